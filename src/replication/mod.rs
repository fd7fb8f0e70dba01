//! Replication Module
//!
//! Pull-based, single-leader replication. A replica repeatedly asks its
//! primary for the smallest pending log entry, copies the current value of
//! that key, applies it locally and acknowledges the entry.
//!
//! ## Guarantees
//! - At-least-once: an entry is only acknowledged after the local apply
//!   succeeded, so a crash between the two redelivers it
//! - Applying the same entry twice is harmless, the latest value wins
//! - A replica converges to the primary once writes stop and the loop runs
//!
//! The log carries keys, not values. Several writes to one key may be
//! observed as a single change.

mod replicator;

pub use replicator::{ReplicationLoop, StepOutcome};
