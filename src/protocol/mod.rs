//! Protocol Module
//!
//! The HTTP contract between clients and nodes, and between a replica and
//! its primary.
//!
//! ## Routes
//! ```text
//! GET      /get?key=K                   → 200 raw value | 404
//! GET|POST /set?key=K[&value=V]         → 200 {"sequence": n|null} | 403
//!          (value from the query, else the raw request body)
//! POST     /purge                       → 200 {"purged": n}
//! GET      /next-replication-key        → 200 {"sequence": n, "key": K} | 204
//! POST     /delete-replication-key?sequence=N → 200 | 404
//! GET      /health                      → 200 {"shard", "role", ...}
//! ```
//!
//! `/next-replication-key` and `/delete-replication-key` are internal: only
//! a replica's replication loop calls them, and they carry no authentication.
//!
//! Errors are returned as `{"error": "...", "kind": "..."}`.

mod messages;
mod response;

pub use messages::{
    HealthResponse, KeyQuery, PurgeResponse, ReplicationEntryBody, SequenceQuery, SetQuery,
    SetResponse,
};
pub use response::{ErrorBody, ErrorKind};

pub const ROUTE_GET: &str = "/get";
pub const ROUTE_SET: &str = "/set";
pub const ROUTE_PURGE: &str = "/purge";
pub const ROUTE_NEXT_REPLICATION_KEY: &str = "/next-replication-key";
pub const ROUTE_DELETE_REPLICATION_KEY: &str = "/delete-replication-key";
pub const ROUTE_HEALTH: &str = "/health";

/// Response header naming the shard that served a request
pub const SHARD_HEADER: &str = "x-shard";

/// Request header set on proxied requests; a node never forwards twice
pub const FORWARDED_HEADER: &str = "x-forwarded-by-shard";
