//! Network Module
//!
//! HTTP server, request routing and the client used to talk to peers.
//!
//! ## Architecture
//! - axum on the tokio multi-threaded runtime, one task per request
//! - Keys owned by this shard go to the local Engine
//! - Everything else is proxied once to the owning shard's address
//! - Storage calls run on the blocking pool

mod client;
mod handlers;
mod server;

pub use client::{PeerClient, PeerResponse};
pub use server::{NodeState, Server};

use crate::error::{Result, ShardKvError};

/// Run a blocking storage call off the async workers
pub(crate) async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ShardKvError::Storage(format!("storage task failed: {}", e)))?
}
