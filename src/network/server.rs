//! HTTP Server
//!
//! Wires the Engine, shard table and replication loop together and serves
//! the routes in `crate::protocol`.

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

use super::client::PeerClient;
use super::handlers;
use crate::config::{Config, NodeRole};
use crate::engine::Engine;
use crate::error::{Result, ShardKvError};
use crate::protocol::{
    ROUTE_DELETE_REPLICATION_KEY, ROUTE_GET, ROUTE_HEALTH, ROUTE_NEXT_REPLICATION_KEY,
    ROUTE_PURGE, ROUTE_SET,
};
use crate::replication::ReplicationLoop;
use crate::sharding::ShardTable;

/// Shared by every request handler
pub struct NodeState {
    pub engine: Arc<Engine>,
    pub shards: Arc<ShardTable>,
    pub role: NodeRole,
    pub peers: PeerClient,
}

/// A ShardKV node
pub struct Server {
    config: Config,
    state: Arc<NodeState>,
}

impl Server {
    /// Open the storage engine and prepare the node
    ///
    /// Any error here is a startup failure; the process must not serve.
    pub fn open(config: Config, shards: ShardTable) -> Result<Self> {
        let engine = Arc::new(Engine::open(config.clone())?);
        Self::with_engine(config, engine, shards)
    }

    /// Build a node around an already opened engine
    pub fn with_engine(config: Config, engine: Arc<Engine>, shards: ShardTable) -> Result<Self> {
        if engine.role() != config.role {
            return Err(ShardKvError::Config(format!(
                "engine opened as {} but node configured as {}",
                engine.role(),
                config.role
            )));
        }

        let peers = PeerClient::new(config.request_timeout())?;
        let state = Arc::new(NodeState {
            engine,
            shards: Arc::new(shards),
            role: config.role,
            peers,
        });

        Ok(Self { config, state })
    }

    /// All routes, with request tracing
    pub fn router(&self) -> Router {
        Router::new()
            .route(ROUTE_GET, get(handlers::handle_get))
            .route(ROUTE_SET, get(handlers::handle_set).post(handlers::handle_set))
            .route(ROUTE_PURGE, post(handlers::handle_purge))
            .route(
                ROUTE_NEXT_REPLICATION_KEY,
                get(handlers::handle_next_replication_key),
            )
            .route(
                ROUTE_DELETE_REPLICATION_KEY,
                post(handlers::handle_delete_replication_key),
            )
            .route(ROUTE_HEALTH, get(handlers::handle_health))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone())
    }

    /// The replication loop this node runs, if it is a replica
    pub fn replication_loop(&self) -> Option<ReplicationLoop> {
        if !self.config.role.is_replica() {
            return None;
        }

        let primary = self
            .config
            .primary_addr
            .clone()
            .unwrap_or_else(|| self.state.shards.local_address().to_string());

        Some(ReplicationLoop::new(
            self.state.engine.clone(),
            self.state.peers.clone(),
            primary,
            self.config.replication_poll_interval(),
        ))
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.state.engine
    }

    pub fn shards(&self) -> &ShardTable {
        &self.state.shards
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Serve until `shutdown` flips to true (or its sender is dropped)
    ///
    /// Replicas also run the replication loop. On the way out the loop is
    /// stopped and joined, then the engine is closed; this happens even when
    /// serving fails.
    pub async fn run(self, listener: TcpListener, shutdown: watch::Receiver<bool>) -> Result<()> {
        let (stop_tx, stop_rx) = watch::channel(false);
        let replication = self.replication_loop().map(|lp| lp.spawn(stop_rx));

        let served = self.serve(listener, shutdown).await;

        let _ = stop_tx.send(true);
        if let Some(handle) = replication {
            if let Err(e) = handle.await {
                tracing::error!("Replication task ended abnormally: {}", e);
            }
        }

        let engine = self.state.engine.clone();
        let closed = super::blocking(move || engine.close()).await;

        served?;
        closed
    }

    async fn serve(&self, listener: TcpListener, shutdown: watch::Receiver<bool>) -> Result<()> {
        let local_addr = listener.local_addr()?;
        tracing::info!(
            addr = %local_addr,
            shard = self.state.shards.current(),
            role = %self.config.role,
            "HTTP server listening"
        );

        axum::serve(listener, self.router())
            .with_graceful_shutdown(wait_for_shutdown(shutdown))
            .await?;

        tracing::info!(addr = %local_addr, "Server stopped");
        Ok(())
    }
}

/// Resolves once the flag is set or the sender goes away
pub(crate) async fn wait_for_shutdown(mut shutdown: watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
