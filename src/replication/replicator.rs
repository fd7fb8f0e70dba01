use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::engine::Engine;
use crate::error::Result;
use crate::network::PeerClient;

/// Result of one replication step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// One log entry was applied and acknowledged
    Applied { sequence: u64 },
    /// The primary had nothing pending
    Idle,
}

/// Replica-side replication worker
pub struct ReplicationLoop {
    engine: Arc<Engine>,
    peers: PeerClient,
    primary: String,
    poll_interval: Duration,
}

impl ReplicationLoop {
    pub fn new(
        engine: Arc<Engine>,
        peers: PeerClient,
        primary: impl Into<String>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            engine,
            peers,
            primary: primary.into(),
            poll_interval,
        }
    }

    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// Fetch, apply and acknowledge at most one log entry
    pub async fn run_once(&self) -> Result<StepOutcome> {
        let Some(entry) = self.peers.next_replication_entry(&self.primary).await? else {
            return Ok(StepOutcome::Idle);
        };

        let value = self.peers.get(&self.primary, &entry.key).await?;

        let engine = self.engine.clone();
        let key = entry.key.clone();
        let deleted = value.is_none();
        crate::network::blocking(move || match value {
            Some(value) => engine.set(key.as_bytes(), &value).map(|_| ()),
            // Gone on the primary since it was logged
            None => engine.delete(key.as_bytes()),
        })
        .await?;

        if !self
            .peers
            .ack_replication_entry(&self.primary, entry.sequence)
            .await?
        {
            tracing::debug!(
                sequence = entry.sequence,
                "Replication entry was already acknowledged"
            );
        }

        tracing::debug!(
            sequence = entry.sequence,
            key = %entry.key,
            deleted,
            "Applied replication entry"
        );
        Ok(StepOutcome::Applied {
            sequence: entry.sequence,
        })
    }

    /// Run until `shutdown` flips to true or its sender is dropped
    ///
    /// Drains the log back to back while there is work; sleeps for the poll
    /// interval when idle or after a failure. Failures never stop the loop.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(primary = %self.primary, "Replication loop started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.run_once().await {
                Ok(StepOutcome::Applied { .. }) => false,
                Ok(StepOutcome::Idle) => true,
                Err(e) if e.is_storage_fault() => {
                    tracing::error!(primary = %self.primary, "Replication apply failed: {}", e);
                    true
                }
                Err(e) => {
                    tracing::warn!(primary = %self.primary, "Replication step failed: {}", e);
                    true
                }
            };

            if pause {
                tokio::select! {
                    _ = tokio::time::sleep(self.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!(primary = %self.primary, "Replication loop stopped");
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
