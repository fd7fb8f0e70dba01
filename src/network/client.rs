//! Peer client
//!
//! Outbound HTTP to other nodes: proxied client requests and the replica
//! side of the replication protocol. Every call has a bounded timeout.

use std::time::Duration;

use axum::http::{HeaderMap, Method, StatusCode};
use bytes::Bytes;

use crate::error::{Result, ShardKvError};
use crate::protocol::{
    PurgeResponse, ReplicationEntryBody, SetResponse, HealthResponse, FORWARDED_HEADER,
    ROUTE_DELETE_REPLICATION_KEY, ROUTE_GET, ROUTE_HEALTH, ROUTE_NEXT_REPLICATION_KEY,
    ROUTE_PURGE, ROUTE_SET,
};
use crate::sharding::ShardId;

/// Response of a proxied request, relayed as-is
#[derive(Debug)]
pub struct PeerResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// HTTP client for talking to other nodes
#[derive(Clone)]
pub struct PeerClient {
    http: reqwest::Client,
}

impl PeerClient {
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ShardKvError::Config(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self { http })
    }

    // =========================================================================
    // Proxying
    // =========================================================================

    /// Re-issue a request against `address` unchanged
    pub async fn forward(
        &self,
        address: &str,
        from_shard: ShardId,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<PeerResponse> {
        let url = format!("http://{}{}", address, path_and_query);
        tracing::debug!(%url, %method, "Forwarding request");

        let mut request = self
            .http
            .request(method, &url)
            .header(FORWARDED_HEADER, from_shard.to_string())
            .body(body);
        if let Some(content_type) = headers.get(axum::http::header::CONTENT_TYPE) {
            request = request.header(axum::http::header::CONTENT_TYPE, content_type);
        }

        let response = request.send().await.map_err(|e| transport_error(address, e))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|e| transport_error(address, e))?;

        Ok(PeerResponse {
            status,
            headers,
            body,
        })
    }

    // =========================================================================
    // Client operations
    // =========================================================================

    /// `Ok(None)` when the key does not exist
    pub async fn get(&self, address: &str, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self
            .http
            .get(format!("http://{}{}", address, ROUTE_GET))
            .query(&[("key", key)])
            .send()
            .await
            .map_err(|e| transport_error(address, e))?;

        match response.status() {
            StatusCode::OK => {
                let body = response.bytes().await.map_err(|e| transport_error(address, e))?;
                Ok(Some(body.to_vec()))
            }
            StatusCode::NOT_FOUND => Ok(None),
            status => Err(unexpected_status(address, ROUTE_GET, status, response).await),
        }
    }

    pub async fn set(&self, address: &str, key: &str, value: Vec<u8>) -> Result<SetResponse> {
        let response = self
            .http
            .post(format!("http://{}{}", address, ROUTE_SET))
            .query(&[("key", key)])
            .body(value)
            .send()
            .await
            .map_err(|e| transport_error(address, e))?;

        match response.status() {
            StatusCode::OK => response.json().await.map_err(|e| transport_error(address, e)),
            StatusCode::FORBIDDEN => Err(ShardKvError::WriteRejected(format!(
                "{} refused the write for {:?}",
                address, key
            ))),
            status => Err(unexpected_status(address, ROUTE_SET, status, response).await),
        }
    }

    pub async fn purge(&self, address: &str) -> Result<PurgeResponse> {
        let response = self
            .http
            .post(format!("http://{}{}", address, ROUTE_PURGE))
            .send()
            .await
            .map_err(|e| transport_error(address, e))?;

        match response.status() {
            StatusCode::OK => response.json().await.map_err(|e| transport_error(address, e)),
            status => Err(unexpected_status(address, ROUTE_PURGE, status, response).await),
        }
    }

    pub async fn health(&self, address: &str) -> Result<HealthResponse> {
        let response = self
            .http
            .get(format!("http://{}{}", address, ROUTE_HEALTH))
            .send()
            .await
            .map_err(|e| transport_error(address, e))?;

        match response.status() {
            StatusCode::OK => response.json().await.map_err(|e| transport_error(address, e)),
            status => Err(unexpected_status(address, ROUTE_HEALTH, status, response).await),
        }
    }

    // =========================================================================
    // Replication protocol
    // =========================================================================

    /// Smallest pending log entry on the primary, `None` if there is none
    pub async fn next_replication_entry(
        &self,
        address: &str,
    ) -> Result<Option<ReplicationEntryBody>> {
        let response = self
            .http
            .get(format!("http://{}{}", address, ROUTE_NEXT_REPLICATION_KEY))
            .send()
            .await
            .map_err(|e| transport_error(address, e))?;

        match response.status() {
            StatusCode::OK => response
                .json()
                .await
                .map(Some)
                .map_err(|e| transport_error(address, e)),
            StatusCode::NO_CONTENT => Ok(None),
            status => {
                Err(unexpected_status(address, ROUTE_NEXT_REPLICATION_KEY, status, response).await)
            }
        }
    }

    /// Acknowledge (delete) a log entry on the primary
    ///
    /// Returns `false` if the primary no longer had it.
    pub async fn ack_replication_entry(&self, address: &str, sequence: u64) -> Result<bool> {
        let response = self
            .http
            .post(format!("http://{}{}", address, ROUTE_DELETE_REPLICATION_KEY))
            .query(&[("sequence", sequence)])
            .send()
            .await
            .map_err(|e| transport_error(address, e))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => {
                Err(unexpected_status(address, ROUTE_DELETE_REPLICATION_KEY, status, response).await)
            }
        }
    }
}

fn transport_error(address: &str, err: reqwest::Error) -> ShardKvError {
    if err.is_timeout() {
        ShardKvError::Timeout(address.to_string())
    } else {
        ShardKvError::Transport(format!("{}: {}", address, err))
    }
}

async fn unexpected_status(
    address: &str,
    route: &str,
    status: StatusCode,
    response: reqwest::Response,
) -> ShardKvError {
    let body = response.text().await.unwrap_or_default();
    ShardKvError::Transport(format!(
        "{}{} answered {}: {}",
        address,
        route,
        status,
        body.trim()
    ))
}
