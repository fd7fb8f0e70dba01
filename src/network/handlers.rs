//! HTTP handlers
//!
//! Each client-facing handler resolves the owning shard first. Local keys go
//! to the Engine; remote keys are forwarded once and the peer's answer is
//! relayed unchanged.

use std::sync::Arc;

use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;

use super::blocking;
use super::server::NodeState;
use crate::error::{Result, ShardKvError};
use crate::protocol::{
    ErrorBody, ErrorKind, HealthResponse, KeyQuery, PurgeResponse, ReplicationEntryBody,
    SequenceQuery, SetQuery, SetResponse, FORWARDED_HEADER, SHARD_HEADER,
};
use crate::purge::purge_foreign_keys;
use crate::sharding::Destination;

impl IntoResponse for ShardKvError {
    fn into_response(self) -> Response {
        let body = ErrorBody::from(&self);
        let status =
            StatusCode::from_u16(body.kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(body)).into_response()
    }
}

fn bad_request(message: &str) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody::new(ErrorKind::BadRequest, message)),
    )
        .into_response()
}

/// Unparseable query strings get the same JSON error body as everything else
fn parse_query<T>(
    query: std::result::Result<Query<T>, QueryRejection>,
) -> std::result::Result<T, Response> {
    query
        .map(|Query(query)| query)
        .map_err(|rejection| bad_request(&rejection.body_text()))
}

/// Tag a locally served response with the shard id
fn local(state: &NodeState, response: impl IntoResponse) -> Response {
    let mut response = response.into_response();
    if let Ok(value) = HeaderValue::from_str(&state.shards.current().to_string()) {
        response.headers_mut().insert(SHARD_HEADER, value);
    }
    response
}

// =============================================================================
// Client-facing
// =============================================================================

pub async fn handle_get(
    State(state): State<Arc<NodeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: std::result::Result<Query<KeyQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let query = match parse_query(query) {
        Ok(query) => query,
        Err(response) => return response,
    };
    let Some(key) = query.key else {
        return bad_request("missing key parameter");
    };

    match route_or_forward(&state, key.as_bytes(), method, &uri, &headers, body).await {
        Ok(None) => {}
        Ok(Some(relayed)) => return relayed,
        Err(e) => return e.into_response(),
    }

    let engine = state.engine.clone();
    let lookup_key = key.clone();
    match blocking(move || engine.get(lookup_key.as_bytes())).await {
        Ok(Some(value)) => local(
            &state,
            ([(header::CONTENT_TYPE, "application/octet-stream")], value),
        ),
        Ok(None) => {
            tracing::debug!(key = %key, "Key not found");
            local(&state, ShardKvError::KeyNotFound)
        }
        Err(e) => {
            tracing::error!(key = %key, "Get failed: {}", e);
            local(&state, e)
        }
    }
}

pub async fn handle_set(
    State(state): State<Arc<NodeState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    query: std::result::Result<Query<SetQuery>, QueryRejection>,
    body: Bytes,
) -> Response {
    let query = match parse_query(query) {
        Ok(query) => query,
        Err(response) => return response,
    };
    let Some(key) = query.key else {
        return bad_request("missing key parameter");
    };

    match route_or_forward(&state, key.as_bytes(), method, &uri, &headers, body.clone()).await {
        Ok(None) => {}
        Ok(Some(relayed)) => return relayed,
        Err(e) => return e.into_response(),
    }

    if state.role.is_replica() {
        tracing::debug!(key = %key, "Rejecting client write on replica");
        return local(
            &state,
            ShardKvError::WriteRejected("this node is a read-only replica".to_string()),
        );
    }

    let value = match query.value {
        Some(value) => value.into_bytes(),
        None => body.to_vec(),
    };

    let engine = state.engine.clone();
    let write_key = key.clone();
    match blocking(move || engine.set(write_key.as_bytes(), &value)).await {
        Ok(sequence) => {
            tracing::debug!(key = %key, ?sequence, "Stored key");
            local(&state, Json(SetResponse { sequence }))
        }
        Err(e) => {
            tracing::error!(key = %key, "Set failed: {}", e);
            local(&state, e)
        }
    }
}

/// `Ok(None)` if the key is local; otherwise the relayed peer response
async fn route_or_forward(
    state: &NodeState,
    key: &[u8],
    method: Method,
    uri: &Uri,
    headers: &HeaderMap,
    body: Bytes,
) -> Result<Option<Response>> {
    let (shard, address) = match state.shards.route(key)? {
        Destination::Local => return Ok(None),
        Destination::Remote { shard, address } => (shard, address),
    };

    // Single hop only: a forwarded request that is still not local means the
    // two nodes disagree about the shard table
    if let Some(from) = headers.get(FORWARDED_HEADER) {
        return Err(ShardKvError::Routing(format!(
            "request forwarded by shard {:?} belongs to shard {}, not {}",
            from,
            shard,
            state.shards.current()
        )));
    }

    let path_and_query = uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or_else(|| uri.path());

    let relayed = state
        .peers
        .forward(address, state.shards.current(), method, path_and_query, headers, body)
        .await
        .map_err(|e| {
            tracing::warn!(shard, address, "Proxy to owning shard failed: {}", e);
            e
        })?;

    let mut response = (relayed.status, relayed.body).into_response();
    for name in [header::CONTENT_TYPE, HeaderName::from_static(SHARD_HEADER)] {
        if let Some(value) = relayed.headers.get(&name) {
            response.headers_mut().insert(name.clone(), value.clone());
        }
    }
    Ok(Some(response))
}

pub async fn handle_purge(State(state): State<Arc<NodeState>>) -> Response {
    let engine = state.engine.clone();
    let shards = state.shards.clone();

    match blocking(move || purge_foreign_keys(&engine, &shards)).await {
        Ok(purged) => local(&state, Json(PurgeResponse { purged })),
        Err(e) => {
            tracing::error!("Purge failed: {}", e);
            local(&state, e)
        }
    }
}

pub async fn handle_health(State(state): State<Arc<NodeState>>) -> Response {
    local(
        &state,
        Json(HealthResponse {
            shard: state.shards.current(),
            shard_count: state.shards.count(),
            role: state.role.to_string(),
            pending_replication: state.engine.pending_replication_count(),
            version: crate::VERSION.to_string(),
        }),
    )
}

// =============================================================================
// Replication (primary side)
// =============================================================================

pub async fn handle_next_replication_key(State(state): State<Arc<NodeState>>) -> Response {
    let Some(entry) = state.engine.next_replication_entry() else {
        return local(&state, StatusCode::NO_CONTENT);
    };

    match String::from_utf8(entry.key) {
        Ok(key) => local(
            &state,
            Json(ReplicationEntryBody {
                sequence: entry.sequence,
                key,
            }),
        ),
        Err(_) => local(
            &state,
            ShardKvError::Storage(format!(
                "replication entry {} references a non UTF-8 key",
                entry.sequence
            )),
        ),
    }
}

pub async fn handle_delete_replication_key(
    State(state): State<Arc<NodeState>>,
    query: std::result::Result<Query<SequenceQuery>, QueryRejection>,
) -> Response {
    let query = match parse_query(query) {
        Ok(query) => query,
        Err(response) => return response,
    };
    let Some(sequence) = query.sequence else {
        return bad_request("missing sequence parameter");
    };

    let engine = state.engine.clone();
    match blocking(move || engine.ack_replication_entry(sequence)).await {
        Ok(()) => {
            tracing::debug!(sequence, "Replication entry acknowledged");
            local(&state, StatusCode::OK)
        }
        Err(ShardKvError::KeyNotFound) => {
            tracing::debug!(sequence, "Replication entry already acknowledged");
            local(&state, ShardKvError::KeyNotFound)
        }
        Err(e) => {
            tracing::error!(sequence, "Acknowledging replication entry failed: {}", e);
            local(&state, e)
        }
    }
}
