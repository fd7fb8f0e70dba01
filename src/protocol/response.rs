//! Error responses
//!
//! Maps the error taxonomy onto HTTP status codes.

use serde::{Deserialize, Serialize};

use crate::error::ShardKvError;

/// Error category reported to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    BadRequest,
    WriteRejected,
    RoutingError,
    StorageFault,
    TransportError,
    Timeout,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::NotFound => 404,
            ErrorKind::BadRequest => 400,
            ErrorKind::WriteRejected => 403,
            ErrorKind::RoutingError | ErrorKind::StorageFault => 500,
            ErrorKind::TransportError => 502,
            ErrorKind::Timeout => 504,
        }
    }
}

impl From<&ShardKvError> for ErrorKind {
    fn from(err: &ShardKvError) -> Self {
        match err {
            ShardKvError::KeyNotFound => ErrorKind::NotFound,
            ShardKvError::WriteRejected(_) => ErrorKind::WriteRejected,
            ShardKvError::Routing(_) | ShardKvError::Config(_) => ErrorKind::RoutingError,
            ShardKvError::Transport(_) => ErrorKind::TransportError,
            ShardKvError::Timeout(_) => ErrorKind::Timeout,
            ShardKvError::Io(_)
            | ShardKvError::WalCorruption(_)
            | ShardKvError::WalWrite(_)
            | ShardKvError::Storage(_)
            | ShardKvError::Serialization(_) => ErrorKind::StorageFault,
        }
    }
}

/// JSON body of every error response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}

impl ErrorBody {
    pub fn new(kind: ErrorKind, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            kind,
        }
    }
}

impl From<&ShardKvError> for ErrorBody {
    fn from(err: &ShardKvError) -> Self {
        Self::new(ErrorKind::from(err), err.to_string())
    }
}
