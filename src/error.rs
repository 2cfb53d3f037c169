//! Error types for the tiered cache
//!
//! Provides unified error handling using thiserror.

use std::error::Error as StdError;
use std::sync::Arc;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Boxed error type accepted from compute functions.
pub type BoxError = Box<dyn StdError + Send + Sync + 'static>;

// == Codec Error ==
/// Failure turning a value into bytes or bytes back into a value.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The binary format rejected the value or payload
    #[error("binary format: {0}")]
    Binary(#[from] bincode::Error),

    /// Text destination received bytes that are not UTF-8
    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

// == Store Error ==
/// Failure talking to the remote tier. Never used to signal a miss.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The request never produced a response
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The remote answered with an unexpected status
    #[error("remote returned status {status}: {message}")]
    Status { status: u16, message: String },

    /// The remote endpoint is misconfigured
    #[error("invalid remote endpoint: {0}")]
    InvalidEndpoint(String),

    /// The backend is temporarily unable to serve requests
    #[error("remote store unavailable: {0}")]
    Unavailable(String),
}

// == Cache Error ==
/// Error returned by the tiered cache operations.
///
/// Cloneable so a single in-flight result can be handed to every waiter.
#[derive(Error, Debug, Clone)]
pub enum CacheError {
    /// Key is absent from every configured tier
    #[error("cache miss")]
    Miss,

    /// Keys must be non-empty
    #[error("invalid key: keys must be non-empty")]
    InvalidKey,

    /// Stored bytes do not match the requested destination type
    #[error("failed to decode cached value: {0}")]
    Decode(#[source] Arc<CodecError>),

    /// The value could not be encoded
    #[error("failed to encode value: {0}")]
    Encode(#[source] Arc<CodecError>),

    /// The compute function failed; the original error is kept as the source
    #[error("compute failed: {0}")]
    Compute(#[source] Arc<dyn StdError + Send + Sync + 'static>),

    /// Remote tier I/O failure
    #[error("remote store error: {0}")]
    Store(#[source] Arc<StoreError>),

    /// The compute task ended before producing a result
    #[error("compute task ended without a result")]
    Canceled,
}

impl CacheError {
    pub(crate) fn decode(err: CodecError) -> Self {
        CacheError::Decode(Arc::new(err))
    }

    pub(crate) fn encode(err: CodecError) -> Self {
        CacheError::Encode(Arc::new(err))
    }

    pub(crate) fn compute(err: impl Into<BoxError>) -> Self {
        CacheError::Compute(Arc::from(err.into()))
    }

    /// Returns true for [`CacheError::Miss`].
    pub fn is_miss(&self) -> bool {
        matches!(self, CacheError::Miss)
    }

    /// Returns the error produced by the compute function, if this is one.
    pub fn compute_error(&self) -> Option<&(dyn StdError + Send + Sync + 'static)> {
        match self {
            CacheError::Compute(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl From<StoreError> for CacheError {
    fn from(err: StoreError) -> Self {
        CacheError::Store(Arc::new(err))
    }
}

// == Api Error ==
/// Error type for the cache node HTTP API.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Key not found on the node
    #[error("Key not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Backing store failure
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

// == IntoResponse Implementation ==
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for cache operations.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;
