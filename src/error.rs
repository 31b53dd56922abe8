//! Error types for catalog_sync
//!
//! Startup failures (`ConfigError`, `SigningError`) are fatal. `ApiError` and
//! `SyncError` are per-product and get counted by the runner.

use thiserror::Error;

/// Invalid credentials or timestamp handed to the request signer
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SigningError {
    /// Access key, secret key or partner tag is empty
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),
    /// Timestamp is not in `YYYYMMDDTHHMMSSZ` form
    #[error("invalid signing timestamp: {0:?}")]
    InvalidTimestamp(String),
    /// Header name or value the signer refuses to canonicalize
    #[error("invalid header: {0:?}")]
    InvalidHeader(String),
}

/// Failure of a single remote operation
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP request failed (network error, timeout, etc.)
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// Remote answered with a non-2xx status
    #[error("remote rejected request ({status}): {code}: {message}")]
    RemoteRejected {
        status: u16,
        code: String,
        message: String,
    },
    /// Response body was not the JSON shape we expected
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    /// Request could not be signed
    #[error("signing failed: {0}")]
    Signing(#[from] SigningError),
}

impl ApiError {
    /// True when the transport gave up waiting for the remote
    pub fn is_timeout(&self) -> bool {
        matches!(self, ApiError::Transport(e) if e.is_timeout())
    }

    /// True when the remote throttled us (HTTP 429)
    pub fn is_throttled(&self) -> bool {
        matches!(self, ApiError::RemoteRejected { status: 429, .. })
    }
}

/// Failure syncing one product
#[derive(Debug, Error)]
pub enum SyncError {
    /// fetch-by-id returned no items for this external id
    #[error("item not found in remote catalog: {0}")]
    NotFound(String),
    /// No product row exists for the internal id
    #[error("unknown product id: {0}")]
    UnknownProduct(i64),
    /// Remote call failed
    #[error(transparent)]
    Api(#[from] ApiError),
    /// Store write failed; the product's transaction was rolled back
    #[error("database error: {0}")]
    Persistence(#[from] rusqlite::Error),
}

impl SyncError {
    /// Whether the runner should count this as a skip rather than an error
    pub fn is_skip(&self) -> bool {
        matches!(self, SyncError::NotFound(_) | SyncError::UnknownProduct(_))
    }
}

/// Missing or invalid startup configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing setting: {0}")]
    Missing(&'static str),
    #[error("invalid base url {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error(transparent)]
    Signing(#[from] SigningError),
    #[error("failed to build http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Result alias for sync operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Result alias for API operations
pub type ApiResult<T> = std::result::Result<T, ApiError>;
