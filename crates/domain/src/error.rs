use serde::{Deserialize, Serialize};

/// Code reported when a request never reached a server.
pub const NETWORK_ERROR: &str = "NETWORK_ERROR";
/// Code reported when a failed response carried no decodable error body.
pub const UNKNOWN: &str = "UNKNOWN";
/// Code reported when a success body could not be decoded into the caller's type.
pub const INVALID_RESPONSE: &str = "INVALID_RESPONSE";
/// Code reported when the credential store could not be read or written.
pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
/// Code reported when a request body could not be serialized.
pub const INVALID_REQUEST: &str = "INVALID_REQUEST";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Typed API error
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The only error shape returned by the API client and the session manager.
///
/// `status == 0` means no HTTP response was received at all.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{code} ({status}): {message}")]
pub struct ApiError {
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(status: u16, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
        }
    }

    /// Transport-level failure: DNS, refused connection, TLS, reset.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(0, NETWORK_ERROR, message)
    }

    /// The transport gave up waiting. Still a `NETWORK_ERROR`.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(0, NETWORK_ERROR, format!("request timed out: {}", message.into()))
    }

    /// A 2xx body that does not fit the type the caller asked for.
    pub fn invalid_response(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, INVALID_RESPONSE, message)
    }

    /// The credential store could not persist a change.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(0, STORAGE_ERROR, message)
    }

    /// The request was never sent because its body could not be encoded.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(0, INVALID_REQUEST, message)
    }

    /// HTTP 401. The only failure that triggers refresh-and-retry during restoration.
    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn is_network(&self) -> bool {
        self.status == 0 && self.code == NETWORK_ERROR
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Workspace error
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Error type for everything outside the request/session core
/// (configuration, credential files, CLI plumbing).
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("config: {0}")]
    Config(String),

    #[error("storage: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, Error>;
