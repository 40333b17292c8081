//! Error types for CVForge
//!
//! Two layers live here. [`ApiError`] is the taxonomy every request-layer
//! operation reports: it is `Clone` so one failure can be handed to every
//! waiter of a de-duplicated request and stored inside a cache entry.
//! [`CvforgeError`] covers everything around it (configuration, local
//! storage, IO) and is what the application-level `anyhow` [`Result`]
//! usually carries.

use thiserror::Error;

/// Number of body characters kept for protocol diagnostics.
pub const BODY_SNIPPET_LEN: usize = 200;

/// Machine-checkable classification of an [`ApiError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No token was present; nothing was sent.
    Unauthenticated,
    /// Transport failure (DNS, refused connection, timeout).
    Network,
    /// The server answered with something other than JSON, or broken JSON.
    Protocol,
    /// The server answered with a JSON error envelope or a non-2xx status.
    Request,
    /// Login or signup was rejected.
    Credential,
    /// The caller passed an argument the backend would reject anyway.
    InvalidInput,
    /// The local token store could not be written.
    Storage,
}

impl ErrorKind {
    /// Stable lowercase name, used as a metrics label and in CLI output.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Network => "network",
            ErrorKind::Protocol => "protocol",
            ErrorKind::Request => "request",
            ErrorKind::Credential => "credential",
            ErrorKind::InvalidInput => "invalid_input",
            ErrorKind::Storage => "storage",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors surfaced by the HTTP client, the resource services and the
/// query layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No bearer token is stored
    #[error("Not authenticated. Please log in.")]
    Unauthenticated,

    /// Network-level failure before any HTTP response was read
    #[error("Network error: {0}")]
    Network(String),

    /// Response was not JSON (or not parseable JSON)
    #[error("Protocol error: {message}")]
    Protocol {
        /// What was expected versus what arrived
        message: String,
        /// Leading characters of the body, for diagnostics
        snippet: String,
    },

    /// Server returned a JSON error envelope or a non-success status
    #[error("Request failed ({status}): {message}")]
    Request {
        /// HTTP status code
        status: u16,
        /// Message from the body's `message` / `error` field
        message: String,
    },

    /// Login or signup rejected by the server
    #[error("{0}")]
    Credential(String),

    /// Invalid caller input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Token store write failure
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ApiError {
    /// Builds a protocol error, truncating the body to [`BODY_SNIPPET_LEN`]
    /// characters.
    pub fn protocol(message: impl Into<String>, body: &str) -> Self {
        ApiError::Protocol {
            message: message.into(),
            snippet: body.chars().take(BODY_SNIPPET_LEN).collect(),
        }
    }

    /// Returns the classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Unauthenticated => ErrorKind::Unauthenticated,
            ApiError::Network(_) => ErrorKind::Network,
            ApiError::Protocol { .. } => ErrorKind::Protocol,
            ApiError::Request { .. } => ErrorKind::Request,
            ApiError::Credential(_) => ErrorKind::Credential,
            ApiError::InvalidInput(_) => ErrorKind::InvalidInput,
            ApiError::Storage(_) => ErrorKind::Storage,
        }
    }

    /// Human-readable message for display.
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Whether a retry could plausibly succeed.
    ///
    /// Network failures, 5xx, 408 and 429 are transient. Protocol errors are
    /// not: an HTML page from a misconfigured server does not fix itself
    /// between attempts.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Network(_) => true,
            ApiError::Request { status, .. } => {
                *status >= 500 || *status == 408 || *status == 429
            }
            _ => false,
        }
    }

    /// True when the server rejected the bearer token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Request { status: 401, .. })
    }
}

/// Result alias for request-layer operations.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Crate-level error type for everything outside the request path.
#[derive(Error, Debug)]
pub enum CvforgeError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request-layer failure
    #[error(transparent)]
    Api(#[from] ApiError),

    /// Local key-value storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type alias for application-level operations
///
/// Uses `anyhow::Error` so callers can attach context while still being able
/// to downcast to [`CvforgeError`] or [`ApiError`].
pub type Result<T> = anyhow::Result<T>;
