//! Error taxonomy shared by every image source.
//!
//! Provider failures are always returned as a typed [`FetchError`] so the
//! orchestrator can record and report them without inspecting the source that
//! produced them.

/// Error returned by source providers and the provider registry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// Timeout, connection failure, or a non-2xx HTTP status.
    #[error("Network error: {message}")]
    Network {
        /// HTTP status code, when the server answered at all.
        status: Option<u16>,
        /// Human readable description of the failure.
        message: String,
    },

    /// The response body did not match the expected schema.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The provider answered successfully but returned zero results.
    #[error("Provider returned no results")]
    EmptyResult,

    /// The registry has no providers to resolve against.
    #[error("No image sources are configured")]
    NoProvidersConfigured,
}

/// Fieldless discriminant of a [`FetchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Network,
    Parse,
    EmptyResult,
    NoProvidersConfigured,
}

impl FetchError {
    /// Create a transport-level network error (no HTTP status available).
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network {
            status: None,
            message: msg.into(),
        }
    }

    /// Create a network error for a non-success HTTP status.
    pub fn status(status: u16, url: &str) -> Self {
        Self::Network {
            status: Some(status),
            message: format!("HTTP {status} from {url}"),
        }
    }

    /// Create a new Parse error.
    pub fn parse<S: Into<String>>(msg: S) -> Self {
        Self::Parse(msg.into())
    }

    /// Return the kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network { .. } => ErrorKind::Network,
            Self::Parse(_) => ErrorKind::Parse,
            Self::EmptyResult => ErrorKind::EmptyResult,
            Self::NoProvidersConfigured => ErrorKind::NoProvidersConfigured,
        }
    }
}

/// Result type alias using [`FetchError`].
pub type FetchResult<T> = std::result::Result<T, FetchError>;
