//! Error types for the tradescout host layer.

use tradescout_search::SearchError;

/// Top-level error type for request handling around the search core.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// The request was rejected before any provider ran.
    #[error("invalid request: {0}")]
    Validation(String),

    /// A daily allowance for the caller's tier is used up.
    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    /// The search core failed as a whole.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed host bridge traffic.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl AppError {
    /// Stable machine-readable category, sent to hosts as `error_kind`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::QuotaExceeded(_) => "quota_exceeded",
            Self::Search(e) => e.kind(),
            Self::Config(_) => "config",
            Self::Io(_) => "io",
            Self::Protocol(_) => "protocol",
        }
    }

    /// Whether the caller can fix this by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::QuotaExceeded(_) | Self::Protocol(_)
        )
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, AppError>;
