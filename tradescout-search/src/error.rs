//! Error types for the tradescout-search crate.
//!
//! All errors use stable string messages suitable for display to users
//! and programmatic handling. No access tokens or API keys appear in
//! error messages.

use crate::types::SourceId;

/// Errors that can occur during a product search.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    /// A single provider failed. Recovered inside the orchestrator and
    /// never surfaced to callers of the coordinator.
    #[error("provider {provider} failed: {message}")]
    Provider {
        /// The source whose provider failed.
        provider: SourceId,
        /// What went wrong.
        message: String,
    },

    /// A provider call exceeded its deadline.
    #[error("search timed out: {0}")]
    Timeout(String),

    /// An HTTP request to a sourcing site or API failed.
    #[error("HTTP error: {0}")]
    Http(String),

    /// Failed to parse a provider response.
    #[error("parse error: {0}")]
    Parse(String),

    /// Invalid search configuration.
    #[error("config error: {0}")]
    Config(String),

    /// Something escaped orchestration that is not attributable to any
    /// single provider.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SearchError {
    /// Stable machine-readable category for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Provider { .. } => "provider",
            Self::Timeout(_) => "timeout",
            Self::Http(_) => "http",
            Self::Parse(_) => "parse",
            Self::Config(_) => "config",
            Self::Internal(_) => "internal",
        }
    }
}

/// Convenience type alias for tradescout-search results.
pub type Result<T> = std::result::Result<T, SearchError>;
