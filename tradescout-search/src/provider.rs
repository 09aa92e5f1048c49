//! Capability contracts for the pluggable search backends.
//!
//! Every sourcing site implements [`ProviderAdapter`]; the AI-assisted
//! second pathway implements [`EnrichmentProvider`]. The orchestrator holds
//! them as `Arc<dyn ...>` keyed by [`SourceId`], so tests substitute fakes
//! implementing the same traits.

use async_trait::async_trait;

use crate::error::SearchError;
use crate::types::{RawCandidate, SourceId};

/// A pluggable primary search backend for one sourcing site.
///
/// Implementors own whatever transport they need (an HTTP session, an API
/// token) and apply their own request timeout. Each implementation must:
///
/// - return at most `limit` candidates
/// - preserve the site's own result order
/// - report failure through `Err`, which the orchestrator downgrades to
///   zero results for this source
///
/// All implementations must be `Send + Sync` for concurrent fan-out.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Which source this adapter represents.
    fn source(&self) -> SourceId;

    /// Search the site for `query`, returning up to `limit` raw listings.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError`] if the request fails, the response cannot
    /// be parsed, or the site is blocking automated access.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawCandidate>, SearchError>;

    /// Acquire long-lived resources ahead of the first search.
    async fn open(&self) -> Result<(), SearchError> {
        Ok(())
    }

    /// Release long-lived resources. Separate from any search call.
    async fn close(&self) -> Result<(), SearchError> {
        Ok(())
    }
}

/// A second, AI-assisted extraction pathway for one sourcing site.
///
/// Output is supplementary: the merge stage never lets it overwrite a
/// value the primary pass already produced.
#[async_trait]
pub trait EnrichmentProvider: Send + Sync {
    /// Which source this extractor targets.
    fn source(&self) -> SourceId;

    /// Whether the extractor is configured. Disabled extractors are skipped
    /// without error.
    fn is_enabled(&self) -> bool;

    /// Extract up to `limit` listings for `query`.
    ///
    /// # Errors
    ///
    /// Same failure rules as [`ProviderAdapter::search`].
    async fn scrape(&self, query: &str, limit: usize) -> Result<Vec<RawCandidate>, SearchError>;
}
