//! # tradescout-search
//!
//! Multi-source B2B product search for tradescout.
//!
//! One query fans out to six sourcing sites (Alibaba, Made-in-China,
//! CJ Dropshipping, Global Sources, TradeKorea, Wholesale Central), the raw
//! listings are normalised into one [`Product`] model, an optional
//! AI-assisted enrichment pass fills gaps, and the merged list is shaped by
//! the caller's [`TierPolicy`].
//!
//! ## Design
//!
//! - Providers implement [`ProviderAdapter`] and are built once by
//!   [`ProviderRegistry`]; tests substitute fakes
//! - All sources are queried concurrently with a per-source deadline; a
//!   failing, hanging or panicking source contributes zero results
//! - A per-source circuit breaker skips sites that keep blocking us
//! - Merged results are cached in memory; tier shaping is re-applied on
//!   every request
//!
//! ## Security
//!
//! - API tokens never appear in errors or logs
//! - Search queries are logged only at trace level
//! - Redacted tiers never see source names, supplier names or product URL
//!   query strings

pub mod cache;
pub mod circuit_breaker;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod http;
pub mod normalize;
pub mod orchestrator;
pub mod provider;
pub mod providers;
pub mod tier;
pub mod types;

pub use config::SearchConfig;
pub use coordinator::SearchCoordinator;
pub use error::{Result, SearchError};
pub use orchestrator::fanout::AggregationOrchestrator;
pub use provider::{EnrichmentProvider, ProviderAdapter};
pub use providers::ProviderRegistry;
pub use tier::{ResultCap, TierPolicy};
pub use types::{
    EnrichedField, Product, Provenance, RawCandidate, SearchRequest, SearchResponse, SourceId,
    SourceTag,
};

/// Build a coordinator over every built-in provider.
///
/// Opens the provider sessions before returning. Call
/// [`ProviderRegistry::close_all`] on the returned registry at shutdown.
///
/// # Errors
///
/// Returns [`SearchError::Config`] if `config` is invalid.
///
/// # Examples
///
/// ```no_run
/// # async fn example() -> tradescout_search::Result<()> {
/// use tradescout_search::{SearchConfig, SearchRequest, SourceId, TierPolicy};
///
/// let config = SearchConfig::default();
/// let (coordinator, registry) = tradescout_search::build(&config).await?;
/// let request = SearchRequest::new("ice maker", [SourceId::Alibaba]);
/// let response = coordinator.search(&request, &TierPolicy::unrestricted()).await?;
/// for product in &response.products {
///     println!("{}: {:?}", product.title, product.price);
/// }
/// registry.close_all().await;
/// # Ok(())
/// # }
/// ```
pub async fn build(config: &SearchConfig) -> Result<(SearchCoordinator, ProviderRegistry)> {
    config.validate()?;
    let registry = ProviderRegistry::from_config(config);
    let opened = registry.open_all().await;
    tracing::debug!(opened, "provider sessions opened");
    let coordinator = SearchCoordinator::new(registry.orchestrator(config), config);
    Ok((coordinator, registry))
}
