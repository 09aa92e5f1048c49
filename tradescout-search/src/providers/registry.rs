//! Composition root for providers.
//!
//! Builds every adapter once from configuration. Instances are long-lived
//! and shared by every search; their sessions are opened and closed
//! explicitly, separately from searching.

use std::sync::Arc;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::orchestrator::fanout::AggregationOrchestrator;
use crate::provider::{EnrichmentProvider, ProviderAdapter};
use crate::types::SourceId;

use super::{site_profile, AiExtractProvider, CjDropshippingProvider, ListingProvider};

/// All configured providers.
#[derive(Clone)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn ProviderAdapter>>,
    enrichers: Vec<Arc<dyn EnrichmentProvider>>,
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field(
                "providers",
                &self.providers.iter().map(|p| p.source()).collect::<Vec<_>>(),
            )
            .field(
                "enrichers",
                &self.enrichers.iter().map(|e| e.source()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ProviderRegistry {
    /// An empty registry. Tests add fakes with [`Self::with_provider`].
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
            enrichers: Vec::new(),
        }
    }

    /// Build the six site providers and one enrichment extractor per
    /// scraped site.
    pub fn from_config(config: &SearchConfig) -> Self {
        let mut registry = Self::empty();
        for source in SourceId::all() {
            match site_profile(*source) {
                Some(profile) => {
                    registry
                        .providers
                        .push(Arc::new(ListingProvider::new(profile, config)));
                    registry
                        .enrichers
                        .push(Arc::new(AiExtractProvider::new(profile, config)));
                }
                None => registry
                    .providers
                    .push(Arc::new(CjDropshippingProvider::new(config))),
            }
        }
        registry
    }

    pub fn with_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.push(provider);
        self
    }

    pub fn with_enricher(mut self, enricher: Arc<dyn EnrichmentProvider>) -> Self {
        self.enrichers.push(enricher);
        self
    }

    pub fn providers(&self) -> &[Arc<dyn ProviderAdapter>] {
        &self.providers
    }

    pub fn enrichers(&self) -> &[Arc<dyn EnrichmentProvider>] {
        &self.enrichers
    }

    /// Open every provider session. A provider that fails to open is
    /// logged and left to open lazily on its first search.
    pub async fn open_all(&self) -> usize {
        let results = futures::future::join_all(self.providers.iter().map(|p| async move {
            (p.source(), p.open().await)
        }))
        .await;
        log_failures("open", results)
    }

    /// Close every provider session.
    pub async fn close_all(&self) -> usize {
        let results = futures::future::join_all(self.providers.iter().map(|p| async move {
            (p.source(), p.close().await)
        }))
        .await;
        log_failures("close", results)
    }

    /// Hand the providers to a new orchestrator configured from `config`.
    pub fn orchestrator(&self, config: &SearchConfig) -> AggregationOrchestrator {
        let orchestrator = self
            .providers
            .iter()
            .fold(AggregationOrchestrator::from_config(config), |o, p| {
                o.with_provider(Arc::clone(p))
            });
        self.enrichers
            .iter()
            .fold(orchestrator, |o, e| o.with_enricher(Arc::clone(e)))
    }
}

/// Log lifecycle failures and return how many calls succeeded.
fn log_failures(action: &str, results: Vec<(SourceId, Result<(), SearchError>)>) -> usize {
    let mut succeeded = 0;
    for (source, result) in results {
        match result {
            Ok(()) => succeeded += 1,
            Err(err) => tracing::warn!(%source, error = %err, "provider {action} failed"),
        }
    }
    succeeded
}
