//! Top-level search entry point.
//!
//! [`SearchCoordinator::search`] sequences fan-out, merge and shaping,
//! times each phase and assembles the [`SearchResponse`]. Zero results is
//! a successful response; only a fault escaping the pipeline itself
//! becomes [`SearchError::Internal`].

use std::collections::BTreeSet;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;

use crate::cache::{CacheKey, CachedMerge, ResultCache};
use crate::config::SearchConfig;
use crate::error::{Result, SearchError};
use crate::orchestrator::fanout::AggregationOrchestrator;
use crate::orchestrator::merge::merge;
use crate::orchestrator::shaping::shape;
use crate::tier::TierPolicy;
use crate::types::{
    EnhancementSummary, SearchRequest, SearchResponse, SearchTimings, SourceId,
};

/// Sources a request will actually search: the requested set (or every
/// allowed source when empty) intersected with the tier's allowed set.
pub fn effective_sources(request: &SearchRequest, policy: &TierPolicy) -> BTreeSet<SourceId> {
    policy.permitted_sources(&request.sources)
}

/// Owns the orchestrator and the result cache for the lifetime of the
/// process.
#[derive(Debug)]
pub struct SearchCoordinator {
    orchestrator: AggregationOrchestrator,
    cache: ResultCache,
    default_source_ceiling: usize,
}

impl SearchCoordinator {
    pub fn new(orchestrator: AggregationOrchestrator, config: &SearchConfig) -> Self {
        Self {
            orchestrator,
            cache: ResultCache::new(config.cache_ttl_seconds),
            default_source_ceiling: config.default_source_ceiling,
        }
    }

    pub fn orchestrator(&self) -> &AggregationOrchestrator {
        &self.orchestrator
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Run one search under `policy`.
    ///
    /// Sources outside the policy are dropped silently. Enhanced mode runs
    /// only when both requested and allowed by the policy; quota checks are
    /// the caller's responsibility.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::Internal`] if the pipeline panics. Provider
    /// failures never surface here.
    pub async fn search(&self, request: &SearchRequest, policy: &TierPolicy) -> Result<SearchResponse> {
        let started = Instant::now();
        let request_id = uuid::Uuid::new_v4().to_string();
        let query = request.query.trim();
        let sources = effective_sources(request, policy);
        let enhanced = request.enhanced && policy.enhanced_mode_allowed;
        let limit = policy.per_source_limit(sources.len(), self.default_source_ceiling);

        if request.enhanced && !enhanced {
            tracing::debug!(%request_id, "enhanced mode not permitted by tier, running standard search");
        }
        tracing::trace!(%request_id, query, ?sources, enhanced, limit, "search started");

        let key = CacheKey::new(query, &sources, limit, enhanced);
        let mut timings = SearchTimings::default();

        let merged = match self.cache.get(&key).await {
            Some(hit) => {
                tracing::debug!(%request_id, count = hit.products.len(), "serving merged results from cache");
                timings.cached = true;
                hit
            }
            None => {
                let pipeline = self.fan_out_and_merge(query, &sources, limit, enhanced, &mut timings);
                let (merged, complete) = AssertUnwindSafe(pipeline)
                    .catch_unwind()
                    .await
                    .map_err(|_| {
                        tracing::error!(%request_id, "search pipeline panicked");
                        SearchError::Internal("search pipeline failed unexpectedly".into())
                    })?;
                // Partial results are served once and never cached.
                if complete {
                    self.cache.insert(key, merged.clone()).await;
                } else {
                    tracing::debug!(%request_id, "not caching results with failed sources");
                }
                merged
            }
        };

        let shaping_started = Instant::now();
        let shaped = shape(merged.products, policy, sources.len(), self.default_source_ceiling);
        timings.shaping_ms = elapsed_ms(shaping_started);
        timings.total_ms = elapsed_ms(started);

        tracing::info!(
            %request_id,
            sources = sources.len(),
            total = shaped.total,
            enhanced,
            cached = timings.cached,
            elapsed_ms = timings.total_ms,
            "search completed"
        );

        Ok(SearchResponse {
            request_id,
            query: query.to_string(),
            per_source_counts: shaped.per_source_counts,
            products: shaped.products,
            total_results: shaped.total,
            elapsed: timings,
            enhanced,
            enhancement: merged.enhancement,
        })
    }

    async fn fan_out_and_merge(
        &self,
        query: &str,
        sources: &BTreeSet<SourceId>,
        limit: usize,
        enhanced: bool,
        timings: &mut SearchTimings,
    ) -> (CachedMerge, bool) {
        let outcome = self.orchestrator.run(query, sources, limit, enhanced).await;
        let complete = outcome.is_complete();
        timings.primary_ms = outcome.primary_ms;
        timings.enrichment_ms = outcome.enrichment_ms;

        for report in outcome.reports.iter().filter(|r| r.status.is_failure()) {
            tracing::debug!(
                source = %report.source,
                pass = ?report.pass,
                status = %report.status,
                "source contributed no results"
            );
        }

        let merge_started = Instant::now();
        let merged = merge(outcome.primary, outcome.enrichment);
        timings.merge_ms = elapsed_ms(merge_started);

        let enhancement = enhanced.then_some(EnhancementSummary {
            primary_count: merged.stats.primary,
            enrichment_count: merged.stats.enrichment,
            merged_count: merged.stats.merged,
            appended_count: merged.stats.appended,
        });

        let cached = CachedMerge {
            products: merged.products,
            enhancement,
        };
        (cached, complete)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitBreakerConfig;
    use crate::provider::ProviderAdapter;
    use crate::tier::ResultCap;
    use crate::types::RawCandidate;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    struct CountingProvider {
        source: SourceId,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderAdapter for CountingProvider {
        fn source(&self) -> SourceId {
            self.source
        }

        async fn search(&self, _query: &str, limit: usize) -> Result<Vec<RawCandidate>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((0..limit.min(4))
                .map(|i| RawCandidate::new(self.source, format!("Ice maker variant {i}")))
                .collect())
        }
    }

    /// Fails its first call, then answers normally.
    struct RecoveringProvider {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ProviderAdapter for RecoveringProvider {
        fn source(&self) -> SourceId {
            SourceId::Alibaba
        }

        async fn search(&self, _query: &str, _limit: usize) -> Result<Vec<RawCandidate>> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(SearchError::Http("503 Service Unavailable".into()));
            }
            Ok(vec![RawCandidate::new(SourceId::Alibaba, "Ice maker 50kg")])
        }
    }

    fn policy(sources: &[SourceId], cap: ResultCap) -> TierPolicy {
        TierPolicy {
            allowed_sources: sources.iter().copied().collect(),
            result_cap: cap,
            per_source_limit: None,
            show_source_names: true,
            enhanced_mode_allowed: false,
            enhanced_mode_daily_limit: 0,
        }
    }

    fn coordinator(provider: Arc<CountingProvider>, cache_ttl_seconds: u64) -> SearchCoordinator {
        let config = SearchConfig {
            cache_ttl_seconds,
            ..Default::default()
        };
        let orchestrator =
            AggregationOrchestrator::new(Duration::from_secs(1), CircuitBreakerConfig::default())
                .with_provider(provider);
        SearchCoordinator::new(orchestrator, &config)
    }

    #[tokio::test]
    async fn disallowed_sources_are_dropped() {
        let provider = Arc::new(CountingProvider {
            source: SourceId::Tradekorea,
            calls: AtomicUsize::new(0),
        });
        let coord = coordinator(provider.clone(), 0);
        let request = SearchRequest::new("ice maker", [SourceId::Tradekorea]);
        let response = coord
            .search(&request, &policy(&[SourceId::Alibaba], ResultCap::Limited(10)))
            .await
            .expect("search");
        assert_eq!(response.total_results, 0);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn enhanced_is_downgraded_when_tier_forbids_it() {
        let provider = Arc::new(CountingProvider {
            source: SourceId::Alibaba,
            calls: AtomicUsize::new(0),
        });
        let coord = coordinator(provider, 0);
        let request = SearchRequest::new("ice maker", [SourceId::Alibaba]).enhanced(true);
        let response = coord
            .search(&request, &policy(&[SourceId::Alibaba], ResultCap::Limited(10)))
            .await
            .expect("search");
        assert!(!response.enhanced);
        assert!(response.enhancement.is_none());
        assert!(response.elapsed.enrichment_ms.is_none());
        assert_eq!(response.total_results, 4);
    }

    #[tokio::test]
    async fn cache_serves_repeat_queries() {
        let provider = Arc::new(CountingProvider {
            source: SourceId::Alibaba,
            calls: AtomicUsize::new(0),
        });
        let coord = coordinator(provider.clone(), 600);
        let tier = policy(&[SourceId::Alibaba], ResultCap::Limited(10));

        let first = coord
            .search(&SearchRequest::new("Ice Maker", [SourceId::Alibaba]), &tier)
            .await
            .expect("search");
        let second = coord
            .search(&SearchRequest::new("ice maker ", [SourceId::Alibaba]), &tier)
            .await
            .expect("search");

        assert_eq!(provider.calls.load(Ordering::SeqCst), 1);
        assert!(!first.elapsed.cached);
        assert!(second.elapsed.cached);
        assert_eq!(first.total_results, second.total_results);
        assert_ne!(first.request_id, second.request_id);
    }

    #[tokio::test]
    async fn results_with_failed_sources_are_not_cached() {
        let provider = Arc::new(RecoveringProvider {
            calls: AtomicUsize::new(0),
        });
        let orchestrator =
            AggregationOrchestrator::new(Duration::from_secs(1), CircuitBreakerConfig::default())
                .with_provider(provider.clone());
        let coord = SearchCoordinator::new(orchestrator, &SearchConfig::default());
        let tier = policy(&[SourceId::Alibaba], ResultCap::Limited(10));
        let request = SearchRequest::new("ice maker", [SourceId::Alibaba]);

        let first = coord.search(&request, &tier).await.expect("search");
        assert_eq!(first.total_results, 0);

        let second = coord.search(&request, &tier).await.expect("search");
        assert!(!second.elapsed.cached);
        assert_eq!(second.total_results, 1);

        let third = coord.search(&request, &tier).await.expect("search");
        assert!(third.elapsed.cached);
        assert_eq!(third.total_results, 1);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn fetch_limit_follows_tier_share() {
        let provider = Arc::new(CountingProvider {
            source: SourceId::Alibaba,
            calls: AtomicUsize::new(0),
        });
        let coord = coordinator(provider, 0);
        let response = coord
            .search(
                &SearchRequest::new("ice maker", [SourceId::Alibaba]),
                &policy(&[SourceId::Alibaba], ResultCap::Limited(2)),
            )
            .await
            .expect("search");
        assert_eq!(response.total_results, 2);
        assert_eq!(response.per_source_counts.and_then(|c| c.get(&SourceId::Alibaba).copied()), Some(2));
    }

    #[tokio::test]
    async fn request_ids_are_uuids() {
        let provider = Arc::new(CountingProvider {
            source: SourceId::Alibaba,
            calls: AtomicUsize::new(0),
        });
        let coord = coordinator(provider, 0);
        let response = coord
            .search(
                &SearchRequest::new("ice maker", Vec::<SourceId>::new()),
                &policy(&[SourceId::Alibaba], ResultCap::Unlimited),
            )
            .await
            .expect("search");
        assert!(uuid::Uuid::parse_str(&response.request_id).is_ok());
        assert_eq!(response.query, "ice maker");
    }
}
