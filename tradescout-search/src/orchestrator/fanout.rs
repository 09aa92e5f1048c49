//! Concurrent multi-source fan-out.
//!
//! One task per permitted source runs the primary adapter; in enhanced
//! mode a second set of tasks runs the enrichment extractors at the same
//! time. Every task is isolated: an error, a panic, or a missed deadline
//! degrades that source to zero results and is recorded in a
//! [`ProviderReport`]. The join never fails fast.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::FutureExt;

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::normalize::Normalizer;
use crate::provider::{EnrichmentProvider, ProviderAdapter};
use crate::types::{Product, Provenance, RawCandidate, SourceId};

/// How one provider task ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Completed, possibly with zero results.
    Succeeded,
    /// Returned an error.
    Failed(String),
    /// Did not finish before the orchestrator deadline.
    TimedOut,
    /// Panicked inside the provider.
    Panicked,
    /// Not attempted because the source's circuit is open.
    CircuitOpen,
    /// Enrichment extractor is not configured.
    Disabled,
}

impl TaskStatus {
    /// Whether this status counts as a provider failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_) | Self::TimedOut | Self::Panicked)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => f.write_str("succeeded"),
            Self::Failed(message) => write!(f, "failed: {message}"),
            Self::TimedOut => f.write_str("timed out"),
            Self::Panicked => f.write_str("panicked"),
            Self::CircuitOpen => f.write_str("circuit open"),
            Self::Disabled => f.write_str("disabled"),
        }
    }
}

/// Observability record for one provider task.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderReport {
    pub source: SourceId,
    pub pass: Provenance,
    pub status: TaskStatus,
    /// Raw candidates the provider returned (after limit enforcement).
    pub raw_count: usize,
    /// Products that survived normalisation.
    pub product_count: usize,
    pub elapsed_ms: u64,
}

/// Everything collected by one fan-out.
#[derive(Debug, Clone, Default)]
pub struct FanOutOutcome {
    /// Primary products, grouped by source in source order, each group in
    /// the provider's own order.
    pub primary: Vec<Product>,
    /// Enrichment products, grouped the same way.
    pub enrichment: Vec<Product>,
    pub reports: Vec<ProviderReport>,
    pub primary_ms: u64,
    /// Present when the enrichment pass ran.
    pub enrichment_ms: Option<u64>,
}

impl FanOutOutcome {
    /// Products per source for the primary pass.
    pub fn primary_counts(&self) -> BTreeMap<SourceId, usize> {
        self.reports
            .iter()
            .filter(|r| r.pass == Provenance::Primary)
            .map(|r| (r.source, r.product_count))
            .collect()
    }

    /// Number of tasks that failed, timed out or panicked.
    pub fn failure_count(&self) -> usize {
        self.reports.iter().filter(|r| r.status.is_failure()).count()
    }

    /// Whether every attempted source answered. Failed, timed out, panicked
    /// and circuit-skipped tasks all make the outcome partial.
    pub fn is_complete(&self) -> bool {
        self.reports
            .iter()
            .all(|r| !r.status.is_failure() && r.status != TaskStatus::CircuitOpen)
    }
}

/// Fans queries out to the registered providers.
///
/// Providers are long-lived and shared; the orchestrator only borrows them
/// per search. Circuit-breaker state is per instance, one breaker per pass.
pub struct AggregationOrchestrator {
    providers: BTreeMap<SourceId, Arc<dyn ProviderAdapter>>,
    enrichers: BTreeMap<SourceId, Arc<dyn EnrichmentProvider>>,
    deadline: Duration,
    primary_breaker: Mutex<CircuitBreaker>,
    enrichment_breaker: Mutex<CircuitBreaker>,
}

impl fmt::Debug for AggregationOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AggregationOrchestrator")
            .field("providers", &self.providers.keys().collect::<Vec<_>>())
            .field("enrichers", &self.enrichers.keys().collect::<Vec<_>>())
            .field("deadline", &self.deadline)
            .finish()
    }
}

impl AggregationOrchestrator {
    pub fn new(deadline: Duration, breaker: CircuitBreakerConfig) -> Self {
        Self {
            providers: BTreeMap::new(),
            enrichers: BTreeMap::new(),
            deadline,
            primary_breaker: Mutex::new(CircuitBreaker::new(breaker.clone())),
            enrichment_breaker: Mutex::new(CircuitBreaker::new(breaker)),
        }
    }

    /// An empty orchestrator using the deadline and breaker settings of `config`.
    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(
            Duration::from_secs(config.provider_deadline_seconds),
            config.circuit_breaker.clone(),
        )
    }

    /// Register (or replace) the primary adapter for its source.
    pub fn with_provider(mut self, provider: Arc<dyn ProviderAdapter>) -> Self {
        self.providers.insert(provider.source(), provider);
        self
    }

    /// Register (or replace) the enrichment extractor for its source.
    pub fn with_enricher(mut self, enricher: Arc<dyn EnrichmentProvider>) -> Self {
        self.enrichers.insert(enricher.source(), enricher);
        self
    }

    /// Sources with a registered primary adapter.
    pub fn sources(&self) -> BTreeSet<SourceId> {
        self.providers.keys().copied().collect()
    }

    pub fn providers(&self) -> impl Iterator<Item = &Arc<dyn ProviderAdapter>> {
        self.providers.values()
    }

    /// Whether any enrichment extractor for `sources` is configured.
    pub fn enrichment_available(&self, sources: &BTreeSet<SourceId>) -> bool {
        sources
            .iter()
            .filter_map(|s| self.enrichers.get(s))
            .any(|e| e.is_enabled())
    }

    /// Breaker state of `source` in one pass.
    pub fn circuit_state(&self, pass: Provenance, source: SourceId) -> CircuitState {
        self.breaker(pass)
            .lock()
            .map_or(CircuitState::Closed, |b| b.state(source))
    }

    fn breaker(&self, pass: Provenance) -> &Mutex<CircuitBreaker> {
        match pass {
            Provenance::Enrichment => &self.enrichment_breaker,
            Provenance::Primary | Provenance::Merged => &self.primary_breaker,
        }
    }

    fn should_attempt(&self, pass: Provenance, source: SourceId) -> bool {
        // A poisoned breaker only loses health data; keep searching.
        self.breaker(pass)
            .lock()
            .map(|mut b| b.should_attempt(source))
            .unwrap_or(true)
    }

    fn record(&self, pass: Provenance, source: SourceId, status: &TaskStatus) {
        let Ok(mut breaker) = self.breaker(pass).lock() else {
            return;
        };
        if status.is_failure() {
            breaker.record_failure(source);
        } else if *status == TaskStatus::Succeeded {
            breaker.record_success(source);
        }
    }

    /// Run the primary pass over `sources` and, when `enhanced`, the
    /// enrichment pass concurrently with it.
    ///
    /// Sources without a registered adapter are skipped. Never fails:
    /// every per-source problem is reflected in the returned reports.
    pub async fn run(
        &self,
        query: &str,
        sources: &BTreeSet<SourceId>,
        limit: usize,
        enhanced: bool,
    ) -> FanOutOutcome {
        let stamp = chrono::Utc::now().timestamp_millis();

        let primary = self.primary_pass(query, sources, limit, stamp);
        let enrichment = async {
            if enhanced {
                Some(self.enrichment_pass(query, sources, limit, stamp).await)
            } else {
                None
            }
        };

        let ((primary, primary_reports, primary_ms), enrichment) =
            futures::join!(primary, enrichment);

        let mut reports = primary_reports;
        let (enrichment, enrichment_ms) = match enrichment {
            Some((products, extra, ms)) => {
                reports.extend(extra);
                (products, Some(ms))
            }
            None => (Vec::new(), None),
        };

        FanOutOutcome {
            primary,
            enrichment,
            reports,
            primary_ms,
            enrichment_ms,
        }
    }

    async fn primary_pass(
        &self,
        query: &str,
        sources: &BTreeSet<SourceId>,
        limit: usize,
        stamp: i64,
    ) -> (Vec<Product>, Vec<ProviderReport>, u64) {
        let started = Instant::now();
        let tasks: Vec<_> = sources
            .iter()
            .filter_map(|source| self.providers.get(source).map(|p| (*source, Arc::clone(p))))
            .map(|(source, provider)| async move {
                if !self.should_attempt(Provenance::Primary, source) {
                    return skipped(source, Provenance::Primary, TaskStatus::CircuitOpen);
                }
                let task = async move { provider.search(query, limit).await };
                self.run_task(source, Provenance::Primary, task, limit, stamp)
                    .await
            })
            .collect();

        let (products, reports) = collect(futures::future::join_all(tasks).await);
        (products, reports, elapsed_ms(started))
    }

    async fn enrichment_pass(
        &self,
        query: &str,
        sources: &BTreeSet<SourceId>,
        limit: usize,
        stamp: i64,
    ) -> (Vec<Product>, Vec<ProviderReport>, u64) {
        let started = Instant::now();
        let tasks: Vec<_> = sources
            .iter()
            .filter_map(|source| self.enrichers.get(source).map(|e| (*source, Arc::clone(e))))
            .map(|(source, enricher)| async move {
                if !enricher.is_enabled() {
                    tracing::trace!(%source, "enrichment extractor disabled, skipping");
                    return skipped(source, Provenance::Enrichment, TaskStatus::Disabled);
                }
                if !self.should_attempt(Provenance::Enrichment, source) {
                    return skipped(source, Provenance::Enrichment, TaskStatus::CircuitOpen);
                }
                let task = async move { enricher.scrape(query, limit).await };
                self.run_task(source, Provenance::Enrichment, task, limit, stamp)
                    .await
            })
            .collect();

        let (products, reports) = collect(futures::future::join_all(tasks).await);
        (products, reports, elapsed_ms(started))
    }

    /// Run one provider call under the deadline with panic isolation, then
    /// normalise what it returned.
    async fn run_task<F>(
        &self,
        source: SourceId,
        pass: Provenance,
        task: F,
        limit: usize,
        stamp: i64,
    ) -> (Vec<Product>, ProviderReport)
    where
        F: std::future::Future<Output = Result<Vec<RawCandidate>, SearchError>>,
    {
        let started = Instant::now();
        tracing::debug!(%source, ?pass, limit, "provider started");

        let guarded = AssertUnwindSafe(task).catch_unwind();
        let (raws, status) = match tokio::time::timeout(self.deadline, guarded).await {
            Ok(Ok(Ok(raws))) => (raws, TaskStatus::Succeeded),
            Ok(Ok(Err(err))) => {
                let message = err.to_string();
                tracing::warn!(%source, ?pass, error = %message, "provider failed");
                (Vec::new(), TaskStatus::Failed(message))
            }
            Ok(Err(_panic)) => {
                tracing::warn!(%source, ?pass, "provider panicked");
                (Vec::new(), TaskStatus::Panicked)
            }
            Err(_elapsed) => {
                tracing::warn!(
                    %source,
                    ?pass,
                    deadline_ms = self.deadline.as_millis() as u64,
                    "provider missed deadline"
                );
                (Vec::new(), TaskStatus::TimedOut)
            }
        };
        self.record(pass, source, &status);

        let raws = enforce_limit(source, raws, limit);
        let raw_count = raws.len();
        let mut normalizer = Normalizer::new(pass, stamp);
        let products = normalizer.normalize_all(raws);

        let report = ProviderReport {
            source,
            pass,
            status,
            raw_count,
            product_count: products.len(),
            elapsed_ms: elapsed_ms(started),
        };
        if report.status == TaskStatus::Succeeded {
            tracing::debug!(
                %source,
                ?pass,
                count = report.product_count,
                elapsed_ms = report.elapsed_ms,
                "provider finished"
            );
        }
        (products, report)
    }
}

/// Drop candidates past `limit`, keeping provider order. Also discards
/// candidates a provider attributed to a different source.
fn enforce_limit(source: SourceId, raws: Vec<RawCandidate>, limit: usize) -> Vec<RawCandidate> {
    let total = raws.len();
    let mut kept: Vec<RawCandidate> = raws.into_iter().filter(|r| r.source == source).collect();
    let foreign = total - kept.len();
    if foreign > 0 {
        tracing::warn!(%source, foreign, "provider returned candidates for another source");
    }
    if kept.len() > limit {
        tracing::warn!(%source, returned = kept.len(), limit, "provider exceeded limit, truncating");
        kept.truncate(limit);
    }
    kept
}

fn skipped(
    source: SourceId,
    pass: Provenance,
    status: TaskStatus,
) -> (Vec<Product>, ProviderReport) {
    if status == TaskStatus::CircuitOpen {
        tracing::warn!(%source, ?pass, "circuit open, source skipped");
    }
    (
        Vec::new(),
        ProviderReport {
            source,
            pass,
            status,
            raw_count: 0,
            product_count: 0,
            elapsed_ms: 0,
        },
    )
}

fn collect(results: Vec<(Vec<Product>, ProviderReport)>) -> (Vec<Product>, Vec<ProviderReport>) {
    let mut products = Vec::new();
    let mut reports = Vec::with_capacity(results.len());
    for (batch, report) in results {
        products.extend(batch);
        reports.push(report);
    }
    (products, reports)
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
