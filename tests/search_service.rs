//! Service-level tests: validation, tier presets, quotas and the bridge
//! dispatch, with fake providers in place of the sourcing sites.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tradescout::host::channel::{CommandHandler, command_channel};
use tradescout::host::contract::{CommandEnvelope, CommandName};
use tradescout::host::handler::ServiceHandler;
use tradescout::host::stdio::run_bridge;
use tradescout::{
    AppError, InMemoryUsageTracker, SearchInput, SearchService, SubscriptionTier, TierCatalog,
    UsageTracker,
};
use tradescout_search::circuit_breaker::CircuitBreakerConfig;
use tradescout_search::{
    AggregationOrchestrator, EnrichmentProvider, ProviderAdapter, RawCandidate, SearchConfig,
    SearchCoordinator, SearchError, SourceId, SourceTag,
};

struct FakeProvider {
    source: SourceId,
    calls: Arc<AtomicUsize>,
}

#[async_trait]
impl ProviderAdapter for FakeProvider {
    fn source(&self) -> SourceId {
        self.source
    }

    async fn search(&self, _query: &str, limit: usize) -> Result<Vec<RawCandidate>, SearchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..limit.min(40))
            .map(|i| {
                let mut raw = RawCandidate::new(self.source, format!("Ice maker {i}"));
                raw.price_text = "$80.00-$120.00".into();
                raw.supplier_text = "Gold Supplier 98% response rate".into();
                raw.product_url = Some(format!("https://example.com/p/{i}?spm=a1"));
                raw
            })
            .collect())
    }
}

struct FakeEnricher {
    source: SourceId,
}

#[async_trait]
impl EnrichmentProvider for FakeEnricher {
    fn source(&self) -> SourceId {
        self.source
    }

    fn is_enabled(&self) -> bool {
        true
    }

    async fn scrape(&self, _query: &str, _limit: usize) -> Result<Vec<RawCandidate>, SearchError> {
        let mut raw = RawCandidate::new(self.source, "Ice maker 0");
        raw.rating_text = "4.6".into();
        Ok(vec![raw])
    }
}

struct Fixture {
    service: SearchService,
    calls: Arc<AtomicUsize>,
    usage: Arc<InMemoryUsageTracker>,
}

fn fixture() -> Fixture {
    let calls = Arc::new(AtomicUsize::new(0));
    let orchestrator =
        SourceId::all()
            .iter()
            .fold(
                AggregationOrchestrator::new(Duration::from_secs(2), CircuitBreakerConfig::default()),
                |orch, source| {
                    orch.with_provider(Arc::new(FakeProvider {
                        source: *source,
                        calls: Arc::clone(&calls),
                    }))
                    .with_enricher(Arc::new(FakeEnricher { source: *source }))
                },
            );
    let config = SearchConfig {
        cache_ttl_seconds: 0,
        ..Default::default()
    };
    let usage = Arc::new(InMemoryUsageTracker::new());
    let service = SearchService::new(
        SearchCoordinator::new(orchestrator, &config),
        TierCatalog::default(),
        Arc::clone(&usage) as Arc<dyn UsageTracker>,
    );
    Fixture {
        service,
        calls,
        usage,
    }
}

fn input(tier: SubscriptionTier, user: Option<&str>) -> SearchInput {
    SearchInput {
        tier,
        user_id: user.map(str::to_string),
        ..SearchInput::new("  ice maker  ")
    }
}

#[tokio::test]
async fn free_tier_is_capped_and_redacted() {
    let fx = fixture();
    let response = fx
        .service
        .search(&input(SubscriptionTier::Free, Some("alice")))
        .await
        .expect("search");

    assert_eq!(response.query, "ice maker");
    assert_eq!(response.total_results, 10);
    assert!(response.per_source_counts.is_none());
    assert_eq!(fx.calls.load(Ordering::SeqCst), 2, "only the two free sources run");
    for product in &response.products {
        assert_eq!(product.source, SourceTag::Redacted);
        assert_eq!(product.price, Some(100.0));
        let url = product.product_url.as_deref().expect("url");
        assert!(!url.contains('?'));
    }
    assert_eq!(fx.usage.usage_today("alice").await.searches, 1);
}

#[tokio::test]
async fn starter_tier_shows_counts_for_its_sources() {
    let fx = fixture();
    let mut request = input(SubscriptionTier::Starter, None);
    request.sources = vec![
        "alibaba".into(),
        "tradekorea".into(),
        "cj-dropshipping".into(),
    ];
    let response = fx.service.search(&request).await.expect("search");

    let counts = response.per_source_counts.expect("counts shown");
    assert!(!counts.contains_key(&SourceId::Tradekorea));
    assert_eq!(counts.values().sum::<usize>(), response.total_results);
    // ceil(50 / 2) per source, each fake returns at most 40.
    assert_eq!(counts[&SourceId::Alibaba], 25);
}

#[tokio::test]
async fn enhanced_search_is_counted_and_capped() {
    let fx = fixture();
    let request = SearchInput {
        enhanced: true,
        sources: vec!["alibaba".into()],
        ..input(SubscriptionTier::Pro, Some("bob"))
    };

    let limit = SubscriptionTier::Pro.preset().policy.enhanced_mode_daily_limit;
    for _ in 0..limit {
        let response = fx.service.search(&request).await.expect("within quota");
        assert!(response.enhanced);
        let first = &response.products[0];
        assert_eq!(first.supplier_rating, Some(4.6));
    }

    let err = fx.service.search(&request).await.unwrap_err();
    assert!(matches!(err, AppError::QuotaExceeded(_)));
    assert_eq!(fx.usage.usage_today("bob").await.enhanced_searches, limit);

    // Standard searches still go through.
    let standard = SearchInput {
        enhanced: false,
        ..request
    };
    assert!(!fx.service.search(&standard).await.expect("standard").enhanced);
}

#[tokio::test]
async fn enhanced_downgraded_when_tier_forbids_it() {
    let fx = fixture();
    let request = SearchInput {
        enhanced: true,
        ..input(SubscriptionTier::Starter, Some("carol"))
    };
    let response = fx.service.search(&request).await.expect("search");
    assert!(!response.enhanced);
    assert!(response.enhancement.is_none());
    assert_eq!(fx.usage.usage_today("carol").await.enhanced_searches, 0);
}

#[tokio::test]
async fn rejected_requests_do_not_count_usage() {
    let fx = fixture();
    let mut request = input(SubscriptionTier::Free, Some("dave"));
    request.sources = vec!["nowhere".into()];
    assert_eq!(
        fx.service.search(&request).await.unwrap_err().kind(),
        "validation"
    );
    assert_eq!(fx.usage.usage_today("dave").await.searches, 0);
    assert_eq!(fx.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_searches_respect_daily_limit() {
    let fx = fixture();
    let service = Arc::new(fx.service);
    let limit = SubscriptionTier::Free
        .preset()
        .daily_search_limit
        .expect("free tier is limited");

    let tasks: Vec<_> = (0..limit + 10)
        .map(|_| {
            let service = Arc::clone(&service);
            tokio::spawn(async move {
                service
                    .search(&input(SubscriptionTier::Free, Some("erin")))
                    .await
            })
        })
        .collect();

    let mut granted = 0;
    for task in tasks {
        match task.await.expect("task") {
            Ok(_) => granted += 1,
            Err(e) => assert_eq!(e.kind(), "quota_exceeded"),
        }
    }
    assert_eq!(granted, limit);
    assert_eq!(fx.usage.usage_today("erin").await.searches, limit);
}

#[tokio::test]
async fn channel_dispatches_search_to_service() {
    let fx = fixture();
    let (client, server) = command_channel(4, ServiceHandler::new(fx.service, None));
    let server_task = tokio::spawn(server.run());

    let resp = client
        .send(CommandEnvelope::new(
            "r1",
            CommandName::Search,
            serde_json::json!({"query": "ice maker", "tier": "enterprise", "sources": ["global-sources"]}),
        ))
        .await
        .expect("send");
    assert!(resp.ok, "{:?}", resp.error);
    assert_eq!(resp.payload["perSourceCounts"]["global-sources"], 40);
    assert_eq!(resp.payload["products"][0]["source"], "global-sources");

    drop(client);
    server_task.await.expect("server task");
}

#[tokio::test]
async fn bridge_streams_search_responses() {
    let fx = fixture();
    let handler = Arc::new(ServiceHandler::new(fx.service, None));
    let input = concat!(
        r#"{"v":1,"request_id":"q1","command":"search","payload":{"query":"ice maker"}}"#,
        "\n",
        r#"{"v":1,"request_id":"q2","command":"search","payload":{"query":"x"}}"#,
        "\n",
        r#"{"v":1,"request_id":"q3","command":"runtime.stop"}"#,
        "\n",
    );
    let mut output = Vec::new();
    run_bridge(input.as_bytes(), &mut output, Arc::clone(&handler))
        .await
        .expect("bridge");

    let lines: Vec<serde_json::Value> = String::from_utf8(output)
        .expect("utf8")
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["request_id"], "q1");
    assert_eq!(lines[0]["payload"]["totalResults"], 10);
    assert_eq!(lines[1]["error_kind"], "validation");
    assert_eq!(lines[2]["payload"]["stopping"], true);
    assert!(handler.is_stopped());
    assert_eq!(handler.tiers().as_array().map(Vec::len), Some(4));
}
