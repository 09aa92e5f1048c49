//! Production command handler backed by [`SearchService`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tradescout_search::ProviderRegistry;

use crate::config::AppConfig;
use crate::error::{AppError, Result};
use crate::host::channel::CommandHandler;
use crate::quota::{InMemoryUsageTracker, UsageTracker};
use crate::service::{SearchInput, SearchService};
use crate::tiers::TierCatalog;

/// Serves host commands with a live search service.
///
/// Owns the provider registry so `runtime.stop` can close provider
/// sessions exactly once.
#[derive(Debug)]
pub struct ServiceHandler {
    service: SearchService,
    registry: Option<ProviderRegistry>,
    stopped: AtomicBool,
}

impl ServiceHandler {
    pub fn new(service: SearchService, registry: Option<ProviderRegistry>) -> Self {
        Self {
            service,
            registry,
            stopped: AtomicBool::new(false),
        }
    }

    /// Build every provider from `config` and open their sessions.
    ///
    /// # Errors
    ///
    /// [`AppError::Config`] when the configuration is invalid.
    pub async fn from_config(config: &AppConfig) -> Result<Self> {
        Self::with_usage(config, Arc::new(InMemoryUsageTracker::new())).await
    }

    /// Like [`ServiceHandler::from_config`] with a caller-supplied usage store.
    ///
    /// # Errors
    ///
    /// [`AppError::Config`] when the configuration is invalid.
    pub async fn with_usage(config: &AppConfig, usage: Arc<dyn UsageTracker>) -> Result<Self> {
        config.validate()?;
        let (coordinator, registry) = tradescout_search::build(&config.search)
            .await
            .map_err(|e| AppError::Config(e.to_string()))?;
        tracing::info!(
            providers = registry.providers().len(),
            enrichers = registry.enrichers().len(),
            "search providers ready"
        );
        let catalog = TierCatalog::with_overrides(&config.tiers);
        Ok(Self::new(
            SearchService::new(coordinator, catalog, usage),
            Some(registry),
        ))
    }

    pub fn service(&self) -> &SearchService {
        &self.service
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandHandler for ServiceHandler {
    async fn search(&self, input: SearchInput) -> Result<serde_json::Value> {
        let response = self.service.search(&input).await?;
        serde_json::to_value(&response)
            .map_err(|e| AppError::Protocol(format!("failed to serialize search response: {e}")))
    }

    fn tiers(&self) -> serde_json::Value {
        let plans: Vec<_> = self.service.catalog().plans().collect();
        serde_json::to_value(plans).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize tier plans");
            serde_json::Value::Array(Vec::new())
        })
    }

    async fn stop(&self) -> Result<()> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        if let Some(registry) = &self.registry {
            let closed = registry.close_all().await;
            tracing::info!(closed, "provider sessions closed");
        }
        self.service.coordinator().cache().clear();
        Ok(())
    }
}
