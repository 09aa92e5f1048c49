//! Search configuration with sensible defaults.
//!
//! [`SearchConfig`] controls timeouts, the orchestrator deadline, caching,
//! request behaviour, and where each provider sends its requests. The
//! defaults are tuned for polite scraping of the sourcing sites.

use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitBreakerConfig;
use crate::error::SearchError;
use crate::types::SourceId;

/// Base URLs of the sourcing sites. Overridable so tests can point
/// providers at a mock server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceEndpoints {
    pub alibaba: String,
    pub made_in_china: String,
    pub cj_dropshipping: String,
    pub global_sources: String,
    pub tradekorea: String,
    pub wholesale_central: String,
}

impl Default for SourceEndpoints {
    fn default() -> Self {
        Self {
            alibaba: "https://www.alibaba.com".into(),
            made_in_china: "https://www.made-in-china.com".into(),
            cj_dropshipping: "https://developers.cjdropshipping.com".into(),
            global_sources: "https://www.globalsources.com".into(),
            tradekorea: "https://www.tradekorea.com".into(),
            wholesale_central: "https://www.wholesalecentral.com".into(),
        }
    }
}

impl SourceEndpoints {
    /// Base URL for `source`, without a trailing slash.
    pub fn base_url(&self, source: SourceId) -> &str {
        let raw = match source {
            SourceId::Alibaba => &self.alibaba,
            SourceId::MadeInChina => &self.made_in_china,
            SourceId::CjDropshipping => &self.cj_dropshipping,
            SourceId::GlobalSources => &self.global_sources,
            SourceId::Tradekorea => &self.tradekorea,
            SourceId::WholesaleCentral => &self.wholesale_central,
        };
        raw.trim_end_matches('/')
    }
}

/// Settings for the AI-assisted extraction pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// API key for the extraction service. Enrichment is disabled when unset.
    pub api_key: Option<String>,
    /// Base URL of the extraction service.
    pub base_url: String,
    /// Request timeout in seconds. Extraction renders the page, so this is
    /// longer than the scraping timeout.
    pub timeout_seconds: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.firecrawl.dev".into(),
            timeout_seconds: 60,
        }
    }
}

impl EnrichmentConfig {
    /// Whether an API key is configured.
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Configuration for the search core.
///
/// Use [`Default::default()`] for sensible defaults, or construct with
/// field overrides for custom behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Per-provider HTTP request timeout in seconds.
    pub provider_timeout_seconds: u64,
    /// Orchestrator deadline for a single provider task in seconds. A
    /// provider still running past this is treated as failed.
    pub provider_deadline_seconds: u64,
    /// Per-source ceiling applied when the tier has no finite cap.
    pub default_source_ceiling: usize,
    /// Random delay range in milliseconds `(min, max)` before each
    /// scraping request.
    pub request_delay_ms: (u64, u64),
    /// Custom User-Agent string. If `None`, rotates through a built-in list
    /// of realistic browser User-Agents.
    pub user_agent: Option<String>,
    /// How long to cache merged results in seconds. Set to 0 to disable caching.
    pub cache_ttl_seconds: u64,
    /// Per-source failure tracking.
    pub circuit_breaker: CircuitBreakerConfig,
    /// Where each provider sends its requests.
    pub endpoints: SourceEndpoints,
    /// CJ Dropshipping API access token. The CJ provider fails without one.
    pub cj_api_token: Option<String>,
    /// AI-assisted enrichment settings.
    pub enrichment: EnrichmentConfig,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider_timeout_seconds: 20,
            provider_deadline_seconds: 30,
            default_source_ceiling: 100,
            request_delay_ms: (100, 500),
            user_agent: None,
            cache_ttl_seconds: 300,
            circuit_breaker: CircuitBreakerConfig::default(),
            endpoints: SourceEndpoints::default(),
            cj_api_token: None,
            enrichment: EnrichmentConfig::default(),
        }
    }
}

impl SearchConfig {
    /// Validates this configuration, returning an error if any field is invalid.
    ///
    /// Checks:
    /// - `provider_timeout_seconds` and `provider_deadline_seconds` must be greater than 0
    /// - `default_source_ceiling` must be greater than 0
    /// - `request_delay_ms.0` must be <= `request_delay_ms.1`
    /// - every endpoint and the enrichment base URL must parse as a URL
    pub fn validate(&self) -> Result<(), SearchError> {
        if self.provider_timeout_seconds == 0 {
            return Err(SearchError::Config(
                "provider_timeout_seconds must be greater than 0".into(),
            ));
        }
        if self.provider_deadline_seconds == 0 {
            return Err(SearchError::Config(
                "provider_deadline_seconds must be greater than 0".into(),
            ));
        }
        if self.default_source_ceiling == 0 {
            return Err(SearchError::Config(
                "default_source_ceiling must be greater than 0".into(),
            ));
        }
        if self.request_delay_ms.0 > self.request_delay_ms.1 {
            return Err(SearchError::Config(
                "request_delay_ms min must be <= max".into(),
            ));
        }
        for source in SourceId::all() {
            let base = self.endpoints.base_url(*source);
            url::Url::parse(base).map_err(|e| {
                SearchError::Config(format!("invalid endpoint for {source}: {e}"))
            })?;
        }
        url::Url::parse(&self.enrichment.base_url)
            .map_err(|e| SearchError::Config(format!("invalid enrichment base_url: {e}")))?;
        Ok(())
    }

    /// Point every source at the same base URL. Used to aim all providers
    /// at one mock server.
    pub fn with_all_endpoints(mut self, base: &str) -> Self {
        let base = base.to_string();
        self.endpoints = SourceEndpoints {
            alibaba: base.clone(),
            made_in_china: base.clone(),
            cj_dropshipping: base.clone(),
            global_sources: base.clone(),
            tradekorea: base.clone(),
            wholesale_central: base,
        };
        self
    }
}
