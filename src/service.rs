//! Request-level search entry point.
//!
//! [`SearchService::search`] runs validation, tier resolution and a quota
//! reservation in front of the search core. A search that fails after
//! reserving gives its slot back.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tradescout_search::{SearchCoordinator, SearchRequest, SearchResponse};

use crate::error::{AppError, Result};
use crate::quota::{DailyLimits, UsageTracker};
use crate::tiers::{SubscriptionTier, TierCatalog};
use crate::validation::{parse_sources, validate_query};

/// One search as a host submits it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchInput {
    pub query: String,
    /// Wire source names. Empty means every source the tier permits.
    pub sources: Vec<String>,
    pub enhanced: bool,
    /// Authenticated user, if any. Usage is only tracked for known users.
    pub user_id: Option<String>,
    pub tier: SubscriptionTier,
}

impl SearchInput {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }
}

/// Validates, applies tier and quota rules, and delegates to the
/// [`SearchCoordinator`].
pub struct SearchService {
    coordinator: SearchCoordinator,
    catalog: TierCatalog,
    usage: Arc<dyn UsageTracker>,
}

impl std::fmt::Debug for SearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchService")
            .field("coordinator", &self.coordinator)
            .field("catalog", &self.catalog)
            .finish_non_exhaustive()
    }
}

impl SearchService {
    pub fn new(
        coordinator: SearchCoordinator,
        catalog: TierCatalog,
        usage: Arc<dyn UsageTracker>,
    ) -> Self {
        Self {
            coordinator,
            catalog,
            usage,
        }
    }

    pub fn catalog(&self) -> &TierCatalog {
        &self.catalog
    }

    pub fn coordinator(&self) -> &SearchCoordinator {
        &self.coordinator
    }

    /// Run one search for a caller.
    ///
    /// Enhanced mode is silently downgraded when the tier forbids it or the
    /// caller is anonymous.
    ///
    /// # Errors
    ///
    /// - [`AppError::Validation`] for a bad query or unknown source name
    /// - [`AppError::QuotaExceeded`] when the daily search or enhanced
    ///   allowance is spent
    /// - [`AppError::Search`] when the pipeline itself fails
    pub async fn search(&self, input: &SearchInput) -> Result<SearchResponse> {
        let query = validate_query(&input.query)?;
        let sources = parse_sources(&input.sources)?;
        let plan = self.catalog.plan(input.tier);
        let user = input.user_id.as_deref().map(str::trim).filter(|u| !u.is_empty());

        let mut enhanced = input.enhanced;
        if enhanced && !plan.policy.enhanced_mode_allowed {
            tracing::debug!(tier = %input.tier, "enhanced mode not in tier; running standard search");
            enhanced = false;
        }
        if enhanced && user.is_none() {
            tracing::debug!("enhanced mode needs a user; running standard search");
            enhanced = false;
        }

        if let Some(user) = user {
            let limits = DailyLimits {
                searches: plan.daily_search_limit,
                enhanced_searches: plan.policy.enhanced_mode_daily_limit,
            };
            self.usage
                .reserve(user, enhanced, limits)
                .await
                .map_err(|denied| {
                    AppError::QuotaExceeded(format!("{denied} for the {} tier", input.tier))
                })?;
        }

        let request = SearchRequest::new(query, sources).enhanced(enhanced);
        let result = self.coordinator.search(&request, &plan.policy).await;
        if let (Err(_), Some(user)) = (&result, user) {
            self.usage.release(user, enhanced).await;
        }
        Ok(result?)
    }
}
