//! Daily usage tracking for per-tier allowances.
//!
//! The search core knows nothing about quotas. [`crate::service::SearchService`]
//! reserves a slot with a [`UsageTracker`] before running a search and
//! releases it if the search fails.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;

/// Searches made by one user on one UTC day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyUsage {
    pub searches: u32,
    pub enhanced_searches: u32,
}

/// Allowances a reservation is checked against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DailyLimits {
    /// `None` is unlimited.
    pub searches: Option<u32>,
    pub enhanced_searches: u32,
}

impl DailyLimits {
    /// Whether one more search (enhanced or not) fits on top of `usage`.
    ///
    /// # Errors
    ///
    /// The allowance that is already spent.
    pub fn check(&self, usage: DailyUsage, enhanced: bool) -> Result<(), QuotaDenied> {
        if let Some(limit) = self.searches {
            if usage.searches >= limit {
                return Err(QuotaDenied::Searches(limit));
            }
        }
        if enhanced && usage.enhanced_searches >= self.enhanced_searches {
            return Err(QuotaDenied::Enhanced(self.enhanced_searches));
        }
        Ok(())
    }
}

/// A spent daily allowance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QuotaDenied {
    #[error("daily search limit of {0} reached")]
    Searches(u32),
    #[error("daily enhanced search limit of {0} reached")]
    Enhanced(u32),
}

/// Storage for per-user daily counters.
#[async_trait]
pub trait UsageTracker: Send + Sync {
    /// Today's counters for `user`.
    async fn usage_today(&self, user: &str) -> DailyUsage;

    /// Count one search unconditionally.
    async fn record_search(&self, user: &str, enhanced: bool);

    /// Undo one earlier count, for a search that did not complete.
    async fn release(&self, user: &str, enhanced: bool);

    /// Count one search if it fits within `limits`.
    ///
    /// The default checks then records in two steps; stores that can do
    /// both under one lock or transaction should override it.
    ///
    /// # Errors
    ///
    /// [`QuotaDenied`] when the allowance is spent; nothing is counted.
    async fn reserve(
        &self,
        user: &str,
        enhanced: bool,
        limits: DailyLimits,
    ) -> Result<(), QuotaDenied> {
        limits.check(self.usage_today(user).await, enhanced)?;
        self.record_search(user, enhanced).await;
        Ok(())
    }

    /// Enhanced searches `user` may still run today under `daily_limit`.
    async fn remaining_enhanced(&self, user: &str, daily_limit: u32) -> u32 {
        daily_limit.saturating_sub(self.usage_today(user).await.enhanced_searches)
    }
}

type Clock = Arc<dyn Fn() -> NaiveDate + Send + Sync>;

/// Process-local tracker keyed by (user, UTC date). Counters reset when
/// the date changes; older days are discarded on the next write.
pub struct InMemoryUsageTracker {
    usage: Mutex<HashMap<(String, NaiveDate), DailyUsage>>,
    clock: Clock,
}

impl std::fmt::Debug for InMemoryUsageTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryUsageTracker").finish_non_exhaustive()
    }
}

impl Default for InMemoryUsageTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUsageTracker {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(|| chrono::Utc::now().date_naive()))
    }

    /// A tracker reading the current date from `clock`.
    pub fn with_clock(clock: Clock) -> Self {
        Self {
            usage: Mutex::new(HashMap::new()),
            clock,
        }
    }

    fn today(&self) -> NaiveDate {
        (self.clock)()
    }
}

fn bump(entry: &mut DailyUsage, enhanced: bool) {
    entry.searches = entry.searches.saturating_add(1);
    if enhanced {
        entry.enhanced_searches = entry.enhanced_searches.saturating_add(1);
    }
    tracing::trace!(
        searches = entry.searches,
        enhanced = entry.enhanced_searches,
        "usage recorded"
    );
}

#[async_trait]
impl UsageTracker for InMemoryUsageTracker {
    async fn usage_today(&self, user: &str) -> DailyUsage {
        let today = self.today();
        let usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        usage
            .get(&(user.to_string(), today))
            .copied()
            .unwrap_or_default()
    }

    async fn record_search(&self, user: &str, enhanced: bool) {
        let today = self.today();
        let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        usage.retain(|(_, date), _| *date >= today);
        bump(usage.entry((user.to_string(), today)).or_default(), enhanced);
    }

    async fn release(&self, user: &str, enhanced: bool) {
        let today = self.today();
        let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = usage.get_mut(&(user.to_string(), today)) {
            entry.searches = entry.searches.saturating_sub(1);
            if enhanced {
                entry.enhanced_searches = entry.enhanced_searches.saturating_sub(1);
            }
        }
    }

    async fn reserve(
        &self,
        user: &str,
        enhanced: bool,
        limits: DailyLimits,
    ) -> Result<(), QuotaDenied> {
        let today = self.today();
        let mut usage = self.usage.lock().unwrap_or_else(|e| e.into_inner());
        usage.retain(|(_, date), _| *date >= today);
        let entry = usage.entry((user.to_string(), today)).or_default();
        limits.check(*entry, enhanced)?;
        bump(entry, enhanced);
        Ok(())
    }
}
