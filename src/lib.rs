//! # tradescout
//!
//! Host layer around [`tradescout_search`]: application config, subscription
//! tiers, request validation, daily quotas, and the `tradescout-host`
//! newline-delimited JSON bridge.
//!
//! A request flows through [`SearchService::search`]: the query and source
//! names are validated, the caller's [`SubscriptionTier`] resolves to a
//! [`tradescout_search::TierPolicy`], quotas are checked, and the search
//! core does the rest.

pub mod config;
pub mod error;
pub mod host;
pub mod quota;
pub mod service;
pub mod tiers;
pub mod validation;

pub use config::AppConfig;
pub use error::{AppError, Result};
pub use quota::{DailyLimits, InMemoryUsageTracker, QuotaDenied, UsageTracker};
pub use service::{SearchInput, SearchService};
pub use tiers::{SubscriptionTier, TierCatalog, TierPlan};
