//! Subscription tiers and the search policies they resolve to.
//!
//! Four presets ship built in. Deployments adjust them through the
//! `[tiers.<name>]` tables of the config file; unset fields keep the
//! preset value.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tradescout_search::{ResultCap, SourceId, TierPolicy};

/// Subscription plan a caller is on.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionTier {
    #[default]
    Free,
    Starter,
    Pro,
    Enterprise,
}

impl SubscriptionTier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Starter => "starter",
            Self::Pro => "pro",
            Self::Enterprise => "enterprise",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "free" => Some(Self::Free),
            "starter" => Some(Self::Starter),
            "pro" => Some(Self::Pro),
            "enterprise" => Some(Self::Enterprise),
            _ => None,
        }
    }

    pub fn all() -> &'static [SubscriptionTier] {
        &[Self::Free, Self::Starter, Self::Pro, Self::Enterprise]
    }

    /// Built-in plan for this tier.
    pub fn preset(self) -> TierPlan {
        let sources = |list: &[SourceId]| list.iter().copied().collect::<BTreeSet<_>>();
        let all = sources(SourceId::all());
        let (policy, daily_search_limit) = match self {
            Self::Free => (
                TierPolicy {
                    allowed_sources: sources(&[SourceId::Alibaba, SourceId::MadeInChina]),
                    result_cap: ResultCap::Limited(10),
                    per_source_limit: None,
                    show_source_names: false,
                    enhanced_mode_allowed: false,
                    enhanced_mode_daily_limit: 0,
                },
                Some(20),
            ),
            Self::Starter => (
                TierPolicy {
                    allowed_sources: sources(&[
                        SourceId::Alibaba,
                        SourceId::MadeInChina,
                        SourceId::CjDropshipping,
                        SourceId::GlobalSources,
                    ]),
                    result_cap: ResultCap::Limited(50),
                    per_source_limit: None,
                    show_source_names: true,
                    enhanced_mode_allowed: false,
                    enhanced_mode_daily_limit: 0,
                },
                Some(200),
            ),
            Self::Pro => (
                TierPolicy {
                    allowed_sources: all,
                    result_cap: ResultCap::Limited(200),
                    per_source_limit: None,
                    show_source_names: true,
                    enhanced_mode_allowed: true,
                    enhanced_mode_daily_limit: 10,
                },
                None,
            ),
            Self::Enterprise => (
                TierPolicy {
                    allowed_sources: all,
                    result_cap: ResultCap::Unlimited,
                    per_source_limit: None,
                    show_source_names: true,
                    enhanced_mode_allowed: true,
                    enhanced_mode_daily_limit: 100,
                },
                None,
            ),
        };
        TierPlan {
            tier: self,
            policy,
            daily_search_limit,
        }
    }
}

impl fmt::Display for SubscriptionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tier's search policy plus the limits enforced outside the search core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierPlan {
    pub tier: SubscriptionTier,
    pub policy: TierPolicy,
    /// Searches per user per UTC day. `None` is unlimited.
    pub daily_search_limit: Option<u32>,
}

/// Partial overrides for one tier. Unset fields keep the preset value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<SourceId>>,
    /// `-1` for unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_cap: Option<ResultCap>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_source_limit: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub show_source_names: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_mode_allowed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enhanced_mode_daily_limit: Option<u32>,
    /// `0` removes the daily search limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub daily_search_limit: Option<u32>,
}

impl TierOverride {
    fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    fn apply(&self, plan: &mut TierPlan) {
        if let Some(sources) = &self.sources {
            plan.policy.allowed_sources = sources.iter().copied().collect();
        }
        if let Some(cap) = self.result_cap {
            plan.policy.result_cap = cap;
        }
        if let Some(limit) = self.per_source_limit {
            plan.policy.per_source_limit = Some(limit);
        }
        if let Some(show) = self.show_source_names {
            plan.policy.show_source_names = show;
        }
        if let Some(allowed) = self.enhanced_mode_allowed {
            plan.policy.enhanced_mode_allowed = allowed;
        }
        if let Some(limit) = self.enhanced_mode_daily_limit {
            plan.policy.enhanced_mode_daily_limit = limit;
        }
        if let Some(limit) = self.daily_search_limit {
            plan.daily_search_limit = (limit > 0).then_some(limit);
        }
    }
}

/// The `[tiers]` config section.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierOverrides {
    #[serde(skip_serializing_if = "TierOverride::is_empty")]
    pub free: TierOverride,
    #[serde(skip_serializing_if = "TierOverride::is_empty")]
    pub starter: TierOverride,
    #[serde(skip_serializing_if = "TierOverride::is_empty")]
    pub pro: TierOverride,
    #[serde(skip_serializing_if = "TierOverride::is_empty")]
    pub enterprise: TierOverride,
}

impl TierOverrides {
    pub fn for_tier(&self, tier: SubscriptionTier) -> &TierOverride {
        match tier {
            SubscriptionTier::Free => &self.free,
            SubscriptionTier::Starter => &self.starter,
            SubscriptionTier::Pro => &self.pro,
            SubscriptionTier::Enterprise => &self.enterprise,
        }
    }
}

/// Resolved plans for every tier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierCatalog {
    plans: BTreeMap<SubscriptionTier, TierPlan>,
}

impl Default for TierCatalog {
    fn default() -> Self {
        Self::with_overrides(&TierOverrides::default())
    }
}

impl TierCatalog {
    pub fn with_overrides(overrides: &TierOverrides) -> Self {
        let plans = SubscriptionTier::all()
            .iter()
            .map(|tier| {
                let mut plan = tier.preset();
                overrides.for_tier(*tier).apply(&mut plan);
                (*tier, plan)
            })
            .collect();
        Self { plans }
    }

    pub fn plan(&self, tier: SubscriptionTier) -> TierPlan {
        self.plans
            .get(&tier)
            .cloned()
            .unwrap_or_else(|| tier.preset())
    }

    pub fn plans(&self) -> impl Iterator<Item = &TierPlan> {
        self.plans.values()
    }
}
