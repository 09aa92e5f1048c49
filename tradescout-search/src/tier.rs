//! Tier policy: the limits and disclosure flags a subscription plan
//! imposes on search output.
//!
//! The policy is resolved by the calling layer and handed to the
//! coordinator as an opaque input.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::types::SourceId;

/// Total result cap. Serialised as an integer where `-1` means unlimited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum ResultCap {
    Limited(usize),
    Unlimited,
}

impl ResultCap {
    /// The finite cap, if any.
    pub fn limit(&self) -> Option<usize> {
        match self {
            Self::Limited(n) => Some(*n),
            Self::Unlimited => None,
        }
    }
}

impl From<ResultCap> for i64 {
    fn from(cap: ResultCap) -> Self {
        match cap {
            ResultCap::Limited(n) => i64::try_from(n).unwrap_or(i64::MAX),
            ResultCap::Unlimited => -1,
        }
    }
}

impl TryFrom<i64> for ResultCap {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Self::Unlimited),
            n if n >= 0 => usize::try_from(n)
                .map(Self::Limited)
                .map_err(|e| format!("result cap {n} out of range: {e}")),
            n => Err(format!("result cap must be -1 or >= 0, got {n}")),
        }
    }
}

/// Limits and flags derived from a subscription plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierPolicy {
    /// Sources this tier may query.
    pub allowed_sources: BTreeSet<SourceId>,
    /// Total number of products a single search may return.
    pub result_cap: ResultCap,
    /// Explicit per-source limit. When unset, the per-source limit is
    /// derived from `result_cap` and the number of searched sources.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_source_limit: Option<usize>,
    /// Whether source and supplier identity may be disclosed.
    pub show_source_names: bool,
    /// Whether the enrichment pass may run at all.
    pub enhanced_mode_allowed: bool,
    /// Enhanced searches allowed per user per UTC day.
    pub enhanced_mode_daily_limit: u32,
}

impl TierPolicy {
    /// A policy permitting every source with no caps and full disclosure.
    pub fn unrestricted() -> Self {
        Self {
            allowed_sources: SourceId::all().iter().copied().collect(),
            result_cap: ResultCap::Unlimited,
            per_source_limit: None,
            show_source_names: true,
            enhanced_mode_allowed: true,
            enhanced_mode_daily_limit: u32::MAX,
        }
    }

    /// Intersect the requested sources with the allowed set. An empty
    /// request selects every allowed source; disallowed sources are
    /// dropped silently.
    pub fn permitted_sources(&self, requested: &BTreeSet<SourceId>) -> BTreeSet<SourceId> {
        if requested.is_empty() {
            return self.allowed_sources.clone();
        }
        requested
            .intersection(&self.allowed_sources)
            .copied()
            .collect()
    }

    /// How many products each source may contribute when `source_count`
    /// sources are searched.
    ///
    /// `ceil(result_cap / source_count)` for a finite cap, otherwise
    /// `default_ceiling`. An explicit `per_source_limit` takes precedence.
    pub fn per_source_limit(&self, source_count: usize, default_ceiling: usize) -> usize {
        if let Some(limit) = self.per_source_limit {
            return limit;
        }
        match self.result_cap.limit() {
            Some(cap) => cap.div_ceil(source_count.max(1)),
            None => default_ceiling,
        }
    }
}
