//! Tier-based output shaping: per-source truncation, total cap, and
//! source redaction. Pure and deterministic.

use std::collections::BTreeMap;

use crate::tier::TierPolicy;
use crate::types::{Product, SourceId, SourceTag, REDACTED_SUPPLIER_LABEL};

use super::url_normalize::strip_query;

/// Output of [`shape`].
#[derive(Debug, Clone, PartialEq)]
pub struct ShapedResults {
    /// Products in merged order after truncation and redaction.
    pub products: Vec<Product>,
    /// Per-source counts, present only when the tier discloses sources.
    pub per_source_counts: Option<BTreeMap<SourceId, usize>>,
    /// Number of products returned.
    pub total: usize,
}

/// Hide everything in `product` that identifies where it came from.
///
/// Numeric fields (price, rating, MOQ) are left untouched.
pub fn redact(product: &mut Product, ordinal: usize) {
    product.source = SourceTag::Redacted;
    product.source_name = REDACTED_SUPPLIER_LABEL.to_string();
    product.supplier_name = REDACTED_SUPPLIER_LABEL.to_string();
    product.id = format!("{}-{ordinal}", String::from(SourceTag::Redacted));
    product.product_url = product.product_url.as_deref().map(strip_query);
}

/// Apply `policy` to the merged products.
///
/// 1. Each source keeps at most `policy.per_source_limit(searched_sources,
///    default_ceiling)` products, in their merged order.
/// 2. A finite `result_cap` then bounds the total.
/// 3. Counts per source are computed before redaction and attached only
///    when `show_source_names` is set; otherwise sources are redacted.
pub fn shape(
    products: Vec<Product>,
    policy: &TierPolicy,
    searched_sources: usize,
    default_ceiling: usize,
) -> ShapedResults {
    let per_source = policy.per_source_limit(searched_sources, default_ceiling);
    let mut taken: BTreeMap<SourceId, usize> = BTreeMap::new();

    let mut kept: Vec<Product> = products
        .into_iter()
        .filter(|p| {
            // Already-redacted records carry no source; they are grouped together.
            let Some(source) = p.source_id() else {
                return true;
            };
            let count = taken.entry(source).or_insert(0);
            if *count >= per_source {
                return false;
            }
            *count += 1;
            true
        })
        .collect();

    if let Some(cap) = policy.result_cap.limit() {
        kept.truncate(cap);
    }

    let total = kept.len();
    let per_source_counts = if policy.show_source_names {
        let mut counts: BTreeMap<SourceId, usize> = BTreeMap::new();
        for source in kept.iter().filter_map(Product::source_id) {
            *counts.entry(source).or_insert(0) += 1;
        }
        Some(counts)
    } else {
        for (ordinal, product) in kept.iter_mut().enumerate() {
            redact(product, ordinal);
        }
        None
    };

    ShapedResults {
        products: kept,
        per_source_counts,
        total,
    }
}
