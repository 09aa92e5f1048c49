//! Cross-pass record matching and field-level merge.
//!
//! Combines the primary pass with the enrichment pass. Each enrichment
//! record is matched against the primary records; a match fills gaps in
//! the primary record without ever overwriting a value it already has.
//! Unmatched enrichment records with a title not yet present are appended.
//!
//! Matching is greedy and order dependent: the first primary record that
//! qualifies wins, with no similarity scoring beyond prefix equality.

use std::collections::HashSet;

use crate::types::{EnrichedField, Product, Provenance};

/// Title prefix length that alone identifies the same product.
const TITLE_KEY_LEN: usize = 30;

/// Shorter title prefix that identifies the same product when the
/// supplier also matches.
const SHORT_TITLE_KEY_LEN: usize = 15;

/// Supplier-name prefix length used alongside the short title prefix.
const SUPPLIER_KEY_LEN: usize = 20;

/// Counts describing one merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Primary records in.
    pub primary: usize,
    /// Enrichment records in.
    pub enrichment: usize,
    /// Primary records that gained at least one field.
    pub merged: usize,
    /// Enrichment records appended as new products.
    pub appended: usize,
    /// Enrichment records dropped (matched without adding anything, or
    /// duplicate titles).
    pub discarded: usize,
}

/// Result of merging the two passes.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// Primary records in their original order, followed by appended
    /// enrichment-only records.
    pub products: Vec<Product>,
    pub stats: MergeStats,
}

/// Lowercased alphanumeric-only form of `text`, cut to `len` characters.
pub fn match_key(text: &str, len: usize) -> String {
    text.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .take(len)
        .collect()
}

/// Full normalised title used to detect duplicate appends.
fn title_key(title: &str) -> String {
    match_key(title, usize::MAX)
}

/// Whether `primary` and `candidate` describe the same product.
///
/// Same source, and either the 30-character title keys match, or the
/// 15-character title keys and the 20-character supplier keys both match.
pub fn is_same_product(primary: &Product, candidate: &Product) -> bool {
    if primary.source != candidate.source {
        return false;
    }
    let long_match =
        match_key(&primary.title, TITLE_KEY_LEN) == match_key(&candidate.title, TITLE_KEY_LEN);
    if long_match {
        return true;
    }
    let short_match = match_key(&primary.title, SHORT_TITLE_KEY_LEN)
        == match_key(&candidate.title, SHORT_TITLE_KEY_LEN);
    // Two placeholder names say nothing about the supplier.
    short_match
        && primary.supplier_reported
        && candidate.supplier_reported
        && match_key(&primary.supplier_name, SUPPLIER_KEY_LEN)
            == match_key(&candidate.supplier_name, SUPPLIER_KEY_LEN)
}

/// Copy `from` into `into` only when `into` is absent.
fn fill(into: &mut Option<f64>, from: Option<f64>) -> bool {
    if into.is_none() && from.is_some() {
        *into = from;
        return true;
    }
    false
}

/// Fill gaps in `primary` from `enrichment`. Returns the fields changed.
///
/// Present primary values are never overwritten, except the supplier
/// name, which is replaced when the enrichment name is strictly longer.
/// A per-source placeholder name counts as absent on either side.
pub fn merge_fields(primary: &mut Product, enrichment: &Product) -> Vec<EnrichedField> {
    let mut changed = Vec::new();

    if fill(&mut primary.price, enrichment.price) {
        changed.push(EnrichedField::Price);
    }
    if fill(&mut primary.price_min, enrichment.price_min) {
        changed.push(EnrichedField::PriceMin);
    }
    if fill(&mut primary.price_max, enrichment.price_max) {
        changed.push(EnrichedField::PriceMax);
    }
    if fill(&mut primary.supplier_rating, enrichment.supplier_rating) {
        changed.push(EnrichedField::SupplierRating);
    }
    if !primary.moq_reported && enrichment.moq_reported {
        primary.min_order_quantity = enrichment.min_order_quantity;
        primary.moq_reported = true;
        changed.push(EnrichedField::MinOrderQuantity);
    }
    if enrichment.supplier_reported
        && (!primary.supplier_reported
            || enrichment.supplier_name.chars().count() > primary.supplier_name.chars().count())
    {
        primary.supplier_name = enrichment.supplier_name.clone();
        primary.supplier_reported = true;
        changed.push(EnrichedField::SupplierName);
    }

    if !changed.is_empty() {
        primary.provenance = Provenance::Merged;
        primary.enriched_fields.extend(changed.iter().copied());
    }
    changed
}

/// Merge the enrichment pass into the primary pass.
pub fn merge(primary: Vec<Product>, enrichment: Vec<Product>) -> MergeOutcome {
    let mut stats = MergeStats {
        primary: primary.len(),
        enrichment: enrichment.len(),
        ..Default::default()
    };

    let primary_len = primary.len();
    let mut products = primary;
    let mut seen_titles: HashSet<String> = products.iter().map(|p| title_key(&p.title)).collect();
    let mut merged_indices: HashSet<usize> = HashSet::new();

    for candidate in enrichment {
        let matched = products[..primary_len]
            .iter()
            .position(|p| is_same_product(p, &candidate));

        match matched {
            Some(index) => {
                let changed = merge_fields(&mut products[index], &candidate);
                if changed.is_empty() {
                    stats.discarded += 1;
                } else {
                    merged_indices.insert(index);
                }
            }
            None => {
                let key = title_key(&candidate.title);
                if seen_titles.insert(key) {
                    let mut appended = candidate;
                    appended.provenance = Provenance::Enrichment;
                    appended.enriched_fields.clear();
                    products.push(appended);
                    stats.appended += 1;
                } else {
                    stats.discarded += 1;
                }
            }
        }
    }

    stats.merged = merged_indices.len();
    tracing::debug!(
        primary = stats.primary,
        enrichment = stats.enrichment,
        merged = stats.merged,
        appended = stats.appended,
        discarded = stats.discarded,
        "passes merged"
    );

    MergeOutcome { products, stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::Normalizer;
    use crate::types::{RawCandidate, SourceId, SourceTag};

    fn product(source: SourceId, title: &str, pass: Provenance) -> Product {
        let mut normalizer = Normalizer::new(pass, 0);
        normalizer
            .normalize(RawCandidate::new(source, title))
            .expect("valid title")
    }

    fn primary(title: &str) -> Product {
        product(SourceId::Alibaba, title, Provenance::Primary)
    }

    fn enrichment(title: &str) -> Product {
        product(SourceId::Alibaba, title, Provenance::Enrichment)
    }

    fn supplied(mut product: Product, supplier: &str) -> Product {
        product.supplier_name = supplier.into();
        product.supplier_reported = true;
        product
    }

    #[test]
    fn match_key_folds_case_and_drops_punctuation() {
        assert_eq!(match_key("Commercial Ice-Maker, 50kg!", 100), "commercialicemaker50kg");
        assert_eq!(match_key("Commercial Ice Maker", 10), "commercial");
    }

    #[test]
    fn long_prefix_match() {
        let a = primary("Commercial Ice Maker");
        let b = enrichment("commercial ice-maker");
        assert!(is_same_product(&a, &b));
    }

    #[test]
    fn short_prefix_needs_supplier_match() {
        let a = supplied(
            primary("Commercial Ice Maker 50kg stainless"),
            "Ningbo Cooling Equipment Co",
        );
        let b = supplied(enrichment("Commercial Ice Machine 80kg"), "Shenzhen Frost Ltd");
        assert!(!is_same_product(&a, &b));

        // First 15 key chars: "commercialicema" on both.
        let b = supplied(
            enrichment("Commercial Ice Machine 80kg"),
            "NINGBO COOLING EQUIPMENT CO., LTD",
        );
        assert!(is_same_product(&a, &b));
    }

    #[test]
    fn placeholder_suppliers_do_not_match_short_titles() {
        let a = primary("Commercial Ice Maker 50kg");
        let b = enrichment("Commercial Ice Machine 80kg");
        assert_eq!(a.supplier_name, b.supplier_name);
        assert!(!is_same_product(&a, &b));

        let outcome = merge(vec![a], vec![b]);
        assert_eq!(outcome.products.len(), 2);
        assert_eq!(outcome.products[0].provenance, Provenance::Primary);
    }

    #[test]
    fn different_sources_never_match() {
        let a = primary("Commercial Ice Maker");
        let b = product(SourceId::MadeInChina, "Commercial Ice Maker", Provenance::Enrichment);
        assert!(!is_same_product(&a, &b));
    }

    #[test]
    fn fills_missing_rating_and_marks_merged() {
        let p = primary("Commercial Ice Maker");
        let mut e = enrichment("Commercial Ice Maker");
        e.supplier_rating = Some(4.5);

        let outcome = merge(vec![p], vec![e]);
        assert_eq!(outcome.products.len(), 1);
        let merged = &outcome.products[0];
        assert_eq!(merged.supplier_rating, Some(4.5));
        assert_eq!(merged.provenance, Provenance::Merged);
        assert!(merged.enriched_fields.contains(&EnrichedField::SupplierRating));
        assert_eq!(outcome.stats.merged, 1);
    }

    #[test]
    fn present_price_never_overwritten() {
        let mut p = primary("Commercial Ice Maker");
        p.price = Some(120.0);
        let mut e = enrichment("Commercial Ice Maker");
        e.price = Some(99.0);
        e.price_min = Some(90.0);

        let outcome = merge(vec![p], vec![e]);
        let merged = &outcome.products[0];
        assert_eq!(merged.price, Some(120.0));
        assert_eq!(merged.price_min, Some(90.0));
        assert!(!merged.enriched_fields.contains(&EnrichedField::Price));
        assert!(merged.enriched_fields.contains(&EnrichedField::PriceMin));
    }

    #[test]
    fn moq_filled_only_when_primary_default() {
        let mut p = primary("Commercial Ice Maker");
        let mut e = enrichment("Commercial Ice Maker");
        e.min_order_quantity = 50;
        e.moq_reported = true;

        let changed = merge_fields(&mut p, &e);
        assert_eq!(changed, vec![EnrichedField::MinOrderQuantity]);
        assert_eq!(p.min_order_quantity, 50);

        let mut e2 = enrichment("Commercial Ice Maker");
        e2.min_order_quantity = 5;
        e2.moq_reported = true;
        assert!(merge_fields(&mut p, &e2).is_empty());
        assert_eq!(p.min_order_quantity, 50);
    }

    #[test]
    fn longer_supplier_name_replaces() {
        let mut p = supplied(primary("Commercial Ice Maker"), "Ningbo Co");
        let e = supplied(
            enrichment("Commercial Ice Maker"),
            "Ningbo Cooling Equipment Co., Ltd.",
        );
        let changed = merge_fields(&mut p, &e);
        assert_eq!(changed, vec![EnrichedField::SupplierName]);
        assert_eq!(p.supplier_name, "Ningbo Cooling Equipment Co., Ltd.");

        let shorter = supplied(enrichment("Commercial Ice Maker"), "Ningbo");
        assert!(merge_fields(&mut p, &shorter).is_empty());
    }

    #[test]
    fn placeholder_supplier_never_replaces_reported_name() {
        let p = supplied(primary("Commercial Ice Maker"), "Acme Co");
        let e = enrichment("Commercial Ice Maker");
        assert_eq!(e.supplier_name, "Alibaba Supplier");

        let outcome = merge(vec![p], vec![e]);
        let merged = &outcome.products[0];
        assert_eq!(merged.supplier_name, "Acme Co");
        assert_eq!(merged.provenance, Provenance::Primary);
        assert!(merged.enriched_fields.is_empty());
        assert_eq!(outcome.stats.discarded, 1);
    }

    #[test]
    fn reported_supplier_replaces_placeholder() {
        let mut p = primary("Commercial Ice Maker");
        let e = supplied(enrichment("Commercial Ice Maker"), "Acme");
        assert_eq!(merge_fields(&mut p, &e), vec![EnrichedField::SupplierName]);
        assert_eq!(p.supplier_name, "Acme");
        assert!(p.supplier_reported);
    }

    #[test]
    fn match_without_changes_keeps_primary_provenance() {
        let mut p = primary("Commercial Ice Maker");
        p.supplier_rating = Some(4.0);
        let mut e = enrichment("Commercial Ice Maker");
        e.supplier_rating = Some(3.0);

        let outcome = merge(vec![p], vec![e]);
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.products[0].provenance, Provenance::Primary);
        assert!(outcome.products[0].enriched_fields.is_empty());
        assert_eq!(outcome.stats.discarded, 1);
    }

    #[test]
    fn unmatched_enrichment_appended_after_primary() {
        let outcome = merge(
            vec![primary("Commercial Ice Maker"), primary("Ice Cube Tray")],
            vec![enrichment("Nugget Ice Machine Countertop")],
        );
        assert_eq!(outcome.products.len(), 3);
        assert_eq!(outcome.products[2].title, "Nugget Ice Machine Countertop");
        assert_eq!(outcome.products[2].provenance, Provenance::Enrichment);
        assert_eq!(outcome.products[0].provenance, Provenance::Primary);
        assert_eq!(outcome.stats.appended, 1);
    }

    #[test]
    fn duplicate_enrichment_titles_appended_once() {
        let outcome = merge(
            vec![],
            vec![
                enrichment("Nugget Ice Machine"),
                enrichment("nugget ice machine"),
            ],
        );
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.stats.discarded, 1);
    }

    #[test]
    fn first_primary_match_wins() {
        let first = primary("Commercial Ice Maker");
        let second = primary("Commercial Ice Maker");
        let mut e = enrichment("Commercial Ice Maker");
        e.supplier_rating = Some(4.2);

        let outcome = merge(vec![first, second], vec![e]);
        assert_eq!(outcome.products[0].supplier_rating, Some(4.2));
        assert_eq!(outcome.products[1].supplier_rating, None);
    }

    #[test]
    fn enrichment_only_set_keeps_sources() {
        let outcome = merge(vec![], vec![enrichment("Nugget Ice Machine")]);
        assert_eq!(outcome.products[0].source, SourceTag::Known(SourceId::Alibaba));
    }

    #[test]
    fn empty_inputs() {
        let outcome = merge(vec![], vec![]);
        assert!(outcome.products.is_empty());
        assert_eq!(outcome.stats, MergeStats::default());
    }
}
