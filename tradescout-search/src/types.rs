//! Core types: source identification, raw provider candidates, the canonical
//! product record, and the request/response shapes of a search.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Wire label used in place of a source identifier when the tier hides sources.
pub const REDACTED_SOURCE_LABEL: &str = "supplier";

/// Display label used in place of source and supplier names when the tier
/// hides sources.
pub const REDACTED_SUPPLIER_LABEL: &str = "Verified Supplier";

/// Sourcing sites that tradescout can query.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SourceId {
    /// Alibaba.com. Largest catalogue, aggressive bot detection.
    Alibaba,
    /// Made-in-China.com manufacturer listings with audit badges.
    MadeInChina,
    /// CJ Dropshipping JSON API.
    CjDropshipping,
    /// Global Sources. Listings are re-sorted by supplier rating.
    GlobalSources,
    /// TradeKorea (Korean exporters).
    Tradekorea,
    /// Wholesale Central, a US wholesale directory.
    WholesaleCentral,
}

impl SourceId {
    /// Stable wire identifier (`alibaba`, `made-in-china`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alibaba => "alibaba",
            Self::MadeInChina => "made-in-china",
            Self::CjDropshipping => "cj-dropshipping",
            Self::GlobalSources => "global-sources",
            Self::Tradekorea => "tradekorea",
            Self::WholesaleCentral => "wholesale-central",
        }
    }

    /// Human-readable site name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Alibaba => "Alibaba",
            Self::MadeInChina => "Made-in-China",
            Self::CjDropshipping => "CJ Dropshipping",
            Self::GlobalSources => "Global Sources",
            Self::Tradekorea => "TradeKorea",
            Self::WholesaleCentral => "Wholesale Central",
        }
    }

    /// Placeholder supplier name used when a listing carries none.
    pub fn default_supplier_name(&self) -> &'static str {
        match self {
            Self::Alibaba => "Alibaba Supplier",
            Self::MadeInChina => "Made-in-China Supplier",
            Self::CjDropshipping => "CJ Dropshipping",
            Self::GlobalSources => "Global Sources Supplier",
            Self::Tradekorea => "TradeKorea Supplier",
            Self::WholesaleCentral => "Wholesale Central Supplier",
        }
    }

    /// Parse a wire identifier. Accepts the display name case-insensitively too.
    pub fn parse(raw: &str) -> Option<Self> {
        let lowered = raw.trim().to_ascii_lowercase();
        Self::all()
            .iter()
            .copied()
            .find(|s| s.as_str() == lowered || s.display_name().to_ascii_lowercase() == lowered)
    }

    /// Returns all available sources.
    pub fn all() -> &'static [SourceId] {
        &[
            Self::Alibaba,
            Self::MadeInChina,
            Self::CjDropshipping,
            Self::GlobalSources,
            Self::Tradekorea,
            Self::WholesaleCentral,
        ]
    }
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown source '{s}'"))
    }
}

/// Provider-family specific data carried alongside the shared text fields
/// of a [`RawCandidate`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CandidateDetail {
    /// Scraped from a listing page; only the text fields are meaningful.
    #[default]
    Scraped,
    /// Returned by a structured API with typed values.
    Api {
        /// Lower bound of an explicit price range.
        price_min: Option<f64>,
        /// Upper bound of an explicit price range.
        price_max: Option<f64>,
        /// Product description, when the API exposes one.
        description: Option<String>,
    },
    /// Produced by the AI-assisted extractor.
    AiExtracted {
        /// Free-form description the extractor produced, if any.
        description: Option<String>,
    },
}

/// One provider-native listing before normalisation. Weakly typed: every
/// number is still the text the site displayed.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCandidate {
    /// Which site produced this listing.
    pub source: SourceId,
    /// Listing title.
    pub title: String,
    /// Unparsed price text, e.g. `"$5.00-$10.00 / Piece"`.
    pub price_text: String,
    /// Unparsed minimum order text, e.g. `"100 Pieces (MOQ)"`.
    pub moq_text: String,
    /// Supplier company name.
    pub supplier_name: String,
    /// Supplier badge text (membership level, response rate, years).
    pub supplier_text: String,
    /// Unparsed rating text, e.g. `"4.8/5"` or `"96%"`.
    pub rating_text: String,
    /// Listing thumbnail.
    pub image_url: Option<String>,
    /// Listing detail page.
    pub product_url: Option<String>,
    /// Provider-family specific extras.
    pub detail: CandidateDetail,
}

impl RawCandidate {
    /// Start a candidate with only a source and title; remaining text
    /// fields are empty.
    pub fn new(source: SourceId, title: impl Into<String>) -> Self {
        Self {
            source,
            title: title.into(),
            price_text: String::new(),
            moq_text: String::new(),
            supplier_name: String::new(),
            supplier_text: String::new(),
            rating_text: String::new(),
            image_url: None,
            product_url: None,
            detail: CandidateDetail::Scraped,
        }
    }
}

/// Supplier membership/verification level shown by the sourcing sites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransactionLevel {
    Gold,
    Silver,
    Assessed,
    Premium,
}

impl TransactionLevel {
    /// Levels in match priority order.
    pub fn all() -> &'static [TransactionLevel] {
        &[Self::Gold, Self::Silver, Self::Assessed, Self::Premium]
    }

    /// The literal marker searched for in supplier text.
    pub fn marker(&self) -> &'static str {
        match self {
            Self::Gold => "Gold",
            Self::Silver => "Silver",
            Self::Assessed => "Assessed",
            Self::Premium => "Premium",
        }
    }
}

/// Which search pass(es) contributed a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provenance {
    Primary,
    Enrichment,
    Merged,
}

/// Fields the enrichment pass can fill into a primary record.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum EnrichedField {
    Price,
    PriceMin,
    PriceMax,
    SupplierRating,
    MinOrderQuantity,
    SupplierName,
}

/// Source identity of a product as it appears on the wire: either the
/// real source or the redaction placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum SourceTag {
    Known(SourceId),
    Redacted,
}

impl From<SourceTag> for String {
    fn from(tag: SourceTag) -> Self {
        match tag {
            SourceTag::Known(id) => id.as_str().to_string(),
            SourceTag::Redacted => REDACTED_SOURCE_LABEL.to_string(),
        }
    }
}

impl TryFrom<String> for SourceTag {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == REDACTED_SOURCE_LABEL {
            return Ok(Self::Redacted);
        }
        value.parse::<SourceId>().map(Self::Known)
    }
}

/// Canonical product record produced by the normaliser.
///
/// Invariants: `supplier_rating` lies in `[0, 5]`, `supplier_response_rate`
/// in `[0, 100]`, and `min_order_quantity >= 1`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    /// Source-prefixed per-request identifier; not durable across searches.
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Single representative price.
    pub price: Option<f64>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub min_order_quantity: u32,
    /// Whether the source actually stated an MOQ (as opposed to the default of 1).
    #[serde(skip)]
    pub moq_reported: bool,
    pub image_url: Option<String>,
    pub product_url: Option<String>,
    pub supplier_name: String,
    /// Whether the source named the supplier (as opposed to the per-source placeholder).
    #[serde(skip)]
    pub supplier_reported: bool,
    pub supplier_rating: Option<f64>,
    pub supplier_response_rate: Option<f64>,
    pub supplier_transaction_level: Option<TransactionLevel>,
    pub supplier_years_in_business: Option<u32>,
    /// Source identifier, or the redaction placeholder.
    pub source: SourceTag,
    /// Source display name, or the redaction placeholder.
    pub source_name: String,
    pub provenance: Provenance,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub enriched_fields: BTreeSet<EnrichedField>,
}

impl Product {
    /// The real source, unless the record has already been redacted.
    pub fn source_id(&self) -> Option<SourceId> {
        match self.source {
            SourceTag::Known(id) => Some(id),
            SourceTag::Redacted => None,
        }
    }
}

/// One search as issued by the calling layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    /// Trimmed query text.
    pub query: String,
    /// Requested sources. Empty means every source the tier permits.
    #[serde(default)]
    pub sources: BTreeSet<SourceId>,
    /// Whether the caller asked for the enrichment pass.
    #[serde(default)]
    pub enhanced: bool,
}

impl SearchRequest {
    pub fn new(query: impl Into<String>, sources: impl IntoIterator<Item = SourceId>) -> Self {
        Self {
            query: query.into(),
            sources: sources.into_iter().collect(),
            enhanced: false,
        }
    }

    /// Request the enrichment pass as well.
    pub fn enhanced(mut self, enhanced: bool) -> Self {
        self.enhanced = enhanced;
        self
    }
}

/// Wall-clock timings of one search, in milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchTimings {
    pub total_ms: u64,
    pub primary_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enrichment_ms: Option<u64>,
    pub merge_ms: u64,
    pub shaping_ms: u64,
    /// Whether the merged set was served from the result cache.
    #[serde(default)]
    pub cached: bool,
}

/// Counts describing what the enrichment pass contributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementSummary {
    pub primary_count: usize,
    pub enrichment_count: usize,
    pub merged_count: usize,
    pub appended_count: usize,
}

/// The unified response of one search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    pub request_id: String,
    pub query: String,
    /// Present only when the tier allows source disclosure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub per_source_counts: Option<BTreeMap<SourceId, usize>>,
    pub products: Vec<Product>,
    pub total_results: usize,
    pub elapsed: SearchTimings,
    pub enhanced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhancement: Option<EnhancementSummary>,
}
