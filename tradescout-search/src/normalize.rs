//! Normaliser: maps provider-native [`RawCandidate`]s onto the canonical
//! [`Product`] record.
//!
//! Parsing rules:
//!
//! - **Price**: every numeric substring of the price text is extracted; two
//!   or more give the mean of the first and last, one is used as-is, none
//!   leaves the price absent.
//! - **Price range**: recorded when the provider states one explicitly, or
//!   when the price text has the `low - high` form.
//! - **MOQ**: first integer in the MOQ text, default 1.
//! - **Rating**: first decimal in the rating text. Values on a percentage
//!   scale (above 10) are divided by 20; everything is clamped to `[0, 5]`.
//! - **Response rate**: an `N%` pattern in the supplier badge text (falling
//!   back to the rating text), clamped to `[0, 100]`.
//! - **Transaction level**: first of `Gold`, `Silver`, `Assessed`,
//!   `Premium` found in the supplier text.
//!
//! A candidate whose title is empty or shorter than [`MIN_TITLE_CHARS`] is
//! dropped; every other field failure degrades to "absent".

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::orchestrator::url_normalize::normalize_url;
use crate::types::{
    CandidateDetail, Product, Provenance, RawCandidate, SourceTag, TransactionLevel,
};

/// Titles shorter than this (in characters, after whitespace collapsing)
/// are treated as parse failures.
pub const MIN_TITLE_CHARS: usize = 3;

/// Ratings above this are assumed to be on a 0–100 scale.
const PERCENT_SCALE_FLOOR: f64 = 10.0;

const MAX_RATING: f64 = 5.0;
const MAX_RESPONSE_RATE: f64 = 100.0;

static NUMBER_RE: OnceLock<Option<Regex>> = OnceLock::new();
static INTEGER_RE: OnceLock<Option<Regex>> = OnceLock::new();
static DECIMAL_RE: OnceLock<Option<Regex>> = OnceLock::new();
static RANGE_RE: OnceLock<Option<Regex>> = OnceLock::new();
static PERCENT_RE: OnceLock<Option<Regex>> = OnceLock::new();
static YEARS_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn cached(cell: &'static OnceLock<Option<Regex>>, pattern: &str) -> Option<&'static Regex> {
    cell.get_or_init(|| Regex::new(pattern).ok()).as_ref()
}

fn number_re() -> Option<&'static Regex> {
    cached(&NUMBER_RE, r"\d[\d,]*(?:\.\d+)?")
}

fn integer_re() -> Option<&'static Regex> {
    cached(&INTEGER_RE, r"\d[\d,]*")
}

fn decimal_re() -> Option<&'static Regex> {
    cached(&DECIMAL_RE, r"\d+(?:\.\d+)?")
}

fn range_re() -> Option<&'static Regex> {
    cached(
        &RANGE_RE,
        r"(\d[\d,]*(?:\.\d+)?)\s*(?:-|~|–|to)\s*[^\d]{0,4}(\d[\d,]*(?:\.\d+)?)",
    )
}

fn percent_re() -> Option<&'static Regex> {
    cached(&PERCENT_RE, r"(\d+(?:\.\d+)?)\s*%")
}

fn years_re() -> Option<&'static Regex> {
    cached(&YEARS_RE, r"(?i)(\d+)\s*\+?\s*(?:yrs?|years?)\b")
}

/// Parse a number that may carry thousands separators (`1,200.50`).
fn parse_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw.chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// All numeric substrings of `text`, in order of appearance.
pub fn extract_numbers(text: &str) -> Vec<f64> {
    let Some(re) = number_re() else {
        return Vec::new();
    };
    re.find_iter(text)
        .filter_map(|m| parse_number(m.as_str()))
        .collect()
}

/// Representative price: mean of the first and last number when two or
/// more are present, the single number when one is, otherwise absent.
pub fn parse_price(text: &str) -> Option<f64> {
    let numbers = extract_numbers(text);
    match numbers.as_slice() {
        [] => None,
        [only] => Some(*only),
        [first, .., last] => Some((first + last) / 2.0),
    }
}

/// Explicit `low - high` range in price text, ordered `(min, max)`.
pub fn parse_price_range(text: &str) -> Option<(f64, f64)> {
    let caps = range_re()?.captures(text)?;
    let a = parse_number(caps.get(1)?.as_str())?;
    let b = parse_number(caps.get(2)?.as_str())?;
    Some((a.min(b), a.max(b)))
}

/// First integer in the MOQ text, at least 1.
pub fn parse_moq(text: &str) -> Option<u32> {
    let m = integer_re()?.find(text)?;
    let cleaned: String = m.as_str().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<u32>().ok().map(|v| v.max(1))
}

/// First decimal in the rating text, normalised to the 0–5 scale.
pub fn parse_rating(text: &str) -> Option<f64> {
    let m = decimal_re()?.find(text)?;
    let value = m.as_str().parse::<f64>().ok()?;
    let scaled = if value > PERCENT_SCALE_FLOOR {
        value / 20.0
    } else {
        value
    };
    Some(scaled.clamp(0.0, MAX_RATING))
}

/// An `N%` pattern, clamped to `[0, 100]`.
pub fn parse_response_rate(text: &str) -> Option<f64> {
    let caps = percent_re()?.captures(text)?;
    let value = caps.get(1)?.as_str().parse::<f64>().ok()?;
    Some(value.clamp(0.0, MAX_RESPONSE_RATE))
}

/// First transaction level marker present in `text`, in priority order.
pub fn parse_transaction_level(text: &str) -> Option<TransactionLevel> {
    TransactionLevel::all()
        .iter()
        .copied()
        .find(|level| text.contains(level.marker()))
}

/// Years in business from text such as `"12 yrs"` or `"5 Years"`.
pub fn parse_years_in_business(text: &str) -> Option<u32> {
    let caps = years_re()?.captures(text)?;
    caps.get(1)?.as_str().parse::<u32>().ok()
}

/// Collapse runs of whitespace and trim.
fn clean_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim a URL, resolve protocol-relative forms, and drop empties.
fn clean_url(raw: Option<&str>) -> Option<String> {
    let trimmed = raw?.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    Some(trimmed.to_string())
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|s| clean_text(&s)).filter(|s| !s.is_empty())
}

/// Converts raw candidates into products for one search pass.
///
/// Product ids are `{source}-{stamp}-{pass}{sequence}`: unique within a
/// request, not durable across requests.
#[derive(Debug)]
pub struct Normalizer {
    pass: Provenance,
    stamp: i64,
    seq: u64,
}

impl Normalizer {
    /// A normaliser with an explicit id stamp.
    pub fn new(pass: Provenance, stamp: i64) -> Self {
        Self { pass, stamp, seq: 0 }
    }

    /// A normaliser stamped with the current time in milliseconds.
    pub fn for_pass(pass: Provenance) -> Self {
        Self::new(pass, chrono::Utc::now().timestamp_millis())
    }

    fn next_id(&mut self, source: &str) -> String {
        let tag = match self.pass {
            Provenance::Enrichment => 'e',
            Provenance::Primary | Provenance::Merged => 'p',
        };
        let id = format!("{source}-{}-{tag}{}", self.stamp, self.seq);
        self.seq += 1;
        id
    }

    /// Normalise one candidate. Returns `None` when the title is unusable.
    pub fn normalize(&mut self, raw: RawCandidate) -> Option<Product> {
        let title = clean_text(&raw.title);
        if title.chars().count() < MIN_TITLE_CHARS {
            return None;
        }

        let source = raw.source;
        let price = parse_price(&raw.price_text);

        let (explicit_min, explicit_max, description) = match raw.detail {
            CandidateDetail::Scraped => (None, None, None),
            CandidateDetail::Api {
                price_min,
                price_max,
                description,
            } => (price_min, price_max, description),
            CandidateDetail::AiExtracted { description } => (None, None, description),
        };
        let (price_min, price_max) = match (explicit_min, explicit_max) {
            (Some(lo), Some(hi)) => (Some(lo.min(hi)), Some(lo.max(hi))),
            (lo, hi) if lo.is_some() || hi.is_some() => (lo, hi),
            _ => match parse_price_range(&raw.price_text) {
                Some((lo, hi)) => (Some(lo), Some(hi)),
                None => (None, None),
            },
        };
        // A range with no parsable price text still yields a representative price.
        let price = price.or(match (price_min, price_max) {
            (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
            (lo, hi) => lo.or(hi),
        });

        let moq = parse_moq(&raw.moq_text);

        let reported_name = clean_text(&raw.supplier_name);
        let supplier_reported = !reported_name.is_empty();
        let supplier_name = if supplier_reported {
            reported_name
        } else {
            source.default_supplier_name().to_string()
        };
        let badge_text = format!("{} {}", raw.supplier_text, raw.supplier_name);

        Some(Product {
            id: self.next_id(source.as_str()),
            title,
            description: non_empty(description),
            price,
            price_min,
            price_max,
            min_order_quantity: moq.unwrap_or(1),
            moq_reported: moq.is_some(),
            image_url: clean_url(raw.image_url.as_deref()),
            product_url: clean_url(raw.product_url.as_deref()).map(|u| normalize_url(&u)),
            supplier_name,
            supplier_reported,
            supplier_rating: parse_rating(&raw.rating_text),
            supplier_response_rate: parse_response_rate(&raw.supplier_text)
                .or_else(|| parse_response_rate(&raw.rating_text)),
            supplier_transaction_level: parse_transaction_level(&badge_text),
            supplier_years_in_business: parse_years_in_business(&raw.supplier_text),
            source: SourceTag::Known(source),
            source_name: source.display_name().to_string(),
            provenance: self.pass,
            enriched_fields: BTreeSet::new(),
        })
    }

    /// Normalise a batch, preserving order and silently dropping
    /// candidates without a usable title.
    pub fn normalize_all(&mut self, raws: Vec<RawCandidate>) -> Vec<Product> {
        let total = raws.len();
        let products: Vec<Product> = raws.into_iter().filter_map(|r| self.normalize(r)).collect();
        let dropped = total - products.len();
        if dropped > 0 {
            tracing::trace!(dropped, "candidates dropped for unusable titles");
        }
        products
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SourceId;

    fn approx(a: Option<f64>, b: f64) -> bool {
        a.is_some_and(|v| (v - b).abs() < 1e-9)
    }

    fn candidate(title: &str) -> RawCandidate {
        RawCandidate::new(SourceId::Alibaba, title)
    }

    #[test]
    fn price_range_text_averages_first_and_last() {
        assert!(approx(parse_price("$5.00-$10.00 / Piece"), 7.5));
    }

    #[test]
    fn single_price() {
        assert!(approx(parse_price("$12"), 12.0));
    }

    #[test]
    fn empty_price_is_absent() {
        assert_eq!(parse_price(""), None);
        assert_eq!(parse_price("Negotiable"), None);
    }

    #[test]
    fn price_with_thousands_separator() {
        assert!(approx(parse_price("US $1,200.50"), 1200.5));
    }

    #[test]
    fn price_uses_first_and_last_of_many() {
        assert!(approx(parse_price("$2 - $3 - $10"), 6.0));
    }

    #[test]
    fn range_is_ordered() {
        assert_eq!(parse_price_range("$5.00-$10.00 / Piece"), Some((5.0, 10.0)));
        assert_eq!(parse_price_range("2.10 -- 3.50"), Some((2.1, 3.5)));
        assert_eq!(parse_price_range("$12"), None);
    }

    #[test]
    fn moq_first_integer_or_none() {
        assert_eq!(parse_moq("100 Pieces (MOQ)"), Some(100));
        assert_eq!(parse_moq("Min. order: 1,000 sets"), Some(1000));
        assert_eq!(parse_moq("contact supplier"), None);
        assert_eq!(parse_moq("0 pieces"), Some(1));
    }

    #[test]
    fn percentage_rating_divides_by_twenty() {
        assert!(approx(parse_rating("96"), 4.8));
    }

    #[test]
    fn five_point_rating_kept() {
        assert!(approx(parse_rating("4.8"), 4.8));
        assert!(approx(parse_rating("4.5/5"), 4.5));
    }

    #[test]
    fn out_of_range_rating_clamps_to_five() {
        assert!(approx(parse_rating("7"), 5.0));
    }

    #[test]
    fn missing_rating_is_absent() {
        assert_eq!(parse_rating(""), None);
        assert_eq!(parse_rating("no reviews"), None);
    }

    #[test]
    fn response_rate_parsed_and_clamped() {
        assert!(approx(parse_response_rate("Gold Supplier · 97% response"), 97.0));
        assert!(approx(parse_response_rate("150%"), 100.0));
        assert_eq!(parse_response_rate("Gold Supplier"), None);
    }

    #[test]
    fn transaction_level_first_match_wins() {
        assert_eq!(
            parse_transaction_level("Verified Gold Supplier"),
            Some(TransactionLevel::Gold)
        );
        assert_eq!(
            parse_transaction_level("Premium Member, Assessed Supplier"),
            Some(TransactionLevel::Assessed)
        );
        assert_eq!(parse_transaction_level("Unverified"), None);
    }

    #[test]
    fn years_in_business() {
        assert_eq!(parse_years_in_business("Gold · 12 yrs · CN"), Some(12));
        assert_eq!(parse_years_in_business("5 Years"), Some(5));
        assert_eq!(parse_years_in_business("97%"), None);
    }

    #[test]
    fn normalize_full_scraped_candidate() {
        let mut raw = candidate("  Commercial   Ice Maker 50kg ");
        raw.price_text = "$5.00-$10.00 / Piece".into();
        raw.moq_text = "2 Pieces".into();
        raw.supplier_name = "Ningbo Cooling Co., Ltd.".into();
        raw.supplier_text = "Gold Supplier 8 yrs 97% response rate".into();
        raw.rating_text = "4.6/5".into();
        raw.image_url = Some("//img.example.com/a.jpg".into());
        raw.product_url = Some("https://www.alibaba.com/product/1.html?utm_source=x".into());

        let mut normalizer = Normalizer::new(Provenance::Primary, 1000);
        let p = normalizer.normalize(raw).expect("product");
        assert_eq!(p.id, "alibaba-1000-p0");
        assert_eq!(p.title, "Commercial Ice Maker 50kg");
        assert!(approx(p.price, 7.5));
        assert_eq!(p.price_min, Some(5.0));
        assert_eq!(p.price_max, Some(10.0));
        assert_eq!(p.min_order_quantity, 2);
        assert!(p.moq_reported);
        assert!(p.supplier_reported);
        assert_eq!(p.supplier_transaction_level, Some(TransactionLevel::Gold));
        assert!(approx(p.supplier_response_rate, 97.0));
        assert!(approx(p.supplier_rating, 4.6));
        assert_eq!(p.supplier_years_in_business, Some(8));
        assert_eq!(p.image_url.as_deref(), Some("https://img.example.com/a.jpg"));
        assert_eq!(
            p.product_url.as_deref(),
            Some("https://www.alibaba.com/product/1.html")
        );
        assert_eq!(p.source, SourceTag::Known(SourceId::Alibaba));
        assert_eq!(p.source_name, "Alibaba");
        assert_eq!(p.provenance, Provenance::Primary);
        assert!(p.enriched_fields.is_empty());
    }

    #[test]
    fn defaults_when_fields_missing() {
        let mut normalizer = Normalizer::new(Provenance::Primary, 1);
        let p = normalizer.normalize(candidate("Ice Maker")).expect("product");
        assert_eq!(p.price, None);
        assert_eq!(p.min_order_quantity, 1);
        assert!(!p.moq_reported);
        assert_eq!(p.supplier_name, "Alibaba Supplier");
        assert!(!p.supplier_reported);
        assert_eq!(p.supplier_rating, None);
        assert_eq!(p.supplier_transaction_level, None);
    }

    #[test]
    fn short_or_empty_titles_dropped() {
        let mut normalizer = Normalizer::new(Provenance::Primary, 1);
        assert!(normalizer.normalize(candidate("")).is_none());
        assert!(normalizer.normalize(candidate("  a ")).is_none());
        let batch = normalizer.normalize_all(vec![
            candidate("ok"),
            candidate("Ice Maker"),
            candidate("   "),
            candidate("Ice Cube Machine"),
        ]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch[0].title, "Ice Maker");
        assert_eq!(batch[1].title, "Ice Cube Machine");
    }

    #[test]
    fn ids_are_unique_and_pass_tagged() {
        let mut normalizer = Normalizer::new(Provenance::Enrichment, 42);
        let batch = normalizer.normalize_all(vec![candidate("Ice Maker"), candidate("Ice Tray")]);
        assert_eq!(batch[0].id, "alibaba-42-e0");
        assert_eq!(batch[1].id, "alibaba-42-e1");
        assert_eq!(batch[0].provenance, Provenance::Enrichment);
    }

    #[test]
    fn api_detail_supplies_explicit_range_and_description() {
        let mut raw = RawCandidate::new(SourceId::CjDropshipping, "Mini Ice Maker");
        raw.detail = CandidateDetail::Api {
            price_min: Some(9.0),
            price_max: Some(4.0),
            description: Some("  Portable\ncountertop unit ".into()),
        };
        let mut normalizer = Normalizer::new(Provenance::Primary, 1);
        let p = normalizer.normalize(raw).expect("product");
        assert_eq!(p.price_min, Some(4.0));
        assert_eq!(p.price_max, Some(9.0));
        assert!(approx(p.price, 6.5));
        assert_eq!(p.description.as_deref(), Some("Portable countertop unit"));
        assert_eq!(p.supplier_name, "CJ Dropshipping");
    }

    #[test]
    fn rating_text_percentage_also_feeds_response_rate() {
        let mut raw = candidate("Ice Maker");
        raw.rating_text = "96%".into();
        let mut normalizer = Normalizer::new(Provenance::Primary, 1);
        let p = normalizer.normalize(raw).expect("product");
        assert!(approx(p.supplier_rating, 4.8));
        assert!(approx(p.supplier_response_rate, 96.0));
    }
}
