//! Global Sources, which lists verified manufacturers with supplier scores.
//!
//! The page is re-sorted by supplier rating so the best-rated suppliers
//! lead this source's share of the results.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::{RawCandidate, SourceId};

use super::listing::{parse_listing_html, ListingProvider, SiteProfile};

pub static PROFILE: SiteProfile = SiteProfile {
    source: SourceId::GlobalSources,
    search_path: "/searchList/products",
    query_param: "keyWord",
    extra_params: &[("pageNum", "1")],
    item: ".product-list .item, .mod-product-list .product-item",
    title: ".product-name, .tit a",
    link: "a.product-link, .tit a",
    price: ".price, .product-price",
    moq: ".min-order, .moq",
    supplier: ".supplier-name, .company a",
    badges: ".supplier-tag, .verified-tag, .years, .response",
    rating: ".supplier-score, .score",
    image: ".img-box img, .product-img img",
    sort_by_rating: true,
};

/// A long-lived Global Sources provider.
pub fn provider(config: &SearchConfig) -> ListingProvider {
    ListingProvider::new(&PROFILE, config)
}

/// Parse a Global Sources results page, best-rated first.
pub fn parse_global_sources_html(
    html: &str,
    base_url: &str,
    limit: usize,
) -> Result<Vec<RawCandidate>, SearchError> {
    parse_listing_html(html, &PROFILE, base_url, limit)
}
