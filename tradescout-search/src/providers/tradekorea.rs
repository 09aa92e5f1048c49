//! TradeKorea, the KITA-run marketplace for Korean exporters.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::{RawCandidate, SourceId};

use super::listing::{parse_listing_html, ListingProvider, SiteProfile};

pub static PROFILE: SiteProfile = SiteProfile {
    source: SourceId::Tradekorea,
    search_path: "/search/product.do",
    query_param: "keyword",
    extra_params: &[],
    item: ".prd_list li, .product-list .product",
    title: ".prd_name, .product-title",
    link: "a.prd_link, .product-title a",
    price: ".prd_price, .price",
    moq: ".prd_moq, .moq",
    supplier: ".company_name, .seller",
    badges: ".seller_grade, .badge",
    rating: "",
    image: ".prd_img img, .thumb img",
    sort_by_rating: false,
};

/// A long-lived TradeKorea provider.
pub fn provider(config: &SearchConfig) -> ListingProvider {
    ListingProvider::new(&PROFILE, config)
}

/// Parse a TradeKorea search results page.
pub fn parse_tradekorea_html(
    html: &str,
    base_url: &str,
    limit: usize,
) -> Result<Vec<RawCandidate>, SearchError> {
    parse_listing_html(html, &PROFILE, base_url, limit)
}
