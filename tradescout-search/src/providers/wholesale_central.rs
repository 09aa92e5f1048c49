//! Wholesale Central, a US wholesaler directory.
//!
//! Listings are supplier ads: there is rarely a price, never a rating.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::{RawCandidate, SourceId};

use super::listing::{parse_listing_html, ListingProvider, SiteProfile};

pub static PROFILE: SiteProfile = SiteProfile {
    source: SourceId::WholesaleCentral,
    search_path: "/search.php",
    query_param: "searchtext",
    extra_params: &[],
    item: ".search-results .result, table.results tr.listing",
    title: ".product-title, .title a",
    link: ".product-title a, .title a",
    price: ".price",
    moq: ".min-order",
    supplier: ".company, .supplier",
    badges: ".member-since",
    rating: "",
    image: "img",
    sort_by_rating: false,
};

/// A long-lived Wholesale Central provider.
pub fn provider(config: &SearchConfig) -> ListingProvider {
    ListingProvider::new(&PROFILE, config)
}

/// Parse a Wholesale Central search results page.
pub fn parse_wholesale_central_html(
    html: &str,
    base_url: &str,
    limit: usize,
) -> Result<Vec<RawCandidate>, SearchError> {
    parse_listing_html(html, &PROFILE, base_url, limit)
}
