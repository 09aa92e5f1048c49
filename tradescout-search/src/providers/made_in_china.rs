//! Made-in-China.com product directory.
//!
//! Listing cards show a price range, an MOQ line, and the supplier's
//! membership tier (Diamond/Gold/Audited) beside the company name.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::{RawCandidate, SourceId};

use super::listing::{parse_listing_html, ListingProvider, SiteProfile};

pub static PROFILE: SiteProfile = SiteProfile {
    source: SourceId::MadeInChina,
    search_path: "/productdirectory.do",
    query_param: "word",
    extra_params: &[("subaction", "hunt"), ("style", "b"), ("mode", "and")],
    item: ".prod-list .list-node, .search-list .prod-info",
    title: ".product-name a",
    link: ".product-name a",
    price: ".product-property .price, .price-info",
    moq: ".product-property .info, .moq",
    supplier: ".company-name a, .compnay-name",
    badges: ".auth-list .auth-icon, .member-level, .company-year, .response-rate",
    rating: ".star-score, .review-score",
    image: ".prod-image img, .img-wrap img",
    sort_by_rating: false,
};

/// A long-lived Made-in-China provider.
pub fn provider(config: &SearchConfig) -> ListingProvider {
    ListingProvider::new(&PROFILE, config)
}

/// Parse a Made-in-China search results page.
pub fn parse_made_in_china_html(
    html: &str,
    base_url: &str,
    limit: usize,
) -> Result<Vec<RawCandidate>, SearchError> {
    parse_listing_html(html, &PROFILE, base_url, limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MOCK_MIC_HTML: &str = r#"<html><body><div class="prod-list">
  <div class="list-node">
    <div class="prod-image"><img data-original="https://image.made-in-china.com/ice.jpg" src="data:image/gif;base64,R0lGOD"></div>
    <h2 class="product-name"><a href="https://cnkingcool.en.made-in-china.com/product/abc/China-Ice-Maker.html" title="Industrial Flake Ice Maker 5 Ton">Industrial Flake Ice...</a></h2>
    <div class="product-property"><span class="price">US$ 3,000-4,500</span><span class="info">1 Piece (MOQ)</span></div>
    <div class="company-name"><a>Guangzhou Icesource Co., Ltd.</a></div>
    <div class="auth-list"><i class="auth-icon">Audited Supplier</i></div>
    <span class="member-level">Gold Member Since 2016</span>
  </div>
</div></body></html>"#;

    #[test]
    fn parse_mock_html_returns_results() {
        let results = parse_made_in_china_html(MOCK_MIC_HTML, "https://www.made-in-china.com", 10)
            .expect("should parse");
        assert_eq!(results.len(), 1);
        let item = &results[0];
        assert_eq!(item.source, SourceId::MadeInChina);
        assert_eq!(item.title, "Industrial Flake Ice Maker 5 Ton");
        assert_eq!(item.price_text, "US$ 3,000-4,500");
        assert_eq!(item.moq_text, "1 Piece (MOQ)");
        assert_eq!(item.supplier_name, "Guangzhou Icesource Co., Ltd.");
        assert!(item.supplier_text.starts_with("Audited Supplier"));
        // data: placeholder skipped in favour of the lazy-load attribute.
        assert_eq!(
            item.image_url.as_deref(),
            Some("https://image.made-in-china.com/ice.jpg")
        );
    }

    #[test]
    fn parse_empty_html_returns_empty() {
        let results = parse_made_in_china_html("<html></html>", "https://www.made-in-china.com", 10)
            .expect("should parse");
        assert!(results.is_empty());
    }

    #[tokio::test]
    #[ignore = "hits the live site"]
    async fn live_search_returns_listings() {
        use crate::provider::ProviderAdapter;
        let results = provider(&SearchConfig::default())
            .search("ice maker", 5)
            .await
            .expect("live search");
        assert!(results.len() <= 5);
    }
}
