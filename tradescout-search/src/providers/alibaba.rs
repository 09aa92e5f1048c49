//! Alibaba.com, the largest source and the only one the free tier always
//! includes.
//!
//! Scrapes the gallery-style offer list at `/trade/search`. Supplier cards
//! carry the Gold Supplier / Verified badges and a response-rate figure.

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::types::{RawCandidate, SourceId};

use super::listing::{parse_listing_html, ListingProvider, SiteProfile};

pub static PROFILE: SiteProfile = SiteProfile {
    source: SourceId::Alibaba,
    search_path: "/trade/search",
    query_param: "SearchText",
    extra_params: &[("tab", "all")],
    item: ".organic-list .fy23-search-card, .organic-list .list-no-v2-outter, .J-offer-wrapper",
    title: ".search-card-e-title, .elements-title-normal__content, h2",
    link: "a.search-card-e-slider__link, a.elements-title-normal, h2 a",
    price: ".search-card-e-price-main, .elements-offer-price-normal__price",
    moq: ".search-card-m-sale-features__item, .element-offer-minorder-normal__value",
    supplier: ".search-card-e-company, .organic-list-offer__seller-company",
    badges: ".search-card-e-supplier__year, .verified-supplier-icon__wrapper, .search-card-e-review, .seller-tag__year, .gold-supplier",
    rating: ".search-card-e-review strong, .seb-supplier-review__score",
    image: "img.search-card-e-slider__img, .seb-img-switcher__imgs img",
    sort_by_rating: false,
};

/// A long-lived Alibaba provider.
pub fn provider(config: &SearchConfig) -> ListingProvider {
    ListingProvider::new(&PROFILE, config)
}

/// Parse an Alibaba search results page.
///
/// Extracted as a separate function for testability with mock HTML.
pub fn parse_alibaba_html(
    html: &str,
    base_url: &str,
    limit: usize,
) -> Result<Vec<RawCandidate>, SearchError> {
    parse_listing_html(html, &PROFILE, base_url, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderAdapter;

    const MOCK_ALIBABA_HTML: &str = r#"<!DOCTYPE html>
<html><body><div class="organic-list">
  <div class="fy23-search-card">
    <a class="search-card-e-slider__link" href="//www.alibaba.com/product-detail/Commercial-Ice-Maker_1600.html?spm=a2700">
      <img class="search-card-e-slider__img" src="//s.alicdn.com/ice1.jpg">
    </a>
    <h2 class="search-card-e-title"><span>Commercial <strong>Ice Maker</strong> 100kg/24h</span></h2>
    <div class="search-card-e-price-main">$520.00-$680.00</div>
    <div class="search-card-m-sale-features__item">Min. order: 1 set</div>
    <a class="search-card-e-company">Ningbo Kingcool Refrigeration Co., Ltd.</a>
    <span class="search-card-e-supplier__year">9 yrs</span>
    <span class="verified-supplier-icon__wrapper">Gold Supplier</span>
    <span class="search-card-e-review"><strong>4.8</strong>/5.0 (21) 97% response rate</span>
  </div>
  <div class="fy23-search-card">
    <a class="search-card-e-slider__link" href="https://www.alibaba.com/product-detail/Nugget-Ice_1601.html"></a>
    <h2 class="search-card-e-title">Nugget Ice Maker Countertop</h2>
    <div class="search-card-e-price-main">$89</div>
    <div class="search-card-m-sale-features__item">Min. order: 200 pieces</div>
  </div>
</div></body></html>"#;

    #[test]
    fn parse_mock_html_returns_results() {
        let results = parse_alibaba_html(MOCK_ALIBABA_HTML, "https://www.alibaba.com", 10)
            .expect("should parse");
        assert_eq!(results.len(), 2);

        let first = &results[0];
        assert_eq!(first.source, SourceId::Alibaba);
        assert_eq!(first.title, "Commercial Ice Maker 100kg/24h");
        assert_eq!(first.price_text, "$520.00-$680.00");
        assert_eq!(first.moq_text, "Min. order: 1 set");
        assert_eq!(first.supplier_name, "Ningbo Kingcool Refrigeration Co., Ltd.");
        assert!(first.supplier_text.contains("Gold"));
        assert!(first.supplier_text.contains("97%"));
        assert!(first.supplier_text.contains("9 yrs"));
        assert_eq!(first.rating_text, "4.8");
        assert_eq!(
            first.product_url.as_deref(),
            Some("https://www.alibaba.com/product-detail/Commercial-Ice-Maker_1600.html?spm=a2700")
        );
        assert_eq!(first.image_url.as_deref(), Some("https://s.alicdn.com/ice1.jpg"));

        assert_eq!(results[1].title, "Nugget Ice Maker Countertop");
        assert!(results[1].supplier_name.is_empty());
    }

    #[test]
    fn parse_respects_limit() {
        let results = parse_alibaba_html(MOCK_ALIBABA_HTML, "https://www.alibaba.com", 1)
            .expect("should parse");
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn parse_empty_html_returns_empty() {
        let results = parse_alibaba_html("<html><body></body></html>", "https://www.alibaba.com", 10)
            .expect("should parse");
        assert!(results.is_empty());
    }

    #[test]
    fn provider_source_is_alibaba() {
        assert_eq!(provider(&SearchConfig::default()).source(), SourceId::Alibaba);
    }

    #[tokio::test]
    #[ignore = "hits the live site"]
    async fn live_search_returns_listings() {
        let results = provider(&SearchConfig::default())
            .search("ice maker", 5)
            .await
            .expect("live search");
        assert!(results.len() <= 5);
    }
}
