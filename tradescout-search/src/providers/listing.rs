//! Shared HTML listing scraper.
//!
//! The five scraped sites differ only in their search URL and in the CSS
//! selectors of a result card, so one [`ListingProvider`] driven by a
//! per-site [`SiteProfile`] implements all of them.

use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http::{self, Session};
use crate::normalize::parse_rating;
use crate::provider::ProviderAdapter;
use crate::types::{RawCandidate, SourceId};

/// Page fragments that indicate the site served a bot check instead of
/// results.
const BLOCK_MARKERS: &[&str] = &[
    "captcha",
    "slide to verify",
    "unusual traffic",
    "access denied",
    "punish",
];

/// Search URL and result-card selectors for one site.
///
/// An empty selector means the site does not show that field.
#[derive(Debug)]
pub struct SiteProfile {
    pub source: SourceId,
    /// Path of the search page, appended to the configured base URL.
    pub search_path: &'static str,
    /// Query parameter carrying the search text.
    pub query_param: &'static str,
    /// Fixed query parameters sent with every search.
    pub extra_params: &'static [(&'static str, &'static str)],
    /// One result card.
    pub item: &'static str,
    pub title: &'static str,
    /// Anchor whose `href` is the detail page.
    pub link: &'static str,
    pub price: &'static str,
    pub moq: &'static str,
    pub supplier: &'static str,
    /// Supplier badges (membership level, response rate, years). Every
    /// match is concatenated.
    pub badges: &'static str,
    pub rating: &'static str,
    pub image: &'static str,
    /// Sort the parsed page by supplier rating, best first.
    pub sort_by_rating: bool,
}

struct CompiledProfile {
    item: Selector,
    title: Selector,
    link: Option<Selector>,
    price: Option<Selector>,
    moq: Option<Selector>,
    supplier: Option<Selector>,
    badges: Option<Selector>,
    rating: Option<Selector>,
    image: Option<Selector>,
}

fn compile(selector: &str, field: &str) -> Result<Option<Selector>, SearchError> {
    if selector.is_empty() {
        return Ok(None);
    }
    Selector::parse(selector)
        .map(Some)
        .map_err(|e| SearchError::Parse(format!("invalid {field} selector: {e:?}")))
}

fn required(selector: &str, field: &str) -> Result<Selector, SearchError> {
    compile(selector, field)?
        .ok_or_else(|| SearchError::Parse(format!("missing {field} selector")))
}

impl CompiledProfile {
    fn new(profile: &SiteProfile) -> Result<Self, SearchError> {
        Ok(Self {
            item: required(profile.item, "item")?,
            title: required(profile.title, "title")?,
            link: compile(profile.link, "link")?,
            price: compile(profile.price, "price")?,
            moq: compile(profile.moq, "moq")?,
            supplier: compile(profile.supplier, "supplier")?,
            badges: compile(profile.badges, "badges")?,
            rating: compile(profile.rating, "rating")?,
            image: compile(profile.image, "image")?,
        })
    }
}

fn collapse(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn text_of(element: ElementRef<'_>) -> String {
    collapse(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_text(card: ElementRef<'_>, selector: Option<&Selector>) -> String {
    selector
        .and_then(|sel| card.select(sel).next())
        .map(text_of)
        .unwrap_or_default()
}

fn all_text(card: ElementRef<'_>, selector: Option<&Selector>) -> String {
    let Some(sel) = selector else {
        return String::new();
    };
    collapse(&card.select(sel).map(text_of).collect::<Vec<_>>().join(" "))
}

/// Resolve `href` against the site base, upgrading protocol-relative links.
fn absolute_url(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with("javascript:") || href.starts_with("data:") {
        return None;
    }
    if let Some(rest) = href.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    match Url::parse(href) {
        Ok(url) => Some(url.to_string()),
        Err(_) => base.and_then(|b| b.join(href).ok()).map(|u| u.to_string()),
    }
}

fn image_of(card: ElementRef<'_>, selector: Option<&Selector>, base: Option<&Url>) -> Option<String> {
    let img = card.select(selector?).next()?;
    ["src", "data-src", "data-original", "data-lazy-src"]
        .iter()
        .filter_map(|attr| img.value().attr(attr))
        .find_map(|src| absolute_url(base, src))
}

/// Whether the page looks like an anti-bot interstitial.
pub fn looks_blocked(html: &str) -> bool {
    let lower = html.to_lowercase();
    BLOCK_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Parse one search results page into raw candidates.
///
/// Cards without a title are skipped. Returns at most `limit` candidates,
/// in page order unless the profile sorts by rating.
///
/// # Errors
///
/// [`SearchError::Parse`] if a selector is invalid, [`SearchError::Http`]
/// if the page has no result cards and looks like a bot check.
pub fn parse_listing_html(
    html: &str,
    profile: &SiteProfile,
    base_url: &str,
    limit: usize,
) -> Result<Vec<RawCandidate>, SearchError> {
    let compiled = CompiledProfile::new(profile)?;
    let base = Url::parse(base_url).ok();
    let document = Html::parse_document(html);
    let source = profile.source;

    let mut cards = 0usize;
    let mut results = Vec::new();
    for card in document.select(&compiled.item) {
        cards += 1;
        let Some(title_el) = card.select(&compiled.title).next() else {
            continue;
        };
        let title = match title_el.value().attr("title").map(collapse) {
            Some(attr) if !attr.is_empty() => attr,
            _ => text_of(title_el),
        };
        if title.is_empty() {
            continue;
        }

        let link_el = match compiled.link.as_ref() {
            Some(sel) => card.select(sel).next(),
            None => Some(title_el),
        };
        let product_url = link_el
            .and_then(|el| el.value().attr("href"))
            .and_then(|href| absolute_url(base.as_ref(), href));

        results.push(RawCandidate {
            price_text: first_text(card, compiled.price.as_ref()),
            moq_text: first_text(card, compiled.moq.as_ref()),
            supplier_name: first_text(card, compiled.supplier.as_ref()),
            supplier_text: all_text(card, compiled.badges.as_ref()),
            rating_text: first_text(card, compiled.rating.as_ref()),
            image_url: image_of(card, compiled.image.as_ref(), base.as_ref()),
            product_url,
            ..RawCandidate::new(source, title)
        });

        if !profile.sort_by_rating && results.len() >= limit {
            break;
        }
    }

    if cards == 0 && looks_blocked(html) {
        return Err(SearchError::Http(format!(
            "{} served a bot check instead of results",
            source.display_name()
        )));
    }

    if profile.sort_by_rating {
        // Stable: equal ratings keep page order, unrated listings go last.
        results.sort_by(|a, b| {
            let ra = parse_rating(&a.rating_text).unwrap_or(-1.0);
            let rb = parse_rating(&b.rating_text).unwrap_or(-1.0);
            rb.total_cmp(&ra)
        });
    }
    results.truncate(limit);

    tracing::debug!(%source, count = results.len(), "listing page parsed");
    Ok(results)
}

/// A scraping provider for one site, reusing one HTTP session across
/// searches.
#[derive(Debug)]
pub struct ListingProvider {
    profile: &'static SiteProfile,
    base_url: String,
    config: SearchConfig,
    session: Session,
}

impl ListingProvider {
    pub fn new(profile: &'static SiteProfile, config: &SearchConfig) -> Self {
        Self {
            profile,
            base_url: config.endpoints.base_url(profile.source).to_string(),
            config: config.clone(),
            session: Session::new(),
        }
    }

    /// Full URL of the search page, without the query.
    pub fn search_url(&self) -> String {
        format!("{}{}", self.base_url, self.profile.search_path)
    }

    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }
}

#[async_trait]
impl ProviderAdapter for ListingProvider {
    fn source(&self) -> SourceId {
        self.profile.source
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawCandidate>, SearchError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        let source = self.profile.source;
        tracing::trace!(%source, query, "listing search");

        http::jitter(&self.config).await;
        let client = self
            .session
            .client(&self.config, self.config.provider_timeout_seconds)?;
        let request = client
            .get(self.search_url())
            .query(&[(self.profile.query_param, query)])
            .query(self.profile.extra_params);
        let html = http::fetch_text(request, source.display_name()).await?;
        tracing::trace!(%source, bytes = html.len(), "listing page received");

        parse_listing_html(&html, self.profile, &self.base_url, limit)
    }

    async fn open(&self) -> Result<(), SearchError> {
        self.session
            .open(&self.config, self.config.provider_timeout_seconds)
    }

    async fn close(&self) -> Result<(), SearchError> {
        self.session.close();
        Ok(())
    }
}
