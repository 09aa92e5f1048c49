//! AI-assisted enrichment extractor.
//!
//! Sends a site's search page to a hosted extraction API (Firecrawl's
//! `/v1/scrape` with the `extract` format), which renders the page and
//! returns listings matching a JSON schema. Coverage is often better than
//! the HTML scraper when a site changes its markup, but the output is
//! loosely structured, so it only ever fills gaps in primary results.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http::{self, Session};
use crate::provider::EnrichmentProvider;
use crate::types::{CandidateDetail, RawCandidate, SourceId};

use super::listing::SiteProfile;

const SCRAPE_PATH: &str = "/v1/scrape";

const EXTRACT_PROMPT: &str = "Extract every product listing on this B2B search results page. \
For each listing return the product title, the price exactly as displayed, the minimum order \
quantity as displayed, the supplier company name, supplier badges (membership level, response \
rate, years in business), the supplier rating as displayed, the product URL and the image URL.";

#[derive(Debug, Serialize)]
struct ScrapeRequest<'a> {
    url: String,
    formats: [&'static str; 1],
    extract: ExtractOptions<'a>,
    /// Milliseconds the service may spend rendering.
    timeout: u64,
}

#[derive(Debug, Serialize)]
struct ExtractOptions<'a> {
    prompt: &'a str,
    schema: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ScrapeResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    data: Option<ScrapeData>,
}

#[derive(Debug, Deserialize)]
struct ScrapeData {
    #[serde(default)]
    extract: Option<Extracted>,
}

#[derive(Debug, Default, Deserialize)]
struct Extracted {
    #[serde(default)]
    products: Vec<ExtractedProduct>,
}

/// One listing as the extractor returned it. Any field may be missing or
/// typed unexpectedly.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ExtractedProduct {
    title: Option<serde_json::Value>,
    price: Option<serde_json::Value>,
    min_order: Option<serde_json::Value>,
    supplier_name: Option<serde_json::Value>,
    supplier_badges: Option<serde_json::Value>,
    rating: Option<serde_json::Value>,
    product_url: Option<serde_json::Value>,
    image_url: Option<serde_json::Value>,
    description: Option<serde_json::Value>,
}

fn listing_schema() -> serde_json::Value {
    let text = serde_json::json!({ "type": "string" });
    serde_json::json!({
        "type": "object",
        "properties": {
            "products": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": text,
                        "price": text,
                        "minOrder": text,
                        "supplierName": text,
                        "supplierBadges": text,
                        "rating": text,
                        "productUrl": text,
                        "imageUrl": text,
                        "description": text,
                    },
                    "required": ["title"],
                }
            }
        },
        "required": ["products"],
    })
}

/// Flatten whatever the extractor produced into display text.
fn value_text(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        Some(serde_json::Value::Array(items)) => items
            .iter()
            .map(|v| value_text(Some(v)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "),
        _ => String::new(),
    }
}

fn optional_text(value: Option<&serde_json::Value>) -> Option<String> {
    let text = value_text(value);
    (!text.is_empty()).then_some(text)
}

impl ExtractedProduct {
    fn into_candidate(self, source: SourceId) -> RawCandidate {
        RawCandidate {
            price_text: value_text(self.price.as_ref()),
            moq_text: value_text(self.min_order.as_ref()),
            supplier_name: value_text(self.supplier_name.as_ref()),
            supplier_text: value_text(self.supplier_badges.as_ref()),
            rating_text: value_text(self.rating.as_ref()),
            image_url: optional_text(self.image_url.as_ref()),
            product_url: optional_text(self.product_url.as_ref()),
            detail: CandidateDetail::AiExtracted {
                description: optional_text(self.description.as_ref()),
            },
            ..RawCandidate::new(source, value_text(self.title.as_ref()))
        }
    }
}

/// Parse an extraction response body into candidates for `source`.
///
/// # Errors
///
/// [`SearchError::Parse`] for malformed JSON, [`SearchError::Provider`]
/// when the service reports failure.
pub fn parse_extract_response(
    body: &str,
    source: SourceId,
    limit: usize,
) -> Result<Vec<RawCandidate>, SearchError> {
    let response: ScrapeResponse = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("extraction response: {e}")))?;
    if !response.success {
        return Err(SearchError::Provider {
            provider: source,
            message: format!(
                "extraction failed: {}",
                response.error.as_deref().unwrap_or("unknown error")
            ),
        });
    }
    Ok(response
        .data
        .and_then(|d| d.extract)
        .unwrap_or_default()
        .products
        .into_iter()
        .map(|p| p.into_candidate(source))
        .filter(|c| !c.title.is_empty())
        .take(limit)
        .collect())
}

/// Extraction-based enrichment for one scraped site.
#[derive(Debug)]
pub struct AiExtractProvider {
    profile: &'static SiteProfile,
    site_base: String,
    endpoint: String,
    api_key: Option<String>,
    timeout_seconds: u64,
    config: SearchConfig,
    session: Session,
}

impl AiExtractProvider {
    pub fn new(profile: &'static SiteProfile, config: &SearchConfig) -> Self {
        let enrichment = &config.enrichment;
        Self {
            profile,
            site_base: config.endpoints.base_url(profile.source).to_string(),
            endpoint: enrichment.base_url.trim_end_matches('/').to_string(),
            api_key: enrichment
                .is_configured()
                .then(|| enrichment.api_key.clone())
                .flatten(),
            timeout_seconds: enrichment.timeout_seconds,
            config: config.clone(),
            session: Session::new(),
        }
    }

    /// The site search page the extractor is asked to read.
    ///
    /// # Errors
    ///
    /// [`SearchError::Config`] if the site base URL is invalid.
    pub fn target_url(&self, query: &str) -> Result<String, SearchError> {
        let mut url = Url::parse(&format!("{}{}", self.site_base, self.profile.search_path))
            .map_err(|e| SearchError::Config(format!("invalid site URL: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair(self.profile.query_param, query);
            for (key, value) in self.profile.extra_params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url.to_string())
    }
}

#[async_trait]
impl EnrichmentProvider for AiExtractProvider {
    fn source(&self) -> SourceId {
        self.profile.source
    }

    fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn scrape(&self, query: &str, limit: usize) -> Result<Vec<RawCandidate>, SearchError> {
        let Some(api_key) = self.api_key.as_deref() else {
            return Ok(Vec::new());
        };
        if limit == 0 {
            return Ok(Vec::new());
        }
        let source = self.profile.source;
        tracing::trace!(%source, query, "AI extraction");

        let request = ScrapeRequest {
            url: self.target_url(query)?,
            formats: ["extract"],
            extract: ExtractOptions {
                prompt: EXTRACT_PROMPT,
                schema: listing_schema(),
            },
            timeout: self.timeout_seconds.saturating_mul(1000),
        };
        let client = self.session.client(&self.config, self.timeout_seconds)?;
        let response = client
            .post(format!("{}{SCRAPE_PATH}", self.endpoint))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| http::transport_error("extraction service", &e))?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("extraction service HTTP error: {e}")))?;
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Http(format!("extraction response read failed: {e}")))?;

        let results = parse_extract_response(&body, source, limit)?;
        tracing::debug!(%source, count = results.len(), "AI extraction parsed");
        Ok(results)
    }
}
