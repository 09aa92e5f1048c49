//! CJ Dropshipping, the one structured source: a JSON product API
//! authenticated with an access token.
//!
//! Results carry typed values, so candidates are tagged
//! [`CandidateDetail::Api`] with the explicit price range the API reports.

use async_trait::async_trait;
use serde::Deserialize;

use crate::config::SearchConfig;
use crate::error::SearchError;
use crate::http::{self, Session};
use crate::normalize::extract_numbers;
use crate::provider::ProviderAdapter;
use crate::types::{CandidateDetail, RawCandidate, SourceId};

const PRODUCT_LIST_PATH: &str = "/api2.0/v1/product/list";
const TOKEN_HEADER: &str = "CJ-Access-Token";
const PRODUCT_PAGE_BASE: &str = "https://cjdropshipping.com/product/-p-";
/// The API pages at most this many products per request.
const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Deserialize)]
struct CjEnvelope {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    result: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<CjPage>,
}

#[derive(Debug, Default, Deserialize)]
struct CjPage {
    #[serde(default)]
    list: Vec<CjProduct>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct CjProduct {
    pid: String,
    product_name_en: String,
    product_image: Option<String>,
    /// Either a number or a string such as `"3.10 -- 5.20"`.
    sell_price: Option<serde_json::Value>,
    description: Option<String>,
    category_name: Option<String>,
}

fn price_text(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s.trim().to_string(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

impl CjProduct {
    fn into_candidate(self) -> RawCandidate {
        let price_text = price_text(self.sell_price.as_ref());
        let numbers = extract_numbers(&price_text);
        let (price_min, price_max) = match numbers.as_slice() {
            [first, .., last] => (Some(first.min(*last)), Some(first.max(*last))),
            _ => (None, None),
        };
        let product_url = (!self.pid.is_empty()).then(|| format!("{PRODUCT_PAGE_BASE}{}.html", self.pid));
        let description = self.description.or(self.category_name);

        RawCandidate {
            price_text,
            // Dropshipping: single units.
            moq_text: "1".into(),
            supplier_name: SourceId::CjDropshipping.default_supplier_name().into(),
            image_url: self.product_image,
            product_url,
            detail: CandidateDetail::Api {
                price_min,
                price_max,
                description,
            },
            ..RawCandidate::new(SourceId::CjDropshipping, self.product_name_en)
        }
    }
}

/// Parse a product-list response body.
///
/// # Errors
///
/// [`SearchError::Parse`] for malformed JSON, [`SearchError::Provider`]
/// when the API reports failure.
pub fn parse_cj_response(body: &str, limit: usize) -> Result<Vec<RawCandidate>, SearchError> {
    let envelope: CjEnvelope = serde_json::from_str(body)
        .map_err(|e| SearchError::Parse(format!("CJ Dropshipping response: {e}")))?;
    if !envelope.result {
        return Err(SearchError::Provider {
            provider: SourceId::CjDropshipping,
            message: format!(
                "API error {}: {}",
                envelope.code,
                envelope.message.as_deref().unwrap_or("unknown")
            ),
        });
    }
    Ok(envelope
        .data
        .unwrap_or_default()
        .list
        .into_iter()
        .take(limit)
        .map(CjProduct::into_candidate)
        .collect())
}

/// CJ Dropshipping API client.
#[derive(Debug)]
pub struct CjDropshippingProvider {
    base_url: String,
    token: Option<String>,
    config: SearchConfig,
    session: Session,
}

impl CjDropshippingProvider {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            base_url: config.endpoints.base_url(SourceId::CjDropshipping).to_string(),
            token: config
                .cj_api_token
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            config: config.clone(),
            session: Session::new(),
        }
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }
}

#[async_trait]
impl ProviderAdapter for CjDropshippingProvider {
    fn source(&self) -> SourceId {
        SourceId::CjDropshipping
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<RawCandidate>, SearchError> {
        let Some(token) = self.token.as_deref() else {
            return Err(SearchError::Provider {
                provider: SourceId::CjDropshipping,
                message: "API token not configured".into(),
            });
        };
        if limit == 0 {
            return Ok(Vec::new());
        }
        tracing::trace!(query, "CJ Dropshipping search");

        let client = self
            .session
            .client(&self.config, self.config.provider_timeout_seconds)?;
        let page_size = limit.min(MAX_PAGE_SIZE).to_string();
        let response = client
            .get(format!("{}{PRODUCT_LIST_PATH}", self.base_url))
            .header(TOKEN_HEADER, token)
            .header("Accept", "application/json")
            .query(&[
                ("productNameEn", query),
                ("pageNum", "1"),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(|e| http::transport_error("CJ Dropshipping", &e))?
            .error_for_status()
            .map_err(|e| SearchError::Http(format!("CJ Dropshipping HTTP error: {e}")))?;
        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Http(format!("CJ Dropshipping response read failed: {e}")))?;

        let results = parse_cj_response(&body, limit)?;
        tracing::debug!(count = results.len(), "CJ Dropshipping results parsed");
        Ok(results)
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
