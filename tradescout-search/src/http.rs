//! Shared HTTP plumbing for the scraping providers.
//!
//! Provides a configured [`reqwest::Client`] with browser-like headers,
//! cookie support, and rotating User-Agent strings, plus a [`Session`]
//! that lets a long-lived provider reuse one client (and its cookie jar)
//! across searches while each search issues its own requests.

use crate::config::SearchConfig;
use crate::error::SearchError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::sync::Mutex;
use std::time::Duration;

/// Realistic browser User-Agent strings, rotated per session.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:133.0) Gecko/20100101 Firefox/133.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.15; rv:133.0) Gecko/20100101 Firefox/133.0",
];

/// Build a [`reqwest::Client`] configured for scraping sourcing sites.
///
/// The client has:
/// - Cookie store enabled (consent and locale cookies persist per session)
/// - `timeout_seconds` request timeout
/// - Random User-Agent from built-in rotation list (or custom if configured)
/// - Brotli and gzip decompression
///
/// # Errors
///
/// Returns [`SearchError::Http`] if the client cannot be constructed.
pub fn build_client(
    config: &SearchConfig,
    timeout_seconds: u64,
) -> Result<reqwest::Client, SearchError> {
    let ua = match config.user_agent {
        Some(ref custom) => custom.clone(),
        None => random_user_agent().to_owned(),
    };

    reqwest::Client::builder()
        .cookie_store(true)
        .timeout(Duration::from_secs(timeout_seconds))
        .user_agent(ua)
        .redirect(reqwest::redirect::Policy::limited(10))
        .build()
        .map_err(|e| SearchError::Http(format!("failed to build HTTP client: {e}")))
}

/// Select a random User-Agent string from the rotation list.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::thread_rng();
    USER_AGENTS
        .choose(&mut rng)
        .copied()
        // USER_AGENTS is a non-empty const array, choose only returns None on empty slices
        .unwrap_or(USER_AGENTS[0])
}

/// Pick a delay from the configured jitter range.
pub fn jitter_delay(range_ms: (u64, u64)) -> Duration {
    let (min, max) = range_ms;
    if max <= min {
        return Duration::from_millis(min);
    }
    Duration::from_millis(rand::thread_rng().gen_range(min..=max))
}

/// Sleep for a random delay from the configured range before a request.
pub async fn jitter(config: &SearchConfig) {
    let delay = jitter_delay(config.request_delay_ms);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

/// A reusable HTTP session owned by one provider.
///
/// The client is built lazily on first use (or eagerly by [`Session::open`])
/// and dropped by [`Session::close`]. `reqwest::Client` is reference
/// counted internally, so handing out clones is cheap and concurrent
/// searches share the connection pool and cookie jar.
#[derive(Debug, Default)]
pub struct Session {
    client: Mutex<Option<reqwest::Client>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the client now rather than on first search.
    pub fn open(&self, config: &SearchConfig, timeout_seconds: u64) -> Result<(), SearchError> {
        self.client(config, timeout_seconds).map(|_| ())
    }

    /// Return the session client, building it if the session is not open.
    pub fn client(
        &self,
        config: &SearchConfig,
        timeout_seconds: u64,
    ) -> Result<reqwest::Client, SearchError> {
        let mut slot = self
            .client
            .lock()
            .map_err(|_| SearchError::Internal("HTTP session lock poisoned".into()))?;
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }
        let client = build_client(config, timeout_seconds)?;
        *slot = Some(client.clone());
        Ok(client)
    }

    /// Drop the session client. The next search opens a fresh one.
    pub fn close(&self) {
        if let Ok(mut slot) = self.client.lock() {
            *slot = None;
        }
    }

    /// Whether a client is currently held.
    pub fn is_open(&self) -> bool {
        self.client.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }
}

/// Fetch a page as text, mapping transport and status errors to
/// [`SearchError::Http`] with the site name for context.
pub async fn fetch_text(
    request: reqwest::RequestBuilder,
    site: &str,
) -> Result<String, SearchError> {
    let response = request
        .header("Accept", "text/html,application/xhtml+xml")
        .header("Accept-Language", "en-US,en;q=0.9")
        .send()
        .await
        .map_err(|e| transport_error(site, &e))?
        .error_for_status()
        .map_err(|e| SearchError::Http(format!("{site} HTTP error: {e}")))?;

    response
        .text()
        .await
        .map_err(|e| SearchError::Http(format!("{site} response read failed: {e}")))
}

/// Map a transport failure to [`SearchError::Timeout`] or
/// [`SearchError::Http`].
pub fn transport_error(site: &str, err: &reqwest::Error) -> SearchError {
    if err.is_timeout() {
        SearchError::Timeout(format!("{site} did not respond in time"))
    } else {
        SearchError::Http(format!("{site} request failed: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_user_agent_returns_valid_ua() {
        let ua = random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
        assert!(ua.contains("Mozilla/5.0"));
    }

    #[test]
    fn build_client_with_default_config() {
        let config = SearchConfig::default();
        assert!(build_client(&config, 5).is_ok());
    }

    #[test]
    fn build_client_with_custom_ua() {
        let config = SearchConfig {
            user_agent: Some("CustomBot/1.0".into()),
            ..Default::default()
        };
        assert!(build_client(&config, 5).is_ok());
    }

    #[test]
    fn jitter_delay_stays_in_range() {
        for _ in 0..50 {
            let delay = jitter_delay((10, 20));
            assert!(delay >= Duration::from_millis(10));
            assert!(delay <= Duration::from_millis(20));
        }
        assert_eq!(jitter_delay((0, 0)), Duration::ZERO);
    }

    #[test]
    fn session_open_and_close() {
        let config = SearchConfig::default();
        let session = Session::new();
        assert!(!session.is_open());
        session.open(&config, 5).expect("open session");
        assert!(session.is_open());
        session.close();
        assert!(!session.is_open());
    }

    #[test]
    fn session_client_opens_lazily() {
        let config = SearchConfig::default();
        let session = Session::new();
        let client = session.client(&config, 5);
        assert!(client.is_ok());
        assert!(session.is_open());
    }
}
