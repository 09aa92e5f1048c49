//! Product URL canonicalisation and redaction.
//!
//! Sourcing sites decorate listing links with click-tracking parameters
//! (`spm`, `scm`, `utm_*`, ...). [`normalize_url`] removes those so the
//! same listing compares equal across passes; [`strip_query`] removes the
//! whole query for tiers that must not leak referral or source metadata.

use url::Url;

/// Tracking query parameters that are stripped during normalisation.
const TRACKING_PARAMS: &[&str] = &[
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "fbclid",
    "gclid",
    "spm",
    "scm",
    "s",
    "tracelog",
    "from",
    "ref",
];

/// Normalise a product URL for comparison and display.
///
/// 1. Remove the fragment.
/// 2. Remove default ports (`:80` for HTTP, `:443` for HTTPS).
/// 3. Strip known tracking parameters and sort the rest by key.
/// 4. Remove a trailing slash from the path (unless the path is `"/"`).
///
/// Scheme and host are lowercased by the parser. If the input cannot be
/// parsed as a URL it is returned unchanged.
///
/// # Examples
///
/// ```
/// use tradescout_search::orchestrator::url_normalize::normalize_url;
///
/// let a = normalize_url("https://WWW.Alibaba.com/product/1.html?spm=a2700&b=2&a=1#reviews");
/// let b = normalize_url("https://www.alibaba.com/product/1.html?a=1&b=2");
/// assert_eq!(a, b);
/// ```
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw) else {
        return raw.to_string();
    };

    parsed.set_fragment(None);

    if is_default_port(&parsed) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| {
            let k = key.to_lowercase();
            !TRACKING_PARAMS.contains(&k.as_str())
        })
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));

    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(params);
    }

    let path = parsed.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        parsed.set_path(&path[..path.len() - 1]);
    }

    parsed.to_string()
}

/// Remove the query string and fragment entirely.
///
/// Unparsable input is cut at the first `?` or `#`.
pub fn strip_query(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut parsed) => {
            parsed.set_query(None);
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}

/// Returns `true` if the URL uses the default port for its scheme.
fn is_default_port(url: &Url) -> bool {
    matches!(
        (url.scheme(), url.port()),
        ("http", Some(80)) | ("https", Some(443))
    )
}
