//! Request validation, applied before the search core runs.

use std::collections::BTreeSet;

use tradescout_search::SourceId;

use crate::error::{AppError, Result};

/// Minimum query length in characters, after trimming.
pub const MIN_QUERY_CHARS: usize = 2;

/// Maximum query length in characters, after trimming.
pub const MAX_QUERY_CHARS: usize = 200;

/// Trim `raw` and check its length.
///
/// # Errors
///
/// [`AppError::Validation`] when the trimmed query is shorter than
/// [`MIN_QUERY_CHARS`] or longer than [`MAX_QUERY_CHARS`].
pub fn validate_query(raw: &str) -> Result<String> {
    let query = raw.trim();
    let chars = query.chars().count();
    if chars < MIN_QUERY_CHARS {
        return Err(AppError::Validation(format!(
            "query must be at least {MIN_QUERY_CHARS} characters"
        )));
    }
    if chars > MAX_QUERY_CHARS {
        return Err(AppError::Validation(format!(
            "query must be at most {MAX_QUERY_CHARS} characters (got {chars})"
        )));
    }
    Ok(query.to_string())
}

/// Parse wire source names (`alibaba`, `made-in-china`, ...).
///
/// An empty list means every source the tier permits. Duplicates collapse.
///
/// # Errors
///
/// [`AppError::Validation`] naming the first unknown source.
pub fn parse_sources<S: AsRef<str>>(raw: &[S]) -> Result<BTreeSet<SourceId>> {
    raw.iter()
        .map(|name| {
            let name = name.as_ref();
            SourceId::parse(name).ok_or_else(|| {
                let known: Vec<&str> = SourceId::all().iter().map(SourceId::as_str).collect();
                AppError::Validation(format!(
                    "unknown source '{}'; expected one of {}",
                    name.trim(),
                    known.join(", ")
                ))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_is_trimmed() {
        assert_eq!(validate_query("  ice maker \n").expect("valid"), "ice maker");
    }

    #[test]
    fn short_query_rejected() {
        for raw in ["", "   ", "a", " b "] {
            let err = validate_query(raw).unwrap_err();
            assert_eq!(err.kind(), "validation", "input {raw:?}");
            assert!(err.to_string().contains("at least 2"));
        }
    }

    #[test]
    fn boundary_lengths_accepted() {
        assert!(validate_query("ab").is_ok());
        assert!(validate_query(&"x".repeat(MAX_QUERY_CHARS)).is_ok());
    }

    #[test]
    fn long_query_rejected() {
        let err = validate_query(&"x".repeat(MAX_QUERY_CHARS + 1)).unwrap_err();
        assert!(err.to_string().contains("at most 200"));
    }

    #[test]
    fn length_counts_characters_not_bytes() {
        let query = "冰".repeat(MAX_QUERY_CHARS);
        assert!(validate_query(&query).is_ok());
    }

    #[test]
    fn sources_parse_from_wire_names() {
        let sources = parse_sources(&["alibaba", "made-in-china", "alibaba"]).expect("valid");
        assert_eq!(sources.len(), 2);
        assert!(sources.contains(&SourceId::MadeInChina));
    }

    #[test]
    fn empty_sources_is_empty_set() {
        assert!(parse_sources::<&str>(&[]).expect("valid").is_empty());
    }

    #[test]
    fn unknown_source_rejected() {
        let err = parse_sources(&["alibaba".to_string(), "ebay".to_string()]).unwrap_err();
        assert_eq!(err.kind(), "validation");
        assert!(err.to_string().contains("'ebay'"));
        assert!(err.to_string().contains("wholesale-central"));
    }
}
