//! Search pipeline stages: concurrent fan-out, cross-pass merge, and
//! tier-based shaping.
//!
//! [`fanout`] queries every permitted source concurrently and tolerates
//! per-source failure, [`merge`] folds enrichment results into the primary
//! results, and [`shaping`] applies tier limits and redaction.

pub mod fanout;
pub mod merge;
pub mod shaping;
pub mod url_normalize;
