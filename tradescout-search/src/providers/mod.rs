//! Provider implementations, one per sourcing site, plus the AI-assisted
//! enrichment extractor.
//!
//! The five HTML sites share [`listing::ListingProvider`] and differ only
//! in their [`listing::SiteProfile`]. CJ Dropshipping is a JSON API client.

pub mod ai_extract;
pub mod alibaba;
pub mod cj_dropshipping;
pub mod global_sources;
pub mod listing;
pub mod made_in_china;
pub mod registry;
pub mod tradekorea;
pub mod wholesale_central;

pub use ai_extract::AiExtractProvider;
pub use cj_dropshipping::CjDropshippingProvider;
pub use listing::{ListingProvider, SiteProfile};
pub use registry::ProviderRegistry;

use crate::types::SourceId;

/// The listing profile of a scraped source. `None` for API-backed sources.
pub fn site_profile(source: SourceId) -> Option<&'static SiteProfile> {
    match source {
        SourceId::Alibaba => Some(&alibaba::PROFILE),
        SourceId::MadeInChina => Some(&made_in_china::PROFILE),
        SourceId::GlobalSources => Some(&global_sources::PROFILE),
        SourceId::Tradekorea => Some(&tradekorea::PROFILE),
        SourceId::WholesaleCentral => Some(&wholesale_central::PROFILE),
        SourceId::CjDropshipping => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_scraped_profile_matches_its_source() {
        for source in SourceId::all() {
            if let Some(profile) = site_profile(*source) {
                assert_eq!(profile.source, *source);
            }
        }
        assert!(site_profile(SourceId::CjDropshipping).is_none());
    }
}
