//! Trait definitions for the listing module.

use async_trait::async_trait;

use super::types::{CandidateSubtitle, ListingError};
use crate::media::MediaReference;

/// A source of subtitle candidates for a media id.
#[async_trait]
pub trait ListingSource: Send + Sync {
    /// Returns the name of this source.
    fn name(&self) -> &str;

    /// Domain used to pace requests against this source.
    fn domain(&self) -> &str;

    /// Page that archive downloads should claim to come from.
    fn referer(&self) -> Option<&str> {
        None
    }

    /// Fetch every candidate listed for the media's series or movie.
    async fn fetch_candidates(
        &self,
        media: &MediaReference,
    ) -> Result<Vec<CandidateSubtitle>, ListingError>;
}
