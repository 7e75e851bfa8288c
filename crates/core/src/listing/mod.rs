//! Subtitle listing.
//!
//! Fetches the upstream page listing every subtitle archive for a series or
//! movie and turns its rows into [`CandidateSubtitle`]s.

mod config;
mod subsro;
mod traits;
mod types;

pub use config::ListingConfig;
pub use subsro::{parse_listing, SubsRoListing};
pub use traits::ListingSource;
pub use types::{CandidateSubtitle, ListingError};
