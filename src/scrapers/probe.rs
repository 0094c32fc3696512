use tracing::{info, warn};

use crate::error::Result;
use crate::models::Listing;
use crate::parsers::{parse_pagination, Pagination};
use crate::utils::http::PageFetcher;

/// Page and item counts of a listing, read from its first page.
///
/// `Ok(None)` means the page carries no pagination metadata and the listing
/// should be skipped.
pub async fn probe(fetcher: &PageFetcher, listing: &Listing) -> Result<Option<Pagination>> {
    let document = fetcher.fetch(&listing.page_url(1)).await?;
    match parse_pagination(document.body()) {
        Some(pagination) => {
            info!(
                "Listing '{}': {} items over {} pages of {}",
                listing.name, pagination.total_count, pagination.total_pages, pagination.page_size
            );
            Ok(Some(pagination))
        }
        None => {
            warn!("Listing '{}' has no pagination metadata", listing.name);
            Ok(None)
        }
    }
}
