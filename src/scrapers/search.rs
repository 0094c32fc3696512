use percent_encoding::{utf8_percent_encode, NON_ALPHANUMERIC};
use tracing::info;

use crate::error::Result;
use crate::models::{Item, Listing, Locale};
use crate::parsers::{ExtractContext, ItemExtractor};
use crate::storage::Storage;
use crate::utils::http::PageFetcher;

pub fn search_url(query: &str, locale: &Locale) -> String {
    format!("/{}/search/{}", locale, utf8_percent_encode(query.trim(), NON_ALPHANUMERIC))
}

/// First page of search results for `query`, tagged with `tag`.
pub async fn search_items(
    fetcher: &PageFetcher,
    extractor: &ItemExtractor,
    query: &str,
    locale: &Locale,
    tag: &Listing,
) -> Result<Vec<Item>> {
    let document = fetcher.fetch(&search_url(query, locale)).await?;
    let context = ExtractContext::Search { query: query.trim(), locale, tag };
    extractor.extract(&document, &context)
}

/// Replace the rows stored under `tag` with fresh search results.
pub async fn search_into<S: Storage + ?Sized>(
    fetcher: &PageFetcher,
    extractor: &ItemExtractor,
    store: &S,
    query: &str,
    locale: &Locale,
    tag: &Listing,
) -> Result<usize> {
    let locale_key = locale.to_string();
    store.clear(&tag.deal_id, &locale_key).await?;

    let items = search_items(fetcher, extractor, query, locale, tag).await?;
    let written = store.insert_items(&items).await?;
    info!("Search '{}' in {}: {} items", query, locale, written);
    Ok(written)
}
