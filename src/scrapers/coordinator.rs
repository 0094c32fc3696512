use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::error::{Error, Result};
use crate::models::{Listing, Locale};
use crate::parsers::{ExtractContext, ItemExtractor, Pagination};
use crate::scrapers::probe::probe;
use crate::storage::{SqliteStorage, Storage};
use crate::utils::http::PageFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Rows from an earlier run were found; nothing was fetched.
    Cached { count: u64, pages: u32 },
    Fetched { pages: u32, items: usize },
    /// The listing carries no pagination metadata and was skipped.
    Unextractable,
}

/// Fetches every page of a listing on a bounded worker pool and writes
/// each page's items straight to the store.
#[derive(Debug, Clone)]
pub struct FetchCoordinator {
    fetcher: PageFetcher,
    extractor: ItemExtractor,
    db_path: PathBuf,
    workers: usize,
}

/// One page's fetch + extract + persist, owning everything it touches.
struct PageJob {
    fetcher: PageFetcher,
    extractor: ItemExtractor,
    db_path: PathBuf,
    listing: Listing,
    locale: Locale,
    page: u32,
    page_size: u32,
}

impl PageJob {
    async fn run(self) -> Result<usize> {
        let document = self.fetcher.fetch(&self.listing.page_url(self.page)).await?;
        let context = ExtractContext::Listing {
            listing: &self.listing,
            locale: &self.locale,
            page: self.page,
            page_size: self.page_size,
        };
        let items = self.extractor.extract(&document, &context)?;

        // Task-local handle; the page commits on its own.
        let store = SqliteStorage::open(&self.db_path)?;
        let written = store.insert_items(&items).await?;
        debug!("Page {} of '{}': {} items written", self.page, self.listing.name, written);
        Ok(written)
    }
}

impl FetchCoordinator {
    pub fn new(fetcher: PageFetcher, extractor: ItemExtractor, db_path: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            fetcher,
            extractor,
            db_path: db_path.into(),
            workers: workers.max(1),
        }
    }

    pub async fn fetch_listing(&self, listing: &Listing, locale: &Locale, force_refresh: bool) -> Result<FetchOutcome> {
        let store = SqliteStorage::open(&self.db_path)?;
        store.ensure_schema().await?;
        let locale_key = locale.to_string();

        if force_refresh {
            let removed = store.clear(&listing.deal_id, &locale_key).await?;
            debug!("Forced refresh of '{}': {} old rows removed", listing.name, removed);
        } else {
            let count = store.count_for(&listing.deal_id, &locale_key).await?;
            if count > 0 {
                let pages = store.max_page_for(&listing.deal_id, &locale_key).await?;
                info!("Using {} stored items of '{}' ({})", count, listing.name, locale_key);
                return Ok(FetchOutcome::Cached { count, pages });
            }
        }

        let Some(pagination) = probe(&self.fetcher, listing).await? else {
            return Ok(FetchOutcome::Unextractable);
        };

        let items = self.fetch_pages(listing, locale, pagination).await?;
        info!(
            "Fetched {} items from '{}' over {} pages",
            items, listing.name, pagination.total_pages
        );
        Ok(FetchOutcome::Fetched {
            pages: pagination.total_pages,
            items,
        })
    }

    async fn fetch_pages(&self, listing: &Listing, locale: &Locale, pagination: Pagination) -> Result<usize> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();

        for page in 1..=pagination.total_pages {
            let semaphore = Arc::clone(&semaphore);
            let job = PageJob {
                fetcher: self.fetcher.clone(),
                extractor: self.extractor,
                db_path: self.db_path.clone(),
                listing: listing.clone(),
                locale: locale.clone(),
                page,
                page_size: pagination.page_size,
            };
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Task(e.to_string()))?;
                job.run().await
            });
        }

        let mut written = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(count)) => written += count,
                Ok(Err(err)) => {
                    error!("Aborting '{}': {}", listing.name, err);
                    tasks.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    tasks.abort_all();
                    return Err(Error::Task(join_err.to_string()));
                }
            }
        }
        Ok(written)
    }
}
