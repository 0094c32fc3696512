use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{Item, Listing, Locale, WatchEntry};
use crate::output::render_watchlist;
use crate::parsers::ItemExtractor;
use crate::scrapers::{lookup, search_into};
use crate::selector::{select, Selection};
use crate::storage::{ItemFilter, QueryResult, SqliteStorage, Storage};
use crate::utils::http::PageFetcher;

/// Watchlist operations. Each one opens its own store handle; item rows
/// written under the reserved watchlist tag never outlive the operation.
#[derive(Debug, Clone)]
pub struct WatchlistManager {
    fetcher: PageFetcher,
    extractor: ItemExtractor,
    db_path: PathBuf,
    workers: usize,
}

impl WatchlistManager {
    pub fn new(fetcher: PageFetcher, extractor: ItemExtractor, db_path: impl Into<PathBuf>, workers: usize) -> Self {
        Self {
            fetcher,
            extractor,
            db_path: db_path.into(),
            workers: workers.max(1),
        }
    }

    fn open(&self) -> Result<SqliteStorage> {
        SqliteStorage::open(&self.db_path)
    }

    /// Drops the transient watchlist rows in every locale.
    async fn purge(&self, store: &SqliteStorage) -> Result<usize> {
        store.clear_deal(&Listing::watchlist().deal_id).await
    }

    pub async fn show<W: Write>(&self, out: &mut W) -> Result<Vec<WatchEntry>> {
        let store = self.open()?;
        store.ensure_schema().await?;
        let entries = store.watch_entries(None).await?;
        render_watchlist(out, &entries)?;
        Ok(entries)
    }

    /// Search `term`, let the user pick from the numbered results and store
    /// the picks. Returns the entries that were new for `locale`.
    pub async fn add<R: BufRead, W: Write>(
        &self,
        term: &str,
        locale: &Locale,
        input: &mut R,
        out: &mut W,
    ) -> Result<Vec<WatchEntry>> {
        let store = self.open()?;
        store.ensure_schema().await?;
        self.purge(&store).await?;

        let added = self.add_from_search(&store, term, locale, input, out).await;
        self.purge(&store).await?;
        added
    }

    async fn add_from_search<R: BufRead, W: Write>(
        &self,
        store: &SqliteStorage,
        term: &str,
        locale: &Locale,
        input: &mut R,
        out: &mut W,
    ) -> Result<Vec<WatchEntry>> {
        let tag = Listing::watchlist();
        search_into(&self.fetcher, &self.extractor, store, term, locale, &tag).await?;

        let filter = ItemFilter::new(&tag.deal_id, locale).with_range(self.extractor.range());
        let found = store.query(&filter).await?;
        if found.is_empty() {
            writeln!(out, "No titles found for '{}'.", term)?;
            return Ok(Vec::new());
        }

        for (n, item) in found.items.iter().enumerate() {
            writeln!(
                out,
                "{:>3}. {:<title$}  {:<price$}  {}",
                n + 1,
                item.title,
                item.price_display,
                item.platform,
                title = found.max_title_len,
                price = found.max_price_len,
            )?;
        }

        let chosen = match select(input, out, found.items.len(), "Titles to add (numbers separated by spaces):")? {
            Selection::Chosen(indices) => indices,
            Selection::Aborted => return Err(Error::InputAbort),
        };

        let mut added = Vec::new();
        for index in chosen {
            let item = &found.items[index - 1];
            let entry = WatchEntry::new(&item.title_id, &item.title, &item.locale);
            if store.insert_watch_entry(&entry).await? {
                info!("Added '{}' ({}) to the watchlist", entry.title, entry.locale);
                added.push(entry);
            } else {
                writeln!(out, "'{}' is already on the watchlist.", entry.title)?;
            }
        }
        Ok(added)
    }

    /// Current prices of every watched title in `locale`, read back
    /// through `filter` (whose key is replaced by the watchlist tag).
    pub async fn check(&self, locale: &Locale, filter: ItemFilter) -> Result<QueryResult> {
        let store = self.open()?;
        store.ensure_schema().await?;
        let locale_key = locale.to_string();
        let entries = store.watch_entries(Some(&locale_key)).await?;
        self.purge(&store).await?;
        if entries.is_empty() {
            return Ok(QueryResult::default());
        }

        let refreshed = self.refresh_prices(&entries, locale).await;
        let filter = ItemFilter {
            deal_id: Listing::watchlist().deal_id,
            locale: locale_key,
            ..filter
        };
        let result = match refreshed {
            Ok(_) => store.query(&filter).await,
            Err(err) => Err(err),
        };
        self.purge(&store).await?;
        result
    }

    async fn refresh_prices(&self, entries: &[WatchEntry], locale: &Locale) -> Result<usize> {
        let semaphore = Arc::new(Semaphore::new(self.workers));
        let mut tasks = JoinSet::new();
        let tag = Listing::watchlist();

        for entry in entries {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = self.fetcher.clone();
            let db_path = self.db_path.clone();
            let title_id = entry.title_id.clone();
            let locale = locale.clone();
            let tag = tag.clone();
            tasks.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| Error::Task(e.to_string()))?;
                let item: Item = lookup(&fetcher, &title_id, &locale, &tag).await?;
                let store = SqliteStorage::open(&db_path)?;
                store.insert_items(std::slice::from_ref(&item)).await
            });
        }

        let mut written = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(count)) => written += count,
                // One unreachable title does not hide the others.
                Ok(Err(err)) if err.is_network() || err.is_site_format() => {
                    warn!("Watchlist lookup failed: {}", err);
                }
                Ok(Err(err)) => {
                    tasks.abort_all();
                    return Err(err);
                }
                Err(join_err) => {
                    tasks.abort_all();
                    return Err(Error::Task(join_err.to_string()));
                }
            }
        }
        info!("Refreshed {} of {} watchlist prices", written, entries.len());
        Ok(written)
    }

    /// Let the user pick entries across all locales and delete them.
    pub async fn remove<R: BufRead, W: Write>(&self, input: &mut R, out: &mut W) -> Result<usize> {
        let store = self.open()?;
        store.ensure_schema().await?;
        let entries = store.watch_entries(None).await?;
        render_watchlist(out, &entries)?;
        if entries.is_empty() {
            return Ok(0);
        }

        let chosen = match select(input, out, entries.len(), "Titles to remove (numbers separated by spaces):")? {
            Selection::Chosen(indices) => indices,
            Selection::Aborted => return Err(Error::InputAbort),
        };
        let ids: Vec<i64> = chosen.iter().filter_map(|index| entries[index - 1].id).collect();

        let removed = store.delete_watch_entries(&ids).await?;
        store.reset_watch_sequence().await?;
        info!("Removed {} watchlist entries", removed);
        Ok(removed)
    }
}
