use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Item, WatchEntry};

mod query;
mod sqlite;

pub use query::{describe, ItemFilter, QueryResult};
pub use sqlite::SqliteStorage;

/// Persisted items (which double as the fetch cache) and the watchlist.
///
/// Reads and cleanups against a schema that was never created behave as if
/// the tables were empty.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Idempotent schema creation.
    async fn ensure_schema(&self) -> Result<()>;
    /// Writes all items in one transaction.
    async fn insert_items(&self, items: &[Item]) -> Result<usize>;
    /// Returns `false` when the `(title_id, locale)` pair was already present.
    async fn insert_watch_entry(&self, entry: &WatchEntry) -> Result<bool>;
    async fn count_for(&self, deal_id: &str, locale: &str) -> Result<u64>;
    async fn max_page_for(&self, deal_id: &str, locale: &str) -> Result<u32>;
    async fn clear(&self, deal_id: &str, locale: &str) -> Result<usize>;
    /// Every row of `deal_id`, whatever its locale.
    async fn clear_deal(&self, deal_id: &str) -> Result<usize>;
    async fn clear_all(&self, including_watchlist: bool) -> Result<()>;
    async fn query(&self, filter: &ItemFilter) -> Result<QueryResult>;
    /// Watchlist rows in insertion order, optionally for one locale.
    async fn watch_entries(&self, locale: Option<&str>) -> Result<Vec<WatchEntry>>;
    async fn delete_watch_entries(&self, ids: &[i64]) -> Result<usize>;
    async fn reset_watch_sequence(&self) -> Result<()>;
}
