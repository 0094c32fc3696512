use async_trait::async_trait;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::{Item, WatchEntry};
use crate::storage::query::{build_select, ItemFilter, QueryResult};
use crate::storage::Storage;

/// One SQLite handle. Concurrent writers each open their own.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteStorage {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self> {
        let path = db_path.as_ref().to_path_buf();
        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(10))?;
        conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::StorePoisoned)
    }
}

/// A read or cleanup against a schema that does not exist yet.
fn is_missing_table(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(_, Some(msg)) if msg.starts_with("no such table"))
}

/// Maps "no such table" to `fallback`, everything else passes through.
fn or_missing<T>(result: rusqlite::Result<T>, fallback: T) -> Result<T> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if is_missing_table(&err) => {
            debug!("Schema not created yet, treating as empty");
            Ok(fallback)
        }
        Err(err) => Err(err.into()),
    }
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        title_id: row.get(0)?,
        title: row.get(1)?,
        price_display: row.get(2)?,
        discount_display: row.get(3)?,
        round_price: row.get(4)?,
        price_parse_failed: row.get(5)?,
        content_type: row.get(6)?,
        platform: row.get(7)?,
        deal: row.get(8)?,
        deal_id: row.get(9)?,
        page_number: row.get(10)?,
        locale: row.get(11)?,
    })
}

fn watch_entry_from_row(row: &Row<'_>) -> rusqlite::Result<WatchEntry> {
    Ok(WatchEntry {
        id: row.get(0)?,
        title_id: row.get(1)?,
        title: row.get(2)?,
        locale: row.get(3)?,
    })
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn ensure_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS items (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title_id TEXT NOT NULL,
                title TEXT NOT NULL,
                price TEXT NOT NULL,
                discount TEXT NOT NULL,
                round_price REAL NOT NULL,
                price_parse_failed INTEGER NOT NULL DEFAULT 0,
                content_type TEXT NOT NULL,
                platform TEXT NOT NULL,
                deal TEXT NOT NULL,
                deal_id TEXT NOT NULL,
                page_number INTEGER NOT NULL,
                locale TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_items_deal_locale ON items(deal_id, locale);
            CREATE TABLE IF NOT EXISTS watchlist (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title_id TEXT NOT NULL,
                title TEXT NOT NULL,
                locale TEXT NOT NULL,
                UNIQUE (title_id, locale)
            );",
        )?;

        debug!("Database schema ready at {}", self.path.display());
        Ok(())
    }

    async fn insert_items(&self, items: &[Item]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO items (title_id, title, price, discount, round_price, price_parse_failed,
                    content_type, platform, deal, deal_id, page_number, locale)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            )?;
            for item in items {
                stmt.execute(params![
                    &item.title_id,
                    &item.title,
                    &item.price_display,
                    &item.discount_display,
                    item.round_price,
                    item.price_parse_failed,
                    &item.content_type,
                    &item.platform,
                    &item.deal,
                    &item.deal_id,
                    item.page_number,
                    &item.locale,
                ])?;
            }
        }
        tx.commit()?;
        Ok(items.len())
    }

    async fn insert_watch_entry(&self, entry: &WatchEntry) -> Result<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO watchlist (title_id, title, locale) VALUES (?1, ?2, ?3)",
            params![&entry.title_id, &entry.title, &entry.locale],
        )?;
        Ok(inserted > 0)
    }

    async fn count_for(&self, deal_id: &str, locale: &str) -> Result<u64> {
        let conn = self.conn()?;
        let count = conn.query_row(
            "SELECT COUNT(*) FROM items WHERE deal_id = ?1 AND locale = ?2",
            params![deal_id, locale],
            |row| row.get::<_, i64>(0),
        );
        Ok(or_missing(count, 0)?.max(0) as u64)
    }

    async fn max_page_for(&self, deal_id: &str, locale: &str) -> Result<u32> {
        let conn = self.conn()?;
        let max_page = conn.query_row(
            "SELECT MAX(page_number) FROM items WHERE deal_id = ?1 AND locale = ?2",
            params![deal_id, locale],
            |row| row.get::<_, Option<u32>>(0),
        );
        Ok(or_missing(max_page, None)?.unwrap_or(0))
    }

    async fn clear(&self, deal_id: &str, locale: &str) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute(
            "DELETE FROM items WHERE deal_id = ?1 AND locale = ?2",
            params![deal_id, locale],
        );
        let removed = or_missing(removed, 0)?;
        debug!("Cleared {} rows for {} ({})", removed, deal_id, locale);
        Ok(removed)
    }

    async fn clear_deal(&self, deal_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM items WHERE deal_id = ?1", params![deal_id]);
        let removed = or_missing(removed, 0)?;
        debug!("Cleared {} rows for {} in every locale", removed, deal_id);
        Ok(removed)
    }

    async fn clear_all(&self, including_watchlist: bool) -> Result<()> {
        let conn = self.conn()?;
        or_missing(conn.execute("DELETE FROM items", []), 0)?;
        if including_watchlist {
            or_missing(conn.execute("DELETE FROM watchlist", []), 0)?;
        }
        info!("Flushed stored items{}", if including_watchlist { " and watchlist" } else { "" });
        Ok(())
    }

    async fn query(&self, filter: &ItemFilter) -> Result<QueryResult> {
        let conn = self.conn()?;
        let (sql, values) = build_select(filter);

        let rows = conn.prepare(&sql).and_then(|mut stmt| {
            let items = stmt
                .query_map(params_from_iter(values.iter()), item_from_row)?
                .collect::<rusqlite::Result<Vec<Item>>>();
            items
        });
        let items = or_missing(rows, Vec::new())?;
        Ok(QueryResult::from_items(items, filter))
    }

    async fn watch_entries(&self, locale: Option<&str>) -> Result<Vec<WatchEntry>> {
        let conn = self.conn()?;
        let rows = conn
            .prepare(
                "SELECT id, title_id, title, locale FROM watchlist
                 WHERE ?1 IS NULL OR locale = ?1
                 ORDER BY id ASC",
            )
            .and_then(|mut stmt| {
                let entries = stmt
                    .query_map(params![locale], watch_entry_from_row)?
                    .collect::<rusqlite::Result<Vec<WatchEntry>>>();
                entries
            });
        or_missing(rows, Vec::new())
    }

    async fn delete_watch_entries(&self, ids: &[i64]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut removed = 0;
        for id in ids {
            removed += tx.execute("DELETE FROM watchlist WHERE id = ?1", params![id])?;
        }
        tx.commit()?;
        Ok(removed)
    }

    async fn reset_watch_sequence(&self) -> Result<()> {
        let conn = self.conn()?;
        let current: Option<i64> = or_missing(
            conn.query_row(
                "SELECT seq FROM sqlite_sequence WHERE name = 'watchlist'",
                [],
                |row| row.get(0),
            )
            .optional(),
            None,
        )?;
        if current.is_some() {
            conn.execute(
                "UPDATE sqlite_sequence SET seq = (SELECT COALESCE(MAX(id), 0) FROM watchlist)
                 WHERE name = 'watchlist'",
                [],
            )?;
        }
        Ok(())
    }
}
