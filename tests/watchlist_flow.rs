mod common;

use common::*;
use pretty_assertions::assert_eq;
use psdeals::models::{Item, WatchEntry, WATCHLIST_TAG};
use psdeals::parsers::ItemExtractor;
use psdeals::storage::{ItemFilter, SqliteStorage, Storage};
use psdeals::watchlist::WatchlistManager;
use psdeals::Error;
use std::io::Cursor;
use std::path::Path;
use wiremock::MockServer;

fn manager(server: &MockServer, db: &Path) -> WatchlistManager {
    WatchlistManager::new(fetcher(server), ItemExtractor::default(), db, 2)
}

async fn serve_search(server: &MockServer) {
    let body = search_page(&[("EP0001", "Astro Bot", "$59.99"), ("EP0002", "Astro's Playroom", "$0.99")]);
    serve(server, "/en-us/search/astro", 200, body).await;
}

#[tokio::test]
async fn adding_the_same_title_twice_keeps_one_entry() {
    let server = MockServer::start().await;
    serve_search(&server).await;
    let (_dir, db) = database();
    let manager = manager(&server, &db);

    let mut out = Vec::new();
    let added = manager
        .add("astro", &locale(), &mut Cursor::new(b"1\n".to_vec()), &mut out)
        .await
        .unwrap();
    assert_eq!(added.len(), 1);

    let again = manager
        .add("astro", &locale(), &mut Cursor::new(b"1\n".to_vec()), &mut out)
        .await
        .unwrap();
    assert!(again.is_empty());

    let store = SqliteStorage::open(&db).unwrap();
    let entries = store.watch_entries(None).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title_id, "EP0001");
    assert_eq!(entries[0].locale, "en-us");
    // Transient search rows are gone after the operation.
    assert_eq!(store.count_for(WATCHLIST_TAG, "en-us").await.unwrap(), 0);
}

#[tokio::test]
async fn closed_input_aborts_the_add() {
    let server = MockServer::start().await;
    serve_search(&server).await;
    let (_dir, db) = database();

    let mut out = Vec::new();
    let err = manager(&server, &db)
        .add("astro", &locale(), &mut Cursor::new(Vec::new()), &mut out)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InputAbort));

    let store = SqliteStorage::open(&db).unwrap();
    assert!(store.watch_entries(None).await.unwrap().is_empty());
    assert_eq!(store.count_for(WATCHLIST_TAG, "en-us").await.unwrap(), 0);
}

#[tokio::test]
async fn check_refreshes_prices_and_cleans_up() {
    let server = MockServer::start().await;
    serve(&server, "/en-us/product/EP0001", 200, product_page("Astro Bot", "44.99")).await;
    serve(&server, "/en-us/product/EP0002", 200, product_page("Astro's Playroom", "0.99")).await;
    let (_dir, db) = database();

    let store = SqliteStorage::open(&db).unwrap();
    store.ensure_schema().await.unwrap();
    for (id, title, locale) in [
        ("EP0001", "Astro Bot", "en-us"),
        ("EP0002", "Astro's Playroom", "en-us"),
        ("EP0003", "Ico", "de-de"),
    ] {
        store.insert_watch_entry(&WatchEntry::new(id, title, locale)).await.unwrap();
    }

    let filter = ItemFilter::new("ignored", &locale()).with_sorting(&[psdeals::models::SortKey::Price], true);
    let result = manager(&server, &db).check(&locale(), filter).await.unwrap();

    let rows: Vec<(&str, f64, &str)> = result
        .items
        .iter()
        .map(|i| (i.title_id.as_str(), i.round_price, i.platform.as_str()))
        .collect();
    assert_eq!(rows, vec![("EP0001", 44.99, "PS5"), ("EP0002", 0.99, "PS5")]);
    assert_eq!(result.items[0].price_display, "$44.99");
    assert_eq!(result.items[0].discount_display, "-25%");
    assert_eq!(store.count_for(WATCHLIST_TAG, "en-us").await.unwrap(), 0);
}

#[tokio::test]
async fn check_clears_leftover_rows_of_other_locales() {
    let server = MockServer::start().await;
    let (_dir, db) = database();
    let store = SqliteStorage::open(&db).unwrap();
    store.ensure_schema().await.unwrap();
    let leftover = Item {
        title_id: "EP0003".to_string(),
        title: "Ico".to_string(),
        price_display: "19,99 €".to_string(),
        discount_display: String::new(),
        round_price: 19.99,
        price_parse_failed: false,
        content_type: "Vollversion".to_string(),
        platform: "PS4".to_string(),
        deal: WATCHLIST_TAG.to_string(),
        deal_id: WATCHLIST_TAG.to_string(),
        page_number: 1,
        locale: "de-de".to_string(),
    };
    store.insert_items(&[leftover]).await.unwrap();

    let result = manager(&server, &db)
        .check(&locale(), ItemFilter::new("ignored", &locale()))
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(store.count_for(WATCHLIST_TAG, "de-de").await.unwrap(), 0);
}

#[tokio::test]
async fn unreachable_titles_are_skipped_by_check() {
    let server = MockServer::start().await;
    serve(&server, "/en-us/product/EP0001", 200, product_page("Astro Bot", "44.99")).await;
    serve(&server, "/en-us/product/EP0002", 404, String::new()).await;
    let (_dir, db) = database();

    let store = SqliteStorage::open(&db).unwrap();
    store.ensure_schema().await.unwrap();
    store.insert_watch_entry(&WatchEntry::new("EP0001", "Astro Bot", "en-us")).await.unwrap();
    store.insert_watch_entry(&WatchEntry::new("EP0002", "Gone", "en-us")).await.unwrap();

    let result = manager(&server, &db)
        .check(&locale(), ItemFilter::new("ignored", &locale()))
        .await
        .unwrap();
    assert_eq!(result.items.len(), 1);
    assert_eq!(result.items[0].title, "Astro Bot");
}

#[tokio::test]
async fn remove_deletes_picks_across_locales() {
    let server = MockServer::start().await;
    let (_dir, db) = database();
    let store = SqliteStorage::open(&db).unwrap();
    store.ensure_schema().await.unwrap();
    for (id, title, locale) in [("A", "Alpha", "en-us"), ("B", "Beta", "de-de"), ("C", "Gamma", "en-gb")] {
        store.insert_watch_entry(&WatchEntry::new(id, title, locale)).await.unwrap();
    }

    let mut out = Vec::new();
    let removed = manager(&server, &db)
        .remove(&mut Cursor::new(b"3 1 3\n".to_vec()), &mut out)
        .await
        .unwrap();
    assert_eq!(removed, 2);

    let left: Vec<String> = store
        .watch_entries(None)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.title)
        .collect();
    assert_eq!(left, vec!["Beta".to_string()]);

    let listing = String::from_utf8(out).unwrap();
    assert!(listing.contains("3. Gamma"));
}

#[tokio::test]
async fn show_prints_every_entry() {
    let server = MockServer::start().await;
    let (_dir, db) = database();
    let store = SqliteStorage::open(&db).unwrap();
    store.ensure_schema().await.unwrap();
    store.insert_watch_entry(&WatchEntry::new("A", "Alpha", "en-us")).await.unwrap();

    let mut out = Vec::new();
    let entries = manager(&server, &db).show(&mut out).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(String::from_utf8(out).unwrap(), "1. Alpha  en-us  A\n");
}
