mod common;

use common::*;
use pretty_assertions::assert_eq;
use psdeals::models::{Item, Listing, PriceRange, SortKey};
use psdeals::parsers::ItemExtractor;
use psdeals::scrapers::{enumerate_listings, probe, search_into, FetchCoordinator, FetchOutcome};
use psdeals::storage::{ItemFilter, SqliteStorage, Storage};
use wiremock::MockServer;

fn coordinator(server: &MockServer, db: &std::path::Path) -> FetchCoordinator {
    FetchCoordinator::new(fetcher(server), ItemExtractor::default(), db, 2)
}

#[tokio::test]
async fn full_fetch_persists_every_page() {
    let server = MockServer::start().await;
    serve_listing(&server).await;
    let (_dir, db) = database();

    let outcome = coordinator(&server, &db)
        .fetch_listing(&listing(), &locale(), false)
        .await
        .unwrap();
    assert_eq!(outcome, FetchOutcome::Fetched { pages: 3, items: 24 });

    let store = SqliteStorage::open(&db).unwrap();
    assert_eq!(store.count_for(DEAL_ID, "en-us").await.unwrap(), 24);
    assert_eq!(store.max_page_for(DEAL_ID, "en-us").await.unwrap(), 3);
}

#[tokio::test]
async fn second_fetch_is_served_from_the_store() {
    let server = MockServer::start().await;
    serve_listing(&server).await;
    let (_dir, db) = database();
    let coordinator = coordinator(&server, &db);

    coordinator.fetch_listing(&listing(), &locale(), false).await.unwrap();
    let requests_after_first = request_count(&server).await;

    let outcome = coordinator.fetch_listing(&listing(), &locale(), false).await.unwrap();
    assert_eq!(outcome, FetchOutcome::Cached { count: 24, pages: 3 });
    assert_eq!(request_count(&server).await, requests_after_first);
}

#[tokio::test]
async fn forced_refresh_replaces_stored_rows() {
    let server = MockServer::start().await;
    serve_listing(&server).await;
    let (_dir, db) = database();
    let coordinator = coordinator(&server, &db);
    coordinator.fetch_listing(&listing(), &locale(), false).await.unwrap();

    let store = SqliteStorage::open(&db).unwrap();
    let stale = Item {
        title_id: "STALE".to_string(),
        title: "Stale".to_string(),
        price_display: "$1.00".to_string(),
        discount_display: "None".to_string(),
        round_price: 1.0,
        price_parse_failed: false,
        content_type: "Full Game".to_string(),
        platform: "PS".to_string(),
        deal: "spring sale".to_string(),
        deal_id: DEAL_ID.to_string(),
        page_number: 9,
        locale: "en-us".to_string(),
    };
    store.insert_items(&[stale]).await.unwrap();
    assert_eq!(store.count_for(DEAL_ID, "en-us").await.unwrap(), 25);

    let outcome = coordinator.fetch_listing(&listing(), &locale(), true).await.unwrap();
    assert_eq!(outcome, FetchOutcome::Fetched { pages: 3, items: 24 });
    assert_eq!(store.count_for(DEAL_ID, "en-us").await.unwrap(), 24);
    assert_eq!(store.max_page_for(DEAL_ID, "en-us").await.unwrap(), 3);
}

#[tokio::test]
async fn a_failed_page_aborts_the_listing() {
    let server = MockServer::start().await;
    let route = |page: u32| format!("/en-us/category/{}/{}", DEAL_ID, page);
    serve(&server, &route(1), 200, listing_page(1, 10, 10, 24)).await;
    serve(&server, &route(2), 503, String::new()).await;
    serve(&server, &route(3), 200, listing_page(3, 10, 4, 24)).await;
    let (_dir, db) = database();
    // One worker: page 1 commits before page 2 fails.
    let coordinator = FetchCoordinator::new(fetcher(&server), ItemExtractor::default(), &db, 1);

    let err = coordinator
        .fetch_listing(&listing(), &locale(), false)
        .await
        .unwrap_err();
    assert!(err.is_network());

    let store = SqliteStorage::open(&db).unwrap();
    let committed = store.count_for(DEAL_ID, "en-us").await.unwrap();
    assert!(committed > 0);

    // The partial rows count as a cache hit on the next plain run.
    let requests_after_failure = request_count(&server).await;
    let outcome = coordinator.fetch_listing(&listing(), &locale(), false).await.unwrap();
    assert!(matches!(outcome, FetchOutcome::Cached { count, .. } if count == committed));
    assert_eq!(request_count(&server).await, requests_after_failure);
}

#[tokio::test]
async fn page_without_pagination_is_unextractable() {
    let server = MockServer::start().await;
    let route = format!("/en-us/category/{}/1", DEAL_ID);
    serve(&server, &route, 200, "<html><body>maintenance</body></html>".to_string()).await;
    let (_dir, db) = database();

    assert_eq!(probe(&fetcher(&server), &listing()).await.unwrap(), None);
    let outcome = coordinator(&server, &db)
        .fetch_listing(&listing(), &locale(), false)
        .await
        .unwrap();
    assert_eq!(outcome, FetchOutcome::Unextractable);
}

#[tokio::test]
async fn clearing_a_key_empties_the_cache() {
    let server = MockServer::start().await;
    serve_listing(&server).await;
    let (_dir, db) = database();
    coordinator(&server, &db).fetch_listing(&listing(), &locale(), false).await.unwrap();

    let store = SqliteStorage::open(&db).unwrap();
    assert_eq!(store.clear(DEAL_ID, "en-us").await.unwrap(), 24);
    assert_eq!(store.count_for(DEAL_ID, "en-us").await.unwrap(), 0);
    assert_eq!(store.max_page_for(DEAL_ID, "en-us").await.unwrap(), 0);
}

#[tokio::test]
async fn stored_rows_come_back_filtered_and_sorted() {
    let server = MockServer::start().await;
    serve_listing(&server).await;
    let (_dir, db) = database();
    coordinator(&server, &db).fetch_listing(&listing(), &locale(), false).await.unwrap();

    let store = SqliteStorage::open(&db).unwrap();
    let filter = ItemFilter::new(DEAL_ID, &locale())
        .with_range(PriceRange::new(1.99, 4.99))
        .with_sorting(&[SortKey::Price, SortKey::Title], true);
    let result = store.query(&filter).await.unwrap();

    // $2.99 and $3.99 exist on every page; both bounds are excluded.
    let prices: Vec<f64> = result.items.iter().map(|i| i.round_price).collect();
    assert_eq!(prices, vec![3.99, 3.99, 3.99, 2.99, 2.99, 2.99]);
    assert_eq!(result.items[0].title, "Game 3");
    assert_eq!(result.items[2].title, "Game 13");
    assert_eq!(
        result.description,
        "6 titles | sorted by price then by title in reverse | price range: from 1.99 under 4.99"
    );
}

#[tokio::test]
async fn search_without_matches_stores_nothing() {
    let server = MockServer::start().await;
    let body = search_page(&[("EP0001", "Astro Bot", "$59.99"), ("EP0002", "Gran Turismo 7", "$39.99")]);
    serve(&server, "/en-us/search/mafia", 200, body).await;
    let (_dir, db) = database();
    let store = SqliteStorage::open(&db).unwrap();
    store.ensure_schema().await.unwrap();

    let tag = Listing::search("mafia");
    let written = search_into(&fetcher(&server), &ItemExtractor::default(), &store, "mafia", &locale(), &tag)
        .await
        .unwrap();
    assert_eq!(written, 0);
    assert_eq!(store.count_for(&tag.deal_id, "en-us").await.unwrap(), 0);
    assert!(store.query(&ItemFilter::new(&tag.deal_id, &locale())).await.unwrap().is_empty());
}

#[tokio::test]
async fn search_matches_are_tagged_with_the_phrase() {
    let server = MockServer::start().await;
    let body = search_page(&[("EP0001", "Astro Bot", "$59.99"), ("EP0002", "Astro's Playroom", "$0.99")]);
    serve(&server, "/en-us/search/astro", 200, body).await;
    let (_dir, db) = database();
    let store = SqliteStorage::open(&db).unwrap();
    store.ensure_schema().await.unwrap();

    let tag = Listing::search("Astro");
    search_into(&fetcher(&server), &ItemExtractor::default(), &store, "astro", &locale(), &tag)
        .await
        .unwrap();

    let result = store
        .query(&ItemFilter::new(&tag.deal_id, &locale()).with_sorting(&[SortKey::Title], false))
        .await
        .unwrap();
    let titles: Vec<&str> = result.items.iter().map(|i| i.title.as_str()).collect();
    assert_eq!(titles, vec!["Astro Bot", "Astro's Playroom"]);
    assert_eq!(result.items[0].deal_id, "search:astro");
    assert_eq!(result.max_title_len, "Astro's Playroom".len());
}

#[tokio::test]
async fn deals_page_lists_category_links() {
    let server = MockServer::start().await;
    let body = r#"<html><body>
        <a href="/en-us/category/spring-sale/1"><img alt="[PROMO] Spring Sale"></a>
        <a href="/en-us/category/spring-sale/2">Spring Sale again</a>
        <a href="/en-us/category/under-20/1">Games Under 20</a>
        <a href="/en-us/product/EP0001">not a listing</a>
    </body></html>"#;
    serve(&server, "/en-us/pages/deals", 200, body.to_string()).await;

    let listings = enumerate_listings(&fetcher(&server), &locale()).await.unwrap();
    let names: Vec<(&str, &str)> = listings.iter().map(|l| (l.name.as_str(), l.deal_id.as_str())).collect();
    assert_eq!(names, vec![("spring sale", "spring-sale"), ("games under 20", "under-20")]);
    assert_eq!(listings[0].page_url(2), "/en-us/category/spring-sale/2");
}

#[tokio::test]
async fn nested_promo_pages_are_followed_once() {
    let server = MockServer::start().await;
    let deals = r#"<html><body>
        <a href="/en-us/category/spring-sale/1"><img alt="Spring Sale"></a>
        <a href="/en-us/pages/web-sale"><img alt="[PROMO] Double Discounts - Web"></a>
    </body></html>"#;
    let nested = r#"<html><body>
        <div class="ems-sdk-strand__header"><a href="/en-us/category/double-1/1">Double</a></div>
    </body></html>"#;
    serve(&server, "/en-us/pages/deals", 200, deals.to_string()).await;
    serve(&server, "/en-us/pages/web-sale", 200, nested.to_string()).await;

    let listings = enumerate_listings(&fetcher(&server), &locale()).await.unwrap();
    let names: Vec<(&str, &str)> = listings.iter().map(|l| (l.name.as_str(), l.deal_id.as_str())).collect();
    assert_eq!(names, vec![("spring sale", "spring-sale"), ("double discounts", "double-1")]);
}
