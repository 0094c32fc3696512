#![allow(dead_code)]

use psdeals::models::{Listing, Locale};
use psdeals::utils::PageFetcher;
use serde_json::{json, Map, Value};
use std::path::PathBuf;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const DEAL_ID: &str = "spring-sale";

pub fn locale() -> Locale {
    Locale::new("en", "us")
}

pub fn listing() -> Listing {
    Listing::from_url("spring sale", &format!("/en-us/category/{}/1", DEAL_ID)).unwrap()
}

pub fn fetcher(server: &MockServer) -> PageFetcher {
    PageFetcher::new(reqwest::Client::new(), &server.uri()).unwrap()
}

/// A database file in its own temporary directory.
pub fn database() -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("psdeals.db");
    (dir, path)
}

pub fn next_data_page(state: Value) -> String {
    let data = json!({ "props": { "pageProps": { "apolloState": state } } });
    format!(
        r#"<html><body><script id="__NEXT_DATA__" type="application/json">{}</script></body></html>"#,
        data
    )
}

fn product(state: &mut Map<String, Value>, id: &str, name: &str, price: &str) {
    state.insert(
        format!("Product:{}:en-us", id),
        json!({
            "id": id,
            "name": name,
            "platforms": ["PS5"],
            "localizedStoreDisplayClassification": "Full Game",
            "price": { "__ref": format!("SkuPrice:{}", id) }
        }),
    );
    state.insert(
        format!("SkuPrice:{}", id),
        json!({ "discountedPrice": price, "discountText": "-40%" }),
    );
}

/// One listing page with `count` products and the listing's page info.
pub fn listing_page(page: u32, page_size: u32, count: u32, total: u32) -> String {
    let offset = (page - 1) * page_size;
    let mut state = Map::new();
    let mut refs = Vec::new();
    for n in 0..count {
        let id = format!("EP{:04}", offset + n + 1);
        product(&mut state, &id, &format!("Game {}", offset + n + 1), &format!("${}.99", n + 1));
        refs.push(json!({ "__ref": format!("Product:{}:en-us", id) }));
    }
    state.insert(
        format!("CategoryGrid:{}:en-us:{}:{}", DEAL_ID, offset, page_size),
        json!({
            "products": refs,
            "pageInfo": { "isLast": page * page_size >= total, "offset": offset, "size": page_size, "totalCount": total }
        }),
    );
    next_data_page(Value::Object(state))
}

/// A search results page holding the given `(id, name, price)` products.
pub fn search_page(products: &[(&str, &str, &str)]) -> String {
    let mut state = Map::new();
    for (id, name, price) in products {
        product(&mut state, id, name, price);
    }
    next_data_page(Value::Object(state))
}

pub fn product_page(name: &str, price: &str) -> String {
    format!(
        r#"<html><head><script type="application/ld+json">
            {{"@context":"http://schema.org","@type":"Product","name":"{}","category":"Full Game",
              "offers":{{"@type":"Offer","price":"{}","priceCurrency":"USD"}}}}
        </script></head><body>
            <span data-qa="mfeCtaMain#offer0#finalPrice">${}</span>
            <span data-qa="mfeCtaMain#offer0#discountInfo">-25%</span>
            <span data-qa="mfe-game-title#productTag0">PS5</span>
        </body></html>"#,
        name, price, price
    )
}

pub async fn serve(server: &MockServer, route: &str, status: u16, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// Serves the three pages (10/10/4 items) of the test listing.
pub async fn serve_listing(server: &MockServer) {
    for (page, count) in [(1, 10), (2, 10), (3, 4)] {
        let route = format!("/en-us/category/{}/{}", DEAL_ID, page);
        serve(server, &route, 200, listing_page(page, 10, count, 24)).await;
    }
}

pub async fn request_count(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}
