use serde::{Deserialize, Serialize};

/// One listing entry as extracted from a storefront page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub title_id: String,
    pub title: String,
    /// Locale-formatted price exactly as the storefront shows it.
    pub price_display: String,
    pub discount_display: String,
    /// Normalized 2-decimal price; filtering and sorting use this value only.
    pub round_price: f64,
    /// Set when `round_price` holds the sentinel instead of a parsed price.
    pub price_parse_failed: bool,
    pub content_type: String,
    pub platform: String,
    pub deal: String,
    pub deal_id: String,
    pub page_number: u32,
    pub locale: String,
}

/// A user-curated watchlist title, unique per `(title_id, locale)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEntry {
    /// Row id in the watchlist table, absent before insertion.
    pub id: Option<i64>,
    pub title_id: String,
    pub title: String,
    pub locale: String,
}

impl WatchEntry {
    pub fn new(title_id: &str, title: &str, locale: &str) -> Self {
        Self {
            id: None,
            title_id: title_id.to_string(),
            title: title.to_string(),
            locale: locale.to_string(),
        }
    }
}
