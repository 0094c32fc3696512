use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{DEFAULT_MAX_PRICE, DEFAULT_MIN_PRICE, WATCHLIST_TAG};

/// Language + country pair identifying one storefront edition, e.g. `en-us`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locale {
    pub language: String,
    pub country: String,
}

impl Locale {
    pub fn new(language: &str, country: &str) -> Self {
        Self {
            language: language.trim().to_lowercase(),
            country: country.trim().to_lowercase(),
        }
    }

    /// Fallback edition whose product nodes also appear on search pages.
    pub fn english_fallback() -> Self {
        Self::new("en", "us")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.language, self.country)
    }
}

impl FromStr for Locale {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('-') {
            Some((lang, country)) if !lang.is_empty() && !country.is_empty() => {
                Ok(Locale::new(lang, country))
            }
            _ => Err(format!("invalid locale '{}', expected <lang>-<country>", s)),
        }
    }
}

/// A named, paginated collection of items ("deal") on the storefront.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub name: String,
    pub deal_id: String,
    /// Storefront-relative URL without the trailing page number.
    pub url: String,
}

impl Listing {
    /// Build a listing from its category URL, deriving the ID from the
    /// segment that follows `category/`.
    pub fn from_url(name: &str, url: &str) -> Option<Self> {
        let url = strip_page_number(url);
        let mut segments = url.split('/').filter(|s| !s.is_empty());
        segments.by_ref().find(|s| *s == "category")?;
        let deal_id = segments.next()?.to_string();
        Some(Self {
            name: name.to_string(),
            deal_id,
            url,
        })
    }

    pub fn page_url(&self, page: u32) -> String {
        format!("{}/{}", self.url.trim_end_matches('/'), page)
    }

    /// Tag used for the transient rows of watchlist add/check.
    pub fn watchlist() -> Self {
        Self {
            name: WATCHLIST_TAG.to_string(),
            deal_id: WATCHLIST_TAG.to_string(),
            url: String::new(),
        }
    }

    /// Tag used for the rows of one search phrase.
    pub fn search(query: &str) -> Self {
        Self {
            name: query.to_string(),
            deal_id: format!("search:{}", query.to_lowercase()),
            url: String::new(),
        }
    }
}

fn strip_page_number(url: &str) -> String {
    let trimmed = url.trim().trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((head, last)) if !last.is_empty() && last.chars().all(|c| c.is_ascii_digit()) => {
            head.to_string()
        }
        _ => trimmed.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Game,
    Addon,
    Currency,
}

impl ContentType {
    pub fn key(&self) -> &'static str {
        match self {
            ContentType::Game => "game",
            ContentType::Addon => "addon",
            ContentType::Currency => "currency",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    Price,
    Title,
    Discount,
}

impl SortKey {
    pub fn key(&self) -> &'static str {
        match self {
            SortKey::Price => "price",
            SortKey::Title => "title",
            SortKey::Discount => "discount",
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Exclusive price bounds applied to `round_price`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceRange {
    pub min: f64,
    pub max: f64,
}

impl PriceRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, price: f64) -> bool {
        self.min < price && price < self.max
    }

    pub fn is_default(&self) -> bool {
        self.min == DEFAULT_MIN_PRICE && self.max == DEFAULT_MAX_PRICE
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_PRICE, DEFAULT_MAX_PRICE)
    }
}
