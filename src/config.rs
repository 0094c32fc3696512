use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::models::{ContentType, Locale, PriceRange, SortKey, DEFAULT_MAX_PRICE, DEFAULT_MIN_PRICE};

const EMBEDDED_LOCALE_TABLE: &str = include_str!("../conf/lang.json");

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub store_origin: String,
    pub database_path: PathBuf,
    pub user_agent: String,
    pub request_timeout_seconds: u64,
    /// Page-fetch pool size; defaults to the available hardware parallelism.
    pub workers: Option<usize>,
    /// Replacement for the embedded language/content table.
    pub locale_table: Option<PathBuf>,
    pub preferences: Preferences,
}

/// User-set defaults for everything the command line can override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub language: Option<String>,
    pub country: Option<String>,
    pub min_price: f64,
    pub max_price: f64,
    pub content: Vec<ContentType>,
    pub sorting: Vec<SortKey>,
    pub sort_reverse: bool,
    pub fetch_all_deals: bool,
    pub ignore_previous_fetch: bool,
    pub table_print: bool,
    pub dont_print: bool,
    pub save_text: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_origin: "https://store.playstation.com".to_string(),
            database_path: PathBuf::from("psdeals.db"),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/108.0.0.0 Safari/537.36".to_string(),
            request_timeout_seconds: 25,
            workers: None,
            locale_table: None,
            preferences: Preferences::default(),
        }
    }
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            language: None,
            country: None,
            min_price: DEFAULT_MIN_PRICE,
            max_price: DEFAULT_MAX_PRICE,
            content: Vec::new(),
            sorting: Vec::new(),
            sort_reverse: false,
            fetch_all_deals: false,
            ignore_previous_fetch: false,
            table_print: false,
            dont_print: false,
            save_text: false,
        }
    }
}

impl Config {
    /// Defaults, then `psdeals.{toml,json,yaml}` (or `path`), then
    /// `PSDEALS_*` environment variables (`__` separates nested keys).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let builder = config::Config::builder();
        let builder = match path {
            Some(path) => builder.add_source(config::File::from(path).required(true)),
            None => builder.add_source(config::File::with_name("psdeals").required(false)),
        };
        let settings = builder
            .add_source(
                config::Environment::with_prefix("PSDEALS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Config = settings.try_deserialize()?;
        Ok(config)
    }

    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|n| *n > 0)
            .unwrap_or_else(|| std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
    }

    pub fn locale_table(&self) -> Result<LocaleTable> {
        match &self.locale_table {
            Some(path) => LocaleTable::from_file(path),
            None => LocaleTable::embedded(),
        }
    }
}

impl Preferences {
    pub fn price_range(&self) -> PriceRange {
        PriceRange::new(self.min_price, self.max_price)
    }

    /// Human-readable settings, in display order.
    pub fn describe(&self) -> Vec<(&'static str, String)> {
        let join = |items: Vec<String>, sep: &str| items.join(sep);
        vec![
            ("language", self.language.clone().unwrap_or_default()),
            ("country", self.country.clone().unwrap_or_default()),
            ("minimum price", self.min_price.to_string()),
            ("maximum price", self.max_price.to_string()),
            ("content type", join(self.content.iter().map(|c| c.to_string()).collect(), " and ")),
            ("sorting order", join(self.sorting.iter().map(|s| s.to_string()).collect(), " then ")),
            ("sorting is reversed", self.sort_reverse.to_string()),
            ("fetch all deals", self.fetch_all_deals.to_string()),
            ("print results in table-like format", self.table_print.to_string()),
            ("don't print results to the terminal", self.dont_print.to_string()),
            ("ignore previous fetch and fetch anew", self.ignore_previous_fetch.to_string()),
            ("save results as a text file", self.save_text.to_string()),
        ]
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LanguageEntry {
    country: Vec<String>,
    content: HashMap<String, Vec<String>>,
}

/// Languages with their storefront countries and the localized
/// classification tokens behind each content type.
#[derive(Debug, Clone)]
pub struct LocaleTable {
    languages: BTreeMap<String, LanguageEntry>,
}

impl LocaleTable {
    pub fn embedded() -> Result<Self> {
        Self::from_json(EMBEDDED_LOCALE_TABLE)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let languages: BTreeMap<String, LanguageEntry> = serde_json::from_str(raw)?;
        Ok(Self { languages })
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    /// Reject language/country pairs the storefront does not serve.
    pub fn validate(&self, locale: &Locale) -> Result<()> {
        let entry = self
            .languages
            .get(&locale.language)
            .ok_or_else(|| Error::Config(format!("unknown language code '{}'", locale.language)))?;
        if !entry.country.iter().any(|c| c == &locale.country) {
            return Err(Error::Config(format!(
                "can't combine language '{}' with country '{}'",
                locale.language, locale.country
            )));
        }
        Ok(())
    }

    pub fn content_tokens(&self, language: &str, content: ContentType) -> &[String] {
        self.languages
            .get(language)
            .and_then(|entry| entry.content.get(content.key()))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Classification tokens for all requested content types, in request order.
    pub fn expand(&self, language: &str, contents: &[ContentType]) -> Vec<String> {
        let mut tokens: Vec<String> = Vec::new();
        for content in contents {
            for token in self.content_tokens(language, *content) {
                if !tokens.contains(token) {
                    tokens.push(token.clone());
                }
            }
        }
        tokens
    }

    pub fn languages(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.languages
            .iter()
            .map(|(lang, entry)| (lang.as_str(), entry.country.as_slice()))
    }
}
