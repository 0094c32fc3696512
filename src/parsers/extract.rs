use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{platform_tag, Item, Listing, Locale, PriceRange, MISSING_DISPLAY};
use crate::parsers::{clean_text, round_price_or_sentinel, Document};

/// Node type of the paginated product grid inside the data island.
pub const GRID_NODE_TYPE: &str = "CategoryGrid";

const PRODUCT_NODE_PREFIX: &str = "Product:";

/// What kind of page is being read and how its items are tagged.
#[derive(Debug, Clone, Copy)]
pub enum ExtractContext<'a> {
    Listing {
        listing: &'a Listing,
        locale: &'a Locale,
        page: u32,
        page_size: u32,
    },
    Search {
        query: &'a str,
        locale: &'a Locale,
        tag: &'a Listing,
    },
}

/// Grid node key of one listing page: `CategoryGrid:<dealID>:<locale>:<offset>:<pageSize>`.
pub fn grid_key(deal_id: &str, locale: &Locale, offset: u32, page_size: u32) -> String {
    format!("{}:{}:{}:{}:{}", GRID_NODE_TYPE, deal_id, locale, offset, page_size)
}

/// Turns a page's embedded data island into normalized items.
#[derive(Debug, Clone, Copy, Default)]
pub struct ItemExtractor {
    range: PriceRange,
}

struct ItemTag<'a> {
    listing: &'a Listing,
    locale: &'a Locale,
    page: u32,
}

impl ItemExtractor {
    pub fn new(range: PriceRange) -> Self {
        Self { range }
    }

    pub fn range(&self) -> PriceRange {
        self.range
    }

    pub fn extract(&self, document: &Document, context: &ExtractContext<'_>) -> Result<Vec<Item>> {
        let state = document.apollo_state()?;
        let items = match *context {
            ExtractContext::Listing { listing, locale, page, page_size } => {
                let tag = ItemTag { listing, locale, page };
                self.extract_listing_page(&state, &tag, page_size)?
            }
            ExtractContext::Search { query, locale, tag } => {
                let tag = ItemTag { listing: tag, locale, page: 1 };
                self.extract_search_page(&state, query, &tag)
            }
        };
        debug!("Extracted {} items from {}", items.len(), document.url());
        Ok(items)
    }

    fn extract_listing_page(
        &self,
        state: &Map<String, Value>,
        tag: &ItemTag<'_>,
        page_size: u32,
    ) -> Result<Vec<Item>> {
        let offset = tag.page.saturating_sub(1) * page_size;
        let key = grid_key(&tag.listing.deal_id, tag.locale, offset, page_size);
        let grid = state
            .get(&key)
            .ok_or_else(|| Error::site_format(format!("grid node '{}' not found", key)))?;
        let members = grid
            .get("products")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::site_format(format!("grid node '{}' has no products", key)))?;

        let mut items = Vec::with_capacity(members.len());
        for member in members {
            let Some(product) = resolve_product(state, member, tag.locale) else {
                warn!("Unresolvable product reference {} in '{}'", member, key);
                continue;
            };
            let Some(title_id) = member_id(member, product) else {
                warn!("Product without id in '{}'", key);
                continue;
            };
            if let Some(item) = self.build_item(state, product, title_id, tag) {
                items.push(item);
            }
        }
        Ok(items)
    }

    fn extract_search_page(
        &self,
        state: &Map<String, Value>,
        query: &str,
        tag: &ItemTag<'_>,
    ) -> Vec<Item> {
        let query = query.to_lowercase();
        let primary = format!(":{}", tag.locale);
        let fallback = format!(":{}", Locale::english_fallback());

        let mut seen = HashSet::new();
        let mut items = Vec::new();
        // Locale-specific nodes first so they win over the English fallback.
        for suffix in [&primary, &fallback] {
            for (key, product) in state {
                if !key.starts_with(PRODUCT_NODE_PREFIX) || !key.ends_with(suffix.as_str()) {
                    continue;
                }
                let name = product.get("name").and_then(Value::as_str).unwrap_or_default();
                if !name.to_lowercase().contains(&query) {
                    continue;
                }
                if product.get("price").map_or(true, Value::is_null) {
                    continue;
                }
                let id = product_id(key, product);
                if !seen.insert(id.clone()) {
                    continue;
                }
                if let Some(item) = self.build_item(state, product, id, tag) {
                    items.push(item);
                }
            }
        }
        items
    }

    /// `None` only when the price falls outside the extractor's range.
    fn build_item(
        &self,
        state: &Map<String, Value>,
        product: &Value,
        title_id: String,
        tag: &ItemTag<'_>,
    ) -> Option<Item> {
        let title = product
            .get("name")
            .and_then(Value::as_str)
            .map(clean_text)
            .unwrap_or_else(|| title_id.clone());

        let price = product.get("price").and_then(|p| resolve_record(state, p));
        let price_text = price
            .and_then(|p| p.get("discountedPrice"))
            .and_then(Value::as_str);
        let discount_text = price
            .and_then(|p| p.get("discountText"))
            .and_then(Value::as_str);
        let (round_price, price_parse_failed) = round_price_or_sentinel(price_text);
        if price_parse_failed {
            debug!("Price of '{}' unparseable ({:?}), using sentinel", title, price_text);
        }

        if !self.range.contains(round_price) {
            return None;
        }

        Some(Item {
            title_id,
            title,
            price_display: price_text.unwrap_or(MISSING_DISPLAY).to_string(),
            discount_display: discount_text.unwrap_or(MISSING_DISPLAY).to_string(),
            round_price,
            price_parse_failed,
            content_type: content_type(product),
            platform: platforms(product),
            deal: tag.listing.name.clone(),
            deal_id: tag.listing.deal_id.clone(),
            page_number: tag.page,
            locale: tag.locale.to_string(),
        })
    }
}

/// Follow a grid member to its product node. Members are `{"__ref": key}`
/// objects, bare keys, inline product nodes or bare product ids.
fn resolve_product<'a>(state: &'a Map<String, Value>, member: &'a Value, locale: &Locale) -> Option<&'a Value> {
    match member {
        Value::String(key) => state
            .get(key)
            .or_else(|| state.get(&format!("{}{}:{}", PRODUCT_NODE_PREFIX, key, locale))),
        Value::Object(_) => resolve_record(state, member),
        _ => None,
    }
}

/// Resolve a sub-record stored either inline or by id reference.
fn resolve_record<'a>(state: &'a Map<String, Value>, record: &'a Value) -> Option<&'a Value> {
    let object = record.as_object()?;
    if let Some(key) = object.get("__ref").and_then(Value::as_str) {
        return state.get(key);
    }
    if let Some(target) = object.get("id").and_then(Value::as_str).and_then(|id| state.get(id)) {
        let is_reference = object.get("type").and_then(Value::as_str) == Some("id") || object.len() <= 2;
        if is_reference {
            return Some(target);
        }
    }
    Some(record)
}

/// Catalog id of a grid member: the node's own `id`, else the id segment
/// of the key it was referenced by.
fn member_id(member: &Value, product: &Value) -> Option<String> {
    let key = match member {
        Value::String(key) => Some(key.as_str()),
        Value::Object(object) => object.get("__ref").and_then(Value::as_str),
        _ => None,
    };
    match key {
        Some(key) => Some(product_id(key, product)),
        None => product.get("id").and_then(Value::as_str).map(str::to_string),
    }
}

fn product_id(key: &str, product: &Value) -> String {
    product
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            key.trim_start_matches(PRODUCT_NODE_PREFIX)
                .split(':')
                .next()
                .unwrap_or(key)
                .to_string()
        })
}

fn content_type(product: &Value) -> String {
    product
        .get("localizedStoreDisplayClassification")
        .or_else(|| product.get("storeDisplayClassification"))
        .and_then(Value::as_str)
        .map(clean_text)
        .unwrap_or_default()
}

fn platforms(product: &Value) -> String {
    let labels = product
        .get("platforms")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str);
    platform_tag(labels)
}
