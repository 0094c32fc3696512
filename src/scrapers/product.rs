use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{platform_tag, Item, Listing, Locale, MISSING_DISPLAY, SENTINEL_PRICE};
use crate::parsers::{clean_text, normalize_price, round_to_cents, Document};
use crate::utils::http::PageFetcher;

const FINAL_PRICE_SELECTOR: &str = r#"[data-qa="mfeCtaMain#offer0#finalPrice"]"#;
const DISCOUNT_SELECTOR: &str = r#"[data-qa="mfeCtaMain#offer0#discountInfo"]"#;
const PLATFORM_TAG_SELECTOR: &str = r#"[data-qa^="mfe-game-title#productTag"]"#;

pub fn product_url(title_id: &str, locale: &Locale) -> String {
    format!("/{}/product/{}", locale, title_id)
}

/// Current price of one catalog title, read from its product page.
pub async fn lookup(fetcher: &PageFetcher, title_id: &str, locale: &Locale, tag: &Listing) -> Result<Item> {
    let document = fetcher.fetch(&product_url(title_id, locale)).await?;
    parse_product(&document, title_id, locale, tag)
}

pub fn parse_product(document: &Document, title_id: &str, locale: &Locale, tag: &Listing) -> Result<Item> {
    let product = document
        .json_ld()?
        .into_iter()
        .find_map(find_product)
        .ok_or_else(|| Error::site_format(format!("no product JSON-LD on {}", document.url())))?;

    let offer = match product.get("offers") {
        Some(Value::Array(offers)) => offers.first().cloned(),
        Some(offer @ Value::Object(_)) => Some(offer.clone()),
        _ => None,
    };
    let offer_price = offer.as_ref().and_then(|o| o.get("price")).and_then(json_number);
    let currency = offer
        .as_ref()
        .and_then(|o| o.get("priceCurrency"))
        .and_then(Value::as_str)
        .unwrap_or_default();

    let price_display = match document.first_text(FINAL_PRICE_SELECTOR)? {
        Some(text) => text,
        None => match offer_price {
            Some(price) => format!("{:.2} {}", price, currency).trim().to_string(),
            None => MISSING_DISPLAY.to_string(),
        },
    };
    let discount_display = document
        .first_text(DISCOUNT_SELECTOR)?
        .unwrap_or_else(|| MISSING_DISPLAY.to_string());

    let parsed = normalize_price(&price_display).or(offer_price.map(round_to_cents));
    let (round_price, price_parse_failed) = match parsed {
        Some(price) => (price, false),
        None => {
            debug!("Unparseable price '{}' for {}", price_display, title_id);
            (SENTINEL_PRICE, true)
        }
    };

    let labels = document.all_text(PLATFORM_TAG_SELECTOR)?;
    let platform = platform_tag(labels.iter().map(String::as_str));

    Ok(Item {
        title_id: title_id.to_string(),
        title: product
            .get("name")
            .and_then(Value::as_str)
            .map(clean_text)
            .unwrap_or_else(|| title_id.to_string()),
        price_display,
        discount_display,
        round_price,
        price_parse_failed,
        content_type: product
            .get("category")
            .and_then(Value::as_str)
            .map(clean_text)
            .unwrap_or_default(),
        platform,
        deal: tag.name.clone(),
        deal_id: tag.deal_id.clone(),
        page_number: 1,
        locale: locale.to_string(),
    })
}

/// The `Product` object of a JSON-LD block, which may be wrapped in an
/// array or an `@graph`.
fn find_product(block: Value) -> Option<Value> {
    match block {
        Value::Array(values) => values.into_iter().find_map(find_product),
        Value::Object(mut object) => {
            if object.get("@type").and_then(Value::as_str) == Some("Product") {
                return Some(Value::Object(object));
            }
            object.remove("@graph").and_then(find_product)
        }
        _ => None,
    }
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
