use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::SENTINEL_PRICE;

static PRICE_KERNEL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d[\d,.\s]*")
        .expect("Invalid price regex")
});

/// Normalize a locale-formatted display price ("$1,299.99", "29,99 €",
/// "1 299,00 zł") to a 2-decimal number.
///
/// Returns `None` when no numeric kernel can be found or parsed.
pub fn normalize_price(price_text: &str) -> Option<f64> {
    let kernel = PRICE_KERNEL_REGEX.find(price_text)?.as_str();
    let mut price: String = kernel.chars().filter(|c| !c.is_whitespace()).collect();
    price = price.trim_end_matches(['.', ',']).to_string();

    // With both separators present the later one is the decimal mark.
    if let (Some(dot), Some(comma)) = (price.rfind('.'), price.rfind(',')) {
        let thousands = if dot > comma { ',' } else { '.' };
        price = price.replace(thousands, "");
    }
    price = price.replace(',', ".");

    if let Some(pos) = price.find('.') {
        if price[pos + 1..].len() >= 3 {
            price = price.replace('.', "");
        }
    }

    let value: f64 = price.parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(round_to_cents(value))
}

/// Normalized price plus a parse-failure flag; the sentinel stands in on failure.
pub fn round_price_or_sentinel(price_text: Option<&str>) -> (f64, bool) {
    match price_text.and_then(normalize_price) {
        Some(value) => (value, false),
        None => (SENTINEL_PRICE, true),
    }
}

pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
