use scraper::{Html, Selector};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

/// Identifier of the script element carrying the page's data island.
pub const NEXT_DATA_ID: &str = "__NEXT_DATA__";

/// A fetched storefront page.
///
/// Keeps the raw body so it can cross task boundaries; the HTML tree is
/// built on demand.
#[derive(Debug, Clone)]
pub struct Document {
    url: String,
    body: String,
}

impl Document {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            body: body.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn html(&self) -> Html {
        Html::parse_document(&self.body)
    }

    /// The JSON payload embedded under `#__NEXT_DATA__`.
    pub fn next_data(&self) -> Result<Value> {
        let html = self.html();
        let script_selector = selector(&format!("script#{}", NEXT_DATA_ID))?;
        let script = html
            .select(&script_selector)
            .next()
            .ok_or_else(|| Error::site_format(format!("no {} block on {}", NEXT_DATA_ID, self.url)))?;
        let raw: String = script.text().collect();
        serde_json::from_str(&raw)
            .map_err(|e| Error::site_format(format!("undecodable {} on {}: {}", NEXT_DATA_ID, self.url, e)))
    }

    /// The normalized node cache inside the data island, keyed by node id.
    pub fn apollo_state(&self) -> Result<Map<String, Value>> {
        let data = self.next_data()?;
        let state = data
            .pointer("/props/apolloState")
            .or_else(|| data.pointer("/props/pageProps/apolloState"))
            .and_then(Value::as_object)
            .ok_or_else(|| Error::site_format(format!("no apolloState on {}", self.url)))?;
        Ok(state.clone())
    }

    /// Every decodable `application/ld+json` block on the page.
    pub fn json_ld(&self) -> Result<Vec<Value>> {
        let html = self.html();
        let script_selector = selector(r#"script[type="application/ld+json"]"#)?;
        let blocks = html
            .select(&script_selector)
            .filter_map(|script| {
                let raw: String = script.text().collect();
                serde_json::from_str(&raw).ok()
            })
            .collect();
        Ok(blocks)
    }

    /// Text of the first element matching `css`, whitespace-normalized.
    pub fn first_text(&self, css: &str) -> Result<Option<String>> {
        let html = self.html();
        let element_selector = selector(css)?;
        let text = html
            .select(&element_selector)
            .next()
            .map(|el| super::clean_text(&el.text().collect::<String>()))
            .filter(|text| !text.is_empty());
        Ok(text)
    }

    /// Texts of all elements matching `css`, whitespace-normalized, empties dropped.
    pub fn all_text(&self, css: &str) -> Result<Vec<String>> {
        let html = self.html();
        let element_selector = selector(css)?;
        let texts = html
            .select(&element_selector)
            .map(|el| super::clean_text(&el.text().collect::<String>()))
            .filter(|text| !text.is_empty())
            .collect();
        Ok(texts)
    }
}

pub(crate) fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|_| Error::site_format(format!("invalid selector '{}'", css)))
}
