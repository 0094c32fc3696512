use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::models::{Listing, Locale};
use crate::parsers::{clean_text, document::selector, Document};
use crate::utils::http::PageFetcher;

const PROMO_PREFIX: &str = "[PROMO] ";
/// Promo tiles carrying this marker link to a nested deal page.
const NESTED_MARKER: &str = "- web";
const STRAND_HEADER_SELECTOR: &str = ".ems-sdk-strand__header a[href]";

/// A promo tile pointing at a page that holds the actual listing link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedDeal {
    pub name: String,
    pub url: String,
}

pub fn deals_page_url(locale: &Locale) -> String {
    format!("/{}/pages/deals", locale)
}

/// Every listing linked from the storefront's deals page, including the
/// ones behind nested promo pages.
pub async fn enumerate_listings(fetcher: &PageFetcher, locale: &Locale) -> Result<Vec<Listing>> {
    let document = fetcher.fetch(&deals_page_url(locale)).await?;
    let mut listings = collect_listings(&document)?;

    for nested in nested_deals(&document)? {
        let page = match fetcher.fetch(&nested.url).await {
            Ok(page) => page,
            Err(err) => {
                warn!("Skipping nested deal '{}': {}", nested.name, err);
                continue;
            }
        };
        match strand_listing(&page, &nested.name)? {
            Some(listing) if !listings.iter().any(|l| l.deal_id == listing.deal_id) => listings.push(listing),
            Some(_) => {}
            None => warn!("Nested deal '{}' has no listing link", nested.name),
        }
    }

    if listings.is_empty() {
        return Err(Error::site_format(format!("no listings linked from {}", document.url())));
    }
    info!("Found {} listings for {}", listings.len(), locale);
    Ok(listings)
}

/// Direct category links of a deals page; fails when there are none.
pub fn parse_listings(document: &Document) -> Result<Vec<Listing>> {
    let listings = collect_listings(document)?;
    if listings.is_empty() {
        return Err(Error::site_format(format!("no listings linked from {}", document.url())));
    }
    Ok(listings)
}

fn tile_name(link: &scraper::ElementRef<'_>, img_selector: &scraper::Selector) -> Option<String> {
    link.select(img_selector)
        .next()
        .and_then(|img| img.value().attr("alt"))
        .map(|alt| clean_text(alt.trim_start_matches(PROMO_PREFIX)))
        .filter(|name| !name.is_empty())
}

fn collect_listings(document: &Document) -> Result<Vec<Listing>> {
    let html = document.html();
    let link_selector = selector(r#"a[href*="/category/"]"#)?;
    let img_selector = selector("img[alt]")?;

    let mut seen = HashSet::new();
    let mut listings = Vec::new();
    for link in html.select(&link_selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };

        let name = match tile_name(&link, &img_selector) {
            Some(name) => name,
            None => clean_text(&link.text().collect::<String>()),
        };
        if name.is_empty() {
            continue;
        }

        if let Some(listing) = Listing::from_url(&name.to_lowercase(), href) {
            if seen.insert(listing.deal_id.clone()) {
                listings.push(listing);
            }
        }
    }
    Ok(listings)
}

/// Promo tiles whose name carries the nested marker and whose link is not
/// a category itself.
pub fn nested_deals(document: &Document) -> Result<Vec<NestedDeal>> {
    let html = document.html();
    let link_selector = selector("a[href]")?;
    let img_selector = selector("img[alt]")?;

    let mut nested = Vec::new();
    for link in html.select(&link_selector) {
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if href.contains("/category/") {
            continue;
        }
        let Some(name) = tile_name(&link, &img_selector).map(|n| n.to_lowercase()) else {
            continue;
        };
        if !name.contains(NESTED_MARKER) {
            continue;
        }
        let deal = NestedDeal {
            name: clean_text(&name.replace(NESTED_MARKER, "")),
            url: href.to_string(),
        };
        if !nested.contains(&deal) {
            nested.push(deal);
        }
    }
    Ok(nested)
}

/// The listing behind a nested deal page's strand header, named `name`.
pub fn strand_listing(document: &Document, name: &str) -> Result<Option<Listing>> {
    let html = document.html();
    let header_selector = selector(STRAND_HEADER_SELECTOR)?;
    let listing = html
        .select(&header_selector)
        .filter_map(|link| link.value().attr("href"))
        .find_map(|href| Listing::from_url(name, href));
    Ok(listing)
}
