use once_cell::sync::Lazy;
use regex::Regex;

static PAGE_INFO_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""pageInfo"\s*:\s*\{[^{}]*\}"#).expect("Invalid pageInfo regex")
});
static TOTAL_COUNT_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""totalCount"\s*:\s*(\d+)"#).expect("Invalid totalCount regex")
});
static OFFSET_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""offset"\s*:\s*(\d+)"#).expect("Invalid offset regex")
});
static SIZE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#""size"\s*:\s*(\d+)"#).expect("Invalid size regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total_count: u32,
    pub total_pages: u32,
    pub page_size: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(total_count: u32, page_size: u32, offset: u32) -> Self {
        let total_pages = if total_count <= page_size {
            1
        } else {
            total_count.div_ceil(page_size)
        };
        Self {
            total_count,
            total_pages,
            page_size,
            offset,
        }
    }
}

/// Pull total count, offset and page size out of a listing page body.
///
/// Returns `None` when any of them is missing or the page size is zero.
pub fn parse_pagination(body: &str) -> Option<Pagination> {
    let scope = PAGE_INFO_REGEX
        .find(body)
        .map(|m| m.as_str())
        .unwrap_or(body);

    let capture = |regex: &Regex| -> Option<u32> {
        regex.captures(scope)?.get(1)?.as_str().parse().ok()
    };

    let total_count = capture(&TOTAL_COUNT_REGEX)?;
    let page_size = capture(&SIZE_REGEX)?;
    let offset = capture(&OFFSET_REGEX)?;
    if page_size == 0 {
        return None;
    }
    Some(Pagination::new(total_count, page_size, offset))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_rounded_up() {
        let body = r#"{"pageInfo":{"__typename":"PageInfo","isLast":false,"offset":0,"size":10,"totalCount":24}}"#;
        assert_eq!(
            parse_pagination(body),
            Some(Pagination { total_count: 24, total_pages: 3, page_size: 10, offset: 0 })
        );
    }

    #[test]
    fn small_listing_has_one_page() {
        let body = r#""pageInfo":{"offset":0,"size":24,"totalCount":7}"#;
        assert_eq!(parse_pagination(body).unwrap().total_pages, 1);
        let body = r#""pageInfo":{"offset":0,"size":24,"totalCount":0}"#;
        assert_eq!(parse_pagination(body).unwrap().total_pages, 1);
    }

    #[test]
    fn page_info_fields_win_over_unrelated_sizes() {
        let body = r#"{"image":{"size":512},"pageInfo":{"totalCount":50,"offset":24,"size":24}}"#;
        let pagination = parse_pagination(body).unwrap();
        assert_eq!(pagination.page_size, 24);
        assert_eq!(pagination.offset, 24);
        assert_eq!(pagination.total_pages, 3);
    }

    #[test]
    fn missing_metadata_yields_none() {
        assert_eq!(parse_pagination("<html></html>"), None);
        assert_eq!(parse_pagination(r#""pageInfo":{"offset":0,"size":0,"totalCount":3}"#), None);
    }
}
