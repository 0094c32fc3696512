use rusqlite::types::Value as SqlValue;

use crate::config::LocaleTable;
use crate::models::{ContentType, Item, Locale, PriceRange, SortKey};

pub(crate) const ITEM_COLUMNS: &str = "title_id, title, price, discount, round_price, price_parse_failed, \
     content_type, platform, deal, deal_id, page_number, locale";

/// Read-side filter over the rows of one `(deal_id, locale)` key.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFilter {
    pub deal_id: String,
    pub locale: String,
    pub range: PriceRange,
    /// Requested content types, de-duplicated in request order.
    pub content: Vec<ContentType>,
    /// Localized classification tokens the content types expand to.
    pub content_tokens: Vec<String>,
    /// Sort keys, de-duplicated in request order.
    pub sorting: Vec<SortKey>,
    /// Applies to every sort key at once.
    pub reverse: bool,
}

impl ItemFilter {
    pub fn new(deal_id: &str, locale: &Locale) -> Self {
        Self {
            deal_id: deal_id.to_string(),
            locale: locale.to_string(),
            range: PriceRange::default(),
            content: Vec::new(),
            content_tokens: Vec::new(),
            sorting: Vec::new(),
            reverse: false,
        }
    }

    pub fn with_range(mut self, range: PriceRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_content(mut self, table: &LocaleTable, language: &str, content: &[ContentType]) -> Self {
        self.content = dedup(content);
        self.content_tokens = table.expand(language, &self.content);
        self
    }

    pub fn with_sorting(mut self, sorting: &[SortKey], reverse: bool) -> Self {
        self.sorting = dedup(sorting);
        self.reverse = reverse;
        self
    }

    /// Content filtering only applies when the locale has tokens for it.
    pub fn content_applies(&self) -> bool {
        !self.content.is_empty() && !self.content_tokens.is_empty()
    }
}

/// The consumer-facing triple plus the rows behind it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    pub items: Vec<Item>,
    pub max_title_len: usize,
    pub max_price_len: usize,
    pub description: String,
}

impl QueryResult {
    pub fn from_items(items: Vec<Item>, filter: &ItemFilter) -> Self {
        if items.is_empty() {
            return Self::default();
        }
        let max_title_len = items.iter().map(|i| i.title.chars().count()).max().unwrap_or(0);
        let max_price_len = items.iter().map(|i| i.price_display.chars().count()).max().unwrap_or(0);
        let description = describe(filter, items.len());
        Self {
            items,
            max_title_len,
            max_price_len,
            description,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

fn dedup<T: PartialEq + Copy>(values: &[T]) -> Vec<T> {
    let mut unique = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(value) {
            unique.push(*value);
        }
    }
    unique
}

fn sort_column(key: SortKey) -> &'static str {
    match key {
        SortKey::Price => "round_price",
        SortKey::Title => "title",
        SortKey::Discount => "discount",
    }
}

/// SQL text plus bound parameters. Only fixed column names and
/// placeholders go into the text.
pub(crate) fn build_select(filter: &ItemFilter) -> (String, Vec<SqlValue>) {
    let mut sql = format!(
        "SELECT {} FROM items WHERE deal_id = ? AND locale = ? AND round_price > ? AND round_price < ?",
        ITEM_COLUMNS
    );
    let mut params = vec![
        SqlValue::Text(filter.deal_id.clone()),
        SqlValue::Text(filter.locale.clone()),
        SqlValue::Real(filter.range.min),
        SqlValue::Real(filter.range.max),
    ];

    if filter.content_applies() {
        let placeholders = vec!["?"; filter.content_tokens.len()].join(", ");
        sql.push_str(&format!(" AND content_type IN ({})", placeholders));
        params.extend(filter.content_tokens.iter().cloned().map(SqlValue::Text));
    }

    if !filter.sorting.is_empty() {
        let direction = if filter.reverse { "DESC" } else { "ASC" };
        let order = filter
            .sorting
            .iter()
            .map(|key| format!("{} {}", sort_column(*key), direction))
            .collect::<Vec<_>>()
            .join(", ");
        sql.push_str(" ORDER BY ");
        sql.push_str(&order);
    } else {
        sql.push_str(" ORDER BY id ASC");
    }

    (sql, params)
}

/// `"<n> titles"` followed by the sort, price-range and content clauses.
pub fn describe(filter: &ItemFilter, count: usize) -> String {
    let mut clauses = Vec::new();

    if !filter.sorting.is_empty() {
        let keys: Vec<&str> = filter.sorting.iter().map(SortKey::key).collect();
        let mut clause = format!("sorted by {}", keys.join(" then by "));
        if filter.reverse {
            clause.push_str(" in reverse");
        }
        clauses.push(clause);
    }

    if !filter.range.is_default() {
        let defaults = PriceRange::default();
        let mut bounds = Vec::new();
        if filter.range.min != defaults.min {
            bounds.push(format!("from {}", filter.range.min));
        }
        if filter.range.max != defaults.max {
            bounds.push(format!("under {}", filter.range.max));
        }
        clauses.push(format!("price range: {}", bounds.join(" ")));
    }

    if filter.content_applies() {
        let names: Vec<&str> = filter.content.iter().map(ContentType::key).collect();
        clauses.push(format!("content: {}", names.join(", ")));
    }

    let mut description = format!("{} titles", count);
    for clause in clauses {
        description.push_str(" | ");
        description.push_str(&clause);
    }
    description
}
