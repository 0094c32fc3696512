pub mod extract;
pub mod document;
pub mod pagination;
pub mod price;

pub use extract::*;
pub use document::*;
pub use pagination::*;
pub use price::*;

use html_escape::decode_html_entities;

/// Decode HTML entities and collapse whitespace runs to single spaces.
pub fn clean_text(text: &str) -> String {
    let decoded = decode_html_entities(text);
    decoded
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}
