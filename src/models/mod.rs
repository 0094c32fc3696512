pub mod item;
pub mod listing;

pub use item::*;
pub use listing::*;

/// Substituted for `round_price` when a display price cannot be parsed.
pub const SENTINEL_PRICE: f64 = 0.1;

pub const DEFAULT_MIN_PRICE: f64 = 0.0;
pub const DEFAULT_MAX_PRICE: f64 = 100_000.0;

/// Platform tag used when none of the known platform tokens is present.
pub const GENERIC_PLATFORM: &str = "PS";

pub const KNOWN_PLATFORMS: &[&str] = &["PS4", "PS5", "PS VR", "PS VR2"];

/// Known platform labels joined with `/`, or the generic marker.
pub fn platform_tag<'a>(labels: impl IntoIterator<Item = &'a str>) -> String {
    let known: Vec<&str> = labels
        .into_iter()
        .filter(|label| KNOWN_PLATFORMS.contains(label))
        .collect();
    if known.is_empty() {
        GENERIC_PLATFORM.to_string()
    } else {
        known.join("/")
    }
}

/// Reserved listing name/ID for transient watchlist rows in the item table.
pub const WATCHLIST_TAG: &str = "watchlist";

/// Display text for a missing price or discount.
pub const MISSING_DISPLAY: &str = "None";
