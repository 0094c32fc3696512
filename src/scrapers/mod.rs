mod coordinator;
mod deals;
mod probe;
mod product;
mod search;

pub use coordinator::{FetchCoordinator, FetchOutcome};
pub use deals::{deals_page_url, enumerate_listings, parse_listings};
pub use probe::probe;
pub use product::{lookup, parse_product, product_url};
pub use search::{search_into, search_items, search_url};
