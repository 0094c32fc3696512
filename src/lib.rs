pub mod config;
pub mod error;
pub mod models;
pub mod output;
pub mod parsers;
pub mod scrapers;
pub mod selector;
pub mod storage;
pub mod utils;
pub mod watchlist;

pub use error::{Error, Result};
