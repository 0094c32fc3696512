pub mod http;

pub use http::{create_client, PageFetcher};
