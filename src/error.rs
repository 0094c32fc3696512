use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error {status}: {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("unexpected page structure: {0}")]
    SiteFormat(String),

    #[error("no valid selection, operation aborted")]
    InputAbort,

    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),

    #[error("worker task failed: {0}")]
    Task(String),

    #[error("database handle poisoned")]
    StorePoisoned,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn site_format(message: impl Into<String>) -> Self {
        Error::SiteFormat(message.into())
    }

    /// Structural mismatch with the storefront page data, reported to the
    /// operator as "site format changed".
    pub fn is_site_format(&self) -> bool {
        matches!(self, Error::SiteFormat(_))
    }

    pub fn is_network(&self) -> bool {
        matches!(self, Error::Network(_) | Error::HttpStatus { .. })
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
