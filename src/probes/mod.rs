//! Page fetching -- the network half of a probe run.

pub mod http;

pub use self::http::{FetchSettings, HttpFetcher};

use thiserror::Error;

/// Why a page fetch failed.
///
/// The `Display` text is what ends up in the `error` field of a
/// `FETCH_ERROR` record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Too many redirects")]
    TooManyRedirects,
    #[error("HTTP {0}")]
    Status(u16),
    #[error("Timeout")]
    Timeout,
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Transport(String),
}

/// Anything that can turn a URL into a page body.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch `url` and return the full response body as text.
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}
