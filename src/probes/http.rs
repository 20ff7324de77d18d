use super::{FetchError, Fetcher};
use anyhow::{Context, Result};
use reqwest::header::{ACCEPT, LOCATION};
use reqwest::{redirect, Client, Url};
use std::time::{Duration, Instant};
use tracing::debug;

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml";

/// Knobs for [`HttpFetcher`].
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Applied to each hop separately (connect + headers + body).
    pub timeout: Duration,
    /// Number of redirect hops that may be followed before giving up.
    pub max_redirects: usize,
    pub user_agent: String,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(15),
            max_redirects: 5,
            user_agent: default_user_agent(),
        }
    }
}

pub fn default_user_agent() -> String {
    format!("Mozilla/5.0 (compatible; nodewatch/{})", env!("CARGO_PKG_VERSION"))
}

/// reqwest-backed fetcher that follows redirects by hand so the hop limit
/// and the error text stay under our control.
pub struct HttpFetcher {
    client: Client,
    max_redirects: usize,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .user_agent(settings.user_agent.clone())
            .redirect(redirect::Policy::none())
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            max_redirects: settings.max_redirects,
        })
    }
}

#[async_trait::async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let mut current = Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
        let mut hops = 0usize;

        loop {
            let start = Instant::now();
            let resp = self
                .client
                .get(current.clone())
                .header(ACCEPT, ACCEPT_HTML)
                .send()
                .await
                .map_err(classify)?;

            let status = resp.status();
            debug!(
                url = %current,
                status = status.as_u16(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                hop = hops,
                "response received"
            );

            if status.is_redirection() {
                if let Some(location) = resp.headers().get(LOCATION) {
                    if hops >= self.max_redirects {
                        return Err(FetchError::TooManyRedirects);
                    }
                    let location = location
                        .to_str()
                        .map_err(|_| FetchError::InvalidUrl("non-ASCII Location header".to_string()))?;
                    // Url::join handles both absolute and relative locations.
                    current = current
                        .join(location)
                        .map_err(|e| FetchError::InvalidUrl(format!("{location}: {e}")))?;
                    hops += 1;
                    continue;
                }
            }

            if !status.is_success() {
                return Err(FetchError::Status(status.as_u16()));
            }

            return resp.text().await.map_err(classify);
        }
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout
    } else {
        FetchError::Transport(err.to_string())
    }
}
