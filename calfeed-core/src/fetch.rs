//! Retrieval of raw ICS text.
//!
//! The rest of the crate only sees [`Fetcher`]: "raw text or failure".
//! [`HttpFetcher`] is the shipped implementation; it tries a direct
//! request first and then each configured proxy prefix in order.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid feed URL '{0}'")]
    InvalidUrl(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Empty response body from {0}")]
    EmptyBody(String),

    #[error("All {attempts} transports failed for {url} (last error: {last})")]
    Exhausted {
        url: String,
        attempts: usize,
        last: String,
    },
}

/// Source of raw feed text.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, FetchError>> + Send;
}

/// `[fetch]` section of the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// URL prefixes the percent-encoded feed URL is appended to, tried
    /// in order after the direct request
    #[serde(default)]
    pub proxies: Vec<String>,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_user_agent() -> String {
    format!("calfeed/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        FetchConfig {
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            proxies: Vec::new(),
        }
    }
}

/// One way of reaching a feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Direct,
    Proxy { prefix: String },
}

impl Transport {
    fn request_url(&self, url: &str) -> String {
        match self {
            Transport::Direct => url.to_string(),
            Transport::Proxy { prefix } => {
                let encoded: String = url::form_urlencoded::byte_serialize(url.as_bytes()).collect();
                format!("{}{}", prefix, encoded)
            }
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Transport::Direct => write!(f, "direct"),
            Transport::Proxy { prefix } => write!(f, "proxy {}", prefix),
        }
    }
}

/// Rewrite `webcal://` to `https://` and validate the result.
pub fn normalize_feed_url(url: &str) -> Result<String, FetchError> {
    let trimmed = url.trim();
    let rewritten = match trimmed.split_once("://") {
        Some((scheme, rest))
            if scheme.eq_ignore_ascii_case("webcal") || scheme.eq_ignore_ascii_case("webcals") =>
        {
            format!("https://{}", rest)
        }
        _ => trimmed.to_string(),
    };

    let parsed =
        url::Url::parse(&rewritten).map_err(|_| FetchError::InvalidUrl(url.to_string()))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        _ => Err(FetchError::InvalidUrl(url.to_string())),
    }
}

pub struct HttpFetcher {
    client: reqwest::Client,
    transports: Vec<Transport>,
}

impl HttpFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        let transports = std::iter::once(Transport::Direct)
            .chain(config.proxies.iter().map(|prefix| Transport::Proxy {
                prefix: prefix.clone(),
            }))
            .collect();

        Ok(HttpFetcher { client, transports })
    }

    pub fn transports(&self) -> &[Transport] {
        &self.transports
    }

    async fn fetch_via(&self, transport: &Transport, url: &str) -> Result<String, FetchError> {
        let request_url = transport.request_url(url);
        let response = self.client.get(&request_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: request_url,
            });
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody(request_url));
        }

        Ok(body)
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        let url = normalize_feed_url(url)?;
        let mut last_error = None;

        for transport in &self.transports {
            match self.fetch_via(transport, &url).await {
                Ok(body) => {
                    tracing::debug!(%url, %transport, bytes = body.len(), "fetched feed");
                    return Ok(body);
                }
                Err(e) => {
                    tracing::debug!(%url, %transport, error = %e, "transport failed");
                    last_error = Some(e);
                }
            }
        }

        Err(FetchError::Exhausted {
            url,
            attempts: self.transports.len(),
            last: last_error.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}
