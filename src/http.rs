//! HTTP fetching shared by every adapter, the resolver and the extractor.
//!
//! The pipeline only needs one operation from the network: GET a URL and get
//! back the final (post-redirect) URL and the body, with non-2xx answers
//! reported as errors. [`HttpFetch`] captures that contract so the
//! dispatcher can be driven by an in-memory fake in tests, and
//! [`HttpClient`] implements it on top of `reqwest`.
//!
//! # Request Headers
//!
//! Some publishers reject requests that do not look like a browser, so every
//! request carries a desktop `User-Agent` and `Accept` headers, and a few
//! hosts get an additional `Referer` (see [`headers_for`]).

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";
const USER_AGENT_125: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0 Safari/537.36";
const ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Why a fetch produced no usable page.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },
}

/// A fetched page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// URL after following redirects.
    pub url: String,
    pub body: String,
}

/// Minimal GET contract consumed by the pipeline.
///
/// Implementations must treat a non-2xx status exactly like a network
/// error and return [`FetchError`].
pub trait HttpFetch {
    /// Fetch `url`, following redirects.
    async fn get(&self, url: &str) -> Result<Page, FetchError>;
}

/// `reqwest`-backed [`HttpFetch`] with per-request timeout and browser headers.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpClient {
    /// Build a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()?;
        Ok(Self { client, timeout })
    }

    /// The underlying client, shared with the Telegram sink.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

impl HttpFetch for HttpClient {
    #[instrument(level = "debug", skip_all, fields(%url))]
    async fn get(&self, url: &str) -> Result<Page, FetchError> {
        let t0 = Instant::now();
        let transport = |source| FetchError::Transport {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .headers(headers_for(url))
            .timeout(self.timeout)
            .send()
            .await
            .map_err(transport)?;

        let status = response.status();
        let final_url = response.url().to_string();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let body = response.text().await.map_err(transport)?;

        debug!(
            status = status.as_u16(),
            %final_url,
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched page"
        );
        Ok(Page {
            url: final_url,
            body,
        })
    }
}

/// Request headers for `url`.
///
/// Everything gets browser-like defaults; News Eleven and DVB additionally
/// need a same-site `Referer` or they answer with an error page.
pub fn headers_for(url: &str) -> HeaderMap {
    let mut pairs: Vec<(&'static str, &'static str)> = vec![
        ("user-agent", USER_AGENT),
        ("accept", ACCEPT),
        ("accept-language", "en-US,en;q=0.9"),
    ];

    let host = Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_lowercase))
        .unwrap_or_default();

    let referer = if host.contains("news-eleven.com") {
        Some("https://news-eleven.com/")
    } else if host.contains("dvb.no") {
        Some("https://burmese.dvb.no/")
    } else {
        None
    };

    if let Some(referer) = referer {
        pairs[0].1 = USER_AGENT_125;
        pairs.push(("referer", referer));
        pairs.push(("connection", "keep-alive"));
    }

    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        headers.insert(
            HeaderName::from_static(name),
            HeaderValue::from_static(value),
        );
    }
    headers
}
