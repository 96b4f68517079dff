//! HTTP fetcher with rate limiting and GB18030 fallback
//!
//! Sina listing pages are served as UTF-8, but older channels still answer
//! in GBK. The fetcher handles:
//! - User-Agent rotation
//! - Rate limiting with governor
//! - Retry with exponential backoff on 429/5xx
//! - UTF-8 decoding with a GB18030 fallback

use crate::config::HttpConfig;
use crate::utils::error::FetchError;
use encoding_rs::{GB18030, UTF_8};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use rand::seq::SliceRandom;
use reqwest::{
    header::{
        HeaderMap, HeaderValue, ACCEPT, ACCEPT_ENCODING, ACCEPT_LANGUAGE, CONTENT_TYPE, REFERER,
        USER_AGENT,
    },
    Client, Response,
};
use std::num::NonZeroU32;
use std::time::Duration;

/// Pool of realistic User-Agent strings for rotation
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
];

/// Listing page fetcher
pub struct SinaFetcher {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Maximum number of retry attempts for failed requests
    max_retries: u32,

    /// Base delay in milliseconds for exponential backoff
    base_delay_ms: u64,

    /// Optional base URL override for testing with mock servers
    base_url: Option<String>,
}

impl SinaFetcher {
    /// Create a fetcher from HTTP settings
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn new(config: &HttpConfig) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .gzip(true)
            .cookie_store(true)
            .build()?;

        let rate = NonZeroU32::new(config.rate_limit).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            max_retries: config.max_retries,
            base_delay_ms: config.base_delay_ms,
            base_url: None,
        })
    }

    /// Create a fetcher that prefixes every request with `base_url`
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_base_url(base_url: &str, config: &HttpConfig) -> Result<Self, FetchError> {
        let mut fetcher = Self::new(config)?;
        fetcher.base_url = Some(base_url.trim_end_matches('/').to_string());
        Ok(fetcher)
    }

    /// Resolve a request target against the base URL override
    pub fn full_url(&self, url: &str) -> String {
        match &self.base_url {
            Some(base) if !url.starts_with("http://") && !url.starts_with("https://") => {
                format!("{base}{url}")
            }
            _ => url.to_string(),
        }
    }

    /// Fetch a page, waiting on the rate limiter first
    ///
    /// # Errors
    ///
    /// Returns `FetchError::ServerError` for non-retryable statuses,
    /// `FetchError::Timeout` when the last attempt timed out and
    /// `FetchError::MaxRetriesExceeded` once retries are otherwise spent
    pub async fn fetch(&self, url: &str, referer: Option<&str>) -> Result<String, FetchError> {
        self.rate_limiter.until_ready().await;
        self.fetch_with_retry(url, referer).await
    }

    async fn fetch_with_retry(
        &self,
        url: &str,
        referer: Option<&str>,
    ) -> Result<String, FetchError> {
        let full_url = self.full_url(url);
        let mut timed_out = false;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay_ms * 2_u64.pow(attempt - 1);
                tokio::time::sleep(Duration::from_millis(delay)).await;
            }

            let headers = self.build_headers(referer);
            timed_out = false;

            match self.client.get(&full_url).headers(headers).send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return self.decode_response(response).await;
                    }
                    if !Self::should_retry(status.as_u16()) {
                        return Err(FetchError::ServerError(status.as_u16()));
                    }
                    tracing::warn!(url = %full_url, status = status.as_u16(), attempt, "Retryable status");
                }
                Err(e) if e.is_timeout() => {
                    timed_out = true;
                    tracing::warn!(url = %full_url, attempt, "Request timed out");
                }
                Err(e) if e.is_builder() => {
                    return Err(FetchError::InvalidUrl(full_url));
                }
                Err(e) => {
                    tracing::warn!(url = %full_url, attempt, error = %e, "Request failed");
                }
            }
        }

        if timed_out {
            Err(FetchError::Timeout)
        } else {
            Err(FetchError::MaxRetriesExceeded)
        }
    }

    /// Retry on 429 and gateway-style 5xx responses
    fn should_retry(status: u16) -> bool {
        matches!(status, 429 | 500 | 502 | 503 | 504)
    }

    async fn decode_response(&self, response: Response) -> Result<String, FetchError> {
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .unwrap_or_default();

        let bytes = response.bytes().await?;
        self.decode_bytes(&bytes, &content_type)
    }

    /// Decode a body, trusting an explicit charset and otherwise trying
    /// UTF-8 before GB18030
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Decode` if no encoding fits
    pub fn decode_bytes(&self, bytes: &[u8], content_type: &str) -> Result<String, FetchError> {
        let content_type = content_type.to_lowercase();

        if ["charset=gbk", "charset=gb2312", "charset=gb18030"]
            .iter()
            .any(|c| content_type.contains(c))
        {
            return self.decode_gb18030(bytes);
        }

        if content_type.contains("charset=utf-8") {
            return self.decode_utf8(bytes);
        }

        if let Ok(text) = self.decode_utf8(bytes) {
            return Ok(text);
        }

        self.decode_gb18030(bytes).map_err(|_| {
            FetchError::Decode("Failed to decode content with UTF-8 or GB18030".to_string())
        })
    }

    fn decode_utf8(&self, bytes: &[u8]) -> Result<String, FetchError> {
        let (cow, _encoding, had_errors) = UTF_8.decode(bytes);

        if had_errors {
            return Err(FetchError::Decode("UTF-8 decoding errors".to_string()));
        }

        Ok(cow.into_owned())
    }

    fn decode_gb18030(&self, bytes: &[u8]) -> Result<String, FetchError> {
        let (cow, _encoding, had_errors) = GB18030.decode(bytes);

        if had_errors {
            return Err(FetchError::Decode("GB18030 decoding errors".to_string()));
        }

        Ok(cow.into_owned())
    }

    fn build_headers(&self, referer: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();

        headers.insert(USER_AGENT, HeaderValue::from_static(self.random_user_agent()));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert(
            ACCEPT_LANGUAGE,
            HeaderValue::from_static("zh-CN,zh;q=0.9,en-US;q=0.8,en;q=0.7"),
        );
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("gzip, deflate"));

        if let Some(value) = referer.and_then(|r| HeaderValue::from_str(r).ok()) {
            headers.insert(REFERER, value);
        }

        headers
    }

    fn random_user_agent(&self) -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS.choose(&mut rng).copied().unwrap_or(USER_AGENTS[0])
    }
}
