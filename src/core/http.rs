use crate::core::urls::Allowlist;
use log::{debug, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Connection failed: {0}")]
    Connection(String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("client error (HTTP {0})")]
    Client(u16),

    #[error("server error (HTTP {status}) after {attempts} attempt(s)")]
    Server { status: u16, attempts: u32 },

    #[error("request failed after {attempts} attempt(s): {source}")]
    Transport {
        attempts: u32,
        #[source]
        source: TransportError,
    },

    #[error("unexpected status (HTTP {0})")]
    Status(u16),
}

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_html(&self) -> bool {
        self.content_type
            .as_deref()
            .is_some_and(|ct| ct.to_ascii_lowercase().contains("text/html"))
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// One blocking GET. Implemented over reqwest for real runs and by an
/// in-memory site in tests.
pub trait Transport {
    fn get(&self, url: &Url) -> Result<Response, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn get(&self, url: &Url) -> Result<Response, TransportError> {
        (**self).get(url)
    }
}

pub const MAX_REDIRECTS: usize = 10;

/// Whether a redirect to `target` may be followed after `hops` earlier
/// hops. Redirect targets must be on the allowlist.
pub fn follow_redirect(allowlist: &Allowlist, target: &Url, hops: usize) -> bool {
    hops < MAX_REDIRECTS && allowlist.permits(target)
}

/// Blocking reqwest client carrying the crawler's identity and timeout.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    /// Redirects outside `allowlist` are not followed; the 3xx response is
    /// returned as is and treated as a failed fetch.
    pub fn new(
        user_agent: &str,
        timeout: Duration,
        allowlist: Allowlist,
    ) -> Result<Self, TransportError> {
        let policy = Policy::custom(move |attempt| {
            if follow_redirect(&allowlist, attempt.url(), attempt.previous().len()) {
                attempt.follow()
            } else {
                debug!("Not following redirect to {}", attempt.url());
                attempt.stop()
            }
        });
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .redirect(policy)
            .build()?;
        Ok(Self { client })
    }
}

impl Transport for HttpTransport {
    fn get(&self, url: &Url) -> Result<Response, TransportError> {
        let resp = self.client.get(url.clone()).send()?;
        let status = resp.status().as_u16();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = resp.bytes()?.to_vec();
        Ok(Response {
            status,
            content_type,
            body,
        })
    }
}

/// The shared politeness clock: the gap between the end of one request
/// and the start of the next is at least `min_interval`.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min_interval: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: None,
        }
    }

    /// Block until the minimum interval since the last request has passed.
    pub fn wait(&self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                thread::sleep(self.min_interval - elapsed);
            }
        }
    }

    /// Record the end of a request, successful or not.
    pub fn mark(&mut self) {
        self.last_request = Some(Instant::now());
    }

    pub fn last_request(&self) -> Option<Instant> {
        self.last_request
    }
}

/// Bounded retry with linear backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub transport_backoff: Duration,
    pub server_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            transport_backoff: Duration::from_millis(350),
            server_backoff: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Same attempt bound, no sleeping between attempts.
    pub fn without_backoff(self) -> Self {
        Self {
            transport_backoff: Duration::ZERO,
            server_backoff: Duration::ZERO,
            ..self
        }
    }
}

/// Crawler session: every page and image request goes through here so
/// they all share one rate-limit clock.
pub struct Session<T> {
    transport: T,
    clock: RateLimiter,
    retry: RetryPolicy,
    requests: usize,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, min_interval: Duration, retry: RetryPolicy) -> Self {
        Self {
            transport,
            clock: RateLimiter::new(min_interval),
            retry,
            requests: 0,
        }
    }

    /// Single rate-limited request, no retries.
    pub fn polite_get(&mut self, url: &Url) -> Result<Response, TransportError> {
        self.clock.wait();
        let result = self.transport.get(url);
        self.clock.mark();
        self.requests += 1;
        result
    }

    /// Rate-limited request with retries on transport failures and 5xx.
    ///
    /// 4xx responses are returned as `FetchError::Client` immediately.
    pub fn fetch(&mut self, url: &Url) -> Result<Response, FetchError> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let (error, backoff) = match self.polite_get(url) {
                Ok(resp) if resp.is_success() => return Ok(resp),
                Ok(resp) if (400..500).contains(&resp.status) => {
                    return Err(FetchError::Client(resp.status));
                }
                Ok(resp) if resp.status >= 500 => (
                    FetchError::Server {
                        status: resp.status,
                        attempts: attempt,
                    },
                    self.retry.server_backoff,
                ),
                Ok(resp) => return Err(FetchError::Status(resp.status)),
                Err(source) => (
                    FetchError::Transport {
                        attempts: attempt,
                        source,
                    },
                    self.retry.transport_backoff,
                ),
            };

            if attempt >= max_attempts {
                warn!("Giving up on {}: {}", url, error);
                return Err(error);
            }
            debug!("Attempt {} for {} failed: {}", attempt, url, error);
            thread::sleep(backoff * attempt);
            attempt += 1;
        }
    }

    pub fn request_count(&self) -> usize {
        self.requests
    }

    pub fn clock(&self) -> &RateLimiter {
        &self.clock
    }
}
