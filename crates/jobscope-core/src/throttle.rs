//! Per-host politeness limits for crawl stages.
//!
//! Wraps any [`Fetcher`] with two bounds toward the origin site: at most
//! `parallelism` requests in flight through this wrapper, and at least
//! `delay` between the start of consecutive requests to the same host.
//! Each crawl stage owns its own wrapper, so the limits apply per stage.
//!
//! An optional deadline covers only the wrapped fetch. Time spent queued
//! for a permit or a delay slot does not count against it.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use jobscope_core::throttle::{PoliteFetcher, Politeness};
//!
//! # use jobscope_core::traits::Fetcher;
//! # #[derive(Clone)] struct MyFetcher;
//! # impl Fetcher for MyFetcher {
//! #     async fn fetch(&self, _: &str) -> Result<String, jobscope_core::error::AppError> { todo!() }
//! # }
//! let fetcher = PoliteFetcher::new(MyFetcher, Politeness::new(2, Duration::from_millis(500)))
//!     .with_timeout(Duration::from_secs(20));
//! ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use url::Url;

use crate::error::AppError;
use crate::traits::Fetcher;

/// Politeness limits toward a single origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Politeness {
    /// Maximum concurrent in-flight fetches.
    pub parallelism: usize,
    /// Minimum spacing between request starts to the same host.
    pub delay: Duration,
}

impl Politeness {
    pub fn new(parallelism: usize, delay: Duration) -> Self {
        Self { parallelism, delay }
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.parallelism == 0 {
            return Err(AppError::ConfigError(
                "parallelism must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for Politeness {
    /// Two requests in flight, 500ms apart.
    fn default() -> Self {
        Self {
            parallelism: 2,
            delay: Duration::from_millis(500),
        }
    }
}

/// A [`Fetcher`] wrapper enforcing [`Politeness`].
///
/// Request slots are reserved under the lock before sleeping, so concurrent
/// callers queue up at `delay` intervals instead of all waking together.
#[derive(Clone)]
pub struct PoliteFetcher<F> {
    inner: F,
    limits: Politeness,
    permits: Arc<Semaphore>,
    /// Earliest start time for the next request, per host key.
    next_slot: Arc<Mutex<HashMap<String, Instant>>>,
    timeout: Option<Duration>,
}

impl<F: Fetcher> PoliteFetcher<F> {
    pub fn new(inner: F, limits: Politeness) -> Self {
        Self {
            inner,
            limits,
            permits: Arc::new(Semaphore::new(limits.parallelism.max(1))),
            next_slot: Arc::new(Mutex::new(HashMap::new())),
            timeout: None,
        }
    }

    /// Fail a fetch with [`AppError::Timeout`] when the wrapped fetcher has
    /// not answered within `timeout` of the request being sent.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Host key of a URL (scheme://host:port).
    fn host_key(url_str: &str) -> Option<String> {
        let url = Url::parse(url_str).ok()?;
        let host = url.host_str()?;
        let port = url
            .port_or_known_default()
            .map(|p| format!(":{p}"))
            .unwrap_or_default();
        Some(format!("{}://{}{}", url.scheme(), host, port))
    }

    /// Claim the next start slot for `host` and return how long to wait for it.
    fn reserve(&self, host: &str) -> Duration {
        let now = Instant::now();
        let mut slots = self.next_slot.lock().unwrap_or_else(PoisonError::into_inner);
        let start = slots.get(host).map_or(now, |&slot| slot.max(now));
        slots.insert(host.to_string(), start + self.limits.delay);
        start.saturating_duration_since(now)
    }
}

impl<F: Fetcher> Fetcher for PoliteFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| AppError::NetworkError("politeness limiter closed".into()))?;

        if let Some(host) = Self::host_key(url) {
            let wait = self.reserve(&host);
            if !wait.is_zero() {
                tracing::debug!(
                    host = %host,
                    sleep_ms = %wait.as_millis(),
                    "Throttling request"
                );
                tokio::time::sleep(wait).await;
            }
        }

        let Some(timeout) = self.timeout else {
            return self.inner.fetch(url).await;
        };
        tokio::time::timeout(timeout, self.inner.fetch(url))
            .await
            .map_err(|_| AppError::Timeout(timeout.as_millis() as u64))?
    }
}
