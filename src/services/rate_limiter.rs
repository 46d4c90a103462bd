//! Process-wide gate on outbound ERP API calls.
//!
//! The remote limit is global to the credential, not per call site, so a
//! single limiter instance fronts every request the process makes: bounded
//! in-flight concurrency, a minimum spacing between call starts, and a
//! retry loop for 429 responses that honors Retry-After when the remote
//! sends one.

use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::time::Instant;

use crate::services::erp_api::ErpApiError;

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Minimum gap between consecutive call starts, across the process.
    pub min_interval: Duration,
    /// Maximum calls in flight at once.
    pub concurrency: usize,
    /// Retries after the initial attempt on a 429.
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1000),
            concurrency: 1,
            max_retries: 2,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(20),
        }
    }
}

pub struct RateLimiter {
    config: RateLimiterConfig,
    slots: Semaphore,
    last_start: Mutex<Option<Instant>>,
}

lazy_static! {
    static ref GLOBAL_LIMITER: Arc<RateLimiter> =
        Arc::new(RateLimiter::new(RateLimiterConfig::default()));
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        let permits = config.concurrency.max(1);
        Self {
            config,
            slots: Semaphore::new(permits),
            last_start: Mutex::new(None),
        }
    }

    /// The shared per-process instance. Tests construct their own via
    /// [`RateLimiter::new`] instead.
    pub fn global() -> Arc<RateLimiter> {
        Arc::clone(&GLOBAL_LIMITER)
    }

    /// Run `op` behind the limiter. The closure is re-invoked on 429
    /// retries, so it must be repeatable.
    pub async fn execute<T, F, Fut>(&self, op: F) -> Result<T, ErpApiError>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, ErpApiError>>,
    {
        // Queue position is the semaphore's FIFO order. The permit stays
        // held across retries: a retrying call is still in flight.
        let _permit = self
            .slots
            .acquire()
            .await
            .expect("rate limiter semaphore closed");

        let mut backoff = self.config.initial_backoff;
        let mut attempt: u32 = 0;

        loop {
            self.pace().await;

            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_rate_limited() => {
                    if attempt >= self.config.max_retries {
                        tracing::warn!(
                            "ERP rate limit persisted after {} retries, giving up",
                            attempt
                        );
                        return Err(err);
                    }

                    let delay = match &err {
                        ErpApiError::RateLimited {
                            retry_after: Some(hint),
                            ..
                        } => *hint,
                        _ => backoff,
                    };
                    let delay = delay.min(self.config.max_backoff);

                    attempt += 1;
                    tracing::warn!(
                        "ERP rate limited, retrying in {:?} (attempt {}/{})",
                        delay,
                        attempt,
                        self.config.max_retries
                    );

                    tokio::time::sleep(delay).await;
                    backoff = (backoff * 2).min(self.config.max_backoff);
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Block until at least `min_interval` has passed since the previous
    /// call start, then claim the current instant as the new start.
    async fn pace(&self) {
        loop {
            let wait = {
                let mut last = self.last_start.lock();
                let now = Instant::now();
                match *last {
                    Some(prev) if now.duration_since(prev) < self.config.min_interval => {
                        Some(self.config.min_interval - now.duration_since(prev))
                    }
                    _ => {
                        *last = Some(now);
                        None
                    }
                }
            };

            match wait {
                None => return,
                Some(d) => tokio::time::sleep(d).await,
            }
        }
    }
}
