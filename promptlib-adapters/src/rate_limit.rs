//! Sliding-window rate limiting.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use crate::traits::EnhanceError;

/// Default number of calls allowed per window.
pub const DEFAULT_MAX_REQUESTS: usize = 60;

/// Default window length.
pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);

/// Rate limiter configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Calls allowed per window.
    pub max_requests: usize,
    /// Window length.
    pub window: Duration,
}

impl RateLimitConfig {
    /// Creates a configuration.
    #[must_use]
    pub const fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

/// Rejection returned when the window is full.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitExceeded {
    /// Time until the oldest call leaves the window.
    pub retry_after: Duration,
}

impl RateLimitExceeded {
    /// Returns the wait in whole seconds, rounded up.
    #[must_use]
    pub fn wait_seconds(&self) -> u64 {
        let secs = self.retry_after.as_secs();
        if self.retry_after.subsec_nanos() > 0 {
            secs + 1
        } else {
            secs
        }
    }
}

impl From<RateLimitExceeded> for EnhanceError {
    fn from(value: RateLimitExceeded) -> Self {
        Self::RateLimited {
            retry_after_secs: value.wait_seconds(),
        }
    }
}

fn admit(
    history: &mut VecDeque<Instant>,
    config: RateLimitConfig,
    now: Instant,
) -> Result<(), RateLimitExceeded> {
    while history
        .front()
        .is_some_and(|oldest| now.duration_since(*oldest) >= config.window)
    {
        history.pop_front();
    }

    if history.len() >= config.max_requests {
        let retry_after = history
            .front()
            .map_or(config.window, |oldest| {
                config.window.saturating_sub(now.duration_since(*oldest))
            });
        return Err(RateLimitExceeded { retry_after });
    }

    history.push_back(now);
    Ok(())
}

/// Limiter tracking the timestamps of recent calls.
///
/// Rejected calls are not recorded and never retried.
#[derive(Debug, Default)]
pub struct RateLimiter {
    config: RateLimitConfig,
    history: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Creates a limiter with the supplied configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            history: Mutex::new(VecDeque::with_capacity(config.max_requests)),
        }
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> RateLimitConfig {
        self.config
    }

    /// Records a call if the window has room.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] with the wait computed from the oldest
    /// call still inside the window.
    pub async fn check(&self) -> Result<(), RateLimitExceeded> {
        let mut history = self.history.lock().await;
        admit(&mut history, self.config, Instant::now())
    }

    /// Returns the number of calls currently inside the window.
    pub async fn in_flight(&self) -> usize {
        let history = self.history.lock().await;
        let now = Instant::now();
        history
            .iter()
            .filter(|ts| now.duration_since(**ts) < self.config.window)
            .count()
    }
}

/// Limiter keeping a separate window per key (e.g. per user).
#[derive(Debug, Default)]
pub struct KeyedRateLimiter {
    config: RateLimitConfig,
    clients: RwLock<HashMap<String, VecDeque<Instant>>>,
}

impl KeyedRateLimiter {
    /// Creates a keyed limiter with the supplied configuration.
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clients: RwLock::new(HashMap::new()),
        }
    }

    /// Records a call for `key` if its window has room.
    ///
    /// # Errors
    ///
    /// Returns [`RateLimitExceeded`] when `key` has used up its window.
    pub async fn check(&self, key: &str) -> Result<(), RateLimitExceeded> {
        let mut clients = self.clients.write().await;
        let history = clients.entry(key.to_owned()).or_default();
        admit(history, self.config, Instant::now())
    }

    /// Drops keys whose windows are empty.
    pub async fn cleanup(&self) {
        let now = Instant::now();
        let window = self.config.window;
        self.clients.write().await.retain(|_, history| {
            history.retain(|ts| now.duration_since(*ts) < window);
            !history.is_empty()
        });
    }
}
