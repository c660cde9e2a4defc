//! Per-user FIFO of deferred calls drained by a fixed-interval ticker.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use futures::FutureExt;
use promptlib_adapters::{KeyedRateLimiter, RateLimitConfig};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Default period between two drain ticks.
pub const DEFAULT_DRAIN_INTERVAL: Duration = Duration::from_secs(60);

type QueuedCall = Box<dyn FnOnce() -> BoxFuture<'static, AppResult<()>> + Send>;

/// One pending call.
pub struct QueuedRequest {
    id: Uuid,
    user_id: String,
    timestamp: DateTime<Utc>,
    call: QueuedCall,
}

impl QueuedRequest {
    /// Returns the request identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns the user the request is charged to.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the enqueue time.
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

impl fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("id", &self.id)
            .field("user_id", &self.user_id)
            .field("timestamp", &self.timestamp)
            .finish_non_exhaustive()
    }
}

/// Result of one drain step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// The queue was empty.
    Idle,
    /// The head's user is over its limit; the request stays queued.
    Deferred {
        /// Request identifier.
        id: Uuid,
        /// Time until the user's window has room.
        retry_after: Duration,
    },
    /// The head ran successfully.
    Completed {
        /// Request identifier.
        id: Uuid,
    },
    /// The head failed and was discarded.
    Dropped {
        /// Request identifier.
        id: Uuid,
        /// Rendered error.
        error: String,
    },
}

/// In-memory request queue with a per-user rate limit.
///
/// Failed requests are dropped, never retried.
pub struct RequestQueue {
    pending: Mutex<VecDeque<QueuedRequest>>,
    limiter: KeyedRateLimiter,
}

impl fmt::Debug for RequestQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestQueue").finish_non_exhaustive()
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new(RateLimitConfig::default())
    }
}

impl RequestQueue {
    /// Creates a queue applying `limit` to each user separately.
    #[must_use]
    pub fn new(limit: RateLimitConfig) -> Self {
        Self {
            pending: Mutex::new(VecDeque::new()),
            limiter: KeyedRateLimiter::new(limit),
        }
    }

    /// Appends a call charged to `user_id` and returns its identifier.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::NotAuthenticated`] when `user_id` is blank.
    pub async fn enqueue<F, Fut>(&self, user_id: &str, call: F) -> AppResult<Uuid>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = AppResult<()>> + Send + 'static,
    {
        if user_id.trim().is_empty() {
            return Err(AppError::NotAuthenticated);
        }
        let request = QueuedRequest {
            id: Uuid::new_v4(),
            user_id: user_id.to_owned(),
            timestamp: Utc::now(),
            call: Box::new(move || call().boxed()),
        };
        let id = request.id;
        self.pending.lock().await.push_back(request);
        debug!(%id, user_id, "request queued");
        Ok(id)
    }

    /// Returns the number of queued requests.
    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Returns `true` when nothing is queued.
    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }

    /// Returns the identifiers of queued requests, oldest first.
    pub async fn pending_ids(&self) -> Vec<Uuid> {
        self.pending.lock().await.iter().map(QueuedRequest::id).collect()
    }

    /// Runs the oldest request if its user is within the rate limit.
    pub async fn drain_one(&self) -> DrainOutcome {
        let head = {
            let pending = self.pending.lock().await;
            pending.front().map(|h| (h.id, h.user_id.clone()))
        };
        let Some((head_id, user_id)) = head else {
            return DrainOutcome::Idle;
        };
        if let Err(exceeded) = self.limiter.check(&user_id).await {
            debug!(id = %head_id, %user_id, "queued request deferred");
            return DrainOutcome::Deferred {
                id: head_id,
                retry_after: exceeded.retry_after,
            };
        }

        let request = {
            let mut pending = self.pending.lock().await;
            match pending.front() {
                Some(front) if front.id == head_id => pending.pop_front(),
                _ => None,
            }
        };
        let Some(request) = request else {
            return DrainOutcome::Idle;
        };

        let id = request.id;
        match (request.call)().await {
            Ok(()) => {
                debug!(%id, "queued request completed");
                DrainOutcome::Completed { id }
            }
            Err(err) => {
                warn!(%id, error = %err, "queued request failed; dropping");
                DrainOutcome::Dropped {
                    id,
                    error: err.to_string(),
                }
            }
        }
    }

    /// Starts a ticker draining one request per `period`.
    ///
    /// The first tick fires immediately. Abort the returned handle to stop
    /// draining.
    #[must_use = "dropping the handle detaches the drain task"]
    pub fn spawn_drain(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let queue = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                queue.drain_one().await;
                queue.limiter.cleanup().await;
            }
        })
    }
}
