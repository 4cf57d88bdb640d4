//! Request rate limiting over a sliding one-second window
//!
//! The RateLimiter is shared by every request the crate sends. Each request takes a permit,
//! and the permit is handed back exactly one second after it was granted. At most `limit`
//! requests are therefore started in any rolling one-second window, while a burst of up to
//! `limit` requests at the start of a run goes through immediately.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::Instant;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Length of the sliding window
const WINDOW: Duration = Duration::from_secs(1);

/// Shared request rate limiter
///
/// # Implementation
///
/// - `permits`: a semaphore holding the permits currently available
/// - `releases`: grant timestamps, oldest first, sent to a background task
/// - the background task sleeps until each timestamp is one window old, then returns the
///   permit to the semaphore
///
/// Cloning is cheap and every clone shares the same window. The background task stops when
/// the last clone is dropped or the parent cancellation token fires.
#[derive(Clone)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

struct Inner {
    limit: u32,
    permits: Arc<Semaphore>,
    releases: mpsc::UnboundedSender<Instant>,
    _shutdown: DropGuard,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` requests per second (values below 1 become 1)
    ///
    /// Must be called inside a Tokio runtime.
    ///
    /// # Examples
    ///
    /// ```
    /// use t2md::rate_limiter::RateLimiter;
    ///
    /// # #[tokio::main]
    /// # async fn main() {
    /// let limiter = RateLimiter::new(10);
    /// limiter.acquire().await;
    /// # }
    /// ```
    #[must_use]
    pub fn new(limit: u32) -> Self {
        Self::with_cancellation(limit, &CancellationToken::new())
    }

    /// Create a limiter whose background task also stops when `parent` is cancelled
    #[must_use]
    pub fn with_cancellation(limit: u32, parent: &CancellationToken) -> Self {
        let limit = limit.max(1);
        let permits = Arc::new(Semaphore::new(limit as usize));
        let (releases, queue) = mpsc::unbounded_channel();
        let token = parent.child_token();

        tokio::spawn(release_permits(permits.clone(), queue, token.clone()));

        Self {
            inner: Arc::new(Inner {
                limit,
                permits,
                releases,
                _shutdown: token.drop_guard(),
            }),
        }
    }

    /// The effective requests-per-second limit
    pub fn limit(&self) -> u32 {
        self.inner.limit
    }

    /// Wait until one more request can start without exceeding the limit
    ///
    /// Never fails. If the background task has stopped, waiting callers are released
    /// immediately.
    pub async fn acquire(&self) {
        match self.inner.permits.acquire().await {
            Ok(permit) => {
                // returned by the background task once the window has passed
                permit.forget();
                if self.inner.releases.send(Instant::now()).is_err() {
                    self.inner.permits.add_permits(1);
                }
            }
            Err(_) => {
                tracing::debug!("rate limiter closed, request not throttled");
            }
        }
    }
}

/// Return each permit one window after it was granted
async fn release_permits(
    permits: Arc<Semaphore>,
    mut queue: mpsc::UnboundedReceiver<Instant>,
    token: CancellationToken,
) {
    loop {
        let granted = tokio::select! {
            _ = token.cancelled() => break,
            next = queue.recv() => match next {
                Some(granted) => granted,
                None => break,
            },
        };

        tokio::select! {
            _ = token.cancelled() => break,
            _ = tokio::time::sleep_until(granted + WINDOW) => permits.add_permits(1),
        }
    }

    // anyone still waiting goes through rather than hanging
    permits.close();
    tracing::debug!("rate limiter release task stopped");
}
