//! Retry pacing for connect and reconnect loops

use std::sync::Arc;
use std::time::Duration;

/// Decides how long to wait before the next connection attempt
///
/// `attempt` counts failed attempts so far, starting at 1.
/// Returning `None` gives up.
pub trait RetryPolicy: Send + Sync + 'static {
    fn next_delay(&self, attempt: u32) -> Option<Duration>;
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Arc<P> {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        (**self).next_delay(attempt)
    }
}

/// Retry forever without waiting
#[derive(Debug, Clone, Copy, Default)]
pub struct Immediate;

impl RetryPolicy for Immediate {
    fn next_delay(&self, _attempt: u32) -> Option<Duration> {
        Some(Duration::ZERO)
    }
}

/// Wait a fixed delay between attempts, optionally giving up
#[derive(Debug, Clone, Copy)]
pub struct FixedDelay {
    pub delay: Duration,
    pub max_attempts: Option<u32>,
}

impl RetryPolicy for FixedDelay {
    fn next_delay(&self, attempt: u32) -> Option<Duration> {
        match self.max_attempts {
            Some(max) if attempt >= max => None,
            _ => Some(self.delay),
        }
    }
}

/// Sleep for `delay`; a zero delay only yields to the scheduler
pub async fn pause(delay: Duration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}
