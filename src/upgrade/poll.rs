//! Fixed-interval bounded polling.

use std::time::Duration;

/// Sleep-then-check schedule with a fixed interval and a maximum number of
/// attempts.
///
/// ```ignore
/// let mut poll = FixedPoll::new(Duration::from_secs(60), 30);
/// while let Some(attempt) = poll.tick().await {
///     if check().await? {
///         return Ok(Some(attempt));
///     }
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FixedPoll {
    interval: Duration,
    max_attempts: u32,
    attempts: u32,
}

impl FixedPoll {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            attempts: 0,
        }
    }

    /// Wait one interval and return the 1-based attempt number, or `None`
    /// once all attempts are used (without sleeping).
    pub async fn tick(&mut self) -> Option<u32> {
        if self.attempts >= self.max_attempts {
            return None;
        }
        tokio::time::sleep(self.interval).await;
        self.attempts += 1;
        Some(self.attempts)
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
