//! Per-site request pacing.
//!
//! The collection loop pauses before every listing-page fetch after the first
//! (1 s nominal) and before every detail-page fetch (0.5 s nominal). Pacing is
//! owned by each site's loop, never shared across sites: it exists to be polite
//! to each target server independently.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use scout_core::throttle::Throttle;
//!
//! # async fn run() {
//! // 1-second pause with up to 250ms of extra jitter
//! let throttle = Throttle::new(Duration::from_secs(1)).with_jitter(Duration::from_millis(250));
//! throttle.pause().await;
//! # }
//! ```

use std::time::Duration;

/// A fixed pause, optionally randomised with jitter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throttle {
    /// Base pause before each request.
    pub delay: Duration,

    /// Maximum random jitter added on top of `delay` (uniform [0, jitter)).
    ///
    /// Set to `Duration::ZERO` to disable.
    pub jitter: Duration,
}

impl Throttle {
    /// Create a throttle with the given delay and no jitter.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            jitter: Duration::ZERO,
        }
    }

    /// A throttle that never waits.
    pub fn none() -> Self {
        Self::new(Duration::ZERO)
    }

    /// Add random jitter (uniform [0, jitter)) on top of the base delay.
    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Compute the effective delay for a single wait (delay + random jitter).
    pub fn effective_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.delay;
        }
        let jitter_ms = rand_jitter_ms(self.jitter.as_millis() as u64);
        self.delay + Duration::from_millis(jitter_ms)
    }

    /// Sleep for the effective delay.
    pub async fn pause(&self) {
        let wait = self.effective_delay();
        if wait.is_zero() {
            return;
        }
        tracing::debug!(sleep_ms = %wait.as_millis(), "Throttling request");
        tokio::time::sleep(wait).await;
    }
}

// ---------------------------------------------------------------------------
// Jitter based on std: a xorshift seeded from the current time.
// ---------------------------------------------------------------------------

fn rand_jitter_ms(max_ms: u64) -> u64 {
    if max_ms == 0 {
        return 0;
    }
    let mut x = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos() as u64;
    // xorshift64
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x % max_ms
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn effective_delay_without_jitter() {
        let throttle = Throttle::new(Duration::from_millis(500));
        assert_eq!(throttle.effective_delay(), Duration::from_millis(500));
    }

    #[test]
    fn effective_delay_with_jitter_is_bounded() {
        let throttle =
            Throttle::new(Duration::from_millis(100)).with_jitter(Duration::from_millis(50));
        for _ in 0..100 {
            let d = throttle.effective_delay();
            assert!(d >= Duration::from_millis(100));
            assert!(d < Duration::from_millis(150));
        }
    }

    #[tokio::test]
    async fn pause_waits_at_least_delay() {
        let throttle = Throttle::new(Duration::from_millis(60));
        let start = Instant::now();
        throttle.pause().await;
        assert!(
            start.elapsed() >= Duration::from_millis(60),
            "pause returned early: {:?}",
            start.elapsed()
        );
    }

    #[tokio::test]
    async fn none_does_not_wait() {
        let start = Instant::now();
        Throttle::none().pause().await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
