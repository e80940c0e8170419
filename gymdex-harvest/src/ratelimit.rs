//! Request pacing and anti-detection
//!
//! Two pacing mechanisms are used:
//! - search engines get a minimum-interval pacer with random jitter so the
//!   outbound pattern never looks like a metronome;
//! - the public dataset gets a plain `governor` quota (it publishes its rate
//!   limit, there is nothing to hide from).
//!
//! [`AntiDetection`] additionally rotates User-Agent headers and escalates a
//! cooldown multiplier each time a source answers with a block signal.

use rand::Rng;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex as StdMutex;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Direct (unkeyed) governor limiter for the public-data endpoint
pub type ApiRateLimiter = governor::RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Build a per-second quota limiter
pub fn per_second_limiter(requests_per_second: u32) -> ApiRateLimiter {
    let quota =
        governor::Quota::per_second(NonZeroU32::new(requests_per_second.max(1)).unwrap());
    governor::RateLimiter::direct(quota)
}

/// Minimum-interval pacer for search engine requests
///
/// Sleeps until at least `min_interval` (plus 0-30% jitter) has passed since
/// the previous request through this pacer.
pub struct RateLimiter {
    last_request: Mutex<Option<Instant>>,
    min_interval: Duration,
    jitter: bool,
}

impl RateLimiter {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
            jitter: true,
        }
    }

    /// Pacer with a fixed interval and no jitter (used by tests)
    pub fn fixed(min_interval_ms: u64) -> Self {
        Self {
            last_request: Mutex::new(None),
            min_interval: Duration::from_millis(min_interval_ms),
            jitter: false,
        }
    }

    /// Wait until the next request is allowed, then claim the slot
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;

        if let Some(last_time) = *last {
            let interval = self.jittered_interval();
            let elapsed = last_time.elapsed();
            if elapsed < interval {
                let wait_time = interval - elapsed;
                tracing::debug!(wait_ms = wait_time.as_millis() as u64, "Rate limiting request");
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }

    fn jittered_interval(&self) -> Duration {
        if !self.jitter {
            return self.min_interval;
        }
        let base_ms = self.min_interval.as_millis() as u64;
        let extra = rand::thread_rng().gen_range(0..=base_ms * 3 / 10);
        Duration::from_millis(base_ms + extra)
    }
}

/// Realistic desktop browser User-Agent strings rotated across requests
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Block-signal bookkeeping and header rotation
///
/// Each consecutive block doubles the cooldown applied before the caller
/// moves on (capped at 8x the base); any success resets the escalation.
/// While a cooldown is in force the owning source reports itself
/// unavailable.
pub struct AntiDetection {
    base_cooldown_ms: u64,
    consecutive_blocks: AtomicU32,
    rotation: AtomicU32,
    blocked_until: StdMutex<Option<Instant>>,
}

impl AntiDetection {
    pub fn new(base_cooldown_ms: u64) -> Self {
        Self {
            base_cooldown_ms,
            consecutive_blocks: AtomicU32::new(0),
            rotation: AtomicU32::new(0),
            blocked_until: StdMutex::new(None),
        }
    }

    /// Next User-Agent in the rotation
    pub fn next_user_agent(&self) -> &'static str {
        let idx = self.rotation.fetch_add(1, Ordering::Relaxed) as usize;
        USER_AGENTS[idx % USER_AGENTS.len()]
    }

    /// Record a block signal, start the cooldown window, and return it
    pub fn record_block(&self) -> Duration {
        let blocks = self.consecutive_blocks.fetch_add(1, Ordering::Relaxed) + 1;
        let multiplier = 1u64 << (blocks - 1).min(3);
        let cooldown = Duration::from_millis(self.base_cooldown_ms * multiplier);
        if let Ok(mut until) = self.blocked_until.lock() {
            *until = Some(Instant::now() + cooldown);
        }
        cooldown
    }

    /// Record a successful request, resetting the escalation
    pub fn record_success(&self) {
        self.consecutive_blocks.store(0, Ordering::Relaxed);
        if let Ok(mut until) = self.blocked_until.lock() {
            *until = None;
        }
    }

    /// Remaining cooldown from the most recent block, if still in force
    pub fn cooldown_remaining(&self) -> Option<Duration> {
        let until = self.blocked_until.lock().ok()?;
        let deadline = (*until)?;
        deadline.checked_duration_since(Instant::now())
    }

    /// Whether the cooldown window from the last block is still open
    pub fn is_cooling_down(&self) -> bool {
        self.cooldown_remaining().is_some()
    }

    /// Consecutive blocks since the last success
    pub fn consecutive_blocks(&self) -> u32 {
        self.consecutive_blocks.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rate_limiter_enforces_min_interval() {
        let limiter = RateLimiter::fixed(50);

        let start = Instant::now();
        limiter.wait().await;
        limiter.wait().await;
        limiter.wait().await;
        let elapsed = start.elapsed();

        // First call is free, the next two wait ~50ms each
        assert!(
            elapsed >= Duration::from_millis(100),
            "three paced calls took only {:?}",
            elapsed
        );
    }

    #[tokio::test]
    async fn test_rate_limiter_first_call_is_immediate() {
        let limiter = RateLimiter::fixed(500);
        let start = Instant::now();
        limiter.wait().await;
        assert!(start.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_user_agent_rotation_cycles() {
        let anti = AntiDetection::new(1000);
        let first = anti.next_user_agent();
        let mut seen_different = false;
        for _ in 0..USER_AGENTS.len() {
            if anti.next_user_agent() != first {
                seen_different = true;
            }
        }
        assert!(seen_different, "rotation never changed the User-Agent");
    }

    #[test]
    fn test_cooldown_escalation_doubles_and_caps() {
        let anti = AntiDetection::new(1000);
        assert_eq!(anti.record_block(), Duration::from_millis(1000));
        assert_eq!(anti.record_block(), Duration::from_millis(2000));
        assert_eq!(anti.record_block(), Duration::from_millis(4000));
        assert_eq!(anti.record_block(), Duration::from_millis(8000));
        // Capped at 8x
        assert_eq!(anti.record_block(), Duration::from_millis(8000));
    }

    #[test]
    fn test_success_resets_escalation() {
        let anti = AntiDetection::new(1000);
        anti.record_block();
        anti.record_block();
        assert_eq!(anti.consecutive_blocks(), 2);

        anti.record_success();
        assert_eq!(anti.consecutive_blocks(), 0);
        assert_eq!(anti.record_block(), Duration::from_millis(1000));
    }

    #[test]
    fn test_block_opens_cooldown_window() {
        let anti = AntiDetection::new(60_000);
        assert!(!anti.is_cooling_down());

        anti.record_block();
        assert!(anti.is_cooling_down());
        let remaining = anti.cooldown_remaining().unwrap();
        assert!(remaining <= Duration::from_millis(60_000));
        assert!(remaining > Duration::from_millis(59_000));

        anti.record_success();
        assert!(!anti.is_cooling_down());
    }

    #[tokio::test]
    async fn test_per_second_limiter_allows_first_request() {
        let limiter = per_second_limiter(10);
        // Must not block on a fresh limiter
        tokio::time::timeout(Duration::from_millis(100), limiter.until_ready())
            .await
            .expect("fresh limiter should admit immediately");
    }
}
