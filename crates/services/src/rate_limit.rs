//! Login throttle keyed by normalized email.
//!
//! A GCRA quota from `governor`: a key may spend `max_attempts` at once and
//! earns one back every `window / max_attempts`, so a locked key is fully
//! free again after one window. Process-local, lost on restart and not
//! shared between instances.

use std::num::NonZeroU32;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Duration, Utc};
use governor::clock::Clock as GovernorClock;
use governor::middleware::NoOpMiddleware;
use governor::nanos::Nanos;
use governor::state::keyed::DefaultKeyedStateStore;
use governor::{Quota, RateLimiter as KeyedLimiter};

use crate::Clock;

pub const MAX_LOGIN_ATTEMPTS: u32 = 5;
pub const LOGIN_WINDOW_MINUTES: i64 = 15;

/// Stale keys are swept once every this many checks.
pub const SWEEP_EVERY: u64 = 1024;

/// Feeds the service clock to governor as nanoseconds since the Unix epoch.
#[derive(Debug, Clone)]
pub struct LimiterClock(Clock);

impl GovernorClock for LimiterClock {
    type Instant = Nanos;

    fn now(&self) -> Nanos {
        since_epoch(self.0.now())
    }
}

fn since_epoch(at: DateTime<Utc>) -> Nanos {
    let elapsed = (at - DateTime::<Utc>::UNIX_EPOCH).to_std().unwrap_or_default();
    Nanos::from(elapsed)
}

pub struct RateLimiter {
    limiter: KeyedLimiter<String, DefaultKeyedStateStore<String>, LimiterClock, NoOpMiddleware<Nanos>>,
    checks: AtomicU64,
}

impl RateLimiter {
    /// The login throttle: five attempts per fifteen minutes per key.
    #[must_use]
    pub fn for_logins(clock: Clock) -> Self {
        Self::new(
            clock,
            MAX_LOGIN_ATTEMPTS,
            Duration::minutes(LOGIN_WINDOW_MINUTES),
        )
    }

    #[must_use]
    pub fn new(clock: Clock, max_attempts: u32, window: Duration) -> Self {
        let burst = NonZeroU32::new(max_attempts).unwrap_or(NonZeroU32::MIN);
        let window = window.to_std().unwrap_or_default();
        let quota = Quota::with_period(window / burst.get())
            .map_or_else(|| Quota::per_minute(burst), |quota| quota.allow_burst(burst));
        Self {
            limiter: KeyedLimiter::dashmap_with_clock(quota, LimiterClock(clock)),
            checks: AtomicU64::new(0),
        }
    }

    /// Spends one attempt for `key`; `false` means the key is throttled.
    pub fn check(&self, key: &str) -> bool {
        let allowed = self.limiter.check_key(&key.to_owned()).is_ok();
        if self.checks.fetch_add(1, Ordering::Relaxed) % SWEEP_EVERY == 0 {
            self.sweep();
        }
        allowed
    }

    /// Drops keys whose attempts have all been earned back.
    pub fn sweep(&self) {
        self.limiter.retain_recent();
        self.limiter.shrink_to_fit();
    }

    /// Number of keys currently holding limiter state.
    #[must_use]
    pub fn tracked_keys(&self) -> usize {
        self.limiter.len()
    }
}
