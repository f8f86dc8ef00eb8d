use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Per-minute request budget shared by every clone of the throttle.
#[derive(Clone)]
pub struct RequestThrottle {
    limiter: Arc<DirectRateLimiter>,
    per_minute: u32,
}

impl RequestThrottle {
    /// Allows `per_minute` requests per minute (at least one), all of which may
    /// be spent in a burst.
    pub fn per_minute(per_minute: u32) -> Self {
        let per_minute = per_minute.max(1);
        Self {
            limiter: Arc::new(RateLimiter::direct(quota_per_minute(per_minute))),
            per_minute,
        }
    }

    pub fn limit(&self) -> u32 {
        self.per_minute
    }

    /// Takes one unit of budget if available without waiting.
    pub fn try_acquire(&self) -> bool {
        self.limiter.check().is_ok()
    }

    /// Waits until one unit of budget is available.
    pub async fn acquire(&self) {
        self.limiter.until_ready().await;
    }
}

fn quota_per_minute(per_minute: u32) -> Quota {
    let burst = NonZeroU32::new(per_minute).unwrap_or(NonZeroU32::MIN);
    let seconds_per_cell = (60.0 / f64::from(burst.get())).max(0.001);
    Quota::with_period(Duration::from_secs_f64(seconds_per_cell))
        .unwrap_or_else(|| Quota::per_minute(burst))
        .allow_burst(burst)
}
