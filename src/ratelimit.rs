use governor::{
    Quota, RateLimiter as GovernorRateLimiter,
    clock::{QuantaClock, QuantaInstant},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use nonzero_ext::nonzero;
use std::{num::NonZeroU32, time::Duration};

// Booking widgets of this kind sit on session-stateful servers that throttle
// or ban clients hammering them. Two navigations per second sustained, never
// two closer together than 400ms.
const NAV_PER_SEC: NonZeroU32 = nonzero!(2u32);
const MS_BETWEEN_NAV: Duration = Duration::from_millis(400);

type DirectRateLimiter =
    GovernorRateLimiter<NotKeyed, InMemoryState, QuantaClock, NoOpMiddleware<QuantaInstant>>;

pub struct NavRateLimiter {
    nav_per_sec: DirectRateLimiter,
    ms_between_nav: DirectRateLimiter,
}

impl NavRateLimiter {
    pub fn new() -> Self {
        let nav_per_sec = GovernorRateLimiter::direct(Quota::per_second(NAV_PER_SEC));
        let ms_between_nav =
            GovernorRateLimiter::direct(Quota::with_period(MS_BETWEEN_NAV).unwrap());

        NavRateLimiter {
            nav_per_sec,
            ms_between_nav,
        }
    }

    pub async fn wait_until_ready(&self) {
        // Await order matters: clear the sustained-rate limiter first, then
        // let the spacing limiter strictly serialize whoever got through it.
        self.nav_per_sec.until_ready().await;
        self.ms_between_nav.until_ready().await;
    }
}

impl Default for NavRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
