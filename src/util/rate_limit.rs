//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Max inbound frames per second per session
pub const FRAME_RATE_LIMIT: u32 = 30;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Limiter {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    RateLimiter::direct(quota)
}

/// Per-session inbound frame limiter, owned by the socket reader
pub struct SessionRateLimiter {
    frames: Limiter,
    throttled: u64,
}

impl SessionRateLimiter {
    pub fn new() -> Self {
        Self::with_rate(FRAME_RATE_LIMIT)
    }

    pub fn with_rate(per_second: u32) -> Self {
        Self {
            frames: create_limiter(per_second),
            throttled: 0,
        }
    }

    /// Check if a frame is allowed (returns true if allowed)
    pub fn check_frame(&mut self) -> bool {
        let allowed = self.frames.check().is_ok();
        if !allowed {
            self.throttled += 1;
        }
        allowed
    }

    /// Frames discarded so far
    pub fn throttled(&self) -> u64 {
        self.throttled
    }
}

impl Default for SessionRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
