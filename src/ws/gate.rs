//! Inbound frame admission for one socket
//!
//! Frames over the rate limit are dropped, except intents. A throttled
//! `input`/`move` is held and replaced by newer ones, then forwarded once a
//! frame is admitted again or the flush timer fires, so the last intent of a
//! burst always reaches the engine.

use std::time::Duration;

use crate::util::rate_limit::SessionRateLimiter;
use crate::ws::protocol::ClientMsg;

/// How often a held intent is flushed when nothing else gets through
pub const INTENT_FLUSH: Duration = Duration::from_millis(50);

pub struct InboundGate {
    limiter: SessionRateLimiter,
    held_intent: Option<ClientMsg>,
}

impl InboundGate {
    pub fn new(limiter: SessionRateLimiter) -> Self {
        Self {
            limiter,
            held_intent: None,
        }
    }

    /// Messages to forward now, oldest first
    pub fn admit(&mut self, msg: ClientMsg) -> Vec<ClientMsg> {
        let intent = is_intent(&msg);

        if !self.limiter.check_frame() {
            if intent {
                self.held_intent = Some(msg);
            }
            return Vec::new();
        }

        let mut forward = Vec::with_capacity(2);
        if intent {
            // Newer than anything held
            self.held_intent = None;
        } else if let Some(held) = self.held_intent.take() {
            forward.push(held);
        }
        forward.push(msg);
        forward
    }

    pub fn has_held_intent(&self) -> bool {
        self.held_intent.is_some()
    }

    pub fn flush(&mut self) -> Option<ClientMsg> {
        self.held_intent.take()
    }

    /// Frames that did not pass the limiter
    pub fn throttled(&self) -> u64 {
        self.limiter.throttled()
    }
}

fn is_intent(msg: &ClientMsg) -> bool {
    matches!(msg, ClientMsg::Input(_) | ClientMsg::Move(_))
}
