//! Backoff for throttled map reads.
//!
//! Throttling gets a linear, widening delay (`base * attempt`) and a hard
//! attempt cap. The wait is awaited inline, so the whole instance stops until
//! it elapses.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// HTTP status the map API uses to say "back off"
pub const THROTTLED_STATUS: u16 = 509;

pub const DEFAULT_THROTTLE_BASE_DELAY_SECONDS: u64 = 60;
pub const DEFAULT_MAX_THROTTLE_ATTEMPTS: u32 = 10;

#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real delays via the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThrottlePolicy {
    pub base_delay_seconds: u64,
    pub max_attempts: u32,
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self {
            base_delay_seconds: DEFAULT_THROTTLE_BASE_DELAY_SECONDS,
            max_attempts: DEFAULT_MAX_THROTTLE_ATTEMPTS,
        }
    }
}

impl ThrottlePolicy {
    /// Delay after being throttled on `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        Duration::from_secs(self.base_delay_seconds * u64::from(attempt))
    }

    pub fn allows(&self, attempt: u32) -> bool {
        attempt <= self.max_attempts
    }
}
