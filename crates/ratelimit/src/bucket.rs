//! Per-client admission log

use std::collections::VecDeque;
use std::time::Instant;

use crate::{Decision, RateLimitConfig};

/// Admission instants inside the trailing window, oldest first.
///
/// Never holds more than `max_requests` entries.
#[derive(Debug, Clone, Default)]
pub(crate) struct Bucket {
    log: VecDeque<Instant>,
}

impl Bucket {
    /// A bucket with full capacity
    pub(crate) fn fresh() -> Self {
        Self::default()
    }

    /// Decide on one request at `now` and record it if admitted.
    ///
    /// `now` must not precede any instant already recorded.
    pub(crate) fn admit(&mut self, config: &RateLimitConfig, now: Instant) -> Decision {
        // Each instant is popped exactly once over its lifetime
        while let Some(&oldest) = self.log.front() {
            if now.saturating_duration_since(oldest) >= config.window {
                self.log.pop_front();
            } else {
                break;
            }
        }

        let limit = config.max_requests as usize;
        if self.log.len() < limit {
            self.log.push_back(now);
            return Decision::Admitted {
                remaining: (limit - self.log.len()) as u32,
            };
        }

        // len >= limit > 0, so the front exists and is younger than the window
        let age = self
            .log
            .front()
            .map(|&oldest| now.saturating_duration_since(oldest))
            .unwrap_or_default();
        Decision::Rejected {
            retry_after: config.window.saturating_sub(age),
        }
    }

    #[cfg(test)]
    pub(crate) fn recorded(&self) -> Vec<Instant> {
        self.log.iter().copied().collect()
    }
}
