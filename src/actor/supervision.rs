/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

//! Supervision: what happens when an activation fails.
//!
//! Every cell carries a [`SupervisorDirective`] consulted when user code
//! panics or a behavior returns `failed`. Failures never unwind past the
//! activation boundary; they are converted into one of these dispositions.

use std::time::Duration;

use rand::Rng;

/// Disposition applied to a cell whose activation failed.
#[derive(Debug, Clone, Default)]
pub enum SupervisorDirective {
    /// Terminate this cell; children terminate recursively and the parent
    /// is notified via `ChildTerminated`.
    #[default]
    Stop,
    /// Discard the behavior instance, keep mailbox and address, install a
    /// fresh behavior from the factory, pausing scheduling per the backoff
    /// schedule.
    Restart(RestartBackoff),
    /// Re-raise the failure as a failure of the parent's own activation.
    /// At a tree root this triggers system shutdown.
    Escalate,
}

/// Exponential backoff with jitter and cap, paced per consecutive restart.
#[derive(Debug, Clone, PartialEq)]
pub struct RestartBackoff {
    initial: Duration,
    cap: Duration,
    jitter: f64,
    max_restarts: Option<u32>,
}

impl RestartBackoff {
    /// Backoff starting at `initial`, doubling per restart up to `cap`.
    #[must_use]
    pub const fn new(initial: Duration, cap: Duration) -> Self {
        Self {
            initial,
            cap,
            jitter: 0.1,
            max_restarts: None,
        }
    }

    /// Randomise each delay by ±`fraction` (clamped to `0.0..=1.0`).
    #[must_use]
    pub fn with_jitter(mut self, fraction: f64) -> Self {
        self.jitter = fraction.clamp(0.0, 1.0);
        self
    }

    /// Give up and stop the actor after `limit` consecutive restarts.
    #[must_use]
    pub const fn with_max_restarts(mut self, limit: u32) -> Self {
        self.max_restarts = Some(limit);
        self
    }

    #[must_use]
    pub(crate) fn exhausted(&self, restarts: u32) -> bool {
        self.max_restarts.is_some_and(|limit| restarts > limit)
    }

    /// The pause before restart number `restart` (1-based): exponential,
    /// capped, jittered.
    #[must_use]
    pub fn delay(&self, restart: u32) -> Duration {
        let exponent = restart.saturating_sub(1).min(32);
        let base = self
            .initial
            .saturating_mul(2_u32.saturating_pow(exponent))
            .min(self.cap);
        if self.jitter <= f64::EPSILON || base.is_zero() {
            return base;
        }
        let spread = base.as_secs_f64() * self.jitter;
        let jittered = base.as_secs_f64() + rand::thread_rng().gen_range(-spread..=spread);
        Duration::from_secs_f64(jittered.max(0.0))
    }
}

impl Default for RestartBackoff {
    fn default() -> Self {
        Self::new(Duration::from_millis(10), Duration::from_secs(10))
    }
}
