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

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for one actor system.
///
/// All values are per-system; there is no ambient global configuration.
/// Settings can be adjusted programmatically in the `launch` closure or
/// loaded from a TOML document via [`SystemSettings::from_toml_str`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SystemSettings {
    /// Timeout configuration.
    pub timeouts: TimeoutSettings,
    /// Limits and capacity configuration.
    pub limits: LimitSettings,
    /// Behavioral switches.
    pub behavior: BehaviorSettings,
}

/// Timeout-related configuration values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    /// Bound on waiting for one tree to drain during `stop_all`.
    pub stop_all_timeout_ms: u64,
    /// Bound on draining the dispatcher pool at shutdown.
    pub dispatcher_drain_timeout_ms: u64,
    /// Bound on draining the event-loop group at shutdown.
    pub event_loop_drain_timeout_ms: u64,
    /// Bound on the cluster unbind step at shutdown. 300 ms unless
    /// overridden; with no cluster shell bound the step is skipped.
    pub unbind_timeout_ms: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            stop_all_timeout_ms: 10_000,
            dispatcher_drain_timeout_ms: 5_000,
            event_loop_drain_timeout_ms: 1_000,
            unbind_timeout_ms: 300,
        }
    }
}

/// Limits and capacity configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitSettings {
    /// Worker threads in the shared dispatcher pool. `0` means one per
    /// available CPU.
    pub worker_threads: usize,
    /// Threads backing the event-loop group.
    pub event_loop_threads: usize,
    /// Maximum user messages processed per activation.
    pub throughput: usize,
}

impl Default for LimitSettings {
    fn default() -> Self {
        Self {
            worker_threads: 0,
            event_loop_threads: 1,
            throughput: 100,
        }
    }
}

impl LimitSettings {
    pub(crate) fn effective_worker_threads(&self) -> usize {
        if self.worker_threads > 0 {
            return self.worker_threads;
        }
        std::thread::available_parallelism().map_or(4, std::num::NonZeroUsize::get)
    }
}

/// Behavioral configuration switches.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BehaviorSettings {
    /// Install a process-wide panic hook that logs a captured backtrace
    /// before supervision absorbs the panic.
    pub install_backtrace_hook: bool,
}

impl SystemSettings {
    /// Parse settings from a TOML document; absent keys take defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.limits.throughput == 0 {
            return Err(ConfigError::Invalid(
                "limits.throughput must be at least 1".to_string(),
            ));
        }
        if self.limits.event_loop_threads == 0 {
            return Err(ConfigError::Invalid(
                "limits.event_loop_threads must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn stop_all_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.stop_all_timeout_ms)
    }

    pub(crate) fn dispatcher_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.dispatcher_drain_timeout_ms)
    }

    pub(crate) fn event_loop_drain_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.event_loop_drain_timeout_ms)
    }
}

/// Errors surfaced while validating or parsing settings.
#[derive(Debug)]
pub enum ConfigError {
    /// A setting value is out of range.
    Invalid(String),
    /// The TOML document failed to parse.
    Parse(toml::de::Error),
    /// The event-loop group could not be constructed.
    EventLoop(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Invalid(msg) => write!(f, "Invalid setting: {msg}"),
            ConfigError::Parse(err) => write!(f, "Failed to parse settings: {err}"),
            ConfigError::EventLoop(msg) => write!(f, "Failed to build event loop: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = SystemSettings::default();
        assert_eq!(settings.timeouts.unbind_timeout_ms, 300);
        assert_eq!(settings.limits.throughput, 100);
        assert!(settings.validate().is_ok());
        assert!(settings.limits.effective_worker_threads() >= 1);
    }

    #[test]
    fn loads_partial_toml() {
        let settings = SystemSettings::from_toml_str(
            r#"
            [limits]
            worker_threads = 2
            throughput = 5

            [timeouts]
            unbind_timeout_ms = 50
            "#,
        )
        .unwrap();
        assert_eq!(settings.limits.worker_threads, 2);
        assert_eq!(settings.limits.throughput, 5);
        assert_eq!(settings.timeouts.unbind_timeout_ms, 50);
        // Untouched sections keep their defaults.
        assert_eq!(settings.timeouts.stop_all_timeout_ms, 10_000);
    }

    #[test]
    fn zero_throughput_is_rejected() {
        let mut settings = SystemSettings::default();
        settings.limits.throughput = 0;
        assert!(matches!(settings.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = SystemSettings::from_toml_str("limits = 3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
