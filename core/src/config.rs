//! Client-wide settings.

use std::time::Duration;

/// Idle timeout applied when neither the config nor the call overrides it.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Environment variable read by `ClientConfig::from_env`, in milliseconds.
pub const IDLE_TIMEOUT_ENV: &str = "COURIER_IDLE_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Longest stretch without progress on the request or the response.
    pub idle_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        }
    }
}

impl ClientConfig {
    /// Defaults, with `COURIER_IDLE_TIMEOUT_MS` applied when set.
    ///
    /// An unparsable value is logged and ignored. Zero keeps the default.
    pub fn from_env() -> Self {
        Self::from_timeout_var(std::env::var(IDLE_TIMEOUT_ENV).ok().as_deref())
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn from_timeout_var(value: Option<&str>) -> Self {
        let mut config = Self::default();
        if let Some(raw) = value {
            match raw.trim().parse::<u64>() {
                Ok(0) => {}
                Ok(ms) => config.idle_timeout = Duration::from_millis(ms),
                Err(err) => {
                    tracing::warn!(value = raw, error = %err, "ignoring invalid {IDLE_TIMEOUT_ENV}");
                }
            }
        }
        config
    }
}
