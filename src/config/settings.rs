use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Upper bound on a synchronizer wait before it gives up.
pub const DEFAULT_SYNCHRONIZATION_TIMEOUT_MS: u64 = 5_000;

/// Delay before the one-shot code lens refresh after a document is (re)added.
pub const DEFAULT_CODE_LENS_REFRESH_DELAY_MS: u64 = 5_000;

/// Capacity of the change notification channel.
pub const DEFAULT_EVENT_BUFFER: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub synchronization_timeout_ms: u64,
    pub code_lens_refresh_delay_ms: u64,
    pub event_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            synchronization_timeout_ms: DEFAULT_SYNCHRONIZATION_TIMEOUT_MS,
            code_lens_refresh_delay_ms: DEFAULT_CODE_LENS_REFRESH_DELAY_MS,
            event_buffer: DEFAULT_EVENT_BUFFER,
        }
    }
}

impl Settings {
    pub fn synchronization_timeout(&self) -> Duration {
        Duration::from_millis(self.synchronization_timeout_ms)
    }

    pub fn code_lens_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.code_lens_refresh_delay_ms)
    }

    /// Parse settings from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}
