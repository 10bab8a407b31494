//! Engine configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use roadcall_media_archive::RecorderConfig;

/// Call engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// General call handling settings
    pub general: GeneralConfig,

    /// Support queue settings
    pub queue: QueueConfig,

    /// Recording pipeline settings
    pub recording: RecordingConfig,
}

/// General call handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// How long a call may ring before it is marked missed
    pub ring_timeout: Duration,

    /// Credits debited from the partner when a direct call connects
    pub lead_price_credits: u32,
}

/// Support queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Maximum number of waiting entries
    pub max_size: usize,
}

/// Recording pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Hard cap on captured audio per call
    pub max_capture: Duration,

    /// Encode/upload attempts before a recording is marked failed
    pub encode_attempts: u32,

    /// Base backoff between encode attempts; doubles per retry
    pub retry_backoff: Duration,

    /// Lifetime of issued playback URLs
    pub url_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            general: GeneralConfig::default(),
            queue: QueueConfig::default(),
            recording: RecordingConfig::default(),
        }
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            ring_timeout: Duration::from_secs(45),
            lead_price_credits: 1,
        }
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self { max_size: 100 }
    }
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            max_capture: Duration::from_secs(4 * 3600),
            encode_attempts: 3,
            retry_backoff: Duration::from_millis(500),
            url_ttl: Duration::from_secs(3600),
        }
    }
}

impl RecordingConfig {
    /// The recorder-facing subset of this configuration.
    pub fn recorder_config(&self) -> RecorderConfig {
        RecorderConfig {
            max_capture: self.max_capture,
            encode_attempts: self.encode_attempts,
            retry_backoff: self.retry_backoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_documented_timeouts() {
        let config = EngineConfig::default();
        assert_eq!(config.general.ring_timeout, Duration::from_secs(45));
        assert_eq!(config.recording.url_ttl, Duration::from_secs(3600));
        assert_eq!(config.recording.encode_attempts, 3);
    }
}
