use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::StreamError;
use super::format::AudioFormat;

/// Nominal engine buffer duration requested at negotiation.
///
/// Trades latency for underrun safety on non-realtime threads; the engine may
/// assign a larger buffer.
pub const DEFAULT_BUFFER_DURATION: Duration = Duration::from_secs(1);

/// Parameters for negotiating a stream session.
///
/// Deserializable from JSON so applications can keep it in their own config
/// files; missing fields take their defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfiguration {
    /// PCM format handed to the engine as-is (default: 48 kHz, stereo, 16-bit).
    pub format: AudioFormat,

    /// Nominal engine buffer duration (default: 1 second).
    #[serde(rename = "buffer_duration_ms", with = "duration_ms")]
    pub buffer_duration: Duration,

    /// Capture the mix going to a render endpoint (default: false).
    pub loopback: bool,
}

impl StreamConfiguration {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            ..Self::default()
        }
    }

    pub fn with_buffer_duration(mut self, buffer_duration: Duration) -> Self {
        self.buffer_duration = buffer_duration;
        self
    }

    pub fn with_loopback(mut self, loopback: bool) -> Self {
        self.loopback = loopback;
        self
    }

    /// Parse and validate a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self, StreamError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| StreamError::InvalidArgument(format!("malformed configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        self.format.validate()?;
        if self.buffer_duration.is_zero() {
            return Err(StreamError::InvalidArgument("buffer duration must be positive".into()));
        }
        Ok(())
    }
}

impl Default for StreamConfiguration {
    fn default() -> Self {
        Self {
            format: AudioFormat::default(),
            buffer_duration: DEFAULT_BUFFER_DURATION,
            loopback: false,
        }
    }
}

mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis().min(u64::MAX as u128) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
