use serde::{Deserialize, Serialize};

use super::error::StreamError;

/// Fixed PCM stream parameters supplied by the caller.
///
/// Derived fields follow the standard PCM layout:
/// ```text
/// block_align       = channels * bits_per_sample / 8   (bytes per frame)
/// avg_bytes_per_sec = sample_rate * block_align
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl AudioFormat {
    pub const fn new(sample_rate: u32, channels: u16, bits_per_sample: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample,
        }
    }

    /// Bytes per frame.
    pub fn block_align(&self) -> u32 {
        self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    pub fn avg_bytes_per_sec(&self) -> u32 {
        self.sample_rate.saturating_mul(self.block_align())
    }

    /// Number of bytes occupied by `frames` frames.
    pub fn bytes_for_frames(&self, frames: u32) -> usize {
        frames as usize * self.block_align() as usize
    }

    /// Whole frames that fit in `bytes` bytes.
    pub fn frames_in(&self, bytes: usize) -> usize {
        match self.block_align() {
            0 => 0,
            align => bytes / align as usize,
        }
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.sample_rate == 0 {
            return Err(StreamError::InvalidArgument("sample rate must be positive".into()));
        }
        if self.channels == 0 {
            return Err(StreamError::InvalidArgument("channel count must be positive".into()));
        }
        if self.bits_per_sample == 0 || self.bits_per_sample % 8 != 0 {
            return Err(StreamError::InvalidArgument(format!(
                "unsupported bit depth: {}",
                self.bits_per_sample
            )));
        }
        // Native format descriptors carry these as 16/32-bit fields.
        if self.block_align() > u16::MAX as u32 {
            return Err(StreamError::InvalidArgument(format!(
                "frame size of {} bytes is too large",
                self.block_align()
            )));
        }
        if self.sample_rate.checked_mul(self.block_align()).is_none() {
            return Err(StreamError::InvalidArgument("byte rate overflows".into()));
        }
        Ok(())
    }
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self::new(48000, 2, 16)
    }
}
