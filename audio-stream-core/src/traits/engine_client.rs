use std::time::Duration;

use crate::models::error::EngineError;
use crate::models::format::AudioFormat;

/// Flags attached to an engine buffer region.
///
/// Bit values match the native stack so backends can pass them through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct BufferFlags(u32);

impl BufferFlags {
    pub const NONE: Self = Self(0);
    pub const DATA_DISCONTINUITY: Self = Self(0x1);
    /// The region holds no valid samples and must be treated as silence.
    pub const SILENT: Self = Self(0x2);
    pub const TIMESTAMP_ERROR: Self = Self(0x4);

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for BufferFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Shared-mode negotiation parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineParams {
    pub format: AudioFormat,
    pub buffer_duration: Duration,
    pub loopback: bool,
}

/// Region of ready capture frames lent out by the engine until the matching
/// `release_buffer` call.
#[derive(Debug, Clone, Copy)]
pub struct CapturePacket<'a> {
    /// `frames * block_align` bytes. May be empty when `flags` has `SILENT`.
    pub data: &'a [u8],
    pub frames: u32,
    pub flags: BufferFlags,
}

impl CapturePacket<'_> {
    /// Nothing ready yet. Must not be released.
    pub const fn empty() -> Self {
        CapturePacket {
            data: &[],
            frames: 0,
            flags: BufferFlags::NONE,
        }
    }
}

/// An activated audio client (one per session).
///
/// Dropping the client releases it.
pub trait EngineClient: Send {
    /// Negotiate a shared-mode stream.
    fn initialize(&mut self, params: &EngineParams) -> Result<(), EngineError>;

    /// Engine buffer size in frames, fixed by `initialize`.
    fn buffer_size(&self) -> Result<u32, EngineError>;

    /// Frames queued in the engine buffer (render: awaiting playback).
    fn current_padding(&self) -> Result<u32, EngineError>;

    fn start(&self) -> Result<(), EngineError>;

    fn stop(&self) -> Result<(), EngineError>;

    fn render_transfer(&self) -> Result<Box<dyn RenderTransfer>, EngineError>;

    fn capture_transfer(&self) -> Result<Box<dyn CaptureTransfer>, EngineError>;
}

/// Render half of the buffer exchange.
pub trait RenderTransfer: Send {
    /// Lend exactly `frames` frames (`frames * block_align` bytes) of the
    /// engine buffer. Fails with `BufferTooLarge` when fewer are free.
    fn get_buffer(&mut self, frames: u32) -> Result<&mut [u8], EngineError>;

    /// Commit `frames` frames of the lent region.
    fn release_buffer(&mut self, frames: u32, flags: BufferFlags) -> Result<(), EngineError>;
}

/// Capture half of the buffer exchange.
pub trait CaptureTransfer: Send {
    /// Lend whatever the engine has ready. Zero frames is not an error.
    fn get_buffer(&mut self) -> Result<CapturePacket<'_>, EngineError>;

    /// Return the lent packet. `frames` must be the packet's full frame count.
    fn release_buffer(&mut self, frames: u32) -> Result<(), EngineError>;

    /// Frames in the next packet, without acquiring it.
    fn next_packet_size(&self) -> Result<u32, EngineError>;
}
