//! `IAudioClient` and its render/capture services behind the core engine traits.
//!
//! Sequence driven by `StreamSession::create`:
//! 1. `IMMDevice::Activate` → `IAudioClient`
//! 2. `Initialize` in shared mode with the caller's PCM format
//! 3. `GetBufferSize`
//! 4. `GetService` → `IAudioRenderClient` or `IAudioCaptureClient`

use std::time::Duration;

use windows::Win32::Media::Audio::*;

use audio_stream_core::models::error::EngineError;
use audio_stream_core::models::format::AudioFormat;
use audio_stream_core::traits::engine_client::{
    BufferFlags, CapturePacket, CaptureTransfer, EngineClient, EngineParams, RenderTransfer,
};

use crate::com::engine_error;

/// Plain PCM descriptor for `format`.
pub(crate) fn wave_format(format: &AudioFormat) -> WAVEFORMATEX {
    WAVEFORMATEX {
        wFormatTag: WAVE_FORMAT_PCM as u16,
        nChannels: format.channels,
        nSamplesPerSec: format.sample_rate,
        nAvgBytesPerSec: format.avg_bytes_per_sec(),
        nBlockAlign: format.block_align() as u16,
        wBitsPerSample: format.bits_per_sample,
        cbSize: 0,
    }
}

/// `duration` in `REFERENCE_TIME` units (100 ns).
pub(crate) fn reference_time(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos() / 100).unwrap_or(i64::MAX)
}

pub(crate) struct WasapiClient {
    client: IAudioClient,
    block_align: Option<usize>,
}

// SAFETY: the client is activated in the MTA and owned by exactly one
// session, which serializes calls through `&mut self`.
unsafe impl Send for WasapiClient {}

impl WasapiClient {
    pub(crate) fn new(client: IAudioClient) -> Self {
        Self {
            client,
            block_align: None,
        }
    }

    fn block_align(&self) -> Result<usize, EngineError> {
        self.block_align.ok_or(EngineError::NotInitialized)
    }
}

impl EngineClient for WasapiClient {
    fn initialize(&mut self, params: &EngineParams) -> Result<(), EngineError> {
        let format = wave_format(&params.format);
        let flags = if params.loopback {
            AUDCLNT_STREAMFLAGS_LOOPBACK
        } else {
            0
        };

        unsafe {
            self.client.Initialize(
                AUDCLNT_SHAREMODE_SHARED,
                flags,
                reference_time(params.buffer_duration),
                0,
                &format,
                None,
            )
        }
        .map_err(|e| engine_error("IAudioClient::Initialize", e))?;

        self.block_align = Some(params.format.block_align() as usize);
        Ok(())
    }

    fn buffer_size(&self) -> Result<u32, EngineError> {
        unsafe { self.client.GetBufferSize() }.map_err(|e| engine_error("IAudioClient::GetBufferSize", e))
    }

    fn current_padding(&self) -> Result<u32, EngineError> {
        unsafe { self.client.GetCurrentPadding() }.map_err(|e| engine_error("IAudioClient::GetCurrentPadding", e))
    }

    fn start(&self) -> Result<(), EngineError> {
        unsafe { self.client.Start() }.map_err(|e| engine_error("IAudioClient::Start", e))
    }

    fn stop(&self) -> Result<(), EngineError> {
        unsafe { self.client.Stop() }.map_err(|e| engine_error("IAudioClient::Stop", e))
    }

    fn render_transfer(&self) -> Result<Box<dyn RenderTransfer>, EngineError> {
        let block_align = self.block_align()?;
        let client: IAudioRenderClient = unsafe { self.client.GetService() }
            .map_err(|e| engine_error("GetService(IAudioRenderClient)", e))?;
        Ok(Box::new(WasapiRenderTransfer { client, block_align }))
    }

    fn capture_transfer(&self) -> Result<Box<dyn CaptureTransfer>, EngineError> {
        let block_align = self.block_align()?;
        let client: IAudioCaptureClient = unsafe { self.client.GetService() }
            .map_err(|e| engine_error("GetService(IAudioCaptureClient)", e))?;
        Ok(Box::new(WasapiCaptureTransfer { client, block_align }))
    }
}

struct WasapiRenderTransfer {
    client: IAudioRenderClient,
    block_align: usize,
}

// SAFETY: see `WasapiClient`.
unsafe impl Send for WasapiRenderTransfer {}

impl RenderTransfer for WasapiRenderTransfer {
    fn get_buffer(&mut self, frames: u32) -> Result<&mut [u8], EngineError> {
        let data = unsafe { self.client.GetBuffer(frames) }
            .map_err(|e| engine_error("IAudioRenderClient::GetBuffer", e))?;
        if data.is_null() {
            return Ok(&mut []);
        }
        // SAFETY: the engine lends `frames * block_align` writable bytes until
        // ReleaseBuffer, and the slice holds `&mut self` so no other buffer
        // call can run while it is alive.
        Ok(unsafe { std::slice::from_raw_parts_mut(data, frames as usize * self.block_align) })
    }

    fn release_buffer(&mut self, frames: u32, flags: BufferFlags) -> Result<(), EngineError> {
        unsafe { self.client.ReleaseBuffer(frames, flags.bits()) }
            .map_err(|e| engine_error("IAudioRenderClient::ReleaseBuffer", e))
    }
}

struct WasapiCaptureTransfer {
    client: IAudioCaptureClient,
    block_align: usize,
}

// SAFETY: see `WasapiClient`.
unsafe impl Send for WasapiCaptureTransfer {}

impl CaptureTransfer for WasapiCaptureTransfer {
    fn get_buffer(&mut self) -> Result<CapturePacket<'_>, EngineError> {
        let mut data: *mut u8 = std::ptr::null_mut();
        let mut frames: u32 = 0;
        let mut flags: u32 = 0;

        // AUDCLNT_S_BUFFER_EMPTY is a success code and leaves `frames` at 0.
        unsafe { self.client.GetBuffer(&mut data, &mut frames, &mut flags, None, None) }
            .map_err(|e| engine_error("IAudioCaptureClient::GetBuffer", e))?;

        if frames == 0 {
            return Ok(CapturePacket::empty());
        }

        let data: &[u8] = if data.is_null() {
            &[]
        } else {
            // SAFETY: valid for `frames * block_align` bytes until ReleaseBuffer;
            // the packet borrows `&mut self` for that long.
            unsafe { std::slice::from_raw_parts(data, frames as usize * self.block_align) }
        };

        Ok(CapturePacket {
            data,
            frames,
            flags: BufferFlags::from_bits(flags),
        })
    }

    fn release_buffer(&mut self, frames: u32) -> Result<(), EngineError> {
        unsafe { self.client.ReleaseBuffer(frames) }
            .map_err(|e| engine_error("IAudioCaptureClient::ReleaseBuffer", e))
    }

    fn next_packet_size(&self) -> Result<u32, EngineError> {
        unsafe { self.client.GetNextPacketSize() }
            .map_err(|e| engine_error("IAudioCaptureClient::GetNextPacketSize", e))
    }
}
