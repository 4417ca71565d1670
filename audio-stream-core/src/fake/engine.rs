//! In-memory engine that records every call and counts live handles.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, MutexGuard};

use crate::models::audio_models::Direction;
use crate::models::error::EngineError;
use crate::models::format::AudioFormat;
use crate::traits::engine_client::{
    BufferFlags, CapturePacket, CaptureTransfer, EngineClient, EngineParams, RenderTransfer,
};

/// Byte pattern of freshly lent render regions, so tests can spot bytes the
/// session never wrote.
pub const REGION_FILL: u8 = 0xCD;

/// One recorded engine call, in the order the engine saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Activate,
    Initialize {
        format: AudioFormat,
        buffer_duration: Duration,
        loopback: bool,
    },
    GetBufferSize,
    GetCurrentPadding,
    GetService(Direction),
    Start,
    Stop,
    RenderGetBuffer(u32),
    RenderReleaseBuffer { frames: u32, flags: BufferFlags },
    CaptureGetBuffer,
    CaptureReleaseBuffer(u32),
    NextPacketSize,
    ReleaseTransfer(Direction),
    ReleaseClient,
}

/// Calls that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    Activate,
    Initialize,
    BufferSize,
    RenderService,
    CaptureService,
    Start,
    Stop,
    Padding,
    GetBuffer,
    ReleaseBuffer,
    NextPacketSize,
    PropertyStore,
    DeviceId,
}

/// A capture packet queued for the session to pick up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakePacket {
    pub data: Vec<u8>,
    pub frames: u32,
    pub flags: BufferFlags,
}

impl FakePacket {
    pub fn audio(data: Vec<u8>, frames: u32) -> Self {
        Self {
            data,
            frames,
            flags: BufferFlags::NONE,
        }
    }

    /// A silent packet. `data` is whatever stale bytes the engine left behind.
    pub fn silent(data: Vec<u8>, frames: u32) -> Self {
        Self {
            data,
            frames,
            flags: BufferFlags::SILENT,
        }
    }

    pub fn with_flags(mut self, flags: BufferFlags) -> Self {
        self.flags = self.flags | flags;
        self
    }
}

#[derive(Default)]
struct EngineState {
    calls: Vec<EngineCall>,
    failures: HashSet<FailPoint>,
    buffer_frames_override: Option<u32>,
    format: Option<AudioFormat>,
    buffer_frames: u32,
    padding: u32,
    running: bool,
    rendered: Vec<u8>,
    packets: VecDeque<FakePacket>,
    live_clients: usize,
    live_transfers: usize,
}

/// Shared handle to one fake device's engine. Clones observe the same state.
#[derive(Clone, Default)]
pub struct FakeEngine {
    state: Arc<Mutex<EngineState>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later call at `point` fail.
    pub fn fail(&self, point: FailPoint) {
        self.state.lock().failures.insert(point);
    }

    pub fn heal(&self, point: FailPoint) {
        self.state.lock().failures.remove(&point);
    }

    /// Buffer size the next `initialize` assigns, instead of one derived from
    /// the requested duration.
    pub fn set_buffer_frames(&self, frames: u32) {
        self.state.lock().buffer_frames_override = Some(frames);
    }

    pub fn set_padding(&self, frames: u32) {
        self.state.lock().padding = frames;
    }

    /// Simulate the device playing `frames` queued frames.
    pub fn consume(&self, frames: u32) {
        let mut state = self.state.lock();
        state.padding = state.padding.saturating_sub(frames);
    }

    pub fn push_packet(&self, packet: FakePacket) {
        self.state.lock().packets.push_back(packet);
    }

    pub fn pending_packets(&self) -> usize {
        self.state.lock().packets.len()
    }

    pub fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Every byte committed through render releases so far.
    pub fn rendered(&self) -> Vec<u8> {
        self.state.lock().rendered.clone()
    }

    pub fn padding(&self) -> u32 {
        self.state.lock().padding
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().running
    }

    pub fn live_clients(&self) -> usize {
        self.state.lock().live_clients
    }

    pub fn live_transfers(&self) -> usize {
        self.state.lock().live_transfers
    }

    pub(crate) fn injected(&self, point: FailPoint) -> Result<(), EngineError> {
        if self.state.lock().failures.contains(&point) {
            Err(injected_failure(point))
        } else {
            Ok(())
        }
    }

    pub(crate) fn activate(&self) -> Result<Box<dyn EngineClient>, EngineError> {
        {
            let mut state = self.record(EngineCall::Activate, FailPoint::Activate)?;
            state.live_clients += 1;
        }
        Ok(Box::new(FakeClient {
            engine: self.clone(),
            initialized: false,
        }))
    }

    /// Log `call`, then fail if `point` is armed.
    fn record(&self, call: EngineCall, point: FailPoint) -> Result<MutexGuard<'_, EngineState>, EngineError> {
        let mut state = self.state.lock();
        state.calls.push(call);
        if state.failures.contains(&point) {
            return Err(injected_failure(point));
        }
        Ok(state)
    }

    fn log(&self, call: EngineCall) -> MutexGuard<'_, EngineState> {
        let mut state = self.state.lock();
        state.calls.push(call);
        state
    }
}

fn injected_failure(point: FailPoint) -> EngineError {
    EngineError::Os {
        context: format!("{:?}", point),
        code: 0x8000_4005u32 as i32,
        message: "injected failure".into(),
    }
}

/// Frames covering `duration` at `sample_rate`, rounded up.
fn frames_for(duration: Duration, sample_rate: u32) -> u32 {
    let frames = (duration.as_nanos() * sample_rate as u128).div_ceil(1_000_000_000);
    u32::try_from(frames).unwrap_or(u32::MAX)
}

struct FakeClient {
    engine: FakeEngine,
    initialized: bool,
}

impl FakeClient {
    fn ensure_initialized(&self) -> Result<(), EngineError> {
        if self.initialized {
            Ok(())
        } else {
            Err(EngineError::NotInitialized)
        }
    }
}

impl EngineClient for FakeClient {
    fn initialize(&mut self, params: &EngineParams) -> Result<(), EngineError> {
        let mut state = self.engine.record(
            EngineCall::Initialize {
                format: params.format,
                buffer_duration: params.buffer_duration,
                loopback: params.loopback,
            },
            FailPoint::Initialize,
        )?;
        if self.initialized {
            return Err(EngineError::Os {
                context: "Initialize".into(),
                code: 0x8889_0002u32 as i32,
                message: "already initialized".into(),
            });
        }
        state.format = Some(params.format);
        state.buffer_frames = state
            .buffer_frames_override
            .unwrap_or_else(|| frames_for(params.buffer_duration, params.format.sample_rate));
        state.padding = 0;
        drop(state);
        self.initialized = true;
        Ok(())
    }

    fn buffer_size(&self) -> Result<u32, EngineError> {
        let state = self.engine.record(EngineCall::GetBufferSize, FailPoint::BufferSize)?;
        self.ensure_initialized()?;
        Ok(state.buffer_frames)
    }

    fn current_padding(&self) -> Result<u32, EngineError> {
        let state = self.engine.record(EngineCall::GetCurrentPadding, FailPoint::Padding)?;
        self.ensure_initialized()?;
        Ok(state.padding)
    }

    fn start(&self) -> Result<(), EngineError> {
        let mut state = self.engine.record(EngineCall::Start, FailPoint::Start)?;
        self.ensure_initialized()?;
        if state.running {
            return Err(EngineError::Os {
                context: "Start".into(),
                code: 0x8889_0005u32 as i32,
                message: "not stopped".into(),
            });
        }
        state.running = true;
        Ok(())
    }

    fn stop(&self) -> Result<(), EngineError> {
        let mut state = self.engine.record(EngineCall::Stop, FailPoint::Stop)?;
        self.ensure_initialized()?;
        state.running = false;
        Ok(())
    }

    fn render_transfer(&self) -> Result<Box<dyn RenderTransfer>, EngineError> {
        {
            let mut state = self
                .engine
                .record(EngineCall::GetService(Direction::Render), FailPoint::RenderService)?;
            self.ensure_initialized()?;
            state.live_transfers += 1;
        }
        Ok(Box::new(FakeRenderTransfer {
            engine: self.engine.clone(),
            region: Vec::new(),
            pending: None,
        }))
    }

    fn capture_transfer(&self) -> Result<Box<dyn CaptureTransfer>, EngineError> {
        {
            let mut state = self
                .engine
                .record(EngineCall::GetService(Direction::Capture), FailPoint::CaptureService)?;
            self.ensure_initialized()?;
            state.live_transfers += 1;
        }
        Ok(Box::new(FakeCaptureTransfer {
            engine: self.engine.clone(),
            held: None,
        }))
    }
}

impl Drop for FakeClient {
    fn drop(&mut self) {
        let mut state = self.engine.log(EngineCall::ReleaseClient);
        state.live_clients -= 1;
    }
}

struct FakeRenderTransfer {
    engine: FakeEngine,
    region: Vec<u8>,
    pending: Option<u32>,
}

impl RenderTransfer for FakeRenderTransfer {
    fn get_buffer(&mut self, frames: u32) -> Result<&mut [u8], EngineError> {
        let block_align = {
            let state = self
                .engine
                .record(EngineCall::RenderGetBuffer(frames), FailPoint::GetBuffer)?;
            if self.pending.is_some() {
                return Err(EngineError::OutOfOrder);
            }
            let format = state.format.ok_or(EngineError::NotInitialized)?;
            if frames > state.buffer_frames.saturating_sub(state.padding) {
                return Err(EngineError::BufferTooLarge);
            }
            format.block_align() as usize
        };

        self.pending = Some(frames);
        self.region.clear();
        self.region.resize(frames as usize * block_align, REGION_FILL);
        Ok(self.region.as_mut_slice())
    }

    fn release_buffer(&mut self, frames: u32, flags: BufferFlags) -> Result<(), EngineError> {
        let pending = self.pending.take();
        let mut state = self.engine.record(
            EngineCall::RenderReleaseBuffer { frames, flags },
            FailPoint::ReleaseBuffer,
        )?;
        let pending = pending.ok_or(EngineError::OutOfOrder)?;
        if frames > pending {
            return Err(EngineError::InvalidSize);
        }

        let block_align = state.format.map(|f| f.block_align() as usize).unwrap_or(0);
        let bytes = frames as usize * block_align;
        if flags.contains(BufferFlags::SILENT) {
            let len = state.rendered.len() + bytes;
            state.rendered.resize(len, 0);
        } else {
            state.rendered.extend_from_slice(&self.region[..bytes]);
        }
        state.padding += frames;
        Ok(())
    }
}

impl Drop for FakeRenderTransfer {
    fn drop(&mut self) {
        let mut state = self.engine.log(EngineCall::ReleaseTransfer(Direction::Render));
        state.live_transfers -= 1;
    }
}

struct FakeCaptureTransfer {
    engine: FakeEngine,
    held: Option<FakePacket>,
}

impl CaptureTransfer for FakeCaptureTransfer {
    fn get_buffer(&mut self) -> Result<CapturePacket<'_>, EngineError> {
        let next = {
            let mut state = self
                .engine
                .record(EngineCall::CaptureGetBuffer, FailPoint::GetBuffer)?;
            if self.held.is_some() {
                return Err(EngineError::OutOfOrder);
            }
            // Zero-frame packets are reported as "nothing ready".
            state.packets.pop_front().filter(|packet| packet.frames > 0)
        };

        let Some(packet) = next else {
            return Ok(CapturePacket::empty());
        };
        let held = self.held.insert(packet);
        Ok(CapturePacket {
            data: &held.data,
            frames: held.frames,
            flags: held.flags,
        })
    }

    fn release_buffer(&mut self, frames: u32) -> Result<(), EngineError> {
        let held = self.held.take();
        let mut state = self
            .engine
            .record(EngineCall::CaptureReleaseBuffer(frames), FailPoint::ReleaseBuffer)?;
        match held {
            None if frames == 0 => Ok(()),
            None => Err(EngineError::OutOfOrder),
            // Releasing nothing leaves the packet for the next acquire.
            Some(packet) if frames == 0 => {
                state.packets.push_front(packet);
                Ok(())
            }
            Some(packet) if frames == packet.frames => Ok(()),
            Some(_) => Err(EngineError::InvalidSize),
        }
    }

    fn next_packet_size(&self) -> Result<u32, EngineError> {
        let state = self
            .engine
            .record(EngineCall::NextPacketSize, FailPoint::NextPacketSize)?;
        Ok(state.packets.front().map(|p| p.frames).unwrap_or(0))
    }
}

impl Drop for FakeCaptureTransfer {
    fn drop(&mut self) {
        let mut state = self.engine.log(EngineCall::ReleaseTransfer(Direction::Capture));
        state.live_transfers -= 1;
    }
}
