use uuid::Uuid;

use crate::models::audio_models::{Direction, StreamDiagnostics};
use crate::models::config::StreamConfiguration;
use crate::models::endpoint::Endpoint;
use crate::models::error::{EngineError, StreamError};
use crate::models::format::AudioFormat;
use crate::models::state::StreamState;
use crate::traits::engine_client::{BufferFlags, CaptureTransfer, EngineClient, EngineParams, RenderTransfer};

/// The direction-specific half of the buffer exchange, fixed at construction.
enum Transfer {
    Render(Box<dyn RenderTransfer>),
    Capture(Box<dyn CaptureTransfer>),
}

/// A negotiated shared-mode stream on one endpoint.
///
/// Owns the engine client, exactly one transfer interface, a reference on the
/// endpoint, and the format. Dropping the session stops it if started, then
/// releases the transfer interface, the client, and the endpoint reference in
/// that order.
///
/// Calls on one session are serialized by `&mut self`; the audio thread that
/// drives it is the caller's. Transfers never block and never retry:
///
/// ```text
/// loop {
///     let room = session.available_frames();
///     if room == 0 { wait; continue }
///     session.write(&pcm, room.min(chunk));
/// }
/// ```
pub struct StreamSession {
    // Declaration order is release order.
    transfer: Transfer,
    client: Box<dyn EngineClient>,
    endpoint: Endpoint,
    format: AudioFormat,
    id: Uuid,
    direction: Direction,
    buffer_frames: u32,
    state: StreamState,
    diagnostics: StreamDiagnostics,
}

impl StreamSession {
    /// Negotiate a shared-mode session on `endpoint`.
    ///
    /// On failure every handle acquired so far has been released by the time
    /// this returns.
    pub fn create(
        endpoint: &Endpoint,
        direction: Direction,
        config: &StreamConfiguration,
    ) -> Result<Self, StreamError> {
        config.validate()?;
        if config.loopback && (direction != Direction::Capture || endpoint.direction() != Direction::Render) {
            return Err(StreamError::InvalidArgument(
                "loopback capture requires a render endpoint".into(),
            ));
        }

        let endpoint = endpoint.clone();
        let format = config.format;

        let mut client = endpoint
            .device()
            .activate()
            .map_err(|e| StreamError::negotiation("activate", e))?;

        client
            .initialize(&EngineParams {
                format,
                buffer_duration: config.buffer_duration,
                loopback: config.loopback,
            })
            .map_err(|e| StreamError::negotiation("initialize", e))?;

        let buffer_frames = client
            .buffer_size()
            .map_err(|e| StreamError::negotiation("buffer size", e))?;
        if buffer_frames == 0 {
            return Err(StreamError::InitializationFailure(
                "engine assigned an empty buffer".into(),
            ));
        }

        let transfer = match direction {
            Direction::Render => Transfer::Render(
                client
                    .render_transfer()
                    .map_err(|e| StreamError::negotiation("render service", e))?,
            ),
            Direction::Capture => Transfer::Capture(
                client
                    .capture_transfer()
                    .map_err(|e| StreamError::negotiation("capture service", e))?,
            ),
        };

        let id = Uuid::new_v4();
        log::debug!(
            "Stream {} negotiated: {} {} Hz, {} ch, {} bit, {} frame buffer",
            id,
            direction,
            format.sample_rate,
            format.channels,
            format.bits_per_sample,
            buffer_frames
        );

        Ok(Self {
            transfer,
            client,
            endpoint,
            format,
            id,
            direction,
            buffer_frames,
            state: StreamState::Ready,
            diagnostics: StreamDiagnostics::default(),
        })
    }

    /// Start the engine. Returns false if already started or the engine refused.
    pub fn start(&mut self) -> bool {
        if self.state.is_started() {
            return false;
        }
        match self.client.start() {
            Ok(()) => {
                self.state = StreamState::Started;
                log::debug!("Stream {} started", self.id);
                true
            }
            Err(e) => {
                log::warn!("Stream {} failed to start: {}", self.id, e);
                false
            }
        }
    }

    /// Stop the engine. Returns false if not started or the engine refused.
    pub fn stop(&mut self) -> bool {
        if !self.state.is_started() {
            return false;
        }
        match self.client.stop() {
            Ok(()) => {
                self.state = StreamState::Ready;
                log::debug!("Stream {} stopped", self.id);
                true
            }
            Err(e) => {
                log::warn!("Stream {} failed to stop: {}", self.id, e);
                false
            }
        }
    }

    /// Free frames in the engine buffer: buffer size minus padding.
    ///
    /// 0 when the padding query fails.
    pub fn available_frames(&self) -> u32 {
        match self.client.current_padding() {
            Ok(padding) => self.buffer_frames.saturating_sub(padding),
            Err(e) => {
                log::trace!("Stream {} padding query failed: {}", self.id, e);
                0
            }
        }
    }

    /// Copy `frame_count` frames from `samples` into the engine buffer.
    ///
    /// Returns `frame_count`, or 0 on any failure. Never requests more than
    /// `available_frames()`: the engine grants all or nothing.
    pub fn write(&mut self, samples: &[u8], frame_count: u32) -> u32 {
        let result = self.try_write(samples, frame_count);
        self.collapse("write", result)
    }

    /// `write`, keeping the reason for a zero-frame outcome.
    pub fn try_write(&mut self, samples: &[u8], frame_count: u32) -> Result<u32, StreamError> {
        if frame_count == 0 {
            return Err(StreamError::InvalidArgument("frame count must be positive".into()));
        }
        if samples.is_empty() {
            return Err(StreamError::InvalidArgument("sample buffer is empty".into()));
        }
        let bytes = self.format.bytes_for_frames(frame_count);
        if samples.len() < bytes {
            return Err(StreamError::InvalidArgument(format!(
                "{} frames need {} bytes, got {}",
                frame_count,
                bytes,
                samples.len()
            )));
        }
        let Transfer::Render(render) = &mut self.transfer else {
            return Err(StreamError::InvalidArgument("write on a capture stream".into()));
        };

        let region = render.get_buffer(frame_count).map_err(StreamError::from_transfer)?;
        if region.len() < bytes {
            log::warn!(
                "Stream {} engine lent {} bytes for {} frames",
                self.id,
                region.len(),
                frame_count
            );
            // Give the region back untouched.
            let _ = render.release_buffer(0, BufferFlags::NONE);
            return Err(EngineError::InvalidSize.into());
        }
        region[..bytes].copy_from_slice(&samples[..bytes]);
        render
            .release_buffer(frame_count, BufferFlags::NONE)
            .map_err(StreamError::from_transfer)?;

        self.diagnostics.frames_written += frame_count as u64;
        log::trace!("Stream {} wrote {} frames", self.id, frame_count);
        Ok(frame_count)
    }

    /// Queue `frame_count` frames of silence without touching sample memory.
    ///
    /// Returns `frame_count`, or 0 on any failure.
    pub fn write_silence(&mut self, frame_count: u32) -> u32 {
        let result = self.try_write_silence(frame_count);
        self.collapse("silence", result)
    }

    fn try_write_silence(&mut self, frame_count: u32) -> Result<u32, StreamError> {
        if frame_count == 0 {
            return Err(StreamError::InvalidArgument("frame count must be positive".into()));
        }
        let Transfer::Render(render) = &mut self.transfer else {
            return Err(StreamError::InvalidArgument("write on a capture stream".into()));
        };

        render.get_buffer(frame_count).map_err(StreamError::from_transfer)?;
        render
            .release_buffer(frame_count, BufferFlags::SILENT)
            .map_err(StreamError::from_transfer)?;

        self.diagnostics.frames_written += frame_count as u64;
        self.diagnostics.silent_frames += frame_count as u64;
        Ok(frame_count)
    }

    /// Copy up to `max_frames` ready capture frames into `destination`.
    ///
    /// Returns the number of frames delivered; 0 when nothing is ready or on
    /// failure. Frames of the engine packet beyond `max_frames` are dropped.
    pub fn read(&mut self, destination: &mut [u8], max_frames: u32) -> u32 {
        let result = self.try_read(destination, max_frames);
        self.collapse("read", result)
    }

    /// `read`, keeping the reason for a zero-frame outcome. `Ok(0)` means
    /// nothing was ready.
    pub fn try_read(&mut self, destination: &mut [u8], max_frames: u32) -> Result<u32, StreamError> {
        if max_frames == 0 {
            return Err(StreamError::InvalidArgument("max frames must be positive".into()));
        }
        let capacity = self.format.frames_in(destination.len());
        if capacity == 0 {
            return Err(StreamError::InvalidArgument(
                "destination cannot hold a single frame".into(),
            ));
        }
        let Transfer::Capture(capture) = &mut self.transfer else {
            return Err(StreamError::InvalidArgument("read on a render stream".into()));
        };

        let packet = capture.get_buffer().map_err(StreamError::from_transfer)?;
        let reported = packet.frames;
        if reported == 0 {
            return Ok(0);
        }

        let frames = reported
            .min(max_frames)
            .min(u32::try_from(capacity).unwrap_or(u32::MAX));
        let bytes = self.format.bytes_for_frames(frames);
        let flags = packet.flags;
        let silent = flags.contains(BufferFlags::SILENT);

        if silent {
            // Engine memory is undefined during silence.
            destination[..bytes].fill(0);
        } else if packet.data.len() >= bytes {
            destination[..bytes].copy_from_slice(&packet.data[..bytes]);
        } else {
            log::warn!(
                "Stream {} engine lent {} bytes for {} frames",
                self.id,
                packet.data.len(),
                reported
            );
            let _ = capture.release_buffer(reported);
            return Err(EngineError::InvalidSize.into());
        }

        // Always release the full packet; the clamped tail is discarded.
        if let Err(e) = capture.release_buffer(reported) {
            log::warn!("Stream {} failed to release {} capture frames: {}", self.id, reported, e);
        }

        self.diagnostics.frames_read += frames as u64;
        self.diagnostics.dropped_frames += (reported - frames) as u64;
        if silent {
            self.diagnostics.silent_frames += frames as u64;
        }
        if flags.contains(BufferFlags::DATA_DISCONTINUITY) {
            self.diagnostics.discontinuities += 1;
            log::debug!("Stream {} capture discontinuity", self.id);
        }
        if frames < reported {
            log::trace!("Stream {} dropped {} capture frames", self.id, reported - frames);
        }
        Ok(frames)
    }

    /// Frames in the next capture packet; 0 on render streams or failure.
    pub fn next_packet_frames(&self) -> u32 {
        let Transfer::Capture(capture) = &self.transfer else {
            return 0;
        };
        capture.next_packet_size().unwrap_or_else(|e| {
            log::trace!("Stream {} packet size query failed: {}", self.id, e);
            0
        })
    }

    /// Stop (if started) and release everything. Equivalent to dropping.
    pub fn destroy(self) {
        drop(self);
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.format.channels
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.format.bits_per_sample
    }

    /// Engine buffer size in frames, as assigned at negotiation.
    pub fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    pub fn state(&self) -> StreamState {
        self.state
    }

    pub fn is_started(&self) -> bool {
        self.state.is_started()
    }

    pub fn diagnostics(&self) -> &StreamDiagnostics {
        &self.diagnostics
    }

    fn collapse(&mut self, op: &str, result: Result<u32, StreamError>) -> u32 {
        match result {
            Ok(frames) => frames,
            Err(e) => {
                self.diagnostics.failed_transfers += 1;
                if e.is_transient() {
                    log::debug!("Stream {} {}: {}", self.id, op, e);
                } else {
                    log::warn!("Stream {} {} failed: {}", self.id, op, e);
                }
                0
            }
        }
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        if self.state.is_started() {
            if let Err(e) = self.client.stop() {
                log::warn!("Stream {} stop during teardown failed: {}", self.id, e);
            }
            self.state = StreamState::Ready;
        }
        log::debug!("Stream {} released", self.id);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::fake::{EngineCall, FailPoint, FakeDevice, FakeEngine, FakePacket, REGION_FILL};

    const CD: AudioFormat = AudioFormat::new(44100, 2, 16);

    fn endpoint(direction: Direction) -> (Endpoint, FakeEngine) {
        let engine = FakeEngine::new();
        let device = FakeDevice::new("dev-1", "Test Device", direction, engine.clone());
        (device.into_endpoint(), engine)
    }

    fn session(direction: Direction, buffer_frames: u32) -> (StreamSession, FakeEngine) {
        let (endpoint, engine) = endpoint(direction);
        engine.set_buffer_frames(buffer_frames);
        let session = StreamSession::create(&endpoint, direction, &StreamConfiguration::new(CD)).unwrap();
        (session, engine)
    }

    fn assert_nothing_held(endpoint: &Endpoint, engine: &FakeEngine) {
        assert_eq!(endpoint.ref_count(), 1);
        assert_eq!(engine.live_clients(), 0);
        assert_eq!(engine.live_transfers(), 0);
    }

    // --- construction ---

    #[test]
    fn create_negotiates_shared_one_second_buffer() {
        let (endpoint, engine) = endpoint(Direction::Render);
        let session =
            StreamSession::create(&endpoint, Direction::Render, &StreamConfiguration::new(CD)).unwrap();

        assert_eq!(session.buffer_frames(), 44100);
        assert_eq!(session.sample_rate(), 44100);
        assert_eq!(session.channels(), 2);
        assert_eq!(session.bits_per_sample(), 16);
        assert_eq!(session.direction(), Direction::Render);
        assert_eq!(session.state(), StreamState::Ready);
        assert!(session.endpoint().same_device(&endpoint));
        assert_eq!(endpoint.ref_count(), 2);
        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Activate,
                EngineCall::Initialize {
                    format: CD,
                    buffer_duration: Duration::from_secs(1),
                    loopback: false,
                },
                EngineCall::GetBufferSize,
                EngineCall::GetService(Direction::Render),
            ]
        );
    }

    #[test]
    fn engine_may_assign_a_different_buffer() {
        let (session, _engine) = session(Direction::Render, 48000);
        assert_eq!(session.buffer_frames(), 48000);
    }

    #[test]
    fn capture_session_acquires_only_capture_transfer() {
        let (_session, engine) = session(Direction::Capture, 1000);
        let calls = engine.calls();
        assert!(calls.contains(&EngineCall::GetService(Direction::Capture)));
        assert!(!calls.contains(&EngineCall::GetService(Direction::Render)));
        assert_eq!(engine.live_transfers(), 1);
    }

    #[test]
    fn create_failure_at_every_step_releases_everything() {
        for point in [
            FailPoint::Activate,
            FailPoint::Initialize,
            FailPoint::BufferSize,
            FailPoint::RenderService,
        ] {
            let (endpoint, engine) = endpoint(Direction::Render);
            engine.fail(point);

            let err = StreamSession::create(&endpoint, Direction::Render, &StreamConfiguration::new(CD))
                .err()
                .unwrap();

            assert!(matches!(err, StreamError::InitializationFailure(_)), "{:?}", point);
            assert_nothing_held(&endpoint, &engine);
        }
    }

    #[test]
    fn failed_capture_service_releases_client() {
        let (endpoint, engine) = endpoint(Direction::Capture);
        engine.fail(FailPoint::CaptureService);

        assert!(StreamSession::create(&endpoint, Direction::Capture, &StreamConfiguration::new(CD)).is_err());
        assert_nothing_held(&endpoint, &engine);
        assert_eq!(engine.calls().last(), Some(&EngineCall::ReleaseClient));
    }

    #[test]
    fn empty_engine_buffer_is_a_negotiation_failure() {
        let (endpoint, engine) = endpoint(Direction::Render);
        engine.set_buffer_frames(0);

        let err = StreamSession::create(&endpoint, Direction::Render, &StreamConfiguration::new(CD))
            .err()
            .unwrap();
        assert!(matches!(err, StreamError::InitializationFailure(_)));
        assert_nothing_held(&endpoint, &engine);
    }

    #[test]
    fn invalid_format_is_rejected_before_activation() {
        let (endpoint, engine) = endpoint(Direction::Render);
        let config = StreamConfiguration::new(AudioFormat::new(44100, 0, 16));

        let err = StreamSession::create(&endpoint, Direction::Render, &config).err().unwrap();
        assert!(matches!(err, StreamError::InvalidArgument(_)));
        assert!(engine.calls().is_empty());
        assert_nothing_held(&endpoint, &engine);
    }

    #[test]
    fn loopback_needs_capture_on_render_endpoint() {
        let (capture_endpoint, _) = endpoint(Direction::Capture);
        let config = StreamConfiguration::new(CD).with_loopback(true);
        assert!(matches!(
            StreamSession::create(&capture_endpoint, Direction::Capture, &config),
            Err(StreamError::InvalidArgument(_))
        ));

        let (render_endpoint, engine) = endpoint(Direction::Render);
        assert!(StreamSession::create(&render_endpoint, Direction::Render, &config).is_err());

        let session = StreamSession::create(&render_endpoint, Direction::Capture, &config).unwrap();
        assert_eq!(session.direction(), Direction::Capture);
        assert!(engine.calls().contains(&EngineCall::Initialize {
            format: CD,
            buffer_duration: Duration::from_secs(1),
            loopback: true,
        }));
    }

    #[test]
    fn custom_buffer_duration_is_requested() {
        let (endpoint, engine) = endpoint(Direction::Render);
        let config = StreamConfiguration::new(CD).with_buffer_duration(Duration::from_millis(100));

        let session = StreamSession::create(&endpoint, Direction::Render, &config).unwrap();
        assert_eq!(session.buffer_frames(), 4410);
        assert!(engine.calls().contains(&EngineCall::Initialize {
            format: CD,
            buffer_duration: Duration::from_millis(100),
            loopback: false,
        }));
    }

    #[test]
    fn sessions_have_distinct_ids() {
        let (a, _) = session(Direction::Render, 100);
        let (b, _) = session(Direction::Render, 100);
        assert_ne!(a.id(), b.id());
    }

    // --- start / stop ---

    #[test]
    fn start_twice_is_a_no_op() {
        let (mut session, engine) = session(Direction::Render, 1000);

        assert!(session.start());
        assert!(!session.start());
        assert!(session.is_started());
        assert!(engine.is_running());
        assert_eq!(engine.calls().iter().filter(|c| **c == EngineCall::Start).count(), 1);
    }

    #[test]
    fn stop_when_not_started_is_a_no_op() {
        let (mut session, engine) = session(Direction::Render, 1000);

        assert!(!session.stop());
        assert_eq!(session.state(), StreamState::Ready);
        assert!(!engine.calls().contains(&EngineCall::Stop));
    }

    #[test]
    fn start_stop_cycle() {
        let (mut session, engine) = session(Direction::Capture, 1000);

        assert!(session.start());
        assert!(session.stop());
        assert!(!session.stop());
        assert!(session.start());
        assert!(engine.is_running());
    }

    #[test]
    fn engine_refusing_start_keeps_ready() {
        let (mut session, engine) = session(Direction::Render, 1000);
        engine.fail(FailPoint::Start);

        assert!(!session.start());
        assert_eq!(session.state(), StreamState::Ready);
    }

    #[test]
    fn engine_refusing_stop_keeps_started() {
        let (mut session, engine) = session(Direction::Render, 1000);
        assert!(session.start());
        engine.fail(FailPoint::Stop);

        assert!(!session.stop());
        assert!(session.is_started());
    }

    // --- render ---

    #[test]
    fn available_frames_subtracts_padding() {
        let (session, engine) = session(Direction::Render, 1000);
        assert_eq!(session.available_frames(), 1000);

        engine.set_padding(640);
        assert_eq!(session.available_frames(), 360);
    }

    #[test]
    fn available_frames_is_zero_when_padding_fails() {
        let (session, engine) = session(Direction::Render, 1000);
        engine.fail(FailPoint::Padding);
        assert_eq!(session.available_frames(), 0);
    }

    #[test]
    fn available_frames_never_underflows() {
        let (session, engine) = session(Direction::Render, 1000);
        engine.set_padding(1200);
        assert_eq!(session.available_frames(), 0);
    }

    #[test]
    fn write_512_frames_of_cd_audio() {
        let (mut session, engine) = session(Direction::Render, 1000);
        assert!(session.start());
        assert_eq!(session.available_frames(), 1000);

        let pcm: Vec<u8> = (0..2048u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(session.write(&pcm, 512), 512);

        assert_eq!(engine.rendered(), pcm);
        assert_eq!(engine.padding(), 512);
        assert_eq!(session.available_frames(), 488);
        assert_eq!(session.diagnostics().frames_written, 512);
    }

    #[test]
    fn write_copies_only_the_requested_frames() {
        let (mut session, engine) = session(Direction::Render, 1000);
        let pcm = vec![7u8; 4096];

        assert_eq!(session.write(&pcm, 10), 10);
        assert_eq!(engine.rendered(), vec![7u8; 40]);
    }

    #[test]
    fn write_beyond_available_fails_without_copy() {
        let (mut session, engine) = session(Direction::Render, 1000);
        engine.set_padding(900);
        let pcm = vec![1u8; 101 * 4];

        assert_eq!(session.write(&pcm, 101), 0);
        assert!(engine.rendered().is_empty());
        assert_eq!(engine.padding(), 900);
        assert_eq!(session.diagnostics().failed_transfers, 1);
        assert!(!engine
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::RenderReleaseBuffer { .. })));
    }

    #[test]
    fn try_write_reports_transient_unavailability() {
        let (mut session, engine) = session(Direction::Render, 100);
        engine.set_padding(100);

        let err = session.try_write(&[0u8; 4], 1).unwrap_err();
        assert!(err.is_transient());

        engine.consume(50);
        assert_eq!(session.try_write(&[0u8; 4], 1), Ok(1));
    }

    #[test]
    fn write_rejects_bad_arguments() {
        let (mut session, engine) = session(Direction::Render, 1000);

        assert!(matches!(session.try_write(&[0u8; 4], 0), Err(StreamError::InvalidArgument(_))));
        assert!(matches!(session.try_write(&[], 1), Err(StreamError::InvalidArgument(_))));
        assert!(matches!(session.try_write(&[0u8; 7], 2), Err(StreamError::InvalidArgument(_))));
        assert_eq!(session.write(&[0u8; 4], 0), 0);
        assert!(!engine
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::RenderGetBuffer(_))));
    }

    #[test]
    fn write_commit_failure_returns_zero() {
        let (mut session, engine) = session(Direction::Render, 1000);
        engine.fail(FailPoint::ReleaseBuffer);

        assert_eq!(session.write(&[3u8; 16], 4), 0);
        assert_eq!(session.diagnostics().frames_written, 0);
    }

    #[test]
    fn write_on_capture_stream_is_invalid() {
        let (mut session, _engine) = session(Direction::Capture, 1000);
        assert!(matches!(session.try_write(&[0u8; 4], 1), Err(StreamError::InvalidArgument(_))));
    }

    #[test]
    fn write_silence_commits_with_silent_flag() {
        let (mut session, engine) = session(Direction::Render, 1000);

        assert_eq!(session.write_silence(8), 8);
        assert_eq!(engine.rendered(), vec![0u8; 32]);
        assert!(engine.calls().contains(&EngineCall::RenderReleaseBuffer {
            frames: 8,
            flags: BufferFlags::SILENT,
        }));
        assert_eq!(session.diagnostics().silent_frames, 8);
    }

    #[test]
    fn render_loop_keeps_up_with_playback() {
        let (mut session, engine) = session(Direction::Render, 256);
        assert!(session.start());
        let chunk = vec![9u8; 64 * 4];
        let mut written = 0u32;

        for _ in 0..20 {
            let room = session.available_frames();
            if room >= 64 {
                written += session.write(&chunk, 64);
            }
            engine.consume(48);
        }

        assert_eq!(session.diagnostics().failed_transfers, 0);
        assert_eq!(engine.rendered().len(), written as usize * 4);
        assert!(engine.padding() <= 256);
    }

    // --- capture ---

    #[test]
    fn read_copies_short_packet() {
        let (mut session, engine) = session(Direction::Capture, 1000);
        let data: Vec<u8> = (0..40u8).collect();
        engine.push_packet(FakePacket::audio(data.clone(), 10));

        let mut buf = vec![0xFFu8; 64 * 4];
        assert_eq!(session.read(&mut buf, 64), 10);

        assert_eq!(&buf[..40], data.as_slice());
        assert!(buf[40..].iter().all(|&b| b == 0xFF));
        assert!(engine.calls().contains(&EngineCall::CaptureReleaseBuffer(10)));
        assert_eq!(session.diagnostics().frames_read, 10);
    }

    #[test]
    fn read_zero_fills_silent_packet() {
        let (mut session, engine) = session(Direction::Capture, 1000);
        engine.push_packet(FakePacket::silent(vec![0xAA; 100 * 4], 100));

        let mut buf = vec![0xFFu8; 64 * 4];
        assert_eq!(session.read(&mut buf, 64), 64);

        assert!(buf.iter().all(|&b| b == 0));
        assert_eq!(session.diagnostics().silent_frames, 64);
    }

    #[test]
    fn read_silent_packet_only_zeroes_the_clamped_frames() {
        let (mut session, engine) = session(Direction::Capture, 1000);
        engine.push_packet(FakePacket::silent(Vec::new(), 5));

        let mut buf = vec![0xFFu8; 16 * 4];
        assert_eq!(session.read(&mut buf, 16), 5);

        assert!(buf[..20].iter().all(|&b| b == 0));
        assert!(buf[20..].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn read_clamps_and_releases_the_whole_packet() {
        let (mut session, engine) = session(Direction::Capture, 1000);
        let data: Vec<u8> = (0..400u32).map(|i| i as u8).collect();
        engine.push_packet(FakePacket::audio(data.clone(), 100));
        engine.push_packet(FakePacket::audio(vec![5u8; 8], 2));

        let mut buf = vec![0u8; 30 * 4];
        assert_eq!(session.read(&mut buf, 30), 30);
        assert_eq!(buf.as_slice(), &data[..120]);
        assert!(engine.calls().contains(&EngineCall::CaptureReleaseBuffer(100)));
        assert_eq!(session.diagnostics().dropped_frames, 70);

        // The dropped tail is not delivered later.
        assert_eq!(session.read(&mut buf, 30), 2);
        assert_eq!(&buf[..8], &[5u8; 8]);
    }

    #[test]
    fn read_clamps_to_destination_capacity() {
        let (mut session, engine) = session(Direction::Capture, 1000);
        engine.push_packet(FakePacket::audio(vec![1u8; 40], 10));

        let mut buf = vec![0u8; 3 * 4 + 2];
        assert_eq!(session.read(&mut buf, 10), 3);
        assert_eq!(&buf[12..], &[0u8, 0]);
    }

    #[test]
    fn read_nothing_ready_leaves_destination_untouched() {
        let (mut session, engine) = session(Direction::Capture, 1000);

        let mut buf = vec![0x5Au8; 32];
        assert_eq!(session.read(&mut buf, 8), 0);
        assert_eq!(session.try_read(&mut buf, 8), Ok(0));

        assert!(buf.iter().all(|&b| b == 0x5A));
        assert!(!engine
            .calls()
            .iter()
            .any(|c| matches!(c, EngineCall::CaptureReleaseBuffer(_))));
        assert_eq!(session.diagnostics().failed_transfers, 0);
    }

    #[test]
    fn read_failure_returns_zero() {
        let (mut session, engine) = session(Direction::Capture, 1000);
        engine.push_packet(FakePacket::audio(vec![1u8; 40], 10));
        engine.fail(FailPoint::GetBuffer);

        let mut buf = vec![0x5Au8; 40];
        assert_eq!(session.read(&mut buf, 10), 0);
        assert!(buf.iter().all(|&b| b == 0x5A));
        assert_eq!(session.diagnostics().failed_transfers, 1);

        engine.heal(FailPoint::GetBuffer);
        assert_eq!(session.read(&mut buf, 10), 10);
    }

    #[test]
    fn read_release_failure_still_delivers() {
        let (mut session, engine) = session(Direction::Capture, 1000);
        engine.push_packet(FakePacket::audio(vec![4u8; 8], 2));
        engine.fail(FailPoint::ReleaseBuffer);

        let mut buf = vec![0u8; 8];
        assert_eq!(session.read(&mut buf, 2), 2);
        assert_eq!(buf, vec![4u8; 8]);
    }

    #[test]
    fn read_rejects_bad_arguments() {
        let (mut session, engine) = session(Direction::Capture, 1000);
        engine.push_packet(FakePacket::audio(vec![1u8; 4], 1));

        assert!(matches!(session.try_read(&mut [0u8; 4], 0), Err(StreamError::InvalidArgument(_))));
        assert!(matches!(session.try_read(&mut [0u8; 3], 1), Err(StreamError::InvalidArgument(_))));
        assert_eq!(engine.pending_packets(), 1);
    }

    #[test]
    fn read_on_render_stream_is_invalid() {
        let (mut session, _engine) = session(Direction::Render, 1000);
        assert!(matches!(session.try_read(&mut [0u8; 4], 1), Err(StreamError::InvalidArgument(_))));
        assert_eq!(session.next_packet_frames(), 0);
    }

    #[test]
    fn read_counts_discontinuities() {
        let (mut session, engine) = session(Direction::Capture, 1000);
        engine.push_packet(
            FakePacket::audio(vec![1u8; 4], 1).with_flags(BufferFlags::DATA_DISCONTINUITY),
        );

        let mut buf = vec![0u8; 4];
        assert_eq!(session.read(&mut buf, 1), 1);
        assert_eq!(session.diagnostics().discontinuities, 1);
    }

    #[test]
    fn next_packet_frames_peeks() {
        let (mut session, engine) = session(Direction::Capture, 1000);
        assert_eq!(session.next_packet_frames(), 0);

        engine.push_packet(FakePacket::audio(vec![0u8; 48], 12));
        assert_eq!(session.next_packet_frames(), 12);

        let mut buf = vec![0u8; 48];
        assert_eq!(session.read(&mut buf, 12), 12);
        assert_eq!(session.next_packet_frames(), 0);
    }

    // --- destruction ---

    #[test]
    fn drop_started_session_stops_before_release() {
        let (endpoint, engine) = endpoint(Direction::Render);
        let mut session =
            StreamSession::create(&endpoint, Direction::Render, &StreamConfiguration::new(CD)).unwrap();
        assert!(session.start());
        engine.clear_calls();

        session.destroy();

        assert_eq!(
            engine.calls(),
            vec![
                EngineCall::Stop,
                EngineCall::ReleaseTransfer(Direction::Render),
                EngineCall::ReleaseClient,
            ]
        );
        assert!(!engine.is_running());
        assert_nothing_held(&endpoint, &engine);
    }

    #[test]
    fn drop_ready_session_skips_stop() {
        let (endpoint, engine) = endpoint(Direction::Capture);
        let session =
            StreamSession::create(&endpoint, Direction::Capture, &StreamConfiguration::new(CD)).unwrap();
        engine.clear_calls();

        drop(session);

        assert_eq!(
            engine.calls(),
            vec![EngineCall::ReleaseTransfer(Direction::Capture), EngineCall::ReleaseClient]
        );
        assert_nothing_held(&endpoint, &engine);
    }

    #[test]
    fn drop_proceeds_when_stop_fails() {
        let (endpoint, engine) = endpoint(Direction::Render);
        let mut session =
            StreamSession::create(&endpoint, Direction::Render, &StreamConfiguration::new(CD)).unwrap();
        assert!(session.start());
        engine.fail(FailPoint::Stop);

        drop(session);
        assert_nothing_held(&endpoint, &engine);
    }

    #[test]
    fn destroying_absent_session_is_a_no_op() {
        let session: Option<StreamSession> = None;
        drop(session);
    }

    #[test]
    fn session_is_send() {
        fn assert_send<T: Send>() {}
        assert_send::<StreamSession>();
    }

    #[test]
    fn region_fill_marks_unwritten_bytes() {
        // Sanity check on the fake: a lent region starts as fill bytes.
        let (mut session, engine) = session(Direction::Render, 10);
        let Transfer::Render(render) = &mut session.transfer else {
            unreachable!()
        };
        assert!(render.get_buffer(1).unwrap().iter().all(|&b| b == REGION_FILL));
        render.release_buffer(0, BufferFlags::NONE).unwrap();
        assert!(engine.rendered().is_empty());
    }
}
