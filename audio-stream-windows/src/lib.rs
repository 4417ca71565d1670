//! # audio-stream-windows
//!
//! Windows WASAPI backend for audio-stream-core.
//!
//! Provides:
//! - `enumerator()` / `shutdown()`: the process-wide endpoint enumerator over
//!   `IMMDeviceEnumerator`, connected on first use
//! - `WasapiProvider` / `WasapiDevice`: MMDevice endpoints behind the core traits
//! - shared-mode `IAudioClient` render and capture transfers
//! - `register_pro_audio_thread()`: MMCSS priority for the caller's audio thread
//!
//! ## Usage
//! ```ignore
//! use audio_stream_core::{Direction, StreamConfiguration, StreamSession, AudioFormat};
//!
//! let endpoint = audio_stream_windows::enumerator()
//!     .default_endpoint(Direction::Render)
//!     .unwrap();
//! let config = StreamConfiguration::new(AudioFormat::new(48000, 2, 16));
//! let mut session = StreamSession::create(&endpoint, Direction::Render, &config)?;
//! session.start();
//! let room = session.available_frames();
//! session.write(&pcm, room);
//! ```

#[cfg(target_os = "windows")]
mod audio_client;
#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod mmcss;

#[cfg(target_os = "windows")]
pub use device_enumerator::{enumerator, shutdown, WasapiDevice, WasapiProvider};
#[cfg(target_os = "windows")]
pub use mmcss::{register_pro_audio_thread, MmcssGuard};
