//! # audio-stream-core
//!
//! Platform-agnostic shared-mode audio stream engine.
//!
//! Provides endpoint discovery, stream negotiation, and the buffer exchange
//! protocol over an abstract audio engine. Platform backends (Windows WASAPI)
//! implement the `EndpointProvider` / `EndpointDevice` / `EngineClient` traits
//! and plug into the generic `EndpointEnumerator` and `StreamSession`.
//!
//! ## Architecture
//!
//! ```text
//! audio-stream-core (this crate)
//! ├── traits/       ← EndpointProvider, EndpointDevice, EngineClient, Render/CaptureTransfer
//! ├── models/       ← AudioFormat, Endpoint, StreamConfiguration, StreamError, etc.
//! ├── enumeration/  ← EngineConnection (lazy, shared), EndpointEnumerator
//! ├── session/      ← StreamSession (negotiation + buffer exchange)
//! └── fake/         ← resource-counting engine for tests (`fake-engine` feature)
//! ```

pub mod enumeration;
pub mod models;
pub mod session;
pub mod traits;

#[cfg(any(test, feature = "fake-engine"))]
pub mod fake;

// Re-export key types at crate root for convenience.
pub use enumeration::connection::EngineConnection;
pub use enumeration::enumerator::EndpointEnumerator;
pub use models::audio_models::{Direction, EndpointInfo, StreamDiagnostics};
pub use models::config::StreamConfiguration;
pub use models::endpoint::Endpoint;
pub use models::error::{EngineError, StreamError};
pub use models::format::AudioFormat;
pub use models::state::StreamState;
pub use session::stream::StreamSession;
pub use traits::endpoint_device::{EndpointDevice, PropertyStore};
pub use traits::endpoint_provider::EndpointProvider;
pub use traits::engine_client::{
    BufferFlags, CapturePacket, CaptureTransfer, EngineClient, EngineParams, RenderTransfer,
};
