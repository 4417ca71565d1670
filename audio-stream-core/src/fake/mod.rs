//! Resource-counting fake engine for exercising sessions without hardware.
//!
//! Every engine call is appended to a call log, live clients and transfer
//! interfaces are counted, and any call can be made to fail. Available to
//! downstream crates with the `fake-engine` feature.

pub mod engine;
pub mod provider;

pub use engine::{EngineCall, FailPoint, FakeEngine, FakePacket, REGION_FILL};
pub use provider::{FakeDevice, FakeProvider};
