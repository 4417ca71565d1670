use crate::models::error::EngineError;
use crate::traits::engine_client::EngineClient;

/// Display metadata attached to an endpoint.
pub trait PropertyStore {
    /// The endpoint's friendly name, or `None` if the store has no value.
    fn friendly_name(&self) -> Result<Option<String>, EngineError>;
}

/// A physical or virtual audio device as exposed by the native stack.
///
/// Implemented by:
/// - `WasapiDevice` (Windows, wraps `IMMDevice`)
/// - `FakeDevice` (tests)
pub trait EndpointDevice: Send + Sync {
    /// Stable endpoint identifier string.
    fn id(&self) -> Result<String, EngineError>;

    /// Open the device's read-only property store.
    fn open_property_store(&self) -> Result<Box<dyn PropertyStore>, EngineError>;

    /// Activate a fresh, uninitialized engine client on this device.
    fn activate(&self) -> Result<Box<dyn EngineClient>, EngineError>;
}
