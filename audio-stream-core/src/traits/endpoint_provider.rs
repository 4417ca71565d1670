use crate::models::audio_models::Direction;
use crate::models::endpoint::Endpoint;
use crate::models::error::EngineError;

/// Device discovery half of the native stack.
///
/// One provider is shared by every enumerator call through an
/// `EngineConnection`.
pub trait EndpointProvider: Send + Sync {
    /// Snapshot of the currently active endpoints for `direction`, in
    /// engine-defined order.
    fn enumerate(&self, direction: Direction) -> Result<Vec<Endpoint>, EngineError>;

    /// The default endpoint for the console role, or `None` if the system has
    /// no endpoint for that direction.
    fn default_endpoint(&self, direction: Direction) -> Result<Option<Endpoint>, EngineError>;
}
