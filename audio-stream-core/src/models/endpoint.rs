use std::fmt;
use std::sync::Arc;

use super::audio_models::Direction;
use crate::traits::endpoint_device::EndpointDevice;

/// Reference-counted capability to activate a session on one device.
///
/// Cloning takes another reference on the underlying device; dropping the
/// last clone releases it. Endpoints come from an enumeration snapshot and
/// are not guaranteed to stay live across hot-plug events.
#[derive(Clone)]
pub struct Endpoint {
    device: Arc<dyn EndpointDevice>,
    direction: Direction,
}

impl Endpoint {
    pub fn new(device: Arc<dyn EndpointDevice>, direction: Direction) -> Self {
        Self { device, direction }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn device(&self) -> &dyn EndpointDevice {
        self.device.as_ref()
    }

    /// Number of live references to the underlying device.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.device)
    }

    /// Whether both handles refer to the same device object.
    pub fn same_device(&self, other: &Endpoint) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.device), Arc::as_ptr(&other.device))
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("id", &self.device.id().ok())
            .field("direction", &self.direction)
            .field("refs", &self.ref_count())
            .finish()
    }
}
