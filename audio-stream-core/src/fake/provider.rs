use std::sync::Arc;

use parking_lot::Mutex;

use super::engine::{FailPoint, FakeEngine};
use crate::models::audio_models::Direction;
use crate::models::endpoint::Endpoint;
use crate::models::error::EngineError;
use crate::traits::endpoint_device::{EndpointDevice, PropertyStore};
use crate::traits::endpoint_provider::EndpointProvider;
use crate::traits::engine_client::EngineClient;

/// A device backed by a `FakeEngine`.
pub struct FakeDevice {
    id: String,
    name: Option<String>,
    direction: Direction,
    engine: FakeEngine,
}

impl FakeDevice {
    pub fn new(id: &str, name: &str, direction: Direction, engine: FakeEngine) -> Self {
        Self {
            id: id.to_string(),
            name: Some(name.to_string()),
            direction,
            engine,
        }
    }

    /// A device whose property store has no friendly name.
    pub fn unnamed(id: &str, direction: Direction, engine: FakeEngine) -> Self {
        Self {
            id: id.to_string(),
            name: None,
            direction,
            engine,
        }
    }

    pub fn engine(&self) -> &FakeEngine {
        &self.engine
    }

    /// Wrap the device in an endpoint handle holding the only reference.
    pub fn into_endpoint(self) -> Endpoint {
        let direction = self.direction;
        Endpoint::new(Arc::new(self), direction)
    }
}

impl EndpointDevice for FakeDevice {
    fn id(&self) -> Result<String, EngineError> {
        self.engine.injected(FailPoint::DeviceId)?;
        Ok(self.id.clone())
    }

    fn open_property_store(&self) -> Result<Box<dyn PropertyStore>, EngineError> {
        self.engine.injected(FailPoint::PropertyStore)?;
        Ok(Box::new(FakePropertyStore {
            name: self.name.clone(),
        }))
    }

    fn activate(&self) -> Result<Box<dyn EngineClient>, EngineError> {
        self.engine.activate()
    }
}

struct FakePropertyStore {
    name: Option<String>,
}

impl PropertyStore for FakePropertyStore {
    fn friendly_name(&self) -> Result<Option<String>, EngineError> {
        Ok(self.name.clone())
    }
}

#[derive(Default)]
struct ProviderState {
    devices: Vec<Arc<FakeDevice>>,
    default_render: Option<String>,
    default_capture: Option<String>,
    fail_enumeration: bool,
}

/// Device list that tests can hot-plug.
#[derive(Default)]
pub struct FakeProvider {
    state: Mutex<ProviderState>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, device: FakeDevice) {
        self.state.lock().devices.push(Arc::new(device));
    }

    pub fn remove(&self, direction: Direction, id: &str) {
        self.state
            .lock()
            .devices
            .retain(|d| !(d.direction == direction && d.id == id));
    }

    pub fn set_default(&self, direction: Direction, id: Option<&str>) {
        let mut state = self.state.lock();
        let id = id.map(str::to_string);
        match direction {
            Direction::Render => state.default_render = id,
            Direction::Capture => state.default_capture = id,
        }
    }

    pub fn fail_enumeration(&self, fail: bool) {
        self.state.lock().fail_enumeration = fail;
    }
}

impl EndpointProvider for FakeProvider {
    fn enumerate(&self, direction: Direction) -> Result<Vec<Endpoint>, EngineError> {
        let state = self.state.lock();
        if state.fail_enumeration {
            return Err(EngineError::Os {
                context: "EnumAudioEndpoints".into(),
                code: 0x8000_4005u32 as i32,
                message: "injected failure".into(),
            });
        }
        Ok(state
            .devices
            .iter()
            .filter(|d| d.direction == direction)
            .map(|d| Endpoint::new(Arc::clone(d) as Arc<dyn EndpointDevice>, direction))
            .collect())
    }

    fn default_endpoint(&self, direction: Direction) -> Result<Option<Endpoint>, EngineError> {
        let state = self.state.lock();
        let default_id = match direction {
            Direction::Render => state.default_render.as_deref(),
            Direction::Capture => state.default_capture.as_deref(),
        };
        let Some(default_id) = default_id else {
            return Ok(None);
        };
        Ok(state
            .devices
            .iter()
            .find(|d| d.direction == direction && d.id == default_id)
            .map(|d| Endpoint::new(Arc::clone(d) as Arc<dyn EndpointDevice>, direction)))
    }
}
