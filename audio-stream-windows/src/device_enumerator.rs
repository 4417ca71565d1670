//! Windows audio endpoint enumeration via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` / `IMMDevice` / `IPropertyStore` behind the
//! core seam traits, and owns the process-wide enumerator.

use std::sync::{Arc, OnceLock};

use windows::Win32::Devices::FunctionDiscovery::PKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::UI::Shell::PropertiesSystem::IPropertyStore;

use audio_stream_core::enumeration::connection::EngineConnection;
use audio_stream_core::enumeration::enumerator::EndpointEnumerator;
use audio_stream_core::models::audio_models::Direction;
use audio_stream_core::models::endpoint::Endpoint;
use audio_stream_core::models::error::EngineError;
use audio_stream_core::traits::endpoint_device::{EndpointDevice, PropertyStore};
use audio_stream_core::traits::endpoint_provider::EndpointProvider;
use audio_stream_core::traits::engine_client::EngineClient;

use crate::audio_client::WasapiClient;
use crate::com::{engine_error, ensure_mta, E_NOTFOUND};

static ENUMERATOR: OnceLock<EndpointEnumerator> = OnceLock::new();

/// The process-wide enumerator. The COM connection behind it is made on the
/// first query and reused until `shutdown()`.
pub fn enumerator() -> &'static EndpointEnumerator {
    ENUMERATOR.get_or_init(|| {
        EndpointEnumerator::new(Arc::new(EngineConnection::new(|| {
            Ok(Arc::new(WasapiProvider::new()?) as Arc<dyn EndpointProvider>)
        })))
    })
}

/// Release the shared `IMMDeviceEnumerator`. Call once on the application's
/// shutdown path; endpoints and sessions still alive keep working.
pub fn shutdown() {
    if let Some(enumerator) = ENUMERATOR.get() {
        enumerator.shutdown();
    }
}

fn data_flow(direction: Direction) -> EDataFlow {
    match direction {
        Direction::Render => eRender,
        Direction::Capture => eCapture,
    }
}

/// `IMMDeviceEnumerator` as an endpoint provider.
pub struct WasapiProvider {
    enumerator: IMMDeviceEnumerator,
}

// SAFETY: the enumerator is created in the MTA and MMDevice objects are
// free-threaded.
unsafe impl Send for WasapiProvider {}
unsafe impl Sync for WasapiProvider {}

impl WasapiProvider {
    /// Join the MTA on this thread and create the device enumerator.
    pub fn new() -> Result<Self, EngineError> {
        ensure_mta()?;
        let enumerator: IMMDeviceEnumerator = unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }
            .map_err(|e| engine_error("CoCreateInstance(MMDeviceEnumerator)", e))?;
        Ok(Self { enumerator })
    }
}

impl EndpointProvider for WasapiProvider {
    fn enumerate(&self, direction: Direction) -> Result<Vec<Endpoint>, EngineError> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(data_flow(direction), DEVICE_STATE_ACTIVE)
                .map_err(|e| engine_error("EnumAudioEndpoints", e))?;

            let count = collection
                .GetCount()
                .map_err(|e| engine_error("IMMDeviceCollection::GetCount", e))?;

            let mut endpoints = Vec::with_capacity(count as usize);
            for i in 0..count {
                let device = collection
                    .Item(i)
                    .map_err(|e| engine_error("IMMDeviceCollection::Item", e))?;
                endpoints.push(WasapiDevice::endpoint(device, direction));
            }
            Ok(endpoints)
        }
    }

    fn default_endpoint(&self, direction: Direction) -> Result<Option<Endpoint>, EngineError> {
        match unsafe { self.enumerator.GetDefaultAudioEndpoint(data_flow(direction), eConsole) } {
            Ok(device) => Ok(Some(WasapiDevice::endpoint(device, direction))),
            Err(e) if e.code() == E_NOTFOUND => Ok(None),
            Err(e) => Err(engine_error("GetDefaultAudioEndpoint", e)),
        }
    }
}

/// One `IMMDevice`. Dropping the last endpoint clone releases it.
pub struct WasapiDevice {
    device: IMMDevice,
}

// SAFETY: see `WasapiProvider`.
unsafe impl Send for WasapiDevice {}
unsafe impl Sync for WasapiDevice {}

impl WasapiDevice {
    fn endpoint(device: IMMDevice, direction: Direction) -> Endpoint {
        Endpoint::new(Arc::new(Self { device }), direction)
    }
}

impl EndpointDevice for WasapiDevice {
    fn id(&self) -> Result<String, EngineError> {
        unsafe {
            let id = self.device.GetId().map_err(|e| engine_error("IMMDevice::GetId", e))?;
            let value = String::from_utf16_lossy(id.as_wide());
            CoTaskMemFree(Some(id.0 as *const _));
            Ok(value)
        }
    }

    fn open_property_store(&self) -> Result<Box<dyn PropertyStore>, EngineError> {
        let store = unsafe { self.device.OpenPropertyStore(STGM_READ) }
            .map_err(|e| engine_error("IMMDevice::OpenPropertyStore", e))?;
        Ok(Box::new(WasapiPropertyStore { store }))
    }

    fn activate(&self) -> Result<Box<dyn EngineClient>, EngineError> {
        // Sessions may be negotiated from a thread other than the one that
        // connected the enumerator.
        ensure_mta()?;
        let client: IAudioClient = unsafe { self.device.Activate(CLSCTX_ALL, None) }
            .map_err(|e| engine_error("IMMDevice::Activate", e))?;
        Ok(Box::new(WasapiClient::new(client)))
    }
}

struct WasapiPropertyStore {
    store: IPropertyStore,
}

impl PropertyStore for WasapiPropertyStore {
    /// Read `PKEY_Device_FriendlyName`. An empty property is "no name".
    fn friendly_name(&self) -> Result<Option<String>, EngineError> {
        let value = unsafe { self.store.GetValue(&PKEY_Device_FriendlyName) }
            .map_err(|e| engine_error("IPropertyStore::GetValue", e))?;
        if value.is_empty() {
            return Ok(None);
        }
        let name = value.to_string();
        Ok((!name.is_empty()).then_some(name))
    }
}
