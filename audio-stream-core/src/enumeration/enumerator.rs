//! Endpoint discovery over the shared engine connection.
//!
//! Every query fails soft: internal failures are logged and reported as
//! `0` / `None` / an empty list, never raised to the caller.

use std::sync::Arc;

use crate::enumeration::connection::EngineConnection;
use crate::models::audio_models::{Direction, EndpointInfo};
use crate::models::endpoint::Endpoint;

/// Lists active endpoints and resolves defaults.
///
/// Each call takes a fresh snapshot; indices are engine-ordered and may change
/// between calls after hot-plug events.
#[derive(Clone)]
pub struct EndpointEnumerator {
    connection: Arc<EngineConnection>,
}

impl EndpointEnumerator {
    pub fn new(connection: Arc<EngineConnection>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &Arc<EngineConnection> {
        &self.connection
    }

    /// Number of active endpoints for `direction`; 0 on any failure.
    pub fn count(&self, direction: Direction) -> u32 {
        self.snapshot(direction)
            .map(|endpoints| u32::try_from(endpoints.len()).unwrap_or(u32::MAX))
            .unwrap_or(0)
    }

    /// Endpoint at `index` in a fresh snapshot, or `None` when out of range.
    pub fn get(&self, direction: Direction, index: u32) -> Option<Endpoint> {
        self.snapshot(direction)?.into_iter().nth(index as usize)
    }

    /// The default console-role endpoint, if any.
    pub fn default_endpoint(&self, direction: Direction) -> Option<Endpoint> {
        let provider = match self.connection.provider() {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Audio engine unavailable: {}", e);
                return None;
            }
        };
        match provider.default_endpoint(direction) {
            Ok(endpoint) => endpoint,
            Err(e) => {
                log::warn!("Default {} endpoint lookup failed: {}", direction, e);
                None
            }
        }
    }

    /// Friendly name of `endpoint`. `None` means the metadata could not be
    /// read, not that the endpoint is invalid.
    pub fn name(&self, endpoint: &Endpoint) -> Option<String> {
        let store = endpoint
            .device()
            .open_property_store()
            .map_err(|e| log::debug!("OpenPropertyStore failed: {}", e))
            .ok()?;
        store
            .friendly_name()
            .map_err(|e| log::debug!("Friendly name lookup failed: {}", e))
            .ok()
            .flatten()
    }

    /// Endpoint identifier string, best effort.
    pub fn id(&self, endpoint: &Endpoint) -> Option<String> {
        endpoint
            .device()
            .id()
            .map_err(|e| log::debug!("GetId failed: {}", e))
            .ok()
    }

    /// Every active endpoint with its display metadata.
    ///
    /// Endpoints whose id cannot be read are skipped; a missing name falls
    /// back to `"Device {index}"`.
    pub fn list(&self, direction: Direction) -> Vec<EndpointInfo> {
        let Some(endpoints) = self.snapshot(direction) else {
            return Vec::new();
        };

        let default_id = self
            .default_endpoint(direction)
            .and_then(|endpoint| self.id(&endpoint));

        endpoints
            .iter()
            .enumerate()
            .filter_map(|(index, endpoint)| {
                let id = self.id(endpoint)?;
                let name = self
                    .name(endpoint)
                    .unwrap_or_else(|| format!("Device {}", index));
                let is_default = default_id.as_deref() == Some(id.as_str());
                Some(EndpointInfo {
                    id,
                    name,
                    direction,
                    is_default,
                })
            })
            .collect()
    }

    /// Tear down the shared engine connection.
    pub fn shutdown(&self) {
        self.connection.shutdown();
    }

    fn snapshot(&self, direction: Direction) -> Option<Vec<Endpoint>> {
        let provider = match self.connection.provider() {
            Ok(p) => p,
            Err(e) => {
                log::warn!("Audio engine unavailable: {}", e);
                return None;
            }
        };
        match provider.enumerate(direction) {
            Ok(endpoints) => Some(endpoints),
            Err(e) => {
                log::warn!("Enumerating {} endpoints failed: {}", direction, e);
                None
            }
        }
    }
}
