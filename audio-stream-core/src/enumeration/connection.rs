use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::EngineError;
use crate::traits::endpoint_provider::EndpointProvider;

type Connector = Box<dyn Fn() -> Result<Arc<dyn EndpointProvider>, EngineError> + Send + Sync>;

/// Lazily established connection to the native device enumerator.
///
/// Contract:
/// - The provider is created on the first `provider()` call and reused by
///   every later call. Concurrent first use connects exactly once.
/// - A failed attempt is not cached; the next call tries again.
/// - `shutdown()` drops the provider. It is called once by the owning
///   application on its shutdown path; a later `provider()` reconnects.
pub struct EngineConnection {
    connector: Connector,
    provider: Mutex<Option<Arc<dyn EndpointProvider>>>,
}

impl EngineConnection {
    pub fn new<F>(connector: F) -> Self
    where
        F: Fn() -> Result<Arc<dyn EndpointProvider>, EngineError> + Send + Sync + 'static,
    {
        Self {
            connector: Box::new(connector),
            provider: Mutex::new(None),
        }
    }

    /// A connection that is already established with `provider`.
    pub fn with_provider(provider: Arc<dyn EndpointProvider>) -> Self {
        let reconnect = Arc::clone(&provider);
        Self {
            connector: Box::new(move || Ok(Arc::clone(&reconnect))),
            provider: Mutex::new(Some(provider)),
        }
    }

    /// The shared provider, connecting on first use.
    pub fn provider(&self) -> Result<Arc<dyn EndpointProvider>, EngineError> {
        // Held across the connect so racing first users wait for one attempt.
        let mut slot = self.provider.lock();
        if let Some(provider) = slot.as_ref() {
            return Ok(Arc::clone(provider));
        }

        let provider = (self.connector)()?;
        log::debug!("audio engine connection established");
        *slot = Some(Arc::clone(&provider));
        Ok(provider)
    }

    pub fn is_connected(&self) -> bool {
        self.provider.lock().is_some()
    }

    /// Drop the shared provider. Endpoints and sessions created earlier keep
    /// their own references and stay usable.
    pub fn shutdown(&self) {
        if self.provider.lock().take().is_some() {
            log::debug!("audio engine connection torn down");
        }
    }
}
