use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{Availability, Device};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// The three callbacks every handler's owner (the Device Manager) wires in
/// before calling `initialize`. Bundled into one cloneable struct so the
/// handler never holds a back-pointer to the manager -- see the design note
/// on callback sprawl.
#[derive(Clone)]
pub struct HandlerEvents {
    pub on_device_discovered: Arc<dyn Fn(Device) + Send + Sync>,
    pub on_device_state: Arc<dyn Fn(&str, &str, serde_json::Value) + Send + Sync>,
    pub on_device_availability: Arc<dyn Fn(&str, Availability) + Send + Sync>,
}

impl HandlerEvents {
    pub fn discovered(&self, device: Device) {
        (self.on_device_discovered)(device);
    }

    pub fn state(&self, device_id: &str, property: &str, value: serde_json::Value) {
        (self.on_device_state)(device_id, property, value);
    }

    pub fn availability(&self, device_id: &str, availability: Availability) {
        (self.on_device_availability)(device_id, availability);
    }
}

/// Common contract every radio/IP backend implements.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    fn name(&self) -> &str;
    fn version(&self) -> &str;
    fn description(&self) -> &str;

    async fn initialize(&self) -> Result<()>;
    async fn shutdown(&self) -> Result<()>;
    /// Cooperative tick; a no-op for purely push-driven backends.
    async fn poll(&self) -> Result<()> {
        Ok(())
    }

    fn state(&self) -> HandlerState;
    fn is_connected(&self) -> bool {
        self.state() == HandlerState::Connected
    }
    fn last_error(&self) -> Option<String>;

    fn supports_discovery(&self) -> bool;
    async fn start_discovery(&self) -> Result<()>;
    async fn stop_discovery(&self) -> Result<()>;
    fn is_discovering(&self) -> bool;

    async fn send_command(&self, device_address: &str, command: &str, params: serde_json::Value) -> Result<()>;

    fn get_status(&self) -> serde_json::Value;
    fn get_known_device_addresses(&self) -> Vec<String>;
}

pub type HandlerFactory =
    Arc<dyn Fn(HandlerEvents, serde_json::Value) -> Result<Arc<dyn ProtocolHandler>> + Send + Sync>;

struct Registration {
    version: String,
    description: String,
    factory: HandlerFactory,
}

/// Maps `name -> factory(events, config) -> handler`. Injected into the
/// Device Manager rather than kept as a process-wide singleton.
#[derive(Default, Clone)]
pub struct Registry {
    entries: Arc<std::sync::Mutex<HashMap<String, Registration>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        name: impl Into<String>,
        version: impl Into<String>,
        description: impl Into<String>,
        factory: HandlerFactory,
    ) -> Result<()> {
        let name = name.into();
        let mut entries = self.entries.lock().unwrap();
        if entries.contains_key(&name) {
            return Err(crate::error::HubError::Internal(format!("protocol handler '{name}' already registered")));
        }
        entries.insert(name, Registration { version: version.into(), description: description.into(), factory });
        Ok(())
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.lock().unwrap().keys().cloned().collect()
    }

    pub fn create(&self, name: &str, events: HandlerEvents, config: serde_json::Value) -> Result<Arc<dyn ProtocolHandler>> {
        let entries = self.entries.lock().unwrap();
        let reg = entries.get(name).ok_or_else(|| crate::error::HubError::NotFound(format!("protocol '{name}'")))?;
        (reg.factory)(events, config)
    }

    pub fn describe(&self, name: &str) -> Option<(String, String)> {
        self.entries.lock().unwrap().get(name).map(|r| (r.version.clone(), r.description.clone()))
    }
}
