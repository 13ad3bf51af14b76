//! Device Manager (owns protocol handlers and the device set). Bridges
//! handler callbacks to the event bus and the persistence sink; breaks the
//! handler<->manager cycle by handing handlers an opaque `HandlerEvents`
//! sink rather than a back-pointer (see the design note on cyclic
//! references).

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};

use chrono::Utc;

use crate::error::{HubError, Result};
use crate::events::{DeviceAvailabilityEvent, DeviceStateEvent, EVENT_DEVICE_AVAILABILITY_CHANGED, EVENT_DEVICE_DISCOVERED, EVENT_DEVICE_STATE_CHANGED};
use crate::model::{Availability, Device, DeviceId};
use crate::protocol::{HandlerEvents, ProtocolHandler, Registry};
use crate::storage::Storage;
use crate::bus::{Event, EventBus};

struct HandlerEntry {
    handler: Arc<dyn ProtocolHandler>,
}

struct Inner {
    handlers: HashMap<String, HandlerEntry>,
    devices: HashMap<DeviceId, Device>,
}

pub struct DeviceManager {
    self_weak: Weak<DeviceManager>,
    registry: Registry,
    bus: EventBus,
    storage: Arc<dyn Storage>,
    inner: Mutex<Inner>,
}

impl DeviceManager {
    pub fn new(registry: Registry, bus: EventBus, storage: Arc<dyn Storage>) -> Arc<Self> {
        Arc::new_cyclic(|self_weak| Self {
            self_weak: self_weak.clone(),
            registry,
            bus,
            storage,
            inner: Mutex::new(Inner { handlers: HashMap::new(), devices: HashMap::new() }),
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn handler_events(&self) -> HandlerEvents {
        let discovered = self.self_weak.clone();
        let state = self.self_weak.clone();
        let availability_weak = self.self_weak.clone();
        HandlerEvents {
            on_device_discovered: Arc::new(move |device| {
                if let Some(manager) = discovered.upgrade() {
                    manager.on_discovered(device);
                }
            }),
            on_device_state: Arc::new(move |device_id, property, value| {
                if let Some(manager) = state.upgrade() {
                    manager.on_state(device_id, property, value);
                }
            }),
            on_device_availability: Arc::new(move |device_id, availability| {
                if let Some(manager) = availability_weak.upgrade() {
                    manager.on_availability(device_id, availability);
                }
            }),
        }
    }

    /// Instantiates a handler by name via the factory registry, wires its
    /// callbacks back to this manager, and calls `initialize()`.
    pub async fn load_protocol(&self, name: &str, config: serde_json::Value) -> Result<()> {
        let events = self.handler_events();
        let handler = self.registry.create(name, events, config)?;
        handler.initialize().await?;
        self.inner.lock().unwrap().handlers.insert(name.to_string(), HandlerEntry { handler });
        Ok(())
    }

    pub async fn unload_protocol(&self, name: &str) -> Result<()> {
        let handler = {
            let mut inner = self.inner.lock().unwrap();
            inner.handlers.remove(name).map(|e| e.handler)
        };
        if let Some(handler) = handler {
            handler.shutdown().await?;
        }
        Ok(())
    }

    pub fn handler_names(&self) -> Vec<String> {
        self.inner.lock().unwrap().handlers.keys().cloned().collect()
    }

    /// Polls every loaded handler's cooperative tick; a no-op for
    /// push-driven backends.
    pub async fn poll_all(&self) -> Result<()> {
        let handlers: Vec<Arc<dyn ProtocolHandler>> = self.inner.lock().unwrap().handlers.values().map(|e| e.handler.clone()).collect();
        for handler in handlers {
            handler.poll().await?;
        }
        Ok(())
    }

    /// Explicit registration, e.g. for a local/virtual device with no live
    /// protocol handler. Rejects a duplicate id.
    pub fn add_device(&self, device: Device) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.devices.contains_key(&device.id) {
            return Err(HubError::Internal(format!("device '{}' already registered", device.id)));
        }
        inner.devices.insert(device.id.clone(), device);
        Ok(())
    }

    pub fn get_device(&self, id: &DeviceId) -> Option<Device> {
        self.inner.lock().unwrap().devices.get(id).cloned()
    }

    pub fn devices(&self) -> Vec<Device> {
        self.inner.lock().unwrap().devices.values().cloned().collect()
    }

    fn on_discovered(&self, device: Device) {
        let mut inner = self.inner.lock().unwrap();
        if inner.devices.contains_key(&device.id) {
            return;
        }
        let event = Event::new(EVENT_DEVICE_DISCOVERED, serde_json::json!({"device_id": device.id.0, "name": device.name, "protocol": device.protocol}));
        inner.devices.insert(device.id.clone(), device);
        drop(inner);
        self.bus.publish(event);
    }

    fn on_state(&self, device_address: &str, property: &str, value: serde_json::Value) {
        let device_id = {
            let mut inner = self.inner.lock().unwrap();
            let Some(device) = inner.devices.values_mut().find(|d| d.address == device_address) else { return };
            device.set_state(property, value.clone());
            device.id.clone()
        };
        self.publish_state_event(&device_id.0, property, value);
    }

    fn on_availability(&self, device_address: &str, availability: Availability) {
        let device_id = {
            let mut inner = self.inner.lock().unwrap();
            let Some(device) = inner.devices.values_mut().find(|d| d.address == device_address) else { return };
            device.set_availability(availability);
            device.id.clone()
        };
        self.bus.publish(Event::new(
            EVENT_DEVICE_AVAILABILITY_CHANGED,
            serde_json::to_value(DeviceAvailabilityEvent { device_id: device_id.0, availability, ts: Utc::now() }).unwrap(),
        ));
    }

    fn publish_state_event(&self, device_id: &str, property: &str, value: serde_json::Value) {
        self.bus.publish(Event::new(
            EVENT_DEVICE_STATE_CHANGED,
            serde_json::to_value(DeviceStateEvent { device_id: device_id.to_string(), property: property.to_string(), value, ts: Utc::now() }).unwrap(),
        ));
    }

    /// Looks up the device, finds its handler by `device.protocol`, and
    /// issues `send_command(address, "set", {property: value})`. Devices
    /// with no live handler (local/virtual) have their state set directly.
    pub async fn set_device_state(&self, device_id: &DeviceId, property: &str, value: serde_json::Value) -> Result<()> {
        let (protocol, address) = {
            let inner = self.inner.lock().unwrap();
            let device = inner.devices.get(device_id).ok_or_else(|| HubError::NotFound(format!("device '{device_id}'")))?;
            (device.protocol.clone(), device.address.clone())
        };

        let handler = self.inner.lock().unwrap().handlers.get(&protocol).map(|e| e.handler.clone());
        match handler {
            Some(handler) => {
                handler.send_command(&address, "set", serde_json::json!({ property: value.clone() })).await?;
            }
            None => {
                let mut inner = self.inner.lock().unwrap();
                if let Some(device) = inner.devices.get_mut(device_id) {
                    device.set_state(property, value.clone());
                }
            }
        }
        self.publish_state_event(&device_id.0, property, value);
        Ok(())
    }

    /// Sink method: persists every known device and its current property
    /// values through the injected `Storage`. Schema is the collaborator's
    /// concern.
    pub async fn save_all_devices(&self) -> Result<()> {
        let devices = self.devices();
        for device in &devices {
            self.storage
                .persist_device(&device.id.0, &device.name, device.device_type, &device.protocol, &device.address, device.room.as_deref(), serde_json::json!({}))
                .await?;
            for (property, value) in device.properties() {
                self.storage.persist_state(&device.id.0, property, value.clone(), Utc::now()).await?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DeviceType;
    use crate::storage::InMemoryStorage;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn add_device_rejects_duplicate_ids() {
        let manager = DeviceManager::new(Registry::new(), EventBus::new(), Arc::new(InMemoryStorage::new()));
        let device = Device::new(DeviceId::from("d1"), "Test", DeviceType::Switch, "virtual", "addr");
        manager.add_device(device.clone()).unwrap();
        assert!(manager.add_device(device).is_err());
    }

    #[test]
    fn discovery_callback_registers_and_publishes_once() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        bus.subscribe(EVENT_DEVICE_DISCOVERED, Arc::new(move |_| { c.fetch_add(1, Ordering::SeqCst); }));

        let manager = DeviceManager::new(Registry::new(), bus, Arc::new(InMemoryStorage::new()));
        let device = Device::new(DeviceId::from("d1"), "Test", DeviceType::Switch, "zigbee", "0xAABB");
        manager.on_discovered(device.clone());
        manager.on_discovered(device); // duplicate id, no second publish
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(manager.devices().len(), 1);
    }

    #[test]
    fn state_callback_updates_device_and_publishes() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(None));
        let s = seen.clone();
        bus.subscribe(EVENT_DEVICE_STATE_CHANGED, Arc::new(move |e| { *s.lock().unwrap() = Some(e.payload.clone()); }));

        let manager = DeviceManager::new(Registry::new(), bus, Arc::new(InMemoryStorage::new()));
        manager.add_device(Device::new(DeviceId::from("d1"), "Test", DeviceType::Switch, "zigbee", "0xAABB")).unwrap();
        manager.on_state("0xAABB", "on", serde_json::json!(true));

        let device = manager.get_device(&DeviceId::from("d1")).unwrap();
        assert_eq!(device.get_property("on"), Some(&serde_json::json!(true)));
        assert!(seen.lock().unwrap().is_some());
    }

    #[tokio::test]
    async fn set_device_state_without_handler_sets_directly() {
        let manager = DeviceManager::new(Registry::new(), EventBus::new(), Arc::new(InMemoryStorage::new()));
        manager.add_device(Device::new(DeviceId::from("d1"), "Virtual", DeviceType::Switch, "virtual", "addr")).unwrap();
        manager.set_device_state(&DeviceId::from("d1"), "on", serde_json::json!(true)).await.unwrap();
        let device = manager.get_device(&DeviceId::from("d1")).unwrap();
        assert_eq!(device.get_property("on"), Some(&serde_json::json!(true)));
    }
}
