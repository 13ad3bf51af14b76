use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::Result;
use crate::model::DeviceType;

#[derive(Debug, Clone)]
pub struct StoredDevice {
    pub id: String,
    pub name: String,
    pub device_type: DeviceType,
    pub protocol: String,
    pub address: String,
    pub room: Option<String>,
    pub config: serde_json::Value,
    pub state: serde_json::Value,
}

/// Persistence sink consumed, not owned, by the core (see EXTERNAL
/// INTERFACES). Durable backing stores are out of scope; this repository
/// ships only the trait and an in-memory reference implementation used by
/// the daemon's default run mode and by tests.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn persist_device(
        &self,
        id: &str,
        name: &str,
        device_type: DeviceType,
        protocol: &str,
        address: &str,
        room: Option<&str>,
        config: serde_json::Value,
    ) -> Result<()>;

    async fn persist_state(&self, id: &str, property: &str, value: serde_json::Value, ts: DateTime<Utc>) -> Result<()>;

    async fn load_devices(&self) -> Result<Vec<StoredDevice>>;
}

#[derive(Default)]
struct Inner {
    devices: HashMap<String, StoredDevice>,
}

#[derive(Default)]
pub struct InMemoryStorage {
    inner: RwLock<Inner>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn persist_device(
        &self,
        id: &str,
        name: &str,
        device_type: DeviceType,
        protocol: &str,
        address: &str,
        room: Option<&str>,
        config: serde_json::Value,
    ) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        let entry = inner.devices.entry(id.to_string()).or_insert_with(|| StoredDevice {
            id: id.to_string(),
            name: name.to_string(),
            device_type,
            protocol: protocol.to_string(),
            address: address.to_string(),
            room: room.map(str::to_string),
            config: config.clone(),
            state: serde_json::json!({}),
        });
        entry.name = name.to_string();
        entry.device_type = device_type;
        entry.protocol = protocol.to_string();
        entry.address = address.to_string();
        entry.room = room.map(str::to_string);
        entry.config = config;
        Ok(())
    }

    async fn persist_state(&self, id: &str, property: &str, value: serde_json::Value, _ts: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.write().unwrap();
        if let Some(device) = inner.devices.get_mut(id) {
            if !device.state.is_object() {
                device.state = serde_json::json!({});
            }
            device.state.as_object_mut().unwrap().insert(property.to_string(), value);
        }
        Ok(())
    }

    async fn load_devices(&self) -> Result<Vec<StoredDevice>> {
        Ok(self.inner.read().unwrap().devices.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn persists_device_and_state_round_trip() {
        let storage = InMemoryStorage::new();
        storage
            .persist_device("d1", "Kitchen Switch", DeviceType::Switch, "zigbee", "0x1234", Some("kitchen"), serde_json::json!({}))
            .await
            .unwrap();
        storage.persist_state("d1", "on", serde_json::json!(true), Utc::now()).await.unwrap();

        let loaded = storage.load_devices().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Kitchen Switch");
        assert_eq!(loaded[0].state["on"], serde_json::json!(true));
    }
}
