use std::sync::Arc;

use anyhow::Result;
use hub_core::bus::EventBus;
use hub_core::manager::DeviceManager;
use hub_core::protocol::Registry;
use hub_core::storage::{InMemoryStorage, Storage};

use crate::config::{Config, StorageKind};
use crate::state::AppState;

fn build_registry() -> Result<Registry> {
    let registry = Registry::new();
    registry.register("zigbee", "1.0.0", "Zigbee ZNP coordinator", Arc::new(adapter_zigbee::factory))?;
    registry.register("tuya", "1.0.0", "Tuya local TCP devices", Arc::new(adapter_tuya::factory))?;
    registry.register("mqtt", "1.0.0", "Home Assistant MQTT discovery", Arc::new(adapter_mqtt::factory))?;
    registry.register("shelly", "1.0.0", "Shelly Gen1/Gen2 HTTP and JSON-RPC", Arc::new(adapter_shelly::factory))?;
    registry.register("wifi", "1.0.0", "Composite MQTT/Shelly/Tuya WiFi handler", Arc::new(adapter_wifi::factory))?;
    Ok(registry)
}

pub async fn build_state(cfg: &Config) -> Result<AppState> {
    let registry = build_registry()?;
    let bus = EventBus::new();

    let storage: Arc<dyn Storage> = match cfg.storage {
        StorageKind::InMem => Arc::new(InMemoryStorage::new()),
    };

    let manager = DeviceManager::new(registry, bus, storage);

    for (name, config) in &cfg.protocols {
        if let Err(e) = manager.load_protocol(name, config.clone()).await {
            tracing::warn!(protocol = name, error = %e, "failed to load protocol handler");
        }
    }

    Ok(AppState { manager })
}
