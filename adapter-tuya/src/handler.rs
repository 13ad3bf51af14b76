use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use hub_core::error::{HubError, Result};
use hub_core::model::{Capabilities, Device, DeviceId, DeviceType};
use hub_core::protocol::{HandlerEvents, HandlerState, ProtocolHandler};

use crate::device::{TuyaDevice, TuyaDeviceConfig};
use crate::discovery::{TuyaAnnouncement, TuyaDiscovery};

#[derive(Debug, Deserialize)]
struct ConfiguredDevice {
    device_id: String,
    local_key: String,
    ip_address: String,
    #[serde(default)]
    port: Option<u16>,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    name: Option<String>,
}

fn default_version() -> String {
    "3.3".to_string()
}

#[derive(Debug, Deserialize)]
struct TuyaConfig {
    #[serde(default)]
    devices: Vec<ConfiguredDevice>,
}

pub struct TuyaHandler {
    events: HandlerEvents,
    devices: Mutex<HashMap<String, Arc<TuyaDevice>>>,
    device_ids: StdMutex<Vec<String>>,
    state: StdMutex<HandlerState>,
    last_error: StdMutex<Option<String>>,
    discovery: Mutex<TuyaDiscovery>,
    discovering: AtomicBool,
}

impl TuyaHandler {
    pub fn new(events: HandlerEvents, config: Value) -> Result<Arc<Self>> {
        let parsed: TuyaConfig = serde_json::from_value(config).unwrap_or(TuyaConfig { devices: Vec::new() });
        let mut devices = HashMap::new();
        let mut device_ids = Vec::new();
        for entry in parsed.devices {
            let key_bytes = match parse_local_key(&entry.local_key) {
                Ok(k) => k,
                Err(e) => {
                    tracing::warn!(device_id = %entry.device_id, error = %e, "skipping tuya device with bad local_key");
                    continue;
                }
            };
            let mut cfg = TuyaDeviceConfig::new(entry.device_id.clone(), key_bytes, entry.ip_address);
            if let Some(port) = entry.port {
                cfg.port = port;
            }
            cfg.version = entry.version;
            cfg.name = entry.name.unwrap_or_else(|| entry.device_id.clone());
            device_ids.push(entry.device_id.clone());
            devices.insert(entry.device_id.clone(), Arc::new(TuyaDevice::new(cfg)));
        }

        Ok(Arc::new(Self {
            events,
            devices: Mutex::new(devices),
            device_ids: StdMutex::new(device_ids),
            state: StdMutex::new(HandlerState::Disconnected),
            last_error: StdMutex::new(None),
            discovery: Mutex::new(TuyaDiscovery::new()),
            discovering: AtomicBool::new(false),
        }))
    }

    fn device_address(&self, device_id: &str) -> String {
        format!("tuya_{device_id}")
    }
}

fn parse_local_key(hex: &str) -> Result<[u8; 16]> {
    if hex.len() != 32 {
        return Err(HubError::ParseError("tuya local_key must be 32 hex chars".into()));
    }
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|e| HubError::ParseError(e.to_string()))?;
    }
    Ok(out)
}

#[async_trait]
impl ProtocolHandler for TuyaHandler {
    fn name(&self) -> &str {
        "tuya"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn description(&self) -> &str {
        "Tuya local network protocol"
    }

    async fn initialize(&self) -> Result<()> {
        *self.state.lock().unwrap() = HandlerState::Connecting;
        let devices: Vec<(String, Arc<TuyaDevice>)> =
            self.devices.lock().await.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        for (device_id, device) in devices {
            let events = self.events.clone();
            let address = self.device_address(&device_id);
            let state_address = address.clone();
            device
                .set_state_callback(Arc::new(move |property, value| {
                    events.state(&state_address, property, value);
                }))
                .await;

            let events = self.events.clone();
            let avail_address = address.clone();
            device
                .set_availability_callback(Arc::new(move |online| {
                    use hub_core::model::Availability;
                    events.availability(&avail_address, if online { Availability::Online } else { Availability::Offline });
                }))
                .await;

            if let Err(e) = device.connect().await {
                tracing::warn!(device_id = %device_id, error = %e, "tuya device connect failed");
                *self.last_error.lock().unwrap() = Some(e.to_string());
                continue;
            }

            let name = device.config.name.clone();
            let dev = Device::new(DeviceId::from(address.clone()), name, DeviceType::Switch, "tuya", address)
                .with_capabilities(Capabilities::ON_OFF | Capabilities::BRIGHTNESS);
            self.events.discovered(dev);
        }

        *self.state.lock().unwrap() = HandlerState::Connected;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        self.discovery.lock().await.stop();
        for device in self.devices.lock().await.values() {
            device.disconnect().await;
        }
        *self.state.lock().unwrap() = HandlerState::Disconnected;
        Ok(())
    }

    fn state(&self) -> HandlerState {
        *self.state.lock().unwrap()
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    fn supports_discovery(&self) -> bool {
        true
    }

    async fn start_discovery(&self) -> Result<()> {
        self.discovering.store(true, Ordering::SeqCst);
        // Discovery only logs broadcasts; provisioning a local_key still
        // requires the user's Tuya/Smart Life account credentials.
        let mut discovery = self.discovery.lock().await;
        discovery
            .start(Arc::new(|announcement: TuyaAnnouncement| {
                tracing::info!(gw_id = %announcement.gw_id, ip = %announcement.ip, "tuya lan broadcast observed");
            }))
            .await
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.discovering.store(false, Ordering::SeqCst);
        self.discovery.lock().await.stop();
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }

    async fn send_command(&self, device_address: &str, _command: &str, params: Value) -> Result<()> {
        let device_id = device_address.strip_prefix("tuya_").unwrap_or(device_address);
        let devices = self.devices.lock().await;
        let device = devices.get(device_id).ok_or_else(|| HubError::NotFound(format!("tuya device '{device_id}'")))?;
        let Some(obj) = params.as_object() else {
            return Err(HubError::ParseError("command params must be an object".into()));
        };
        for (property, value) in obj {
            device.set_state(property, value).await?;
        }
        Ok(())
    }

    fn get_status(&self) -> Value {
        serde_json::json!({
            "state": format!("{:?}", self.state()),
            "discovering": self.is_discovering(),
        })
    }

    fn get_known_device_addresses(&self) -> Vec<String> {
        self.device_ids.lock().unwrap().iter().map(|id| self.device_address(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_local_key_rejects_wrong_length() {
        assert!(parse_local_key("abcd").is_err());
    }

    #[test]
    fn parse_local_key_parses_valid_hex() {
        let key = parse_local_key("30313233343536373839616263646566").unwrap();
        assert_eq!(&key, b"0123456789abcdef");
    }
}
