use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;

use hub_core::error::{HubError, Result};
use hub_core::model::{Availability, Device, DeviceId, DeviceType};
use hub_core::protocol::{HandlerEvents, HandlerState, ProtocolHandler};

use crate::client::ShellyClient;
use crate::model::ShellyDeviceInfo;

const POLL_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct ConfiguredHost {
    ip_address: String,
}

#[derive(Debug, Deserialize)]
struct ShellyConfig {
    #[serde(default)]
    hosts: Vec<ConfiguredHost>,
}

struct KnownDevice {
    info: ShellyDeviceInfo,
}

pub struct ShellyHandler {
    events: HandlerEvents,
    client: ShellyClient,
    devices: Mutex<HashMap<String, Arc<KnownDevice>>>,
    known_device_ids: StdMutex<Vec<String>>,
    configured_hosts: Vec<String>,
    state: StdMutex<HandlerState>,
    last_error: StdMutex<Option<String>>,
    discovering: AtomicBool,
}

impl ShellyHandler {
    pub fn new(events: HandlerEvents, config: Value) -> Result<Arc<Self>> {
        let parsed: ShellyConfig = serde_json::from_value(config).unwrap_or(ShellyConfig { hosts: Vec::new() });
        Ok(Arc::new(Self {
            events,
            client: ShellyClient::new(),
            devices: Mutex::new(HashMap::new()),
            known_device_ids: StdMutex::new(Vec::new()),
            configured_hosts: parsed.hosts.into_iter().map(|h| h.ip_address).collect(),
            state: StdMutex::new(HandlerState::Disconnected),
            last_error: StdMutex::new(None),
            discovering: AtomicBool::new(false),
        }))
    }

    fn address(&self, device_id: &str) -> String {
        format!("shelly_{device_id}")
    }

    async fn probe_and_register(&self, ip: &str) {
        let Some(info) = self.client.probe(ip).await else {
            tracing::debug!(ip, "no shelly device responded");
            return;
        };
        let device_id = info.id.clone();
        let device_type = if info.num_outputs > 1 || info.model_code.contains("DM") { DeviceType::Dimmer } else { DeviceType::Switch };
        let capabilities = device_type.default_capabilities();
        let address = self.address(&device_id);
        let dev = Device::new(DeviceId::from(address.clone()), info.display_name().to_string(), device_type, "shelly", address)
            .with_capabilities(capabilities);

        self.known_device_ids.lock().unwrap().push(device_id.clone());
        self.devices.lock().await.insert(device_id, Arc::new(KnownDevice { info }));
        self.events.discovered(dev);
    }

    async fn poll_device(&self, device_id: &str, known: &KnownDevice) {
        match self.client.poll_status(&known.info).await {
            Ok(outputs) => {
                self.events.availability(&self.address(device_id), Availability::Online);
                for output in outputs {
                    let address = self.address(device_id);
                    self.events.state(&address, "on", serde_json::json!(output.is_on));
                    if let Some(brightness) = output.brightness {
                        self.events.state(&address, "brightness", serde_json::json!(brightness));
                    }
                    if let Some(power) = output.power_watts {
                        self.events.state(&address, "power", serde_json::json!(power));
                    }
                    if let Some(energy) = output.energy_kwh {
                        self.events.state(&address, "energy", serde_json::json!(energy));
                    }
                }
            }
            Err(e) => {
                tracing::warn!(device_id, error = %e, "shelly poll failed");
                self.events.availability(&self.address(device_id), Availability::Offline);
            }
        }
    }
}

#[async_trait]
impl ProtocolHandler for ShellyHandler {
    fn name(&self) -> &str {
        "shelly"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn description(&self) -> &str {
        "Shelly Gen1/Gen2 HTTP and JSON-RPC devices"
    }

    async fn initialize(&self) -> Result<()> {
        *self.state.lock().unwrap() = HandlerState::Connecting;
        for ip in &self.configured_hosts {
            self.probe_and_register(ip).await;
        }
        *self.state.lock().unwrap() = HandlerState::Connected;
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        *self.state.lock().unwrap() = HandlerState::Disconnected;
        Ok(())
    }

    /// Cooperative tick: polls every known device at `POLL_INTERVAL`
    /// cadence, driven by the owner's scheduling loop.
    async fn poll(&self) -> Result<()> {
        let devices: Vec<(String, Arc<KnownDevice>)> = self.devices.lock().await.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        for (device_id, known) in devices {
            self.poll_device(&device_id, &known).await;
        }
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
        for ip in &self.configured_hosts {
            self.probe_and_register(ip).await;
        }
        self.discovering.store(false, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.discovering.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }

    async fn send_command(&self, device_address: &str, command: &str, params: Value) -> Result<()> {
        let device_id = device_address.strip_prefix("shelly_").unwrap_or(device_address);
        let devices = self.devices.lock().await;
        let known = devices.get(device_id).ok_or_else(|| HubError::NotFound(format!("shelly device '{device_id}'")))?;
        let channel = params.get("channel").and_then(Value::as_u64).unwrap_or(0) as usize;

        match command {
            "set_on_off" => {
                let on = params.get("on").and_then(Value::as_bool).ok_or_else(|| HubError::ParseError("missing 'on'".into()))?;
                self.client.set_relay(&known.info, channel, on).await
            }
            "set_brightness" => {
                let level = params.get("brightness").and_then(Value::as_u64).ok_or_else(|| HubError::ParseError("missing 'brightness'".into()))? as u8;
                self.client.set_brightness(&known.info, channel, level).await
            }
            other => Err(HubError::Unsupported(format!("shelly command '{other}'"))),
        }
    }

    fn get_status(&self) -> Value {
        serde_json::json!({
            "state": format!("{:?}", self.state()),
            "poll_interval_secs": POLL_INTERVAL.as_secs(),
        })
    }

    fn get_known_device_addresses(&self) -> Vec<String> {
        self.known_device_ids.lock().unwrap().iter().map(|id| self.address(id)).collect()
    }
}
