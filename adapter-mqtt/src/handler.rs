use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use serde::Deserialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use hub_core::error::{HubError, Result};
use hub_core::model::{Availability, Device, DeviceId, DeviceType};
use hub_core::protocol::{HandlerEvents, HandlerState, ProtocolHandler};

use crate::discovery::{MqttDiscoveryManager, ProcessedMessage, StateUpdate};

#[derive(Debug, Deserialize)]
struct MqttConfig {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default = "default_prefix")]
    discovery_prefix: String,
    #[serde(default = "default_client_id")]
    client_id: String,
}

fn default_host() -> String {
    "localhost".to_string()
}
fn default_port() -> u16 {
    1883
}
fn default_prefix() -> String {
    "homeassistant".to_string()
}
fn default_client_id() -> String {
    "hub-mqtt".to_string()
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self { host: default_host(), port: default_port(), username: None, password: None, discovery_prefix: default_prefix(), client_id: default_client_id() }
    }
}

pub struct MqttHandler {
    self_weak: Weak<MqttHandler>,
    events: HandlerEvents,
    config: MqttConfig,
    client: Mutex<Option<AsyncClient>>,
    manager: Mutex<MqttDiscoveryManager>,
    known_device_ids: StdMutex<Vec<String>>,
    state: StdMutex<HandlerState>,
    last_error: StdMutex<Option<String>>,
    discovering: AtomicBool,
    poll_task: StdMutex<Option<JoinHandle<()>>>,
}

impl MqttHandler {
    pub fn new(events: HandlerEvents, config: Value) -> Result<Arc<Self>> {
        let parsed: MqttConfig = serde_json::from_value(config).unwrap_or_default();
        let manager = MqttDiscoveryManager::new(parsed.discovery_prefix.clone());
        Ok(Arc::new_cyclic(|self_weak| Self {
            self_weak: self_weak.clone(),
            events,
            config: parsed,
            client: Mutex::new(None),
            manager: Mutex::new(manager),
            known_device_ids: StdMutex::new(Vec::new()),
            state: StdMutex::new(HandlerState::Disconnected),
            last_error: StdMutex::new(None),
            discovering: AtomicBool::new(false),
            poll_task: StdMutex::new(None),
        }))
    }

    fn address(&self, unique_id: &str) -> String {
        format!("mqtt_{unique_id}")
    }

    fn device_type_for_component(component: &str) -> DeviceType {
        match component {
            "light" => DeviceType::Dimmer,
            "switch" => DeviceType::Switch,
            "sensor" | "binary_sensor" => DeviceType::Sensor,
            _ => DeviceType::Unknown,
        }
    }

    async fn handle_processed(self: Arc<Self>, processed: ProcessedMessage) {
        match processed {
            ProcessedMessage::Discovered(config) => {
                let device_type = Self::device_type_for_component(&config.component);
                let address = self.address(&config.unique_id);
                let capabilities = device_type.default_capabilities();
                let device = Device::new(DeviceId::from(address.clone()), config.name.clone(), device_type, "mqtt", address.clone())
                    .with_capabilities(capabilities);

                self.known_device_ids.lock().unwrap().push(config.unique_id.clone());
                self.events.discovered(device);
                tracing::info!(unique_id = %config.unique_id, source = ?config.source, "mqtt device discovered");
            }
            ProcessedMessage::State(unique_id, update) => {
                let address = self.address(&unique_id);
                let (property, value) = match update {
                    StateUpdate::State(v) => ("state", v),
                    StateUpdate::Brightness(v) => ("brightness", v),
                    StateUpdate::ColorTemp(v) => ("color_temp", v),
                    StateUpdate::Rgb(v) => ("rgb", v),
                };
                self.events.state(&address, property, value);
            }
            ProcessedMessage::Availability(unique_id, online) => {
                let address = self.address(&unique_id);
                self.events.availability(&address, if online { Availability::Online } else { Availability::Offline });
            }
            ProcessedMessage::Removed(unique_id) => {
                self.known_device_ids.lock().unwrap().retain(|id| id != &unique_id);
                tracing::info!(unique_id, "mqtt device removed via empty discovery payload");
            }
            ProcessedMessage::Ignored => {}
        }
    }

    fn spawn_event_loop(&self, mut eventloop: rumqttc::EventLoop) {
        let weak = self.self_weak.clone();
        let handle = tokio::spawn(async move {
            loop {
                let Some(this) = weak.upgrade() else { break };
                match eventloop.poll().await {
                    Ok(Event::Incoming(Incoming::Publish(publish))) => {
                        let topic = publish.topic.clone();
                        let payload = String::from_utf8_lossy(&publish.payload).to_string();
                        let processed = this.manager.lock().await.process_message(&topic, &payload);
                        this.handle_processed(processed).await;
                    }
                    Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                        *this.state.lock().unwrap() = HandlerState::Connected;
                        tracing::info!("mqtt broker connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::warn!(error = %e, "mqtt event loop error");
                        *this.state.lock().unwrap() = HandlerState::Error;
                        *this.last_error.lock().unwrap() = Some(e.to_string());
                        for device_id in this.known_device_ids.lock().unwrap().iter() {
                            this.events.availability(&this.address(device_id), Availability::Offline);
                        }
                        tokio::time::sleep(Duration::from_secs(5)).await;
                    }
                }
            }
        });
        *self.poll_task.lock().unwrap() = Some(handle);
    }
}

#[async_trait]
impl ProtocolHandler for MqttHandler {
    fn name(&self) -> &str {
        "mqtt"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn description(&self) -> &str {
        "Home Assistant MQTT discovery (Tasmota, ESPHome, Zigbee2MQTT and compatible devices)"
    }

    async fn initialize(&self) -> Result<()> {
        *self.state.lock().unwrap() = HandlerState::Connecting;

        let mut options = MqttOptions::new(self.config.client_id.clone(), self.config.host.clone(), self.config.port);
        options.set_keep_alive(Duration::from_secs(30));
        if let (Some(user), Some(pass)) = (&self.config.username, &self.config.password) {
            options.set_credentials(user.clone(), pass.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, 100);
        let subscribe_topic = self.manager.lock().await.subscription_topic();
        client.subscribe(subscribe_topic, QoS::AtMostOnce).await.map_err(|e| HubError::ProtocolError(e.to_string()))?;

        *self.client.lock().await = Some(client);
        self.spawn_event_loop(eventloop);
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        if let Some(handle) = self.poll_task.lock().unwrap().take() {
            handle.abort();
        }
        if let Some(client) = self.client.lock().await.take() {
            let _ = client.disconnect().await;
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
        let unique_id = device_address.strip_prefix("mqtt_").unwrap_or(device_address);
        let manager = self.manager.lock().await;
        let config = manager.get_device(unique_id).ok_or_else(|| HubError::NotFound(format!("mqtt device '{unique_id}'")))?;

        let client_guard = self.client.lock().await;
        let client = client_guard.as_ref().ok_or(HubError::TransportClosed)?;

        let (topic, payload) = match command {
            "set_on_off" => {
                let on = params.get("on").and_then(Value::as_bool).ok_or_else(|| HubError::ParseError("missing 'on'".into()))?;
                let payload = if on { config.payload_on.clone() } else { config.payload_off.clone() };
                (config.command_topic.clone(), payload)
            }
            "set_brightness" => {
                let level = params.get("brightness").and_then(Value::as_u64).ok_or_else(|| HubError::ParseError("missing 'brightness'".into()))?;
                (config.brightness_command_topic.clone(), level.to_string())
            }
            "set_color_temp" => {
                let mireds = params.get("color_temp").and_then(Value::as_u64).ok_or_else(|| HubError::ParseError("missing 'color_temp'".into()))?;
                (config.color_temp_command_topic.clone(), mireds.to_string())
            }
            other => return Err(HubError::Unsupported(format!("mqtt command '{other}'"))),
        };

        if topic.is_empty() {
            return Err(HubError::Unsupported(format!("device '{unique_id}' has no command topic for '{command}'")));
        }

        client.publish(topic, QoS::AtLeastOnce, false, payload).await.map_err(|e| HubError::ProtocolError(e.to_string()))?;
        Ok(())
    }

    fn get_status(&self) -> Value {
        serde_json::json!({
            "state": format!("{:?}", self.state()),
            "host": self.config.host,
            "port": self.config.port,
            "discovery_prefix": self.config.discovery_prefix,
        })
    }

    fn get_known_device_addresses(&self) -> Vec<String> {
        self.known_device_ids.lock().unwrap().iter().map(|id| self.address(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_ha_components_to_device_types() {
        assert_eq!(MqttHandler::device_type_for_component("light"), DeviceType::Dimmer);
        assert_eq!(MqttHandler::device_type_for_component("switch"), DeviceType::Switch);
        assert_eq!(MqttHandler::device_type_for_component("sensor"), DeviceType::Sensor);
        assert_eq!(MqttHandler::device_type_for_component("climate"), DeviceType::Unknown);
    }

    #[test]
    fn new_parses_config_with_defaults() {
        let events = HandlerEvents {
            on_device_discovered: Arc::new(|_| {}),
            on_device_state: Arc::new(|_, _, _| {}),
            on_device_availability: Arc::new(|_, _| {}),
        };
        let handler = MqttHandler::new(events, serde_json::json!({"host": "broker.local"})).unwrap();
        assert_eq!(handler.config.host, "broker.local");
        assert_eq!(handler.config.port, 1883);
        assert_eq!(handler.config.discovery_prefix, "homeassistant");
    }
}
