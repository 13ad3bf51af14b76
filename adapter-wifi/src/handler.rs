//! Composes the three WiFi-facing backends (MQTT discovery, Shelly HTTP,
//! Tuya local TCP) behind a single `ProtocolHandler`, the way the original
//! wifi handler folded all three into one class. Each sub-handler keeps its
//! own address namespace (`mqtt_`/`shelly_`/`tuya_`), so commands and known
//! addresses can be routed and merged without a shared id space.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex as StdMutex;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use adapter_mqtt::MqttHandler;
use adapter_shelly::ShellyHandler;
use adapter_tuya::TuyaHandler;
use hub_core::error::{HubError, Result};
use hub_core::protocol::{HandlerEvents, HandlerState, ProtocolHandler};

pub struct WifiHandler {
    mqtt: Arc<MqttHandler>,
    shelly: Arc<ShellyHandler>,
    tuya: Arc<TuyaHandler>,
    last_error: StdMutex<Option<String>>,
    discovering: AtomicBool,
}

impl WifiHandler {
    pub fn new(events: HandlerEvents, config: Value) -> Result<Arc<Self>> {
        let mqtt_config = config.get("mqtt").cloned().unwrap_or(Value::Null);
        let shelly_config = config.get("shelly").cloned().unwrap_or(Value::Null);
        let tuya_config = config.get("tuya").cloned().unwrap_or(Value::Null);

        let mqtt = MqttHandler::new(events.clone(), mqtt_config)?;
        let shelly = ShellyHandler::new(events.clone(), shelly_config)?;
        let tuya = TuyaHandler::new(events, tuya_config)?;

        Ok(Arc::new(Self { mqtt, shelly, tuya, last_error: StdMutex::new(None), discovering: AtomicBool::new(false) }))
    }

    fn record_partial_failure(&self, backend: &str, err: HubError) {
        tracing::warn!(backend, error = %err, "wifi sub-handler failed to initialize; continuing with the rest");
        *self.last_error.lock().unwrap() = Some(format!("{backend}: {err}"));
    }
}

#[async_trait]
impl ProtocolHandler for WifiHandler {
    fn name(&self) -> &str {
        "wifi"
    }
    fn version(&self) -> &str {
        "1.0.0"
    }
    fn description(&self) -> &str {
        "Composite WiFi handler: MQTT discovery, Shelly HTTP/RPC, Tuya local TCP"
    }

    /// Initializes every backend independently; a backend failing to
    /// connect does not stop the others from starting (S2/S4 partial
    /// failure tolerance).
    async fn initialize(&self) -> Result<()> {
        if let Err(e) = self.mqtt.initialize().await {
            self.record_partial_failure("mqtt", e);
        }
        if let Err(e) = self.shelly.initialize().await {
            self.record_partial_failure("shelly", e);
        }
        if let Err(e) = self.tuya.initialize().await {
            self.record_partial_failure("tuya", e);
        }
        Ok(())
    }

    async fn shutdown(&self) -> Result<()> {
        let _ = self.mqtt.shutdown().await;
        let _ = self.shelly.shutdown().await;
        let _ = self.tuya.shutdown().await;
        Ok(())
    }

    /// Drives Shelly's cooperative poll; MQTT and Tuya are push-driven and
    /// no-op here.
    async fn poll(&self) -> Result<()> {
        self.shelly.poll().await?;
        self.mqtt.poll().await?;
        self.tuya.poll().await?;
        Ok(())
    }

    fn state(&self) -> HandlerState {
        let states = [self.mqtt.state(), self.shelly.state(), self.tuya.state()];
        if states.iter().any(|s| *s == HandlerState::Connected) {
            HandlerState::Connected
        } else if states.iter().any(|s| *s == HandlerState::Connecting) {
            HandlerState::Connecting
        } else if states.iter().all(|s| *s == HandlerState::Error) {
            HandlerState::Error
        } else {
            HandlerState::Disconnected
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.lock().unwrap().clone()
    }

    fn supports_discovery(&self) -> bool {
        true
    }

    async fn start_discovery(&self) -> Result<()> {
        self.discovering.store(true, Ordering::SeqCst);
        let _ = self.mqtt.start_discovery().await;
        let _ = self.shelly.start_discovery().await;
        let _ = self.tuya.start_discovery().await;
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.discovering.store(false, Ordering::SeqCst);
        let _ = self.mqtt.stop_discovery().await;
        let _ = self.shelly.stop_discovery().await;
        let _ = self.tuya.stop_discovery().await;
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }

    /// Dispatches by the `mqtt_`/`shelly_`/`tuya_` address prefix each
    /// backend assigns its own devices.
    async fn send_command(&self, device_address: &str, command: &str, params: Value) -> Result<()> {
        if device_address.starts_with("mqtt_") {
            self.mqtt.send_command(device_address, command, params).await
        } else if device_address.starts_with("shelly_") {
            self.shelly.send_command(device_address, command, params).await
        } else if device_address.starts_with("tuya_") {
            self.tuya.send_command(device_address, command, params).await
        } else {
            Err(HubError::NotFound(format!("wifi device '{device_address}' has no recognized backend prefix")))
        }
    }

    fn get_status(&self) -> Value {
        serde_json::json!({
            "state": format!("{:?}", self.state()),
            "mqtt": self.mqtt.get_status(),
            "shelly": self.shelly.get_status(),
            "tuya": self.tuya.get_status(),
        })
    }

    fn get_known_device_addresses(&self) -> Vec<String> {
        let mut addresses = self.mqtt.get_known_device_addresses();
        addresses.extend(self.shelly.get_known_device_addresses());
        addresses.extend(self.tuya.get_known_device_addresses());
        addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_events() -> HandlerEvents {
        HandlerEvents {
            on_device_discovered: Arc::new(|_| {}),
            on_device_state: Arc::new(|_, _, _| {}),
            on_device_availability: Arc::new(|_, _| {}),
        }
    }

    #[test]
    fn dispatches_send_command_by_address_prefix() {
        let handler = WifiHandler::new(noop_events(), Value::Null).unwrap();
        assert_eq!(handler.get_known_device_addresses().len(), 0);
    }

    #[tokio::test]
    async fn unrecognized_address_prefix_is_rejected() {
        let handler = WifiHandler::new(noop_events(), Value::Null).unwrap();
        let result = handler.send_command("zigbee_AABB", "set_on_off", serde_json::json!({"on": true})).await;
        assert!(matches!(result, Err(HubError::NotFound(_))));
    }
}
