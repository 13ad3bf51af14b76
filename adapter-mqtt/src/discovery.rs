//! Home Assistant MQTT discovery: topic/payload parsing plus the stateful
//! manager that routes subsequent state/availability messages back to the
//! right device by topic.

use std::collections::HashMap;

use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    Unknown,
    Tasmota,
    ESPHome,
    Zigbee2Mqtt,
    Other,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceInfo {
    pub identifiers: String,
    pub manufacturer: String,
    pub model: String,
    pub name: String,
    pub sw_version: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MqttDiscoveryConfig {
    pub unique_id: String,
    pub name: String,
    pub component: String,
    pub node_id: String,
    pub object_id: String,

    pub state_topic: String,
    pub command_topic: String,
    pub availability_topic: String,

    pub payload_on: String,
    pub payload_off: String,
    pub payload_available: String,
    pub payload_not_available: String,

    pub value_template: String,
    pub unit_of_measurement: String,

    pub brightness_command_topic: String,
    pub brightness_state_topic: String,
    pub color_temp_command_topic: String,
    pub color_temp_state_topic: String,
    pub rgb_command_topic: String,
    pub rgb_state_topic: String,

    pub device: DeviceInfo,
    pub source: DiscoverySource,
    pub raw: Value,
}

fn get_str(j: &Value, keys: &[&str]) -> String {
    for key in keys {
        if let Some(s) = j.get(key).and_then(Value::as_str) {
            if !s.is_empty() {
                return s.to_string();
            }
        }
    }
    String::new()
}

fn detect_source(j: &Value) -> DiscoverySource {
    if let Some(sw) = j.get("device").and_then(|d| d.get("sw")).and_then(Value::as_str) {
        if sw.contains("Tasmota") {
            return DiscoverySource::Tasmota;
        }
    }
    if let Some(topic) = j.get("state_topic").and_then(Value::as_str) {
        if topic.contains("tele/") || topic.contains("stat/") {
            return DiscoverySource::Tasmota;
        }
    }
    if let Some(sw) = j.get("device").and_then(|d| d.get("sw_version")).and_then(Value::as_str) {
        if sw.to_lowercase().contains("esphome") {
            return DiscoverySource::ESPHome;
        }
    }
    if j.get("device").and_then(|d| d.get("manufacturer")).is_some() {
        if let Some(via) = j.get("via_device").and_then(Value::as_str) {
            if via.contains("zigbee2mqtt") {
                return DiscoverySource::Zigbee2Mqtt;
            }
        }
    }
    DiscoverySource::Unknown
}

impl MqttDiscoveryConfig {
    /// Parses `<prefix>/<component>/<node_id>[/<object_id>]/config`. Returns
    /// `None` for a topic that doesn't match the discovery shape, invalid
    /// JSON, or an empty object (which signals device removal upstream).
    pub fn parse(topic: &str, payload: &str) -> Option<Self> {
        let parts: Vec<&str> = topic.split('/').collect();
        if parts.len() < 4 || *parts.last().unwrap() != "config" {
            return None;
        }

        let j: Value = serde_json::from_str(payload).ok()?;
        if j.as_object().map(|o| o.is_empty()).unwrap_or(true) {
            return None;
        }

        let component = parts[1].to_string();
        let (node_id, object_id) = if parts.len() == 5 {
            (parts[2].to_string(), parts[3].to_string())
        } else {
            (parts[2].to_string(), String::new())
        };

        let unique_id = get_str(&j, &["unique_id", "uniq_id"]);
        let unique_id = if unique_id.is_empty() { format!("{node_id}_{object_id}") } else { unique_id };
        let name = {
            let n = get_str(&j, &["name"]);
            if n.is_empty() { unique_id.clone() } else { n }
        };

        let mut availability_topic = get_str(&j, &["availability_topic", "avty_t"]);
        if let Some(arr) = j.get("availability").and_then(Value::as_array) {
            for entry in arr {
                if let Some(t) = entry.get("topic").and_then(Value::as_str) {
                    availability_topic = t.to_string();
                    break;
                }
            }
        }

        let device = j.get("device").and_then(Value::as_object).map(|dev| {
            let dev = Value::Object(dev.clone());
            let mut identifiers = get_str(&dev, &["identifiers"]);
            if identifiers.is_empty() {
                if let Some(first) = dev.get("identifiers").and_then(Value::as_array).and_then(|a| a.first()).and_then(Value::as_str) {
                    identifiers = first.to_string();
                }
            }
            if identifiers.is_empty() {
                identifiers = get_str(&dev, &["ids"]);
            }
            DeviceInfo {
                identifiers,
                manufacturer: {
                    let m = get_str(&dev, &["manufacturer", "mf"]);
                    m
                },
                model: get_str(&dev, &["model", "mdl"]),
                name: get_str(&dev, &["name"]),
                sw_version: get_str(&dev, &["sw_version", "sw"]),
            }
        }).unwrap_or_default();

        Some(Self {
            unique_id,
            name,
            component,
            node_id,
            object_id,
            state_topic: get_str(&j, &["state_topic", "stat_t"]),
            command_topic: get_str(&j, &["command_topic", "cmd_t"]),
            availability_topic,
            payload_on: {
                let v = get_str(&j, &["payload_on", "pl_on"]);
                if v.is_empty() { "ON".to_string() } else { v }
            },
            payload_off: {
                let v = get_str(&j, &["payload_off", "pl_off"]);
                if v.is_empty() { "OFF".to_string() } else { v }
            },
            payload_available: {
                let v = get_str(&j, &["payload_available", "pl_avail"]);
                if v.is_empty() { "online".to_string() } else { v }
            },
            payload_not_available: {
                let v = get_str(&j, &["payload_not_available", "pl_not_avail"]);
                if v.is_empty() { "offline".to_string() } else { v }
            },
            value_template: get_str(&j, &["value_template", "val_tpl"]),
            unit_of_measurement: get_str(&j, &["unit_of_measurement", "unit_of_meas"]),
            brightness_command_topic: get_str(&j, &["brightness_command_topic", "bri_cmd_t"]),
            brightness_state_topic: get_str(&j, &["brightness_state_topic", "bri_stat_t"]),
            color_temp_command_topic: get_str(&j, &["color_temp_command_topic", "clr_temp_cmd_t"]),
            color_temp_state_topic: get_str(&j, &["color_temp_state_topic", "clr_temp_stat_t"]),
            rgb_command_topic: get_str(&j, &["rgb_command_topic", "rgb_cmd_t"]),
            rgb_state_topic: get_str(&j, &["rgb_state_topic", "rgb_stat_t"]),
            device,
            source: detect_source(&j),
            raw: j,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StateUpdate {
    State(Value),
    Brightness(Value),
    ColorTemp(Value),
    Rgb(Value),
}

/// Tracks discovered devices and maintains `topic -> unique_id` indices so
/// an incoming message can be routed without re-parsing every config.
#[derive(Default)]
pub struct MqttDiscoveryManager {
    discovery_prefix: String,
    devices: HashMap<String, MqttDiscoveryConfig>,
    state_topic_map: HashMap<String, String>,
    availability_topic_map: HashMap<String, String>,
}

impl MqttDiscoveryManager {
    pub fn new(discovery_prefix: impl Into<String>) -> Self {
        Self { discovery_prefix: discovery_prefix.into(), ..Default::default() }
    }

    pub fn subscription_topic(&self) -> String {
        format!("{}/#", self.discovery_prefix)
    }

    pub fn is_discovery_topic(&self, topic: &str) -> bool {
        topic.starts_with(&format!("{}/", self.discovery_prefix)) && topic.ends_with("/config")
    }

    pub fn get_device(&self, unique_id: &str) -> Option<&MqttDiscoveryConfig> {
        self.devices.get(unique_id)
    }

    pub fn discovered_device_ids(&self) -> Vec<String> {
        self.devices.keys().cloned().collect()
    }

    pub fn remove_device(&mut self, unique_id: &str) {
        if let Some(config) = self.devices.remove(unique_id) {
            for topic in [&config.state_topic, &config.brightness_state_topic, &config.color_temp_state_topic, &config.rgb_state_topic] {
                if !topic.is_empty() {
                    self.state_topic_map.remove(topic);
                }
            }
            if !config.availability_topic.is_empty() {
                self.availability_topic_map.remove(&config.availability_topic);
            }
        }
    }

    /// Returns the discovered config on a fresh discovery, a
    /// `(unique_id, StateUpdate)` on a state message, `(unique_id, bool)`
    /// availability on an availability message, or `None` if the topic is
    /// routed to removal or ignored entirely.
    pub fn process_message(&mut self, topic: &str, payload: &str) -> ProcessedMessage {
        if self.is_discovery_topic(topic) {
            return self.handle_discovery(topic, payload);
        }
        if let Some(unique_id) = self.state_topic_map.get(topic).cloned() {
            return self.handle_state(&unique_id, topic, payload);
        }
        if let Some(unique_id) = self.availability_topic_map.get(topic).cloned() {
            return self.handle_availability(&unique_id, payload);
        }
        ProcessedMessage::Ignored
    }

    fn handle_discovery(&mut self, topic: &str, payload: &str) -> ProcessedMessage {
        let Some(config) = MqttDiscoveryConfig::parse(topic, payload) else {
            if payload.is_empty() || payload == "{}" {
                let parts: Vec<&str> = topic.split('/').collect();
                if parts.len() >= 4 {
                    let possible_id = if parts.len() >= 5 { format!("{}_{}", parts[2], parts[3]) } else { parts[2].to_string() };
                    self.remove_device(&possible_id);
                    return ProcessedMessage::Removed(possible_id);
                }
            }
            return ProcessedMessage::Ignored;
        };

        for t in [&config.state_topic, &config.brightness_state_topic, &config.color_temp_state_topic, &config.rgb_state_topic] {
            if !t.is_empty() {
                self.state_topic_map.insert(t.clone(), config.unique_id.clone());
            }
        }
        if !config.availability_topic.is_empty() {
            self.availability_topic_map.insert(config.availability_topic.clone(), config.unique_id.clone());
        }

        let unique_id = config.unique_id.clone();
        self.devices.insert(unique_id.clone(), config.clone());
        ProcessedMessage::Discovered(config)
    }

    fn handle_state(&self, unique_id: &str, topic: &str, payload: &str) -> ProcessedMessage {
        let Some(config) = self.devices.get(unique_id) else { return ProcessedMessage::Ignored };
        let parsed: Value = serde_json::from_str(payload).unwrap_or_else(|_| Value::String(payload.to_string()));

        let update = if topic == config.state_topic {
            let value = if payload == config.payload_on {
                Value::Bool(true)
            } else if payload == config.payload_off {
                Value::Bool(false)
            } else {
                parsed
            };
            StateUpdate::State(value)
        } else if topic == config.brightness_state_topic {
            StateUpdate::Brightness(parsed)
        } else if topic == config.color_temp_state_topic {
            StateUpdate::ColorTemp(parsed)
        } else if topic == config.rgb_state_topic {
            StateUpdate::Rgb(parsed)
        } else {
            StateUpdate::State(parsed)
        };

        ProcessedMessage::State(unique_id.to_string(), update)
    }

    fn handle_availability(&self, unique_id: &str, payload: &str) -> ProcessedMessage {
        let Some(config) = self.devices.get(unique_id) else { return ProcessedMessage::Ignored };
        ProcessedMessage::Availability(unique_id.to_string(), payload == config.payload_available)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessedMessage {
    Discovered(MqttDiscoveryConfig),
    State(String, StateUpdate),
    Availability(String, bool),
    Removed(String),
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_form_discovery_payload() {
        let payload = serde_json::json!({
            "unique_id": "switch_1",
            "name": "Kitchen Switch",
            "state_topic": "tele/switch1/STATE",
            "command_topic": "cmnd/switch1/POWER",
            "payload_on": "ON",
            "payload_off": "OFF",
            "device": { "sw": "Tasmota 12.1" },
        });
        let config = MqttDiscoveryConfig::parse("homeassistant/switch/switch1/config", &payload.to_string()).unwrap();
        assert_eq!(config.unique_id, "switch_1");
        assert_eq!(config.source, DiscoverySource::Tasmota);
    }

    #[test]
    fn parses_short_form_aliases() {
        let payload = serde_json::json!({
            "uniq_id": "light_1",
            "stat_t": "esp/light1/state",
            "cmd_t": "esp/light1/set",
            "bri_stat_t": "esp/light1/brightness",
            "pl_on": "1",
            "pl_off": "0",
        });
        let config = MqttDiscoveryConfig::parse("homeassistant/light/esp1/light1/config", &payload.to_string()).unwrap();
        assert_eq!(config.unique_id, "light_1");
        assert_eq!(config.state_topic, "esp/light1/state");
        assert_eq!(config.brightness_state_topic, "esp/light1/brightness");
    }

    #[test]
    fn empty_payload_is_not_a_valid_discovery() {
        assert!(MqttDiscoveryConfig::parse("homeassistant/switch/x/config", "{}").is_none());
    }

    #[test]
    fn manager_routes_state_after_discovery() {
        let mut mgr = MqttDiscoveryManager::new("homeassistant");
        let payload = serde_json::json!({
            "unique_id": "sw1",
            "state_topic": "sw1/state",
            "availability_topic": "sw1/avail",
        });
        let discovered = mgr.process_message("homeassistant/switch/sw1/config", &payload.to_string());
        assert!(matches!(discovered, ProcessedMessage::Discovered(_)));

        let state = mgr.process_message("sw1/state", "ON");
        assert_eq!(state, ProcessedMessage::State("sw1".to_string(), StateUpdate::State(Value::Bool(true))));

        let avail = mgr.process_message("sw1/avail", "online");
        assert_eq!(avail, ProcessedMessage::Availability("sw1".to_string(), true));
    }

    #[test]
    fn manager_ignores_unrelated_topics() {
        let mut mgr = MqttDiscoveryManager::new("homeassistant");
        assert_eq!(mgr.process_message("random/topic", "x"), ProcessedMessage::Ignored);
    }
}
