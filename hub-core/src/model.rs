use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct DeviceId(pub String);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Unknown,
    Light,
    Switch,
    Outlet,
    Dimmer,
    ColorLight,
    Sensor,
    TemperatureSensor,
    MotionSensor,
    MultiSensor,
    Thermostat,
    Lock,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    #[default]
    Unknown,
    Online,
    Offline,
}

bitflags::bitflags! {
    #[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const ON_OFF           = 0b0000_0000_0001;
        const BRIGHTNESS       = 0b0000_0000_0010;
        const COLOR_TEMPERATURE = 0b0000_0000_0100;
        const COLOR_RGB        = 0b0000_0000_1000;
        const COLOR_HSV        = 0b0000_0001_0000;
        const TEMPERATURE      = 0b0000_0010_0000;
        const HUMIDITY         = 0b0000_0100_0000;
        const MOTION           = 0b0000_1000_0000;
        const OCCUPANCY        = 0b0001_0000_0000;
        const ILLUMINANCE      = 0b0010_0000_0000;
        const BATTERY          = 0b0100_0000_0000;
    }
}

impl DeviceType {
    /// The capability set a freshly constructed device of this type starts
    /// with. Sub-type constructors (see `cap`) may widen this.
    pub fn default_capabilities(self) -> Capabilities {
        use DeviceType::*;
        match self {
            Unknown => Capabilities::empty(),
            Light => Capabilities::ON_OFF,
            Switch | Outlet => Capabilities::ON_OFF,
            Dimmer => Capabilities::ON_OFF | Capabilities::BRIGHTNESS,
            ColorLight => {
                Capabilities::ON_OFF
                    | Capabilities::BRIGHTNESS
                    | Capabilities::COLOR_TEMPERATURE
                    | Capabilities::COLOR_RGB
                    | Capabilities::COLOR_HSV
            }
            Sensor => Capabilities::empty(),
            TemperatureSensor => Capabilities::TEMPERATURE | Capabilities::HUMIDITY | Capabilities::BATTERY,
            MotionSensor => Capabilities::MOTION | Capabilities::OCCUPANCY | Capabilities::BATTERY,
            MultiSensor => {
                Capabilities::MOTION
                    | Capabilities::TEMPERATURE
                    | Capabilities::HUMIDITY
                    | Capabilities::ILLUMINANCE
                    | Capabilities::BATTERY
            }
            Thermostat => Capabilities::TEMPERATURE,
            Lock => Capabilities::ON_OFF,
        }
    }
}

pub type StateCallback = Arc<dyn Fn(&str, &serde_json::Value) + Send + Sync>;

/// A device as the core sees it: one wire-protocol-agnostic record of
/// identity, type, capabilities and an open property store. Owned
/// exclusively by the Device Manager; protocol handlers never hold a Device
/// themselves, only its id and protocol-specific address.
#[derive(Clone)]
pub struct Device {
    pub id: DeviceId,
    pub name: String,
    pub device_type: DeviceType,
    pub protocol: String,
    pub address: String,
    pub room: Option<String>,
    pub availability: Availability,
    pub capabilities: Capabilities,
    properties: BTreeMap<String, serde_json::Value>,
    pub last_seen: DateTime<Utc>,
    on_state: Option<StateCallback>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("device_type", &self.device_type)
            .field("protocol", &self.protocol)
            .field("address", &self.address)
            .field("room", &self.room)
            .field("availability", &self.availability)
            .field("capabilities", &self.capabilities)
            .field("properties", &self.properties)
            .field("last_seen", &self.last_seen)
            .finish()
    }
}

impl Device {
    pub fn new(id: DeviceId, name: impl Into<String>, device_type: DeviceType, protocol: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            device_type,
            protocol: protocol.into(),
            address: address.into(),
            room: None,
            availability: Availability::Unknown,
            capabilities: device_type.default_capabilities(),
            properties: BTreeMap::new(),
            last_seen: Utc::now(),
            on_state: None,
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    pub fn on_state(mut self, cb: StateCallback) -> Self {
        self.on_state = Some(cb);
        self
    }

    pub fn set_state_callback(&mut self, cb: StateCallback) {
        self.on_state = Some(cb);
    }

    pub fn get_property(&self, property: &str) -> Option<&serde_json::Value> {
        self.properties.get(property)
    }

    pub fn properties(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.properties
    }

    /// Updates the property store and always fires the state callback, even
    /// if the value is unchanged — callers that need change-only delivery
    /// filter at the Device Manager, not here.
    pub fn set_state(&mut self, property: impl Into<String>, value: serde_json::Value) {
        let property = property.into();
        self.properties.insert(property.clone(), value.clone());
        self.last_seen = Utc::now();
        if let Some(cb) = &self.on_state {
            cb(&property, &value);
        }
    }

    pub fn set_availability(&mut self, availability: Availability) {
        self.availability = availability;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn set_state_is_observable_to_next_caller() {
        let mut d = Device::new(DeviceId::from("t1"), "Test", DeviceType::Switch, "test", "addr");
        d.set_state("on", serde_json::json!(true));
        assert_eq!(d.get_property("on"), Some(&serde_json::json!(true)));
    }

    #[test]
    fn set_state_always_fires_callback() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let c = calls.clone();
        let mut d = Device::new(DeviceId::from("t1"), "Test", DeviceType::Switch, "test", "addr")
            .on_state(Arc::new(move |p, v| c.lock().unwrap().push((p.to_string(), v.clone()))));
        d.set_state("on", serde_json::json!(true));
        d.set_state("on", serde_json::json!(true)); // idempotent value, callback still fires
        assert_eq!(calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn default_capabilities_follow_type() {
        let d = Device::new(DeviceId::from("d1"), "Dimmer", DeviceType::Dimmer, "test", "addr");
        assert!(d.capabilities.contains(Capabilities::BRIGHTNESS));
        assert!(!d.capabilities.contains(Capabilities::COLOR_RGB));
    }
}
