use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::Availability;

pub const EVENT_DEVICE_DISCOVERED: &str = "device.discovered";
pub const EVENT_DEVICE_STATE_CHANGED: &str = "device.state.changed";
pub const EVENT_DEVICE_AVAILABILITY_CHANGED: &str = "device.availability.changed";
pub const EVENT_HEARTBEAT: &str = "hub.heartbeat";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HeartbeatEvent {
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceStateEvent {
    pub device_id: String,
    pub property: String,
    pub value: serde_json::Value,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceAvailabilityEvent {
    pub device_id: String,
    pub availability: Availability,
    pub ts: DateTime<Utc>,
}
