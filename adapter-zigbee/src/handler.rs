//! Bridges the device-agnostic `ProtocolHandler` contract to a Zigbee
//! coordinator: device-class inference, attribute-to-property mapping,
//! and command routing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use async_trait::async_trait;
use serde_json::Value;

use hub_core::error::{HubError, Result};
use hub_core::model::{Availability, Capabilities, Device, DeviceId, DeviceType};
use hub_core::protocol::{HandlerEvents, HandlerState, ProtocolHandler};
use hub_core::zcl;

use crate::coordinator::{ZclAttributeValue, ZigbeeCoordinator, ZigbeeDeviceInfo};
use crate::device_db;

fn ieee_to_device_id(ieee: u64) -> String {
    format!("zigbee_{ieee:016X}")
}

fn device_id_to_ieee(device_id: &str) -> Option<u64> {
    device_id.strip_prefix("zigbee_").and_then(|hex| u64::from_str_radix(hex, 16).ok())
}

fn infer_device_type(info: &ZigbeeDeviceInfo) -> DeviceType {
    if let Some(def) = device_db::lookup(&info.manufacturer, &info.model) {
        if def.device_type != DeviceType::Unknown {
            return def.device_type;
        }
    }

    let clusters: Vec<u16> = info.in_clusters.values().flatten().copied().collect();
    let has = |c: u16| clusters.contains(&c);

    if has(zcl::cluster::IAS_ZONE) {
        DeviceType::MotionSensor
    } else if has(zcl::cluster::OCCUPANCY_SENSING) {
        DeviceType::MotionSensor
    } else if has(zcl::cluster::TEMPERATURE_MEASUREMENT) || has(zcl::cluster::RELATIVE_HUMIDITY) {
        DeviceType::TemperatureSensor
    } else if has(zcl::cluster::COLOR_CONTROL) {
        DeviceType::ColorLight
    } else if has(zcl::cluster::LEVEL_CONTROL) {
        DeviceType::Dimmer
    } else if has(zcl::cluster::ON_OFF) {
        DeviceType::Switch
    } else {
        DeviceType::Unknown
    }
}

/// Maps a ZCL attribute report onto a `(property, value)` pair the Device
/// Manager understands. Returns `None` for attributes with no mapped property.
fn attribute_to_property(attr: &ZclAttributeValue) -> Option<(&'static str, Value)> {
    match (attr.cluster_id, attr.attribute_id) {
        (c, a) if c == zcl::cluster::ON_OFF && a == zcl::attr::onoff::ON_OFF => Some(("on", Value::Bool(attr.as_bool()))),
        (c, a) if c == zcl::cluster::LEVEL_CONTROL && a == zcl::attr::level::CURRENT_LEVEL => {
            let pct = (attr.as_u8() as u32 * 100 / 254).min(100);
            Some(("brightness", Value::from(pct)))
        }
        (c, a) if c == zcl::cluster::COLOR_CONTROL && a == zcl::attr::color::COLOR_TEMP => Some(("color_temp", Value::from(attr.as_u16()))),
        (c, a) if c == zcl::cluster::COLOR_CONTROL && a == zcl::attr::color::CURRENT_HUE => {
            let degrees = (attr.as_u8() as u32 * 360 / 254).min(359);
            Some(("hue", Value::from(degrees)))
        }
        (c, a) if c == zcl::cluster::COLOR_CONTROL && a == zcl::attr::color::CURRENT_SAT => {
            let pct = (attr.as_u8() as u32 * 100 / 254).min(100);
            Some(("saturation", Value::from(pct)))
        }
        (c, a) if c == zcl::cluster::TEMPERATURE_MEASUREMENT && a == zcl::attr::temperature::MEASURED_VALUE => {
            Some(("temperature", serde_json::json!(attr.as_i16() as f64 / 100.0)))
        }
        (c, a) if c == zcl::cluster::RELATIVE_HUMIDITY && a == zcl::attr::humidity::MEASURED_VALUE => {
            Some(("humidity", serde_json::json!(attr.as_u16() as f64 / 100.0)))
        }
        (c, a) if c == zcl::cluster::OCCUPANCY_SENSING && a == zcl::attr::occupancy::OCCUPANCY => Some(("occupancy", Value::Bool(attr.as_u8() & 0x01 != 0))),
        (c, a) if c == zcl::cluster::POWER_CONFIG && a == zcl::attr::power::BATTERY_PERCENT => Some(("battery", Value::from(attr.as_u8() / 2))),
        (c, a) if c == zcl::cluster::IAS_ZONE && a == zcl::attr::ias_zone::ZONE_STATUS => Some(("motion", Value::Bool(attr.as_u16() & 0x01 != 0))),
        _ => None,
    }
}

struct DeviceRecord {
    ieee: u64,
    endpoint: u8,
    device_type: DeviceType,
}

pub struct ZigbeeHandler {
    self_weak: Weak<ZigbeeHandler>,
    events: HandlerEvents,
    coordinator: Arc<ZigbeeCoordinator>,
    state: Mutex<HandlerState>,
    last_error: Mutex<Option<String>>,
    discovering: AtomicBool,
    devices: Mutex<HashMap<String, DeviceRecord>>,
    coordinator_version: Mutex<Option<(u8, u8, u8, u8, u8)>>,
}

impl ZigbeeHandler {
    pub fn new(events: HandlerEvents, config: Value) -> Result<Arc<Self>> {
        let port = config.get("port").and_then(Value::as_str).unwrap_or("/dev/ttyACM0").to_string();
        let baud_rate = config.get("baud_rate").and_then(Value::as_u64).unwrap_or(115200) as u32;
        let coordinator = ZigbeeCoordinator::new(port, baud_rate);
        Ok(Arc::new_cyclic(|self_weak| Self {
            self_weak: self_weak.clone(),
            events,
            coordinator,
            state: Mutex::new(HandlerState::Disconnected),
            last_error: Mutex::new(None),
            discovering: AtomicBool::new(false),
            devices: Mutex::new(HashMap::new()),
            coordinator_version: Mutex::new(None),
        }))
    }

    fn set_state(&self, state: HandlerState) {
        *self.state.lock().unwrap() = state;
    }

    fn record_device(&self, info: &ZigbeeDeviceInfo, device_type: DeviceType) -> String {
        let device_id = ieee_to_device_id(info.ieee_address);
        let endpoint = info.endpoints.first().copied().unwrap_or(1);
        self.devices.lock().unwrap().insert(device_id.clone(), DeviceRecord { ieee: info.ieee_address, endpoint, device_type });
        device_id
    }

    fn wire_coordinator_callbacks(&self) {
        let handler = self.self_weak.clone();
        self.coordinator.set_device_announced_callback(Arc::new(move |nwk_addr, ieee_addr| {
            let Some(handler) = handler.upgrade() else { return };
            tokio::spawn(async move {
                handler.on_device_announced(nwk_addr, ieee_addr).await;
            });
        }));

        let handler = self.self_weak.clone();
        self.coordinator.set_attribute_report_callback(Arc::new(move |nwk_addr, attr| {
            if let Some(handler) = handler.upgrade() {
                handler.on_attribute_report(nwk_addr, attr);
            }
        }));

        let handler = self.self_weak.clone();
        self.coordinator.set_device_left_callback(Arc::new(move |ieee_addr| {
            if let Some(handler) = handler.upgrade() {
                handler.on_device_left(ieee_addr);
            }
        }));
    }

    async fn on_device_announced(self: Arc<Self>, nwk_addr: u16, ieee_addr: u64) {
        let _ = self.coordinator.request_device_info(nwk_addr).await;
        // Give the ZDO a moment to answer ACTIVE_EP/SIMPLE_DESC before reading clusters.
        tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        let Some(info) = self.coordinator.get_device(ieee_addr) else { return };
        let device_type = infer_device_type(&info);
        let device_id = self.record_device(&info, device_type);
        let endpoint = info.endpoints.first().copied().unwrap_or(1);

        let display_name = device_db::lookup(&info.manufacturer, &info.model)
            .map(|d| d.display_name.to_string())
            .unwrap_or_else(|| format!("Zigbee Device {ieee_addr:016X}"));

        let device = Device::new(DeviceId::from(device_id.as_str()), display_name, device_type, "zigbee", format!("0x{nwk_addr:04X}"))
            .with_capabilities(device_type.default_capabilities());
        self.events.discovered(device);
        self.events.availability(&device_id, Availability::Online);

        self.setup_reporting(nwk_addr, endpoint, device_type).await;
    }

    async fn setup_reporting(&self, nwk_addr: u16, endpoint: u8, device_type: DeviceType) {
        let caps = device_type.default_capabilities();
        if caps.contains(Capabilities::ON_OFF) {
            let _ = self
                .coordinator
                .configure_reporting(nwk_addr, endpoint, zcl::cluster::ON_OFF, zcl::attr::onoff::ON_OFF, zcl::datatype::BOOLEAN, 1, 3600, &[])
                .await;
        }
        if caps.contains(Capabilities::TEMPERATURE) {
            let _ = self
                .coordinator
                .configure_reporting(
                    nwk_addr,
                    endpoint,
                    zcl::cluster::TEMPERATURE_MEASUREMENT,
                    zcl::attr::temperature::MEASURED_VALUE,
                    zcl::datatype::INT16,
                    60,
                    3600,
                    &[0x64, 0x00],
                )
                .await;
        }
    }

    fn on_attribute_report(&self, nwk_addr: u16, attr: &ZclAttributeValue) {
        let Some(info) = self.coordinator.get_device_by_nwk_addr(nwk_addr) else { return };
        let device_id = ieee_to_device_id(info.ieee_address);
        if let Some((property, value)) = attribute_to_property(attr) {
            self.events.state(&device_id, property, value);
        }
    }

    fn on_device_left(&self, ieee_addr: u64) {
        let device_id = ieee_to_device_id(ieee_addr);
        self.devices.lock().unwrap().remove(&device_id);
        self.events.availability(&device_id, Availability::Offline);
    }

    fn device_record(&self, device_address: &str) -> Result<(u16, u8)> {
        let ieee = device_id_to_ieee(device_address).ok_or_else(|| HubError::NotFound(device_address.to_string()))?;
        let info = self.coordinator.get_device(ieee).ok_or_else(|| HubError::NotFound(device_address.to_string()))?;
        let endpoint = self.devices.lock().unwrap().get(device_address).map(|r| r.endpoint).unwrap_or(1);
        Ok((info.network_address, endpoint))
    }
}

#[async_trait]
impl ProtocolHandler for ZigbeeHandler {
    fn name(&self) -> &str {
        "zigbee"
    }

    fn version(&self) -> &str {
        "1.0.0"
    }

    fn description(&self) -> &str {
        "Zigbee protocol handler via a Z-Stack ZNP coordinator"
    }

    async fn initialize(&self) -> Result<()> {
        self.set_state(HandlerState::Connecting);
        self.wire_coordinator_callbacks();
        let result = async {
            self.coordinator.initialize().await?;
            *self.coordinator_version.lock().unwrap() = Some(self.coordinator.get_version().await?);
            self.coordinator.start_network().await?;
            if !self.coordinator.is_network_up() {
                return Err(HubError::Timeout);
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {
                self.set_state(HandlerState::Connected);
                Ok(())
            }
            Err(e) => {
                *self.last_error.lock().unwrap() = Some(e.to_string());
                self.set_state(HandlerState::Error);
                Err(e)
            }
        }
    }

    async fn shutdown(&self) -> Result<()> {
        self.coordinator.shutdown().await;
        self.set_state(HandlerState::Disconnected);
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
        self.coordinator.permit_join(60).await?;
        self.discovering.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop_discovery(&self) -> Result<()> {
        self.coordinator.permit_join(0).await?;
        self.discovering.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_discovering(&self) -> bool {
        self.discovering.load(Ordering::SeqCst)
    }

    async fn send_command(&self, device_address: &str, command: &str, params: Value) -> Result<()> {
        let (nwk_addr, endpoint) = self.device_record(device_address)?;
        match command {
            "set_on_off" => {
                let on = params.get("on").and_then(Value::as_bool).unwrap_or(false);
                self.coordinator.set_on_off(nwk_addr, endpoint, on).await
            }
            "set_brightness" => {
                let pct = params.get("brightness").and_then(Value::as_u64).unwrap_or(0).min(100) as u32;
                let level = (pct * 254 / 100) as u8;
                self.coordinator.set_level(nwk_addr, endpoint, level, 10).await
            }
            "set_color_temp" => {
                let mireds = params.get("color_temp").and_then(Value::as_u64).unwrap_or(370) as u16;
                self.coordinator.set_color_temp(nwk_addr, endpoint, mireds, 10).await
            }
            "set_color_hsv" => {
                let hue_deg = params.get("hue").and_then(Value::as_u64).unwrap_or(0).min(359) as u32;
                let sat_pct = params.get("saturation").and_then(Value::as_u64).unwrap_or(0).min(100) as u32;
                let hue = (hue_deg * 254 / 360) as u8;
                let sat = (sat_pct * 254 / 100) as u8;
                self.coordinator.set_hue_sat(nwk_addr, endpoint, hue, sat, 10).await
            }
            other => Err(HubError::Unsupported(format!("zigbee command '{other}'"))),
        }
    }

    fn get_status(&self) -> Value {
        let version = self.coordinator_version.lock().unwrap().map(|(transport_rev, product_id, major, minor, maint)| {
            serde_json::json!({
                "transport_rev": transport_rev,
                "product_id": product_id,
                "major_release": major,
                "minor_release": minor,
                "maint_release": maint,
            })
        });
        serde_json::json!({
            "connected": self.is_connected(),
            "network_up": self.coordinator.is_network_up(),
            "pan_id": self.coordinator.pan_id(),
            "channel": self.coordinator.channel(),
            "device_count": self.coordinator.device_count(),
            "discovering": self.is_discovering(),
            "coordinator_version": version,
        })
    }

    fn get_known_device_addresses(&self) -> Vec<String> {
        self.devices.lock().unwrap().keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ieee_device_id_round_trips() {
        let id = ieee_to_device_id(0x00124B001F23A456);
        assert_eq!(id, "zigbee_00124B001F23A456");
        assert_eq!(device_id_to_ieee(&id), Some(0x00124B001F23A456));
    }

    #[test]
    fn attribute_maps_onoff_to_property() {
        let attr = ZclAttributeValue { cluster_id: zcl::cluster::ON_OFF, endpoint: 1, attribute_id: zcl::attr::onoff::ON_OFF, data_type: zcl::datatype::BOOLEAN, data: vec![1] };
        let (prop, value) = attribute_to_property(&attr).unwrap();
        assert_eq!(prop, "on");
        assert_eq!(value, Value::Bool(true));
    }

    #[test]
    fn infer_device_type_prefers_color_over_level() {
        let mut info = ZigbeeDeviceInfo::default();
        info.in_clusters.insert(1, vec![zcl::cluster::ON_OFF, zcl::cluster::LEVEL_CONTROL, zcl::cluster::COLOR_CONTROL]);
        assert_eq!(infer_device_type(&info), DeviceType::ColorLight);
    }

    #[test]
    fn infer_device_type_falls_back_to_switch() {
        let mut info = ZigbeeDeviceInfo::default();
        info.in_clusters.insert(1, vec![zcl::cluster::ON_OFF]);
        assert_eq!(infer_device_type(&info), DeviceType::Switch);
    }
}
