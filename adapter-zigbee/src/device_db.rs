//! Static manufacturer/model lookup used when cluster inspection alone
//! can't tell a plug from a bulb. Callers fall back to cluster-based
//! inference (see `handler::infer_device_type`) when nothing matches here.

use hub_core::model::DeviceType;

#[derive(Debug, Clone)]
pub struct DeviceDefinition {
    pub manufacturer: &'static str,
    pub model: &'static str,
    pub display_name: &'static str,
    pub device_type: DeviceType,
}

const KNOWN_DEVICES: &[DeviceDefinition] = &[
    DeviceDefinition { manufacturer: "TexasInstruments", model: "ZNP-LAUNCHXL", display_name: "Dev Board Coordinator", device_type: DeviceType::Unknown },
    DeviceDefinition { manufacturer: "IKEA of Sweden", model: "TRADFRI bulb E27 WS opal 980lm", display_name: "IKEA Tradfri Bulb", device_type: DeviceType::ColorLight },
    DeviceDefinition { manufacturer: "Philips", model: "LCT015", display_name: "Hue White and Color Ambiance", device_type: DeviceType::ColorLight },
    DeviceDefinition { manufacturer: "LUMI", model: "lumi.sensor_motion.aq2", display_name: "Aqara Motion Sensor", device_type: DeviceType::MotionSensor },
    DeviceDefinition { manufacturer: "LUMI", model: "lumi.weather", display_name: "Aqara Temperature/Humidity Sensor", device_type: DeviceType::TemperatureSensor },
    DeviceDefinition { manufacturer: "LUMI", model: "lumi.plug", display_name: "Aqara Smart Plug", device_type: DeviceType::Outlet },
];

pub fn lookup(manufacturer: &str, model: &str) -> Option<&'static DeviceDefinition> {
    KNOWN_DEVICES.iter().find(|d| d.manufacturer == manufacturer && d.model == model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_known_device() {
        let d = lookup("LUMI", "lumi.sensor_motion.aq2").unwrap();
        assert_eq!(d.device_type, DeviceType::MotionSensor);
    }

    #[test]
    fn lookup_returns_none_for_unknown() {
        assert!(lookup("Nobody", "nothing").is_none());
    }
}
