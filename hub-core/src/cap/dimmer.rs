use crate::model::{Capabilities, Device};

pub struct DimmerDevice<'a> {
    device: &'a mut Device,
}

impl<'a> TryFrom<&'a mut Device> for DimmerDevice<'a> {
    type Error = &'static str;

    fn try_from(device: &'a mut Device) -> Result<Self, Self::Error> {
        if !device.capabilities.contains(Capabilities::ON_OFF | Capabilities::BRIGHTNESS) {
            return Err("device lacks dimmer capabilities");
        }
        Ok(Self { device })
    }
}

impl<'a> DimmerDevice<'a> {
    pub fn is_on(&self) -> bool {
        matches!(self.device.get_property("on"), Some(serde_json::Value::Bool(true)))
    }

    pub fn set_on(&mut self, on: bool) {
        self.device.set_state("on", serde_json::json!(on));
    }

    /// 0-100, clamped.
    pub fn brightness(&self) -> Option<u8> {
        self.device.get_property("brightness").and_then(|v| v.as_u64()).map(|n| n.min(100) as u8)
    }

    pub fn set_brightness(&mut self, pct: u8) {
        self.device.set_state("brightness", serde_json::json!(pct.min(100)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceId, DeviceType};

    #[test]
    fn brightness_clamped_to_100() {
        let mut d = Device::new(DeviceId::from("d1"), "Dimmer", DeviceType::Dimmer, "test", "a");
        let mut dim = DimmerDevice::try_from(&mut d).unwrap();
        dim.set_brightness(250);
        assert_eq!(dim.brightness(), Some(100));
    }
}
