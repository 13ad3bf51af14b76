use crate::model::{Capabilities, Device};

pub struct SwitchDevice<'a> {
    device: &'a mut Device,
}

impl<'a> TryFrom<&'a mut Device> for SwitchDevice<'a> {
    type Error = &'static str;

    fn try_from(device: &'a mut Device) -> Result<Self, Self::Error> {
        if !device.capabilities.contains(Capabilities::ON_OFF) {
            return Err("device lacks on/off capability");
        }
        Ok(Self { device })
    }
}

impl<'a> SwitchDevice<'a> {
    pub fn is_on(&self) -> bool {
        matches!(self.device.get_property("on"), Some(serde_json::Value::Bool(true)))
    }

    pub fn set_on(&mut self, on: bool) {
        self.device.set_state("on", serde_json::json!(on));
    }

    pub fn toggle(&mut self) {
        let on = self.is_on();
        self.set_on(!on);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceId, DeviceType};

    #[test]
    fn rejects_devices_without_onoff() {
        let mut d = Device::new(DeviceId::from("s1"), "Sensor", DeviceType::TemperatureSensor, "test", "a")
            .with_capabilities(Capabilities::TEMPERATURE);
        assert!(SwitchDevice::try_from(&mut d).is_err());
    }

    #[test]
    fn toggle_flips_state() {
        let mut d = Device::new(DeviceId::from("s1"), "Switch", DeviceType::Switch, "test", "a");
        let mut sw = SwitchDevice::try_from(&mut d).unwrap();
        assert!(!sw.is_on());
        sw.toggle();
        assert!(sw.is_on());
    }
}
