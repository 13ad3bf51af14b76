use crate::model::{Capabilities, Device};

pub struct TemperatureSensor<'a> {
    device: &'a mut Device,
}

impl<'a> TryFrom<&'a mut Device> for TemperatureSensor<'a> {
    type Error = &'static str;

    fn try_from(device: &'a mut Device) -> Result<Self, Self::Error> {
        if !device.capabilities.contains(Capabilities::TEMPERATURE) {
            return Err("device lacks temperature capability");
        }
        Ok(Self { device })
    }
}

impl<'a> TemperatureSensor<'a> {
    /// Celsius.
    pub fn temperature(&self) -> Option<f64> {
        self.device.get_property("temperature").and_then(|v| v.as_f64())
    }

    pub fn set_temperature(&mut self, celsius: f64) {
        self.device.set_state("temperature", serde_json::json!(celsius));
    }

    pub fn humidity(&self) -> Option<f64> {
        self.device.get_property("humidity").and_then(|v| v.as_f64())
    }

    pub fn set_humidity(&mut self, pct: f64) -> Result<(), &'static str> {
        if !self.device.capabilities.contains(Capabilities::HUMIDITY) {
            return Err("device lacks humidity capability");
        }
        self.device.set_state("humidity", serde_json::json!(pct));
        Ok(())
    }

    pub fn battery_pct(&self) -> Option<u8> {
        self.device.get_property("battery").and_then(|v| v.as_u64()).map(|n| n as u8)
    }
}
