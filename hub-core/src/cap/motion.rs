use crate::model::{Capabilities, Device};

pub struct MotionSensor<'a> {
    device: &'a mut Device,
}

impl<'a> TryFrom<&'a mut Device> for MotionSensor<'a> {
    type Error = &'static str;

    fn try_from(device: &'a mut Device) -> Result<Self, Self::Error> {
        if !device.capabilities.contains(Capabilities::MOTION) {
            return Err("device lacks motion capability");
        }
        Ok(Self { device })
    }
}

impl<'a> MotionSensor<'a> {
    pub fn is_occupied(&self) -> bool {
        matches!(self.device.get_property("occupancy"), Some(serde_json::Value::Bool(true)))
    }

    pub fn set_motion(&mut self, detected: bool) {
        self.device.set_state("motion", serde_json::json!(detected));
    }

    pub fn set_occupancy(&mut self, occupied: bool) -> Result<(), &'static str> {
        if !self.device.capabilities.contains(Capabilities::OCCUPANCY) {
            return Err("device lacks occupancy capability");
        }
        self.device.set_state("occupancy", serde_json::json!(occupied));
        Ok(())
    }

    pub fn battery_pct(&self) -> Option<u8> {
        self.device.get_property("battery").and_then(|v| v.as_u64()).map(|n| n as u8)
    }
}
