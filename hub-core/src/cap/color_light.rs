use crate::color::{hsv_to_rgb, rgb_to_hsv, Hsv, Rgb};
use crate::model::{Capabilities, Device};

pub struct ColorLightDevice<'a> {
    device: &'a mut Device,
}

impl<'a> TryFrom<&'a mut Device> for ColorLightDevice<'a> {
    type Error = &'static str;

    fn try_from(device: &'a mut Device) -> Result<Self, Self::Error> {
        if !device.capabilities.contains(Capabilities::ON_OFF | Capabilities::BRIGHTNESS) {
            return Err("device lacks dimmable light capabilities");
        }
        Ok(Self { device })
    }
}

impl<'a> ColorLightDevice<'a> {
    pub fn set_on(&mut self, on: bool) {
        self.device.set_state("on", serde_json::json!(on));
    }

    pub fn set_brightness(&mut self, pct: u8) {
        self.device.set_state("brightness", serde_json::json!(pct.min(100)));
    }

    pub fn set_color_temp_mireds(&mut self, mireds: u16) -> Result<(), &'static str> {
        if !self.device.capabilities.contains(Capabilities::COLOR_TEMPERATURE) {
            return Err("device lacks color temperature capability");
        }
        self.device.set_state("color_temp", serde_json::json!(mireds));
        Ok(())
    }

    pub fn set_rgb(&mut self, rgb: Rgb) -> Result<(), &'static str> {
        if !self.device.capabilities.contains(Capabilities::COLOR_RGB) {
            return Err("device lacks RGB capability");
        }
        self.device.set_state("rgb", serde_json::json!([rgb.r, rgb.g, rgb.b]));
        Ok(())
    }

    pub fn set_hsv(&mut self, hsv: Hsv) -> Result<(), &'static str> {
        if !self.device.capabilities.contains(Capabilities::COLOR_HSV) {
            return Err("device lacks HSV capability");
        }
        let rgb = hsv_to_rgb(hsv);
        self.device.set_state("rgb", serde_json::json!([rgb.r, rgb.g, rgb.b]));
        self.device.set_state("hue", serde_json::json!(hsv.h));
        self.device.set_state("saturation", serde_json::json!(hsv.s));
        Ok(())
    }

    pub fn rgb(&self) -> Option<Rgb> {
        let arr = self.device.get_property("rgb")?.as_array()?;
        if arr.len() != 3 {
            return None;
        }
        Some(Rgb {
            r: arr[0].as_u64()? as u8,
            g: arr[1].as_u64()? as u8,
            b: arr[2].as_u64()? as u8,
        })
    }

    pub fn hsv(&self) -> Option<Hsv> {
        self.rgb().map(rgb_to_hsv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DeviceId, DeviceType};

    #[test]
    fn rejects_rgb_without_capability() {
        let mut d = Device::new(DeviceId::from("l1"), "Dimmer", DeviceType::Dimmer, "test", "a");
        let mut light = ColorLightDevice::try_from(&mut d).unwrap();
        assert!(light.set_rgb(Rgb { r: 1, g: 2, b: 3 }).is_err());
    }

    #[test]
    fn hsv_round_trips_through_stored_rgb() {
        let mut d = Device::new(DeviceId::from("l1"), "ColorLight", DeviceType::ColorLight, "test", "a");
        let mut light = ColorLightDevice::try_from(&mut d).unwrap();
        light.set_hsv(Hsv { h: 120, s: 100, v: 100 }).unwrap();
        assert_eq!(light.rgb(), Some(Rgb { r: 0, g: 255, b: 0 }));
    }
}
