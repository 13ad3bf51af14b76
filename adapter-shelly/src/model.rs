//! Shapes shared by the Gen1 and Gen2 clients: device info as reported by
//! discovery/status endpoints, and per-channel output (relay/switch/light)
//! state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Generation {
    Gen1,
    Gen2,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellyDeviceInfo {
    pub id: String,
    pub model_code: String,
    pub ip_address: String,
    pub mac_address: Option<String>,
    pub firmware: Option<String>,
    pub generation: Generation,
    pub num_outputs: usize,
    pub has_power_metering: bool,
}

impl ShellyDeviceInfo {
    pub fn display_name(&self) -> &str {
        model_display_name(&self.model_code)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct ShellyOutputState {
    pub channel: usize,
    pub is_on: bool,
    /// 0-100, `None` if the channel has no dimming.
    pub brightness: Option<u8>,
    pub power_watts: Option<f64>,
    pub energy_kwh: Option<f64>,
}

/// Static model-code -> human display name table. Falls back to the raw
/// code when unrecognised.
pub fn model_display_name(code: &str) -> &str {
    const TABLE: &[(&str, &str)] = &[
        ("SHSW-1", "Shelly 1"),
        ("SHSW-PM", "Shelly 1PM"),
        ("SHSW-25", "Shelly 2.5"),
        ("SHSW-L", "Shelly 1L"),
        ("SHDM-1", "Shelly Dimmer"),
        ("SHDM-2", "Shelly Dimmer 2"),
        ("SHPLG-S", "Shelly Plug S"),
        ("SHPLG-U1", "Shelly Plug US"),
        ("SHPLG2-1", "Shelly Plug 2"),
        ("SHRGBW2", "Shelly RGBW2"),
        ("SHBLB-1", "Shelly Bulb"),
        ("SHVIN-1", "Shelly Vintage"),
        ("SHBDUO-1", "Shelly Duo"),
        ("SHHT-1", "Shelly H&T"),
        ("SHEM", "Shelly EM"),
        ("SHEM-3", "Shelly 3EM"),
        ("SHSW-21", "Shelly 2"),
        ("SHUNI-1", "Shelly UNI"),
        ("SHMOS-01", "Shelly Motion"),
        ("SHGS-1", "Shelly Gas"),
        ("SHSM-01", "Shelly Smoke"),
        ("SHWT-1", "Shelly Flood"),
        ("SHDW-1", "Shelly Door/Window"),
        ("SHDW-2", "Shelly Door/Window 2"),
        ("SHBTN-1", "Shelly Button1"),
        ("SHBTN-2", "Shelly Button2"),
        ("SHIX3-1", "Shelly i3"),
        ("SNSW-001X16EU", "Shelly Plus 1"),
        ("SNSW-001P16EU", "Shelly Plus 1PM"),
        ("SNSW-002P16EU", "Shelly Plus 2PM"),
        ("SNPL-00112EU", "Shelly Plus Plug S"),
        ("SNDM-0013US", "Shelly Plus Dimmer"),
        ("SNSN-0024X", "Shelly Plus H&T"),
        ("SPSW-001XE16EU", "Shelly Pro 1"),
        ("SPSW-101PE16EU", "Shelly Pro 1PM"),
        ("SPSW-002PE16EU", "Shelly Pro 2PM"),
        ("SPSW-003PE16EU", "Shelly Pro 3"),
        ("SPEM-003CEBEU", "Shelly Pro 3EM"),
        ("SPSH-002PE16EU", "Shelly Pro Dual Cover PM"),
    ];
    TABLE.iter().find(|(c, _)| *c == code).map(|(_, name)| *name).unwrap_or(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_display_name_known_code() {
        assert_eq!(model_display_name("SHPLG-S"), "Shelly Plug S");
    }

    #[test]
    fn model_display_name_falls_back_to_code() {
        assert_eq!(model_display_name("SHXX-UNKNOWN"), "SHXX-UNKNOWN");
    }
}
