//! Gen1 REST and Gen2 JSON-RPC clients. Both speak plain HTTP to the
//! device's local IP; `reqwest` supplies the transport and a per-request
//! timeout.

use std::time::Duration;

use serde_json::{json, Value};

use hub_core::error::{HubError, Result};

use crate::model::{Generation, ShellyDeviceInfo, ShellyOutputState};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

pub struct ShellyClient {
    http: reqwest::Client,
}

impl ShellyClient {
    pub fn new() -> Self {
        Self { http: reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build().unwrap_or_default() }
    }

    /// Probes Gen2 first (`POST /rpc` `Shelly.GetDeviceInfo`), falling
    /// back to Gen1's `/settings` on failure.
    pub async fn probe(&self, ip: &str) -> Option<ShellyDeviceInfo> {
        if let Some(info) = self.probe_gen2(ip).await {
            return Some(info);
        }
        self.probe_gen1(ip).await
    }

    async fn probe_gen2(&self, ip: &str) -> Option<ShellyDeviceInfo> {
        let result = self.rpc_call(ip, "Shelly.GetDeviceInfo", json!({})).await.ok()?;
        let id = result.get("id").and_then(Value::as_str)?.to_string();
        let model_code = result.get("model").and_then(Value::as_str).unwrap_or("unknown").to_string();
        let firmware = result.get("fw_id").and_then(Value::as_str).map(str::to_string);
        let mac_address = result.get("mac").and_then(Value::as_str).map(str::to_string);

        let status = self.rpc_call(ip, "Shelly.GetStatus", json!({})).await.ok();
        let num_outputs = status
            .as_ref()
            .map(|s| s.as_object().map(|o| o.keys().filter(|k| k.starts_with("switch:") || k.starts_with("light:")).count()).unwrap_or(1))
            .unwrap_or(1)
            .max(1);
        let has_power_metering = status
            .as_ref()
            .and_then(|s| s.as_object())
            .map(|o| o.values().any(|v| v.get("apower").is_some()))
            .unwrap_or(false);

        Some(ShellyDeviceInfo {
            id,
            model_code,
            ip_address: ip.to_string(),
            mac_address,
            firmware,
            generation: Generation::Gen2,
            num_outputs,
            has_power_metering,
        })
    }

    async fn probe_gen1(&self, ip: &str) -> Option<ShellyDeviceInfo> {
        let settings: Value = self.http.get(format!("http://{ip}/settings")).send().await.ok()?.json().await.ok()?;
        let status: Value = self.http.get(format!("http://{ip}/status")).send().await.ok()?.json().await.ok()?;

        let id = settings.get("device").and_then(|d| d.get("hostname")).and_then(Value::as_str).unwrap_or(ip).to_string();
        let model_code = settings.get("device").and_then(|d| d.get("type")).and_then(Value::as_str).unwrap_or("unknown").to_string();
        let mac_address = settings.get("device").and_then(|d| d.get("mac")).and_then(Value::as_str).map(str::to_string);
        let firmware = status.get("update").and_then(|u| u.get("old_version")).and_then(Value::as_str).map(str::to_string);

        let relay_count = status.get("relays").and_then(Value::as_array).map(Vec::len).unwrap_or(0);
        let light_count = status.get("lights").and_then(Value::as_array).map(Vec::len).unwrap_or(0);
        let num_outputs = (relay_count + light_count).max(1);
        let has_power_metering = status.get("meters").and_then(Value::as_array).map(|m| !m.is_empty()).unwrap_or(false);

        Some(ShellyDeviceInfo {
            id,
            model_code,
            ip_address: ip.to_string(),
            mac_address,
            firmware,
            generation: Generation::Gen1,
            num_outputs,
            has_power_metering,
        })
    }

    pub async fn poll_status(&self, info: &ShellyDeviceInfo) -> Result<Vec<ShellyOutputState>> {
        match info.generation {
            Generation::Gen1 => self.poll_gen1(info).await,
            Generation::Gen2 => self.poll_gen2(info).await,
        }
    }

    async fn poll_gen1(&self, info: &ShellyDeviceInfo) -> Result<Vec<ShellyOutputState>> {
        let status: Value = self
            .http
            .get(format!("http://{}/status", info.ip_address))
            .send()
            .await
            .map_err(to_hub_error)?
            .json()
            .await
            .map_err(to_hub_error)?;
        Ok(parse_gen1_status(&status))
    }

    async fn poll_gen2(&self, info: &ShellyDeviceInfo) -> Result<Vec<ShellyOutputState>> {
        let status = self.rpc_call(&info.ip_address, "Shelly.GetStatus", json!({})).await?;
        let mut outputs = Vec::new();
        let Some(obj) = status.as_object() else { return Ok(outputs) };
        for (key, value) in obj {
            let Some(rest) = key.strip_prefix("switch:").or_else(|| key.strip_prefix("light:")) else { continue };
            let Ok(channel) = rest.parse::<usize>() else { continue };
            let is_on = value.get("output").and_then(Value::as_bool).unwrap_or(false);
            let brightness = value.get("brightness").and_then(Value::as_f64).map(|b| b.round() as u8);
            let power_watts = value.get("apower").and_then(Value::as_f64);
            let energy_kwh = value.get("aenergy").and_then(|e| e.get("total")).and_then(Value::as_f64).map(|wh| wh / 1000.0);
            outputs.push(ShellyOutputState { channel, is_on, brightness, power_watts, energy_kwh });
        }
        outputs.sort_by_key(|o| o.channel);
        Ok(outputs)
    }

    pub async fn set_relay(&self, info: &ShellyDeviceInfo, channel: usize, on: bool) -> Result<()> {
        match info.generation {
            Generation::Gen1 => {
                let turn = if on { "on" } else { "off" };
                self.http
                    .get(format!("http://{}/relay/{channel}?turn={turn}", info.ip_address))
                    .send()
                    .await
                    .map_err(to_hub_error)?;
            }
            Generation::Gen2 => {
                self.rpc_call(&info.ip_address, "Switch.Set", json!({"id": channel, "on": on})).await?;
            }
        }
        Ok(())
    }

    pub async fn set_brightness(&self, info: &ShellyDeviceInfo, channel: usize, level: u8) -> Result<()> {
        match info.generation {
            Generation::Gen1 => {
                self.http
                    .get(format!("http://{}/light/{channel}?brightness={level}", info.ip_address))
                    .send()
                    .await
                    .map_err(to_hub_error)?;
            }
            Generation::Gen2 => {
                self.rpc_call(&info.ip_address, "Light.Set", json!({"id": channel, "brightness": level})).await?;
            }
        }
        Ok(())
    }

    async fn rpc_call(&self, ip: &str, method: &str, params: Value) -> Result<Value> {
        let body = json!({ "id": 1, "method": method, "params": params });
        let response: Value = self
            .http
            .post(format!("http://{ip}/rpc"))
            .json(&body)
            .send()
            .await
            .map_err(to_hub_error)?
            .json()
            .await
            .map_err(to_hub_error)?;
        if let Some(error) = response.get("error") {
            return Err(HubError::ProtocolError(format!("shelly rpc error: {error}")));
        }
        response.get("result").cloned().ok_or_else(|| HubError::ProtocolError("rpc response missing result".into()))
    }
}

impl Default for ShellyClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Gen1 `meters[].total` is in watt-minutes, not watt-hours.
fn parse_gen1_status(status: &Value) -> Vec<ShellyOutputState> {
    let mut outputs = Vec::new();
    if let Some(relays) = status.get("relays").and_then(Value::as_array) {
        for (i, relay) in relays.iter().enumerate() {
            let is_on = relay.get("ison").and_then(Value::as_bool).unwrap_or(false);
            let power_watts = status.get("meters").and_then(Value::as_array).and_then(|m| m.get(i)).and_then(|m| m.get("power")).and_then(Value::as_f64);
            let energy_kwh = status
                .get("meters")
                .and_then(Value::as_array)
                .and_then(|m| m.get(i))
                .and_then(|m| m.get("total"))
                .and_then(Value::as_f64)
                .map(|watt_minutes| watt_minutes / 60_000.0);
            outputs.push(ShellyOutputState { channel: i, is_on, brightness: None, power_watts, energy_kwh });
        }
    }
    if let Some(lights) = status.get("lights").and_then(Value::as_array) {
        for (i, light) in lights.iter().enumerate() {
            let is_on = light.get("ison").and_then(Value::as_bool).unwrap_or(false);
            let brightness = light.get("brightness").and_then(Value::as_u64).map(|b| b as u8);
            outputs.push(ShellyOutputState { channel: i, is_on, brightness, power_watts: None, energy_kwh: None });
        }
    }
    outputs
}

fn to_hub_error(e: reqwest::Error) -> HubError {
    if e.is_timeout() {
        HubError::Timeout
    } else {
        HubError::IoError(std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gen1_status_converts_watt_minutes_to_kwh() {
        let status = json!({"relays":[{"ison":true}],"meters":[{"power":42,"total":60000}]});
        let outputs = parse_gen1_status(&status);
        assert_eq!(outputs.len(), 1);
        assert!(outputs[0].is_on);
        assert_eq!(outputs[0].power_watts, Some(42.0));
        assert_eq!(outputs[0].energy_kwh, Some(1.0));
    }
}
