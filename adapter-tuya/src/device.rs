//! Per-device TCP connection: connect, optional session negotiation,
//! heartbeat, and the data-point protocol.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use hub_core::error::{HubError, Result};

use crate::crypto::TuyaCrypto;
use crate::framing::{TuyaCommand, TuyaMessage};

const DEFAULT_PORT: u16 = 6668;
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
const POLL_QUANTUM: Duration = Duration::from_secs(1);
const HEARTBEAT_IDLE_TICKS: u32 = 5;

#[derive(Debug, Clone)]
pub struct TuyaDeviceConfig {
    pub device_id: String,
    pub local_key: [u8; 16],
    pub ip_address: String,
    pub port: u16,
    pub version: String,
    pub name: String,
}

impl TuyaDeviceConfig {
    pub fn new(device_id: impl Into<String>, local_key: [u8; 16], ip_address: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            local_key,
            ip_address: ip_address.into(),
            port: DEFAULT_PORT,
            version: "3.3".to_string(),
            name: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TuyaDataPointValue {
    Bool(bool),
    Int(i64),
    String(String),
    Enum(String),
    Raw(Vec<u8>),
}

impl TuyaDataPointValue {
    fn from_json(v: &Value) -> Self {
        match v {
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => Self::Int(n.as_i64().unwrap_or(0)),
            Value::String(s) => Self::String(s.clone()),
            other => Self::Raw(other.to_string().into_bytes()),
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Self::Bool(b) => json!(b),
            Self::Int(i) => json!(i),
            Self::String(s) | Self::Enum(s) => json!(s),
            Self::Raw(bytes) => json!(String::from_utf8_lossy(bytes)),
        }
    }
}

type StateCallback = Arc<dyn Fn(&str, Value) + Send + Sync>;
type AvailabilityCallback = Arc<dyn Fn(bool) + Send + Sync>;

struct Shared {
    stream: Mutex<Option<TcpStream>>,
    crypto: Mutex<TuyaCrypto>,
    seq_no: AtomicU32,
    connected: AtomicBool,
    running: AtomicBool,
    on_state: Mutex<Option<StateCallback>>,
    on_availability: Mutex<Option<AvailabilityCallback>>,
}

/// Owns one TCP connection to a Tuya device plus its background poll task.
pub struct TuyaDevice {
    pub config: TuyaDeviceConfig,
    shared: Arc<Shared>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl TuyaDevice {
    pub fn new(config: TuyaDeviceConfig) -> Self {
        let crypto = TuyaCrypto::new(config.local_key);
        Self {
            shared: Arc::new(Shared {
                stream: Mutex::new(None),
                crypto: Mutex::new(crypto),
                seq_no: AtomicU32::new(0),
                connected: AtomicBool::new(false),
                running: AtomicBool::new(false),
                on_state: Mutex::new(None),
                on_availability: Mutex::new(None),
            }),
            task: Mutex::new(None),
            config,
        }
    }

    pub async fn set_state_callback(&self, cb: StateCallback) {
        *self.shared.on_state.lock().await = Some(cb);
    }

    pub async fn set_availability_callback(&self, cb: AvailabilityCallback) {
        *self.shared.on_availability.lock().await = Some(cb);
    }

    pub fn is_connected(&self) -> bool {
        self.shared.connected.load(Ordering::SeqCst)
    }

    fn needs_session_negotiation(&self) -> bool {
        matches!(self.config.version.as_str(), "3.4" | "3.5")
    }

    pub async fn connect(self: &Arc<Self>) -> Result<()> {
        let addr = format!("{}:{}", self.config.ip_address, self.config.port);
        let stream = tokio::time::timeout(CONNECT_TIMEOUT, TcpStream::connect(&addr))
            .await
            .map_err(|_| HubError::Timeout)?
            .map_err(HubError::IoError)?;

        *self.shared.stream.lock().await = Some(stream);
        self.shared.connected.store(true, Ordering::SeqCst);

        if self.needs_session_negotiation() {
            self.negotiate_session().await?;
        }

        self.shared.running.store(true, Ordering::SeqCst);
        let this = self.clone();
        let handle = tokio::spawn(async move { this.run_loop().await });
        *self.task.lock().await = Some(handle);
        if let Some(cb) = self.shared.on_availability.lock().await.as_ref() {
            cb(true);
        }
        Ok(())
    }

    pub async fn disconnect(&self) {
        self.shared.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            let _ = handle.await;
        }
        *self.shared.stream.lock().await = None;
        self.shared.connected.store(false, Ordering::SeqCst);
        if let Some(cb) = self.shared.on_availability.lock().await.as_ref() {
            cb(false);
        }
    }

    async fn negotiate_session(&self) -> Result<()> {
        let local_nonce = *self.shared.crypto.lock().await.local_nonce();
        let start = TuyaMessage::new(self.next_seq(), TuyaCommand::SessKeyNegStart as u32, local_nonce.to_vec());
        self.send_raw(&start).await?;

        let resp = self.recv_raw().await?;
        if resp.command != TuyaCommand::SessKeyNegResp as u32 {
            return Err(HubError::ProtocolError("unexpected reply to session negotiation".into()));
        }
        let remote_nonce = &resp.payload[..16.min(resp.payload.len())];
        self.shared.crypto.lock().await.complete_negotiation(remote_nonce)?;

        let finish = TuyaMessage::new(self.next_seq(), TuyaCommand::SessKeyNegFinish as u32, Vec::new());
        self.send_raw(&finish).await
    }

    fn next_seq(&self) -> u32 {
        self.shared.seq_no.fetch_add(1, Ordering::SeqCst)
    }

    async fn send_raw(&self, msg: &TuyaMessage) -> Result<()> {
        let wire = {
            let crypto = self.shared.crypto.lock().await;
            msg.encode(&crypto, &self.config.version)
        };
        let mut guard = self.shared.stream.lock().await;
        let stream = guard.as_mut().ok_or(HubError::TransportClosed)?;
        stream.write_all(&wire).await.map_err(HubError::IoError)
    }

    async fn recv_raw(&self) -> Result<TuyaMessage> {
        let mut buf = Vec::new();
        let mut guard = self.shared.stream.lock().await;
        let stream = guard.as_mut().ok_or(HubError::TransportClosed)?;
        loop {
            let mut chunk = [0u8; 256];
            let n = stream.read(&mut chunk).await.map_err(HubError::IoError)?;
            if n == 0 {
                return Err(HubError::TransportClosed);
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some((offset, len)) = TuyaMessage::find_message(&buf) {
                let crypto = self.shared.crypto.lock().await;
                return TuyaMessage::decode(&buf[offset..offset + len], &crypto, &self.config.version);
            }
        }
    }

    /// Sends a `set_state` command translated to the device's DP model.
    pub async fn set_state(&self, property: &str, value: &Value) -> Result<()> {
        let dp = property_to_dp(property, value)?;
        let cmd = if matches!(self.config.version.as_str(), "3.4" | "3.5") {
            TuyaCommand::ControlNew
        } else {
            TuyaCommand::Control
        };
        let body = json!({
            "devId": self.config.device_id,
            "uid": "",
            "t": unix_timestamp(),
            "dps": { dp.0.to_string(): dp.1 },
        });
        let msg = TuyaMessage::new(self.next_seq(), cmd as u32, serde_json::to_vec(&body)?);
        self.send_raw(&msg).await
    }

    async fn run_loop(self: Arc<Self>) {
        let mut idle_ticks = 0u32;
        while self.shared.running.load(Ordering::SeqCst) {
            let readable = {
                let guard = self.shared.stream.lock().await;
                match guard.as_ref() {
                    Some(stream) => tokio::time::timeout(POLL_QUANTUM, stream.readable()).await.is_ok(),
                    None => break,
                }
            };

            if readable {
                idle_ticks = 0;
                match self.try_read_frame().await {
                    Ok(Some(msg)) => self.dispatch(msg).await,
                    Ok(None) => {}
                    Err(_) => {
                        self.shared.connected.store(false, Ordering::SeqCst);
                        if let Some(cb) = self.shared.on_availability.lock().await.as_ref() {
                            cb(false);
                        }
                        break;
                    }
                }
            } else {
                idle_ticks += 1;
                if idle_ticks >= HEARTBEAT_IDLE_TICKS {
                    idle_ticks = 0;
                    let hb = TuyaMessage::new(self.next_seq(), TuyaCommand::HeartBeat as u32, Vec::new());
                    if self.send_raw(&hb).await.is_err() {
                        break;
                    }
                }
            }
        }
    }

    async fn try_read_frame(&self) -> Result<Option<TuyaMessage>> {
        let mut chunk = [0u8; 256];
        let mut guard = self.shared.stream.lock().await;
        let stream = guard.as_mut().ok_or(HubError::TransportClosed)?;
        let n = match stream.try_read(&mut chunk) {
            Ok(0) => return Err(HubError::TransportClosed),
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => return Ok(None),
            Err(e) => return Err(HubError::IoError(e)),
        };
        drop(guard);

        let crypto = self.shared.crypto.lock().await;
        if let Some((offset, len)) = TuyaMessage::find_message(&chunk[..n]) {
            return Ok(Some(TuyaMessage::decode(&chunk[offset..offset + len], &crypto, &self.config.version)?));
        }
        Ok(None)
    }

    async fn dispatch(&self, msg: TuyaMessage) {
        match TuyaCommand::from_u32(msg.command) {
            Some(TuyaCommand::HeartBeat) => {}
            Some(TuyaCommand::Status) | Some(TuyaCommand::DpQuery) | Some(TuyaCommand::DpQueryNew) => {
                self.handle_dps_payload(&msg.payload).await;
            }
            other => {
                tracing::debug!(?other, "unhandled tuya command");
            }
        }
    }

    async fn handle_dps_payload(&self, payload: &[u8]) {
        let Ok(parsed) = serde_json::from_slice::<Value>(payload) else { return };
        let Some(dps) = parsed.get("dps").and_then(Value::as_object) else { return };
        let cb = self.shared.on_state.lock().await.clone();
        let Some(cb) = cb else { return };
        for (dp_id, value) in dps {
            let Ok(dp) = dp_id.parse::<u8>() else { continue };
            let dp_value = TuyaDataPointValue::from_json(value);
            if let Some((property, scaled)) = dp_to_property(dp, &dp_value) {
                cb(property, scaled);
            }
        }
    }
}

/// `dp 1 -> "on"`, `dp 2 -> "brightness"` (0-1000 scaled to 0-100),
/// `dp 3 -> "color_temp"` passthrough.
fn dp_to_property(dp: u8, value: &TuyaDataPointValue) -> Option<(&'static str, Value)> {
    match dp {
        1 => match value {
            TuyaDataPointValue::Bool(b) => Some(("on", json!(*b))),
            _ => None,
        },
        2 => match value {
            TuyaDataPointValue::Int(raw) => Some(("brightness", json!((*raw as f64 / 1000.0 * 100.0).round() as i64))),
            _ => None,
        },
        3 => Some(("color_temp", value.to_json())),
        _ => None,
    }
}

fn property_to_dp(property: &str, value: &Value) -> Result<(u8, Value)> {
    match property {
        "on" => Ok((1, json!(value.as_bool().unwrap_or(false)))),
        "brightness" => {
            let pct = value.as_f64().ok_or_else(|| HubError::ParseError("brightness must be numeric".into()))?;
            Ok((2, json!((pct / 100.0 * 1000.0).round() as i64)))
        }
        "color_temp" => Ok((3, value.clone())),
        other => Err(HubError::Unsupported(format!("tuya property '{other}'"))),
    }
}

fn unix_timestamp() -> String {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dp_to_property_scales_brightness() {
        let (prop, val) = dp_to_property(2, &TuyaDataPointValue::Int(500)).unwrap();
        assert_eq!(prop, "brightness");
        assert_eq!(val, json!(50));
    }

    #[test]
    fn property_to_dp_scales_brightness_back() {
        let (dp, val) = property_to_dp("brightness", &json!(50)).unwrap();
        assert_eq!(dp, 2);
        assert_eq!(val, json!(500));
    }

    #[test]
    fn property_to_dp_rejects_unknown_property() {
        assert!(property_to_dp("nonsense", &json!(1)).is_err());
    }
}
