//! UDP/6666 broadcast listener for LAN Tuya announcements. Each
//! broadcast is encrypted with a protocol-wide fixed key; this is
//! enough to recover `gwId`/`ip`/`productKey`/`version` for logging.
//! It does not provision a `local_key` -- that still comes from the
//! user's Tuya/Smart Life account.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;

use crate::crypto::aes128_ecb_decrypt;
use hub_core::error::Result;

pub const DISCOVERY_PORT: u16 = 6666;

/// The fixed key every Tuya LAN broadcast is encrypted under, independent
/// of any device's `local_key`.
const UDP_KEY: [u8; 16] = *b"yGAdlopoPVldABfn";

#[derive(Debug, Clone, Deserialize)]
pub struct TuyaAnnouncement {
    #[serde(rename = "gwId")]
    pub gw_id: String,
    pub ip: String,
    #[serde(rename = "productKey")]
    pub product_key: Option<String>,
    pub version: Option<String>,
}

type AnnouncementCallback = Arc<dyn Fn(TuyaAnnouncement) + Send + Sync>;

pub struct TuyaDiscovery {
    running: Arc<AtomicBool>,
    task: Option<JoinHandle<()>>,
}

impl TuyaDiscovery {
    pub fn new() -> Self {
        Self { running: Arc::new(AtomicBool::new(false)), task: None }
    }

    pub async fn start(&mut self, on_announcement: AnnouncementCallback) -> Result<()> {
        let socket = UdpSocket::bind(("0.0.0.0", DISCOVERY_PORT)).await?;
        socket.set_broadcast(true)?;
        self.running.store(true, Ordering::SeqCst);
        let running = self.running.clone();

        self.task = Some(tokio::spawn(async move {
            let mut buf = [0u8; 2048];
            while running.load(Ordering::SeqCst) {
                let Ok((n, _src)) = socket.recv_from(&mut buf).await else { break };
                if let Some(announcement) = decode_broadcast(&buf[..n]) {
                    on_announcement(announcement);
                }
            }
        }));
        Ok(())
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for TuyaDiscovery {
    fn default() -> Self {
        Self::new()
    }
}

/// Broadcasts carry the same prefix/length/crc/suffix framing as the TCP
/// protocol, but encrypted under the fixed UDP key rather than a
/// per-device one, with no sequence/session negotiation.
fn decode_broadcast(data: &[u8]) -> Option<TuyaAnnouncement> {
    let (offset, len) = crate::framing::TuyaMessage::find_message(data)?;
    let frame = &data[offset..offset + len];
    let ciphertext = &frame[16..frame.len() - 8];
    if ciphertext.is_empty() {
        return None;
    }
    let plain = aes128_ecb_decrypt(ciphertext, &UDP_KEY).ok()?;
    serde_json::from_slice(&plain).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TuyaCrypto;
    use crate::framing::{TuyaCommand, TuyaMessage};

    #[test]
    fn decode_broadcast_parses_announcement() {
        let crypto = TuyaCrypto::new(UDP_KEY);
        let body = serde_json::json!({
            "gwId": "abc123",
            "ip": "192.168.1.50",
            "productKey": "key1",
            "version": "3.3",
        });
        let msg = TuyaMessage::new(0, TuyaCommand::UdpDiscovery as u32, serde_json::to_vec(&body).unwrap());
        let wire = msg.encode(&crypto, "3.3");
        let announcement = decode_broadcast(&wire).expect("announcement decodes");
        assert_eq!(announcement.gw_id, "abc123");
        assert_eq!(announcement.ip, "192.168.1.50");
    }
}
