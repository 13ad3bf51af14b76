//! Length-prefixed TCP message framing for the local Tuya protocol.
//! All multi-byte framing fields are big-endian; the payload inside is
//! UTF-8 JSON once decrypted.

use crate::crypto::TuyaCrypto;
use hub_core::error::{HubError, Result};

pub const PREFIX: u32 = 0x0000_55AA;
pub const SUFFIX: u32 = 0x0000_AA55;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TuyaCommand {
    UdpDiscovery = 0x00,
    SessKeyNegStart = 0x03,
    SessKeyNegResp = 0x04,
    SessKeyNegFinish = 0x05,
    Control = 0x07,
    Status = 0x08,
    HeartBeat = 0x09,
    DpQuery = 0x0A,
    ControlNew = 0x0D,
    DpQueryNew = 0x10,
}

impl TuyaCommand {
    pub fn from_u32(v: u32) -> Option<Self> {
        use TuyaCommand::*;
        Some(match v {
            0x00 => UdpDiscovery,
            0x03 => SessKeyNegStart,
            0x04 => SessKeyNegResp,
            0x05 => SessKeyNegFinish,
            0x07 => Control,
            0x08 => Status,
            0x09 => HeartBeat,
            0x0A => DpQuery,
            0x0D => ControlNew,
            0x10 => DpQueryNew,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone)]
pub struct TuyaMessage {
    pub sequence_no: u32,
    pub command: u32,
    pub payload: Vec<u8>,
}

impl TuyaMessage {
    pub fn new(sequence_no: u32, command: u32, payload: Vec<u8>) -> Self {
        Self { sequence_no, command, payload }
    }

    /// Scans `data` for a complete frame starting at `PREFIX`. Returns
    /// `(offset, total_len)` of a full frame, or `None` if incomplete.
    pub fn find_message(data: &[u8]) -> Option<(usize, usize)> {
        let mut start = 0;
        while start + 16 <= data.len() {
            let prefix = be32(&data[start..]);
            if prefix != PREFIX {
                start += 1;
                continue;
            }
            let declared_len = be32(&data[start + 8..]) as usize;
            let total_len = 16 + declared_len;
            if start + total_len > data.len() {
                return None;
            }
            let suffix_offset = start + total_len - 4;
            let suffix = be32(&data[suffix_offset..]);
            if suffix != SUFFIX {
                start += 1;
                continue;
            }
            return Some((start, total_len));
        }
        None
    }

    /// Encodes this message for the wire. `version` selects whether a
    /// 15-byte version banner precedes the ciphertext (every version but
    /// `3.1`, which encrypts with no banner and no CRC verification of
    /// the banner).
    pub fn encode(&self, crypto: &TuyaCrypto, version: &str) -> Vec<u8> {
        let mut ciphertext = crypto.encrypt(&self.payload);
        if version != "3.1" {
            let mut banner = format!("{version:0<15}").into_bytes();
            banner.truncate(15);
            banner.extend_from_slice(&ciphertext);
            ciphertext = banner;
        }

        let mut body = Vec::new();
        body.extend_from_slice(&self.sequence_no.to_be_bytes());
        body.extend_from_slice(&self.command.to_be_bytes());
        body.extend_from_slice(&((ciphertext.len() + 8) as u32).to_be_bytes());
        body.extend_from_slice(&ciphertext);

        let mut framed = Vec::with_capacity(16 + body.len());
        framed.extend_from_slice(&PREFIX.to_be_bytes());
        framed.extend_from_slice(&body);
        let crc = crc32fast::hash(&framed);
        framed.extend_from_slice(&crc.to_be_bytes());
        framed.extend_from_slice(&SUFFIX.to_be_bytes());
        framed
    }

    /// Inverts `encode`. `data` must be exactly one complete frame as
    /// located by `find_message`.
    pub fn decode(data: &[u8], crypto: &TuyaCrypto, version: &str) -> Result<Self> {
        if data.len() < 16 || be32(data) != PREFIX {
            return Err(HubError::ProtocolError("missing tuya frame prefix".into()));
        }
        if be32(&data[data.len() - 4..]) != SUFFIX {
            return Err(HubError::ProtocolError("missing tuya frame suffix".into()));
        }
        let sequence_no = be32(&data[4..]);
        let command = be32(&data[8..]);
        let mut ciphertext = &data[16..data.len() - 8];

        let mut banner_skipped = None;
        if version != "3.1" && ciphertext.len() >= 15 {
            banner_skipped = Some(&ciphertext[..15]);
            ciphertext = &ciphertext[15..];
        }
        let _ = banner_skipped;

        let payload = if ciphertext.is_empty() {
            Vec::new()
        } else {
            crypto.decrypt(ciphertext)?
        };
        Ok(Self { sequence_no, command, payload })
    }
}

fn be32(data: &[u8]) -> u32 {
    u32::from_be_bytes([data[0], data[1], data[2], data[3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_then_decode_round_trips_v33() {
        let crypto = TuyaCrypto::new(*b"0123456789abcdef");
        let msg = TuyaMessage::new(1, TuyaCommand::DpQuery as u32, br#"{"dps":{"1":true}}"#.to_vec());
        let wire = msg.encode(&crypto, "3.3");
        let (offset, len) = TuyaMessage::find_message(&wire).expect("frame found");
        assert_eq!(offset, 0);
        assert_eq!(len, wire.len());
        let decoded = TuyaMessage::decode(&wire[offset..offset + len], &crypto, "3.3").unwrap();
        assert_eq!(decoded.payload, msg.payload);
        assert_eq!(decoded.command, msg.command);
    }

    #[test]
    fn find_message_resyncs_past_garbage_prefix_byte() {
        let crypto = TuyaCrypto::new(*b"0123456789abcdef");
        let msg = TuyaMessage::new(2, TuyaCommand::HeartBeat as u32, Vec::new());
        let wire = msg.encode(&crypto, "3.3");
        let mut buf = vec![0xFF];
        buf.extend_from_slice(&wire);
        let (offset, len) = TuyaMessage::find_message(&buf).expect("frame found past garbage byte");
        assert_eq!(offset, 1);
        assert_eq!(len, wire.len());
    }

    #[test]
    fn find_message_returns_none_on_incomplete_frame() {
        let crypto = TuyaCrypto::new(*b"0123456789abcdef");
        let msg = TuyaMessage::new(3, TuyaCommand::Status as u32, br#"{"dps":{}}"#.to_vec());
        let wire = msg.encode(&crypto, "3.3");
        assert!(TuyaMessage::find_message(&wire[..wire.len() - 5]).is_none());
    }
}
