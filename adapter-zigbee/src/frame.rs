//! Z-Stack ZNP (Zigbee Network Processor) frame codec.
//!
//! Frame layout: `SOF(1) | Len(1) | Cmd0(1) | Cmd1(1) | Payload(Len) | FCS(1)`.
//! Cmd0 packs the message type into bits 7-5 and the subsystem into bits 4-0.

pub const SOF: u8 = 0xFE;
pub const MIN_FRAME_SIZE: usize = 5; // SOF + Len + Cmd0 + Cmd1 + FCS
pub const MAX_PAYLOAD_SIZE: usize = 250;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZnpType {
    Poll,
    Sreq,
    Areq,
    Srsp,
}

impl ZnpType {
    pub(crate) fn bits(self) -> u8 {
        match self {
            ZnpType::Poll => 0x00,
            ZnpType::Sreq => 0x20,
            ZnpType::Areq => 0x40,
            ZnpType::Srsp => 0x60,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0xE0 {
            0x20 => ZnpType::Sreq,
            0x40 => ZnpType::Areq,
            0x60 => ZnpType::Srsp,
            _ => ZnpType::Poll,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZnpSubsystem {
    RpcError,
    Sys,
    Mac,
    Nwk,
    Af,
    Zdo,
    Sapi,
    Util,
    Debug,
    App,
    AppCnf,
    GreenPower,
    Unknown(u8),
}

impl ZnpSubsystem {
    pub(crate) fn bits(self) -> u8 {
        match self {
            ZnpSubsystem::RpcError => 0x00,
            ZnpSubsystem::Sys => 0x01,
            ZnpSubsystem::Mac => 0x02,
            ZnpSubsystem::Nwk => 0x03,
            ZnpSubsystem::Af => 0x04,
            ZnpSubsystem::Zdo => 0x05,
            ZnpSubsystem::Sapi => 0x06,
            ZnpSubsystem::Util => 0x07,
            ZnpSubsystem::Debug => 0x08,
            ZnpSubsystem::App => 0x09,
            ZnpSubsystem::AppCnf => 0x0F,
            ZnpSubsystem::GreenPower => 0x15,
            ZnpSubsystem::Unknown(b) => b,
        }
    }

    fn from_bits(bits: u8) -> Self {
        match bits & 0x1F {
            0x00 => ZnpSubsystem::RpcError,
            0x01 => ZnpSubsystem::Sys,
            0x02 => ZnpSubsystem::Mac,
            0x03 => ZnpSubsystem::Nwk,
            0x04 => ZnpSubsystem::Af,
            0x05 => ZnpSubsystem::Zdo,
            0x06 => ZnpSubsystem::Sapi,
            0x07 => ZnpSubsystem::Util,
            0x08 => ZnpSubsystem::Debug,
            0x09 => ZnpSubsystem::App,
            0x0F => ZnpSubsystem::AppCnf,
            0x15 => ZnpSubsystem::GreenPower,
            other => ZnpSubsystem::Unknown(other),
        }
    }
}

/// Command IDs, grouped by subsystem, that the coordinator issues or listens for.
pub mod cmd {
    pub mod sys {
        pub const RESET_REQ: u8 = 0x00;
        pub const PING: u8 = 0x01;
        pub const VERSION: u8 = 0x02;
        pub const SET_EXTADDR: u8 = 0x03;
        pub const GET_EXTADDR: u8 = 0x04;
        pub const OSAL_NV_INIT: u8 = 0x07;
        pub const OSAL_NV_READ: u8 = 0x08;
        pub const OSAL_NV_WRITE: u8 = 0x09;
        pub const OSAL_NV_DELETE: u8 = 0x12;
        pub const OSAL_NV_LENGTH: u8 = 0x13;
        pub const RESET_IND: u8 = 0x80; // AREQ
    }

    pub mod af {
        pub const REGISTER: u8 = 0x00;
        pub const DATA_REQUEST: u8 = 0x01;
        pub const DATA_REQUEST_EXT: u8 = 0x02;
        pub const DATA_CONFIRM: u8 = 0x80; // AREQ
        pub const INCOMING_MSG: u8 = 0x81; // AREQ
        pub const INCOMING_MSG_EXT: u8 = 0x82; // AREQ
    }

    pub mod zdo {
        pub const NWK_ADDR_REQ: u8 = 0x00;
        pub const IEEE_ADDR_REQ: u8 = 0x01;
        pub const NODE_DESC_REQ: u8 = 0x02;
        pub const SIMPLE_DESC_REQ: u8 = 0x04;
        pub const ACTIVE_EP_REQ: u8 = 0x05;
        pub const MATCH_DESC_REQ: u8 = 0x06;
        pub const BIND_REQ: u8 = 0x21;
        pub const UNBIND_REQ: u8 = 0x22;
        pub const MGMT_LQI_REQ: u8 = 0x31;
        pub const MGMT_LEAVE_REQ: u8 = 0x34;
        pub const MGMT_PERMIT_JOIN_REQ: u8 = 0x36;
        pub const STARTUP_FROM_APP: u8 = 0x40;

        pub const NWK_ADDR_RSP: u8 = 0x80;
        pub const IEEE_ADDR_RSP: u8 = 0x81;
        pub const NODE_DESC_RSP: u8 = 0x82;
        pub const SIMPLE_DESC_RSP: u8 = 0x84;
        pub const ACTIVE_EP_RSP: u8 = 0x85;
        pub const STATE_CHANGE_IND: u8 = 0xC0;
        pub const END_DEVICE_ANNCE_IND: u8 = 0xC1;
        pub const SRC_RTG_IND: u8 = 0xC4;
        pub const LEAVE_IND: u8 = 0xC9;
        pub const TC_DEV_IND: u8 = 0xCA;
        pub const PERMIT_JOIN_IND: u8 = 0xCB;
    }

    pub mod util {
        pub const GET_DEVICE_INFO: u8 = 0x00;
        pub const GET_NV_INFO: u8 = 0x01;
        pub const CALLBACK_SUB_CMD: u8 = 0x06;
        pub const LED_CONTROL: u8 = 0x0E;
    }

    pub mod app_cnf {
        pub const SET_NWK_FRAME_COUNTER: u8 = 0x01;
        pub const SET_DEFAULT_REMOTE_ENDDEV_TIMEOUT: u8 = 0x02;
        pub const BDB_START_COMMISSIONING: u8 = 0x05;
        pub const BDB_SET_JOINUSES_INSTALL_CODE_KEY: u8 = 0x06;
        pub const BDB_SET_ACTIVE_DEFAULT_CENTRALIZED_KEY: u8 = 0x07;
        pub const BDB_SET_CHANNEL: u8 = 0x08;
        pub const BDB_SET_TC_REQUIRE_KEY_EXCHANGE: u8 = 0x09;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZnpDeviceState {
    Hold,
    Init,
    NwkDisc,
    NwkJoining,
    NwkRejoin,
    EndDeviceUnauth,
    EndDevice,
    Router,
    CoordStarting,
    ZbCoord,
    NwkOrphan,
    Unknown(u8),
}

impl From<u8> for ZnpDeviceState {
    fn from(b: u8) -> Self {
        match b {
            0x00 => ZnpDeviceState::Hold,
            0x01 => ZnpDeviceState::Init,
            0x02 => ZnpDeviceState::NwkDisc,
            0x03 => ZnpDeviceState::NwkJoining,
            0x04 => ZnpDeviceState::NwkRejoin,
            0x05 => ZnpDeviceState::EndDeviceUnauth,
            0x06 => ZnpDeviceState::EndDevice,
            0x07 => ZnpDeviceState::Router,
            0x08 => ZnpDeviceState::CoordStarting,
            0x09 => ZnpDeviceState::ZbCoord,
            0x0A => ZnpDeviceState::NwkOrphan,
            other => ZnpDeviceState::Unknown(other),
        }
    }
}

/// A parsed or to-be-serialized ZNP frame.
#[derive(Debug, Clone)]
pub struct ZnpFrame {
    pub frame_type: ZnpType,
    pub subsystem: ZnpSubsystem,
    pub command: u8,
    pub payload: Vec<u8>,
}

impl ZnpFrame {
    pub fn new(frame_type: ZnpType, subsystem: ZnpSubsystem, command: u8) -> Self {
        Self { frame_type, subsystem, command, payload: Vec::new() }
    }

    pub fn with_payload(frame_type: ZnpType, subsystem: ZnpSubsystem, command: u8, payload: Vec<u8>) -> Self {
        Self { frame_type, subsystem, command, payload }
    }

    pub fn set_payload(&mut self, payload: Vec<u8>) -> &mut Self {
        self.payload = payload;
        self
    }

    pub fn append_byte(&mut self, b: u8) -> &mut Self {
        self.payload.push(b);
        self
    }

    pub fn append_word(&mut self, w: u16) -> &mut Self {
        self.payload.extend_from_slice(&w.to_le_bytes());
        self
    }

    pub fn append_dword(&mut self, d: u32) -> &mut Self {
        self.payload.extend_from_slice(&d.to_le_bytes());
        self
    }

    pub fn append_qword(&mut self, q: u64) -> &mut Self {
        self.payload.extend_from_slice(&q.to_le_bytes());
        self
    }

    pub fn append_bytes(&mut self, data: &[u8]) -> &mut Self {
        self.payload.extend_from_slice(data);
        self
    }

    pub fn cmd0(&self) -> u8 {
        self.frame_type.bits() | self.subsystem.bits()
    }

    pub fn cmd1(&self) -> u8 {
        self.command
    }

    pub fn is_request(&self) -> bool {
        self.frame_type == ZnpType::Sreq
    }

    pub fn is_response(&self) -> bool {
        self.frame_type == ZnpType::Srsp
    }

    pub fn is_indication(&self) -> bool {
        self.frame_type == ZnpType::Areq
    }

    pub fn get_byte(&self, offset: usize) -> u8 {
        self.payload.get(offset).copied().unwrap_or(0)
    }

    pub fn get_word(&self, offset: usize) -> u16 {
        match self.payload.get(offset..offset + 2) {
            Some(b) => u16::from_le_bytes([b[0], b[1]]),
            None => 0,
        }
    }

    pub fn get_dword(&self, offset: usize) -> u32 {
        match self.payload.get(offset..offset + 4) {
            Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            None => 0,
        }
    }

    pub fn get_qword(&self, offset: usize) -> u64 {
        match self.payload.get(offset..offset + 8) {
            Some(b) => u64::from_le_bytes(b.try_into().unwrap()),
            None => 0,
        }
    }

    pub fn get_bytes(&self, offset: usize, len: usize) -> Vec<u8> {
        match self.payload.get(offset..) {
            Some(rest) => rest[..len.min(rest.len())].to_vec(),
            None => Vec::new(),
        }
    }

    /// Serializes to the wire, appending the trailing FCS byte.
    pub fn serialize(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(MIN_FRAME_SIZE + self.payload.len());
        frame.push(SOF);
        frame.push(self.payload.len() as u8);
        frame.push(self.cmd0());
        frame.push(self.command);
        frame.extend_from_slice(&self.payload);
        let fcs = calculate_fcs(&frame[1..]);
        frame.push(fcs);
        frame
    }

    /// Parses a single complete frame out of `data`, ignoring anything
    /// before or after it. Returns `None` if no valid frame is present.
    pub fn parse(data: &[u8]) -> Option<ZnpFrame> {
        let (start, len) = find_frame(data)?;
        let frame = &data[start..start + len];
        let payload_len = frame[1] as usize;
        let cmd0 = frame[2];
        let cmd1 = frame[3];
        let frame_type = ZnpType::from_bits(cmd0);
        let subsystem = ZnpSubsystem::from_bits(cmd0);
        let payload = frame[4..4 + payload_len].to_vec();
        Some(ZnpFrame::with_payload(frame_type, subsystem, cmd1, payload))
    }
}

fn calculate_fcs(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |fcs, b| fcs ^ b)
}

/// Scans `data` for a complete, FCS-valid frame. Resyncs past a corrupt
/// SOF by continuing the scan rather than giving up on the whole buffer.
///
/// Returns `Some((offset, total_len))` on success.
pub fn find_frame(data: &[u8]) -> Option<(usize, usize)> {
    let len = data.len();
    let mut i = 0;
    while i < len {
        if data[i] == SOF {
            if i + MIN_FRAME_SIZE > len {
                return None;
            }
            let payload_len = data[i + 1] as usize;
            if payload_len > MAX_PAYLOAD_SIZE {
                i += 1;
                continue;
            }
            let total_len = MIN_FRAME_SIZE + payload_len;
            if i + total_len > len {
                return None;
            }
            let expected_fcs = calculate_fcs(&data[i + 1..i + 1 + payload_len + 3]);
            let actual_fcs = data[i + total_len - 1];
            if expected_fcs == actual_fcs {
                return Some((i, total_len));
            }
            // FCS mismatch: this SOF was noise inside another frame's
            // payload. Keep scanning from the next byte.
        }
        i += 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_then_parse_round_trips() {
        let mut frame = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Sys, cmd::sys::PING);
        frame.append_word(0x1234).append_byte(0xAB);
        let wire = frame.serialize();

        let parsed = ZnpFrame::parse(&wire).expect("frame should parse");
        assert_eq!(parsed.frame_type, ZnpType::Sreq);
        assert_eq!(parsed.subsystem, ZnpSubsystem::Sys);
        assert_eq!(parsed.command, cmd::sys::PING);
        assert_eq!(parsed.get_word(0), 0x1234);
        assert_eq!(parsed.get_byte(2), 0xAB);
    }

    #[test]
    fn find_frame_resyncs_past_fcs_mismatch() {
        let mut good = ZnpFrame::new(ZnpType::Areq, ZnpSubsystem::Zdo, cmd::zdo::STATE_CHANGE_IND);
        good.append_byte(0x09);
        let mut wire = good.serialize();

        // Prepend a bogus SOF with a garbage length/FCS that looks like a
        // frame start but fails the checksum check.
        let mut buf = vec![SOF, 0x02, 0x00, 0x00, 0xAA, 0xBB, 0x00];
        buf.extend_from_slice(&wire);
        wire = buf;

        let (start, len) = find_frame(&wire).expect("should find the valid frame after the bogus SOF");
        assert_eq!(&wire[start..start + len], &good.serialize()[..]);
    }

    #[test]
    fn find_frame_rejects_len_byte_above_max_payload() {
        let mut good = ZnpFrame::new(ZnpType::Areq, ZnpSubsystem::Zdo, cmd::zdo::STATE_CHANGE_IND);
        good.append_byte(0x09);
        let wire = good.serialize();

        // A bogus SOF whose len byte exceeds MAX_PAYLOAD_SIZE must be
        // resynced past, never accepted even if an FCS happened to match.
        let mut buf = vec![SOF, 0xFF];
        buf.extend_from_slice(&wire);
        let (start, len) = find_frame(&buf).expect("should find the valid frame after the oversized len byte");
        assert_eq!(&buf[start..start + len], &wire[..]);
    }

    #[test]
    fn find_frame_returns_none_when_incomplete() {
        let frame = {
            let mut f = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Sys, cmd::sys::VERSION);
            f.append_bytes(&[1, 2, 3]);
            f.serialize()
        };
        assert!(find_frame(&frame[..frame.len() - 1]).is_none());
    }

    #[test]
    fn device_state_from_u8_round_trips_known_values() {
        assert!(matches!(ZnpDeviceState::from(0x09), ZnpDeviceState::ZbCoord));
        assert!(matches!(ZnpDeviceState::from(0x07), ZnpDeviceState::Router));
        assert!(matches!(ZnpDeviceState::from(0xFF), ZnpDeviceState::Unknown(0xFF)));
    }
}
