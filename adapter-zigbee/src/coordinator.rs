//! Zigbee network state machine: device database, ZCL attribute
//! read/write/command plumbing, and the handful of convenience ops the
//! protocol handler needs (on/off, level, color temp, hue/sat).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hub_core::error::{HubError, Result};
use hub_core::zcl;

use crate::frame::{cmd, ZnpDeviceState, ZnpFrame, ZnpSubsystem, ZnpType};
use crate::transport::ZnpTransport;

const DEFAULT_ENDPOINT: u8 = 1;
const DEFAULT_PROFILE_ID: u16 = 0x0104; // Home Automation
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default)]
pub struct ZigbeeDeviceInfo {
    pub network_address: u16,
    pub ieee_address: u64,
    pub device_type: u8, // 0=Coordinator, 1=Router, 2=EndDevice
    pub manufacturer: String,
    pub model: String,
    pub date_code: String,
    pub endpoints: Vec<u8>,
    pub last_seen: i64,
    pub available: bool,
    pub in_clusters: HashMap<u8, Vec<u16>>,
    pub out_clusters: HashMap<u8, Vec<u16>>,
}

#[derive(Debug, Clone)]
pub struct ZclAttributeValue {
    pub cluster_id: u16,
    pub endpoint: u8,
    pub attribute_id: u16,
    pub data_type: u8,
    pub data: Vec<u8>,
}

impl ZclAttributeValue {
    pub fn as_bool(&self) -> bool {
        self.data.first().copied().unwrap_or(0) != 0
    }

    pub fn as_u8(&self) -> u8 {
        self.data.first().copied().unwrap_or(0)
    }

    pub fn as_i8(&self) -> i8 {
        self.as_u8() as i8
    }

    pub fn as_u16(&self) -> u16 {
        match self.data.get(0..2) {
            Some(b) => u16::from_le_bytes([b[0], b[1]]),
            None => 0,
        }
    }

    pub fn as_i16(&self) -> i16 {
        self.as_u16() as i16
    }

    pub fn as_u32(&self) -> u32 {
        match self.data.get(0..4) {
            Some(b) => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            None => 0,
        }
    }

    pub fn as_i32(&self) -> i32 {
        self.as_u32() as i32
    }

    pub fn as_string(&self) -> String {
        // ZCL character strings are length-prefixed.
        match self.data.first() {
            Some(&len) => {
                let len = len as usize;
                String::from_utf8_lossy(&self.data[1..1 + len.min(self.data.len().saturating_sub(1))]).into_owned()
            }
            None => String::new(),
        }
    }
}

type DeviceJoinedCallback = Arc<dyn Fn(&ZigbeeDeviceInfo) + Send + Sync>;
type DeviceLeftCallback = Arc<dyn Fn(u64) + Send + Sync>;
type DeviceAnnouncedCallback = Arc<dyn Fn(u16, u64) + Send + Sync>;
type AttributeReportCallback = Arc<dyn Fn(u16, &ZclAttributeValue) + Send + Sync>;
type CommandReceivedCallback = Arc<dyn Fn(u16, u8, u16, u8, &[u8]) + Send + Sync>;

#[derive(Default)]
struct Callbacks {
    device_joined: Option<DeviceJoinedCallback>,
    device_left: Option<DeviceLeftCallback>,
    device_announced: Option<DeviceAnnouncedCallback>,
    attribute_report: Option<AttributeReportCallback>,
    command_received: Option<CommandReceivedCallback>,
}

#[derive(Default)]
struct DeviceDb {
    by_ieee: HashMap<u64, ZigbeeDeviceInfo>,
    nwk_to_ieee: HashMap<u16, u64>,
}

struct PendingAttrRead {
    tx: tokio::sync::oneshot::Sender<ZclAttributeValue>,
}

pub struct ZigbeeCoordinator {
    transport: Arc<ZnpTransport>,
    network_up: std::sync::atomic::AtomicBool,
    pan_id: std::sync::atomic::AtomicU16,
    ieee_address: std::sync::atomic::AtomicU64,
    channel: AtomicU8,
    trans_seq: AtomicU8,
    devices: Mutex<DeviceDb>,
    callbacks: Mutex<Callbacks>,
    pending_reads: Mutex<HashMap<(u16, u16, u16), PendingAttrRead>>,
    coord_ready: Mutex<Option<tokio::sync::oneshot::Sender<()>>>,
}

/// Bound on how long `start_network` waits for the ZDO_STATE_CHANGE_IND
/// reporting ZB_COORD before giving up.
const NETWORK_FORMATION_TIMEOUT: Duration = Duration::from_secs(30);

impl ZigbeeCoordinator {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Arc<Self> {
        Self::with_transport(Arc::new(ZnpTransport::new(port, baud_rate)))
    }

    pub fn with_transport(transport: Arc<ZnpTransport>) -> Arc<Self> {
        Arc::new(Self {
            transport,
            network_up: std::sync::atomic::AtomicBool::new(false),
            pan_id: std::sync::atomic::AtomicU16::new(0),
            ieee_address: std::sync::atomic::AtomicU64::new(0),
            channel: AtomicU8::new(0),
            trans_seq: AtomicU8::new(0),
            devices: Mutex::new(DeviceDb::default()),
            callbacks: Mutex::new(Callbacks::default()),
            pending_reads: Mutex::new(HashMap::new()),
            coord_ready: Mutex::new(None),
        })
    }

    pub fn is_network_up(&self) -> bool {
        self.network_up.load(Ordering::SeqCst)
    }

    pub fn pan_id(&self) -> u16 {
        self.pan_id.load(Ordering::SeqCst)
    }

    pub fn ieee_address(&self) -> u64 {
        self.ieee_address.load(Ordering::SeqCst)
    }

    pub fn channel(&self) -> u8 {
        self.channel.load(Ordering::SeqCst)
    }

    fn next_transaction_seq(&self) -> u8 {
        self.trans_seq.fetch_add(1, Ordering::SeqCst)
    }

    pub fn set_device_joined_callback(&self, cb: DeviceJoinedCallback) {
        self.callbacks.lock().unwrap().device_joined = Some(cb);
    }

    pub fn set_device_left_callback(&self, cb: DeviceLeftCallback) {
        self.callbacks.lock().unwrap().device_left = Some(cb);
    }

    pub fn set_device_announced_callback(&self, cb: DeviceAnnouncedCallback) {
        self.callbacks.lock().unwrap().device_announced = Some(cb);
    }

    pub fn set_attribute_report_callback(&self, cb: AttributeReportCallback) {
        self.callbacks.lock().unwrap().attribute_report = Some(cb);
    }

    pub fn set_command_received_callback(&self, cb: CommandReceivedCallback) {
        self.callbacks.lock().unwrap().command_received = Some(cb);
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub async fn initialize(self: &Arc<Self>) -> Result<()> {
        self.transport.open().await?;
        let coordinator = self.clone();
        self.transport.set_indication_callback(Arc::new(move |frame| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move {
                coordinator.handle_indication(frame).await;
            });
        }));
        self.ping().await?;
        self.register_endpoint(
            DEFAULT_ENDPOINT,
            DEFAULT_PROFILE_ID,
            0x0100,
            &[
                zcl::cluster::BASIC,
                zcl::cluster::ON_OFF,
                zcl::cluster::LEVEL_CONTROL,
                zcl::cluster::COLOR_CONTROL,
                zcl::cluster::TEMPERATURE_MEASUREMENT,
                zcl::cluster::RELATIVE_HUMIDITY,
                zcl::cluster::OCCUPANCY_SENSING,
                zcl::cluster::IAS_ZONE,
                zcl::cluster::POWER_CONFIG,
            ],
            &[],
        )
        .await?;
        Ok(())
    }

    pub async fn shutdown(&self) {
        self.transport.close().await;
        self.network_up.store(false, Ordering::SeqCst);
    }

    pub async fn ping(&self) -> Result<()> {
        let frame = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Sys, cmd::sys::PING);
        self.transport.request(&frame, DEFAULT_REQUEST_TIMEOUT).await?;
        Ok(())
    }

    pub async fn reset(&self, hard: bool) -> Result<()> {
        if hard {
            self.transport.reset_coordinator().await
        } else {
            let mut frame = ZnpFrame::new(ZnpType::Areq, ZnpSubsystem::Sys, cmd::sys::RESET_REQ);
            frame.append_byte(0x00); // target: soft reset
            self.transport.send(&frame).await
        }
    }

    async fn register_endpoint(&self, endpoint: u8, profile_id: u16, device_id: u16, in_clusters: &[u16], out_clusters: &[u16]) -> Result<()> {
        let mut frame = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Af, cmd::af::REGISTER);
        frame
            .append_byte(endpoint)
            .append_word(profile_id)
            .append_word(device_id)
            .append_byte(0) // device version
            .append_byte(0); // latency flags
        frame.append_byte(in_clusters.len() as u8);
        for c in in_clusters {
            frame.append_word(*c);
        }
        frame.append_byte(out_clusters.len() as u8);
        for c in out_clusters {
            frame.append_word(*c);
        }
        self.transport.request(&frame, DEFAULT_REQUEST_TIMEOUT).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Network operations
    // ------------------------------------------------------------------

    /// Issues ZDO_STARTUP_FROM_APP and waits for the asynchronous
    /// ZDO_STATE_CHANGE_IND reporting `ZB_COORD`. The SRSP to the request
    /// only confirms the command was accepted, not that the network formed;
    /// the device state indication is the authoritative signal. Fails with
    /// `HubError::Timeout` if the coordinator hasn't reached `ZB_COORD`
    /// within `NETWORK_FORMATION_TIMEOUT`.
    pub async fn start_network(&self) -> Result<()> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        *self.coord_ready.lock().unwrap() = Some(tx);

        let mut frame = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Zdo, cmd::zdo::STARTUP_FROM_APP);
        frame.append_word(100); // startDelay ms
        if let Err(e) = self.transport.request(&frame, DEFAULT_REQUEST_TIMEOUT).await {
            self.coord_ready.lock().unwrap().take();
            return Err(e);
        }

        if self.is_network_up() {
            self.coord_ready.lock().unwrap().take();
            return Ok(());
        }

        match tokio::time::timeout(NETWORK_FORMATION_TIMEOUT, rx).await {
            Ok(Ok(())) => Ok(()),
            _ => {
                self.coord_ready.lock().unwrap().take();
                Err(HubError::Timeout)
            }
        }
    }

    pub async fn permit_join(&self, duration: u8) -> Result<()> {
        let mut frame = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Zdo, cmd::zdo::MGMT_PERMIT_JOIN_REQ);
        frame.append_word(0xFFFC); // broadcast to all routers + coordinator
        frame.append_byte(duration);
        frame.append_byte(0); // TC significance
        self.transport.request(&frame, DEFAULT_REQUEST_TIMEOUT).await?;
        Ok(())
    }

    pub async fn get_version(&self) -> Result<(u8, u8, u8, u8, u8)> {
        let frame = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Sys, cmd::sys::VERSION);
        let response = self.transport.request(&frame, DEFAULT_REQUEST_TIMEOUT).await?;
        Ok((response.get_byte(0), response.get_byte(1), response.get_byte(2), response.get_byte(3), response.get_byte(4)))
    }

    pub async fn request_device_info(&self, nwk_addr: u16) -> Result<()> {
        let mut frame = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Zdo, cmd::zdo::IEEE_ADDR_REQ);
        frame.append_word(nwk_addr).append_byte(0).append_byte(0);
        self.transport.request(&frame, DEFAULT_REQUEST_TIMEOUT).await?;

        let mut frame = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Zdo, cmd::zdo::ACTIVE_EP_REQ);
        frame.append_word(nwk_addr).append_word(nwk_addr);
        self.transport.request(&frame, DEFAULT_REQUEST_TIMEOUT).await?;
        Ok(())
    }

    pub async fn leave_request(&self, ieee_addr: u64) -> Result<()> {
        let mut frame = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Zdo, cmd::zdo::MGMT_LEAVE_REQ);
        let nwk_addr = {
            let db = self.devices.lock().unwrap();
            db.by_ieee.get(&ieee_addr).map(|d| d.network_address).unwrap_or(0)
        };
        frame.append_word(nwk_addr).append_qword(ieee_addr).append_byte(0);
        self.transport.request(&frame, DEFAULT_REQUEST_TIMEOUT).await?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Device operations: ZCL over AF::DATA_REQUEST
    // ------------------------------------------------------------------

    fn zcl_header(&self, cluster_specific: bool, disable_default_rsp: bool, command: u8) -> (u8, u8, u8) {
        let mut frame_control = 0u8;
        if cluster_specific {
            frame_control |= zcl::frame_ctrl::CLUSTER_SPECIFIC;
        }
        if disable_default_rsp {
            frame_control |= zcl::frame_ctrl::DISABLE_DEFAULT_RSP;
        }
        (frame_control, self.next_transaction_seq(), command)
    }

    async fn send_af_data(&self, nwk_addr: u16, endpoint: u8, cluster: u16, zcl_payload: &[u8]) -> Result<()> {
        let mut frame = ZnpFrame::new(ZnpType::Sreq, ZnpSubsystem::Af, cmd::af::DATA_REQUEST);
        frame
            .append_word(nwk_addr)
            .append_byte(DEFAULT_ENDPOINT)
            .append_byte(endpoint)
            .append_word(cluster)
            .append_byte(self.next_transaction_seq()) // AF transaction id, distinct from ZCL seq
            .append_byte(0x00) // options
            .append_byte(30) // radius
            .append_byte(zcl_payload.len() as u8)
            .append_bytes(zcl_payload);
        self.transport.request(&frame, DEFAULT_REQUEST_TIMEOUT).await?;
        Ok(())
    }

    pub async fn read_attribute(&self, nwk_addr: u16, endpoint: u8, cluster: u16, attr_id: u16) -> Result<ZclAttributeValue> {
        let (frame_control, seq, _) = self.zcl_header(false, true, zcl::global_cmd::READ_ATTRIBUTES);
        let mut payload = vec![frame_control, seq, zcl::global_cmd::READ_ATTRIBUTES];
        payload.extend_from_slice(&attr_id.to_le_bytes());

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.pending_reads.lock().unwrap().insert((nwk_addr, cluster, attr_id), PendingAttrRead { tx });
        self.send_af_data(nwk_addr, endpoint, cluster, &payload).await?;

        match tokio::time::timeout(DEFAULT_REQUEST_TIMEOUT, rx).await {
            Ok(Ok(value)) => Ok(value),
            _ => {
                self.pending_reads.lock().unwrap().remove(&(nwk_addr, cluster, attr_id));
                Err(HubError::Timeout)
            }
        }
    }

    pub async fn write_attribute(&self, nwk_addr: u16, endpoint: u8, cluster: u16, attr_id: u16, data_type: u8, value: &[u8]) -> Result<()> {
        let (frame_control, seq, _) = self.zcl_header(false, true, zcl::global_cmd::WRITE_ATTRIBUTES);
        let mut payload = vec![frame_control, seq, zcl::global_cmd::WRITE_ATTRIBUTES];
        payload.extend_from_slice(&attr_id.to_le_bytes());
        payload.push(data_type);
        payload.extend_from_slice(value);
        self.send_af_data(nwk_addr, endpoint, cluster, &payload).await
    }

    pub async fn send_command(&self, nwk_addr: u16, endpoint: u8, cluster: u16, command: u8, payload: &[u8], disable_default_rsp: bool) -> Result<()> {
        let (frame_control, seq, command) = self.zcl_header(true, disable_default_rsp, command);
        let mut zcl_payload = vec![frame_control, seq, command];
        zcl_payload.extend_from_slice(payload);
        self.send_af_data(nwk_addr, endpoint, cluster, &zcl_payload).await
    }

    pub async fn configure_reporting(
        &self,
        nwk_addr: u16,
        endpoint: u8,
        cluster: u16,
        attr_id: u16,
        data_type: u8,
        min_interval: u16,
        max_interval: u16,
        reportable_change: &[u8],
    ) -> Result<()> {
        let (frame_control, seq, _) = self.zcl_header(false, true, zcl::global_cmd::CONFIGURE_REPORTING);
        let mut payload = vec![frame_control, seq, zcl::global_cmd::CONFIGURE_REPORTING];
        payload.push(0x00); // direction: report
        payload.extend_from_slice(&attr_id.to_le_bytes());
        payload.push(data_type);
        payload.extend_from_slice(&min_interval.to_le_bytes());
        payload.extend_from_slice(&max_interval.to_le_bytes());
        payload.extend_from_slice(reportable_change);
        self.send_af_data(nwk_addr, endpoint, cluster, &payload).await
    }

    // ------------------------------------------------------------------
    // Convenience ops
    // ------------------------------------------------------------------

    pub async fn set_on_off(&self, nwk_addr: u16, endpoint: u8, on: bool) -> Result<()> {
        let command = if on { zcl::cmd::onoff::ON } else { zcl::cmd::onoff::OFF };
        self.send_command(nwk_addr, endpoint, zcl::cluster::ON_OFF, command, &[], true).await
    }

    pub async fn set_level(&self, nwk_addr: u16, endpoint: u8, level: u8, transition_time: u16) -> Result<()> {
        let mut payload = vec![level];
        payload.extend_from_slice(&transition_time.to_le_bytes());
        self.send_command(nwk_addr, endpoint, zcl::cluster::LEVEL_CONTROL, zcl::cmd::level::MOVE_TO_LEVEL, &payload, true).await
    }

    pub async fn set_color_temp(&self, nwk_addr: u16, endpoint: u8, color_temp: u16, transition_time: u16) -> Result<()> {
        let mut payload = Vec::new();
        payload.extend_from_slice(&color_temp.to_le_bytes());
        payload.extend_from_slice(&transition_time.to_le_bytes());
        self.send_command(nwk_addr, endpoint, zcl::cluster::COLOR_CONTROL, zcl::cmd::color::MOVE_TO_COLOR_TEMP, &payload, true).await
    }

    pub async fn set_hue_sat(&self, nwk_addr: u16, endpoint: u8, hue: u8, sat: u8, transition_time: u16) -> Result<()> {
        let mut payload = vec![hue, sat];
        payload.extend_from_slice(&transition_time.to_le_bytes());
        self.send_command(nwk_addr, endpoint, zcl::cluster::COLOR_CONTROL, zcl::cmd::color::MOVE_TO_HUE_SAT, &payload, true).await
    }

    // ------------------------------------------------------------------
    // Device database
    // ------------------------------------------------------------------

    pub fn get_device(&self, ieee_addr: u64) -> Option<ZigbeeDeviceInfo> {
        self.devices.lock().unwrap().by_ieee.get(&ieee_addr).cloned()
    }

    pub fn get_device_by_nwk_addr(&self, nwk_addr: u16) -> Option<ZigbeeDeviceInfo> {
        let db = self.devices.lock().unwrap();
        db.nwk_to_ieee.get(&nwk_addr).and_then(|ieee| db.by_ieee.get(ieee)).cloned()
    }

    pub fn get_all_devices(&self) -> Vec<ZigbeeDeviceInfo> {
        self.devices.lock().unwrap().by_ieee.values().cloned().collect()
    }

    pub fn device_count(&self) -> usize {
        self.devices.lock().unwrap().by_ieee.len()
    }

    // ------------------------------------------------------------------
    // Indication handling
    // ------------------------------------------------------------------

    async fn handle_indication(self: &Arc<Self>, frame: ZnpFrame) {
        match (frame.subsystem, frame.command) {
            (ZnpSubsystem::Zdo, cmd::zdo::STATE_CHANGE_IND) => self.handle_state_change(&frame),
            (ZnpSubsystem::Zdo, cmd::zdo::END_DEVICE_ANNCE_IND) => self.handle_device_announce(&frame),
            (ZnpSubsystem::Zdo, cmd::zdo::LEAVE_IND) => self.handle_device_leave(&frame),
            (ZnpSubsystem::Zdo, cmd::zdo::TC_DEV_IND) => self.handle_tc_device_ind(&frame),
            (ZnpSubsystem::Zdo, cmd::zdo::ACTIVE_EP_RSP) => self.handle_active_ep_rsp(&frame),
            (ZnpSubsystem::Zdo, cmd::zdo::SIMPLE_DESC_RSP) => self.handle_simple_desc_rsp(&frame),
            (ZnpSubsystem::Af, cmd::af::INCOMING_MSG) => self.handle_incoming_message(&frame),
            _ => {}
        }
    }

    fn handle_state_change(&self, frame: &ZnpFrame) {
        let state = ZnpDeviceState::from(frame.get_byte(0));
        let up = matches!(state, ZnpDeviceState::ZbCoord);
        self.network_up.store(up, Ordering::SeqCst);
        if up {
            if let Some(tx) = self.coord_ready.lock().unwrap().take() {
                let _ = tx.send(());
            }
        }
    }

    fn handle_device_announce(&self, frame: &ZnpFrame) {
        let nwk_addr = frame.get_word(0);
        let ieee_addr = frame.get_qword(2);
        {
            let mut db = self.devices.lock().unwrap();
            db.nwk_to_ieee.insert(nwk_addr, ieee_addr);
            let entry = db.by_ieee.entry(ieee_addr).or_insert_with(|| ZigbeeDeviceInfo { ieee_address: ieee_addr, ..Default::default() });
            entry.network_address = nwk_addr;
            entry.available = true;
        }
        if let Some(cb) = self.callbacks.lock().unwrap().device_announced.clone() {
            cb(nwk_addr, ieee_addr);
        }
        if let Some(info) = self.get_device(ieee_addr) {
            if let Some(cb) = self.callbacks.lock().unwrap().device_joined.clone() {
                cb(&info);
            }
        }
    }

    fn handle_device_leave(&self, frame: &ZnpFrame) {
        let ieee_addr = frame.get_qword(0);
        {
            let mut db = self.devices.lock().unwrap();
            if let Some(info) = db.by_ieee.remove(&ieee_addr) {
                db.nwk_to_ieee.remove(&info.network_address);
            }
        }
        if let Some(cb) = self.callbacks.lock().unwrap().device_left.clone() {
            cb(ieee_addr);
        }
    }

    fn handle_tc_device_ind(&self, frame: &ZnpFrame) {
        let nwk_addr = frame.get_word(0);
        let ieee_addr = frame.get_qword(2);
        let mut db = self.devices.lock().unwrap();
        db.nwk_to_ieee.insert(nwk_addr, ieee_addr);
        db.by_ieee.entry(ieee_addr).or_insert_with(|| ZigbeeDeviceInfo { ieee_address: ieee_addr, network_address: nwk_addr, ..Default::default() });
    }

    fn handle_active_ep_rsp(&self, frame: &ZnpFrame) {
        // srcAddr(2) status(1) nwkAddrOfInterest(2) epCount(1) epList(n)
        let nwk_addr = frame.get_word(3);
        let count = frame.get_byte(5) as usize;
        let endpoints = frame.get_bytes(6, count);
        let mut db = self.devices.lock().unwrap();
        if let Some(ieee) = db.nwk_to_ieee.get(&nwk_addr).copied() {
            if let Some(info) = db.by_ieee.get_mut(&ieee) {
                info.endpoints = endpoints;
            }
        }
    }

    fn handle_simple_desc_rsp(&self, frame: &ZnpFrame) {
        // srcAddr(2) status(1) nwkAddr(2) len(1) endpoint(1) profileId(2)
        // deviceId(2) version(1) numIn(1) inClusters... numOut(1) outClusters...
        let nwk_addr = frame.get_word(3);
        let endpoint = frame.get_byte(6);
        let mut offset = 12;
        let num_in = frame.get_byte(offset) as usize;
        offset += 1;
        let mut in_clusters = Vec::with_capacity(num_in);
        for _ in 0..num_in {
            in_clusters.push(frame.get_word(offset));
            offset += 2;
        }
        let num_out = frame.get_byte(offset) as usize;
        offset += 1;
        let mut out_clusters = Vec::with_capacity(num_out);
        for _ in 0..num_out {
            out_clusters.push(frame.get_word(offset));
            offset += 2;
        }

        let mut db = self.devices.lock().unwrap();
        if let Some(ieee) = db.nwk_to_ieee.get(&nwk_addr).copied() {
            if let Some(info) = db.by_ieee.get_mut(&ieee) {
                info.in_clusters.insert(endpoint, in_clusters);
                info.out_clusters.insert(endpoint, out_clusters);
            }
        }
    }

    fn handle_incoming_message(&self, frame: &ZnpFrame) {
        // groupId(2) clusterId(2) srcAddr(2) srcEp(1) dstEp(1) wasBroadcast(1)
        // linkQuality(1) securityUse(1) timestamp(4) transSeq(1) len(1) data...
        let cluster = frame.get_word(2);
        let nwk_addr = frame.get_word(4);
        let endpoint = frame.get_byte(6);
        let zcl_len_offset = 16;
        let zcl_len = frame.get_byte(zcl_len_offset) as usize;
        let zcl_payload = frame.get_bytes(zcl_len_offset + 1, zcl_len);
        if zcl_payload.len() < 3 {
            return;
        }
        let frame_control = zcl_payload[0];
        let command = zcl_payload[2];
        let body = &zcl_payload[3..];

        if frame_control & zcl::frame_ctrl::CLUSTER_SPECIFIC != 0 {
            if let Some(cb) = self.callbacks.lock().unwrap().command_received.clone() {
                cb(nwk_addr, endpoint, cluster, command, body);
            }
            return;
        }

        if command == zcl::global_cmd::READ_ATTRIBUTES_RSP || command == zcl::global_cmd::REPORT_ATTRIBUTES {
            self.handle_attribute_payload(nwk_addr, endpoint, cluster, command, body);
        }
    }

    fn handle_attribute_payload(&self, nwk_addr: u16, endpoint: u8, cluster: u16, command: u8, mut body: &[u8]) {
        while body.len() >= 3 {
            let attr_id = u16::from_le_bytes([body[0], body[1]]);
            let (data_type, data, consumed) = if command == zcl::global_cmd::READ_ATTRIBUTES_RSP {
                let status = body[2];
                if status != zcl::status::SUCCESS {
                    return;
                }
                let data_type = body[3];
                let size = zcl::datatype::size_of(data_type).max(1).min(body.len().saturating_sub(4));
                (data_type, body[4..4 + size].to_vec(), 4 + size)
            } else {
                let data_type = body[2];
                let size = zcl::datatype::size_of(data_type).max(1).min(body.len().saturating_sub(3));
                (data_type, body[3..3 + size].to_vec(), 3 + size)
            };

            let value = ZclAttributeValue { cluster_id: cluster, endpoint, attribute_id: attr_id, data_type, data };

            if let Some(pending) = self.pending_reads.lock().unwrap().remove(&(nwk_addr, cluster, attr_id)) {
                let _ = pending.tx.send(value.clone());
            }
            if let Some(cb) = self.callbacks.lock().unwrap().attribute_report.clone() {
                cb(nwk_addr, &value);
            }

            if consumed == 0 || consumed > body.len() {
                break;
            }
            body = &body[consumed..];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_value_decodes_little_endian_u16() {
        let v = ZclAttributeValue { cluster_id: 0, endpoint: 1, attribute_id: 0, data_type: zcl::datatype::UINT16, data: vec![0x34, 0x12] };
        assert_eq!(v.as_u16(), 0x1234);
    }

    #[test]
    fn attribute_value_decodes_bool() {
        let v = ZclAttributeValue { cluster_id: 0, endpoint: 1, attribute_id: 0, data_type: zcl::datatype::BOOLEAN, data: vec![1] };
        assert!(v.as_bool());
    }

    #[tokio::test]
    async fn transaction_sequence_numbers_increment_and_wrap() {
        let coordinator = ZigbeeCoordinator::with_transport(Arc::new(ZnpTransport::new("mock0", 115200)));
        let first = coordinator.next_transaction_seq();
        let second = coordinator.next_transaction_seq();
        assert_eq!(second, first.wrapping_add(1));
    }
}
