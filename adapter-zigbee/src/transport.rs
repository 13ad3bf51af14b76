//! Serial transport for the ZNP coordinator: frame (de)serialization, a
//! background reader task, and correlated synchronous request/response.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;

use hub_core::error::{HubError, Result};

use crate::frame::{find_frame, ZnpFrame};

/// Abstraction over the physical serial link so the transport can be driven
/// by a mock in tests without a real coordinator attached.
#[async_trait]
pub trait SerialPort: Send {
    async fn open(&mut self, port: &str, baud_rate: u32) -> std::io::Result<()>;
    async fn close(&mut self);
    fn is_open(&self) -> bool;
    async fn write(&mut self, data: &[u8]) -> std::io::Result<usize>;
    /// Reads whatever is available, waiting up to `timeout` for the first byte.
    async fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> std::io::Result<usize>;
    fn set_dtr(&mut self, state: bool) -> std::io::Result<()>;
    fn set_rts(&mut self, state: bool) -> std::io::Result<()>;
}

pub struct TokioSerialPort {
    stream: Option<tokio_serial::SerialStream>,
}

impl TokioSerialPort {
    pub fn new() -> Self {
        Self { stream: None }
    }
}

impl Default for TokioSerialPort {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SerialPort for TokioSerialPort {
    async fn open(&mut self, port: &str, baud_rate: u32) -> std::io::Result<()> {
        use tokio_serial::SerialPortBuilderExt;
        let stream = tokio_serial::new(port, baud_rate).timeout(Duration::from_millis(100)).open_native_async()?;
        self.stream = Some(stream);
        Ok(())
    }

    async fn close(&mut self) {
        self.stream = None;
    }

    fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    async fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        use tokio::io::AsyncWriteExt;
        match &mut self.stream {
            Some(s) => {
                s.write_all(data).await?;
                Ok(data.len())
            }
            None => Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "serial port not open")),
        }
    }

    async fn read(&mut self, buffer: &mut [u8], timeout: Duration) -> std::io::Result<usize> {
        use tokio::io::AsyncReadExt;
        match &mut self.stream {
            Some(s) => match tokio::time::timeout(timeout, s.read(buffer)).await {
                Ok(result) => result,
                Err(_) => Ok(0),
            },
            None => Err(std::io::Error::new(std::io::ErrorKind::NotConnected, "serial port not open")),
        }
    }

    fn set_dtr(&mut self, state: bool) -> std::io::Result<()> {
        use tokio_serial::SerialPort as _;
        self.stream.as_mut().map(|s| s.write_data_terminal_ready(state)).transpose()?;
        Ok(())
    }

    fn set_rts(&mut self, state: bool) -> std::io::Result<()> {
        use tokio_serial::SerialPort as _;
        self.stream.as_mut().map(|s| s.write_request_to_send(state)).transpose()?;
        Ok(())
    }
}

pub type IndicationCallback = Arc<dyn Fn(ZnpFrame) + Send + Sync>;

struct PendingRequest {
    expected_cmd0: u8,
    expected_cmd1: u8,
    tx: oneshot::Sender<ZnpFrame>,
}

struct Shared {
    serial: Mutex<Box<dyn SerialPort>>,
    rx_buffer: Mutex<VecDeque<u8>>,
    pending: Mutex<Option<PendingRequest>>,
    indication_cb: Mutex<Option<IndicationCallback>>,
    parse_errors: AtomicU64,
}

pub struct ZnpTransport {
    shared: Arc<Shared>,
    port: String,
    baud_rate: u32,
    running: Arc<std::sync::atomic::AtomicBool>,
    reader_task: Mutex<Option<JoinHandle<()>>>,
}

impl ZnpTransport {
    pub fn new(port: impl Into<String>, baud_rate: u32) -> Self {
        Self::with_serial_port(Box::new(TokioSerialPort::new()), port, baud_rate)
    }

    pub fn with_serial_port(serial: Box<dyn SerialPort>, port: impl Into<String>, baud_rate: u32) -> Self {
        Self {
            shared: Arc::new(Shared {
                serial: Mutex::new(serial),
                rx_buffer: Mutex::new(VecDeque::new()),
                pending: Mutex::new(None),
                indication_cb: Mutex::new(None),
                parse_errors: AtomicU64::new(0),
            }),
            port: port.into(),
            baud_rate,
            running: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            reader_task: Mutex::new(None),
        }
    }

    pub fn port_name(&self) -> &str {
        &self.port
    }

    pub fn baud_rate(&self) -> u32 {
        self.baud_rate
    }

    pub async fn is_open(&self) -> bool {
        self.shared.serial.lock().await.is_open()
    }

    pub async fn open(&self) -> Result<()> {
        {
            let mut serial = self.shared.serial.lock().await;
            serial.open(&self.port, self.baud_rate).await.map_err(HubError::IoError)?;
        }
        self.running.store(true, std::sync::atomic::Ordering::SeqCst);
        let shared = self.shared.clone();
        let running = self.running.clone();
        let handle = tokio::spawn(async move { reader_loop(shared, running).await });
        *self.reader_task.lock().await = Some(handle);
        Ok(())
    }

    pub async fn close(&self) {
        self.running.store(false, std::sync::atomic::Ordering::SeqCst);
        if let Some(handle) = self.reader_task.lock().await.take() {
            handle.abort();
        }
        self.shared.serial.lock().await.close().await;
    }

    /// Number of frames that passed `find_frame`'s FCS check but failed to
    /// parse into a `ZnpFrame` (e.g. a truncated payload slice).
    pub fn parse_error_count(&self) -> u64 {
        self.shared.parse_errors.load(Ordering::Relaxed)
    }

    pub fn set_indication_callback(&self, callback: IndicationCallback) {
        // Best-effort: the lock is uncontended except during the brief
        // window a frame is being dispatched.
        if let Ok(mut cb) = self.shared.indication_cb.try_lock() {
            *cb = Some(callback);
        }
    }

    /// Sends `frame` and blocks until the matching SRSP arrives or `timeout` elapses.
    pub async fn request(&self, frame: &ZnpFrame, timeout: Duration) -> Result<ZnpFrame> {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock().await;
            *pending = Some(PendingRequest {
                expected_cmd0: crate::frame::ZnpType::Srsp.bits() | frame.subsystem.bits(),
                expected_cmd1: frame.command,
                tx,
            });
        }
        self.send(frame).await?;
        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(HubError::Timeout),
            Err(_) => {
                *self.shared.pending.lock().await = None;
                Err(HubError::Timeout)
            }
        }
    }

    pub async fn send(&self, frame: &ZnpFrame) -> Result<()> {
        let wire = frame.serialize();
        let mut serial = self.shared.serial.lock().await;
        serial.write(&wire).await.map_err(HubError::IoError)?;
        Ok(())
    }

    /// Toggles DTR/RTS to reset the coordinator into its boot sequence.
    pub async fn reset_coordinator(&self) -> Result<()> {
        let mut serial = self.shared.serial.lock().await;
        serial.set_rts(true).map_err(HubError::IoError)?;
        serial.set_dtr(false).map_err(HubError::IoError)?;
        drop(serial);
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut serial = self.shared.serial.lock().await;
        serial.set_dtr(true).map_err(HubError::IoError)?;
        serial.set_rts(false).map_err(HubError::IoError)?;
        drop(serial);
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }
}

async fn reader_loop(shared: Arc<Shared>, running: Arc<std::sync::atomic::AtomicBool>) {
    let mut chunk = [0u8; 256];
    while running.load(std::sync::atomic::Ordering::SeqCst) {
        let n = {
            let mut serial = shared.serial.lock().await;
            match serial.read(&mut chunk, Duration::from_millis(100)).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!(error = %e, "znp serial read failed");
                    0
                }
            }
        };
        if n == 0 {
            // Mock ports return immediately with nothing to read; back off
            // briefly so the reader task doesn't starve the scheduler.
            tokio::time::sleep(Duration::from_millis(5)).await;
            continue;
        }
        {
            let mut buf = shared.rx_buffer.lock().await;
            buf.extend(&chunk[..n]);
        }
        process_received_data(&shared).await;
    }
}

async fn process_received_data(shared: &Arc<Shared>) {
    loop {
        let found = {
            let buf = shared.rx_buffer.lock().await;
            let contiguous: Vec<u8> = buf.iter().copied().collect();
            find_frame(&contiguous).map(|(start, len)| (start, len, contiguous))
        };
        let Some((start, len, contiguous)) = found else { break };
        let frame_bytes = &contiguous[start..start + len];
        let frame = ZnpFrame::parse(frame_bytes);
        {
            let mut buf = shared.rx_buffer.lock().await;
            buf.drain(0..start + len);
        }
        match frame {
            Some(frame) => dispatch_frame(shared, frame).await,
            None => {
                shared.parse_errors.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(bytes = ?frame_bytes, "znp frame failed to parse after passing fcs check");
            }
        }
    }
}

async fn dispatch_frame(shared: &Arc<Shared>, frame: ZnpFrame) {
    if frame.is_response() {
        let mut pending = shared.pending.lock().await;
        let matches = pending
            .as_ref()
            .map(|p| p.expected_cmd0 == frame.cmd0() && p.expected_cmd1 == frame.cmd1())
            .unwrap_or(false);
        if matches {
            if let Some(p) = pending.take() {
                let _ = p.tx.send(frame);
            }
            return;
        } else {
            tracing::warn!(cmd0 = frame.cmd0(), cmd1 = frame.cmd1(), "orphaned response");
            return;
        }
    }
    if frame.is_indication() {
        let cb = shared.indication_cb.lock().await.clone();
        if let Some(cb) = cb {
            cb(frame);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque as Deque;
    use std::sync::Mutex as StdMutex;

    struct MockSerialPort {
        open: bool,
        inbox: Arc<StdMutex<Deque<u8>>>,
        outbox: Arc<StdMutex<Vec<u8>>>,
    }

    #[async_trait]
    impl SerialPort for MockSerialPort {
        async fn open(&mut self, _port: &str, _baud_rate: u32) -> std::io::Result<()> {
            self.open = true;
            Ok(())
        }

        async fn close(&mut self) {
            self.open = false;
        }

        fn is_open(&self) -> bool {
            self.open
        }

        async fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
            self.outbox.lock().unwrap().extend_from_slice(data);
            Ok(data.len())
        }

        async fn read(&mut self, buffer: &mut [u8], _timeout: Duration) -> std::io::Result<usize> {
            let mut inbox = self.inbox.lock().unwrap();
            let n = inbox.len().min(buffer.len());
            for slot in buffer.iter_mut().take(n) {
                *slot = inbox.pop_front().unwrap();
            }
            Ok(n)
        }

        fn set_dtr(&mut self, _state: bool) -> std::io::Result<()> {
            Ok(())
        }

        fn set_rts(&mut self, _state: bool) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn request_resolves_on_matching_srsp() {
        let inbox = Arc::new(StdMutex::new(Deque::new()));
        let outbox = Arc::new(StdMutex::new(Vec::new()));
        let mock = MockSerialPort { open: false, inbox: inbox.clone(), outbox: outbox.clone() };
        let transport = ZnpTransport::with_serial_port(Box::new(mock), "mock0", 115200);
        transport.open().await.unwrap();

        let response = crate::frame::ZnpFrame::new(
            crate::frame::ZnpType::Srsp,
            crate::frame::ZnpSubsystem::Sys,
            crate::frame::cmd::sys::PING,
        );
        let wire = response.serialize();

        let request = crate::frame::ZnpFrame::new(
            crate::frame::ZnpType::Sreq,
            crate::frame::ZnpSubsystem::Sys,
            crate::frame::cmd::sys::PING,
        );

        let deliver = async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            inbox.lock().unwrap().extend(wire);
        };
        let (result, _) = tokio::join!(transport.request(&request, Duration::from_secs(1)), deliver);
        assert!(result.is_ok());
        transport.close().await;
    }

    #[tokio::test]
    async fn orphaned_response_is_dropped_without_panicking() {
        let inbox = Arc::new(StdMutex::new(Deque::new()));
        let outbox = Arc::new(StdMutex::new(Vec::new()));
        let mock = MockSerialPort { open: false, inbox: inbox.clone(), outbox: outbox.clone() };
        let transport = ZnpTransport::with_serial_port(Box::new(mock), "mock0", 115200);
        transport.open().await.unwrap();

        // No request is pending, so this SRSP has nothing to match.
        let late_response = crate::frame::ZnpFrame::new(
            crate::frame::ZnpType::Srsp,
            crate::frame::ZnpSubsystem::Sys,
            crate::frame::cmd::sys::PING,
        );
        inbox.lock().unwrap().extend(late_response.serialize());
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(transport.parse_error_count(), 0);
        transport.close().await;
    }
}
