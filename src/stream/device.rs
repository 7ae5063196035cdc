//! Device transports
//!
//! Lines are read on the monitor thread from a source whose reads time out on
//! their own, normally a serial port opened at the configured baud rate. Bytes
//! of a line still in flight when a read times out are kept for the next call,
//! and closing the transport drops the source at once.

use super::LineTransport;
use crate::error::MonitorError;
use serialport::{SerialPort, SerialPortType};
use std::io::{self, ErrorKind, Read};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Baud rate used when none is configured
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Bytes requested from the source per read
const READ_CHUNK: usize = 256;

/// Port names that look like USB serial adapters (lowercase)
const NAME_TAGS: [&str; 5] = ["ttyacm", "ttyusb", "cu.usbmodem", "cu.usbserial", "com"];

/// Port descriptions that look like a heart-rate board (lowercase)
const DESCRIPTION_TAGS: [&str; 3] = ["arduino", "usb serial", "usb-serial"];

/// Byte source whose reads can be bounded in time
pub trait DeviceSource: Read {
    /// Bound how long a single `read` may block before failing with `TimedOut`
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl DeviceSource for Box<dyn SerialPort> {
    fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout).map_err(io::Error::from)
    }
}

/// Line transport over a [`DeviceSource`]
pub struct DeviceLineTransport<S: DeviceSource> {
    name: String,
    source: Option<S>,
    pending: Vec<u8>,
}

/// Transport over an open serial port
pub type SerialLineTransport = DeviceLineTransport<Box<dyn SerialPort>>;

impl SerialLineTransport {
    /// Open a serial device at `baud_rate`
    pub fn open(path: &Path, baud_rate: u32) -> Result<Self, MonitorError> {
        let name = path.display().to_string();
        if !path.exists() {
            return Err(MonitorError::TransportUnavailable(format!("{} not found", name)));
        }

        let port = serialport::new(name.clone(), baud_rate)
            .timeout(Duration::from_secs(1))
            .open()
            .map_err(|e| {
                MonitorError::TransportUnavailable(format!(
                    "cannot open {} at {} baud: {}",
                    name, baud_rate, e
                ))
            })?;

        log::info!("Opened {} at {} baud", name, baud_rate);
        Ok(Self::new(name, port))
    }

    /// Open `port`, or the autodetected device when no port is given
    pub fn open_or_detect(port: Option<&Path>, baud_rate: u32) -> Result<Self, MonitorError> {
        match port {
            Some(path) => Self::open(path, baud_rate),
            None => {
                let path = autodetect_device_port().ok_or_else(|| {
                    MonitorError::TransportUnavailable(
                        "No serial port detected. Specify --port.".to_string(),
                    )
                })?;
                Self::open(&path, baud_rate)
            }
        }
    }
}

impl<S: DeviceSource> DeviceLineTransport<S> {
    pub fn new(name: impl Into<String>, source: S) -> Self {
        Self {
            name: name.into(),
            source: Some(source),
            pending: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }
}

/// Split the first complete line off `pending`, without its terminator
fn take_line(pending: &mut Vec<u8>) -> Option<Vec<u8>> {
    let end = pending.iter().position(|b| *b == b'\n')?;
    let mut line: Vec<u8> = pending.drain(..=end).collect();
    while matches!(line.last().copied(), Some(b'\n' | b'\r')) {
        line.pop();
    }
    Some(line)
}

impl<S: DeviceSource> LineTransport for DeviceLineTransport<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, MonitorError> {
        let Self {
            name,
            source,
            pending,
        } = self;

        if let Some(line) = take_line(pending) {
            return Ok(Some(line));
        }

        let source = source
            .as_mut()
            .ok_or_else(|| MonitorError::TransportDisconnected(format!("{} is closed", name)))?;

        let deadline = Instant::now() + timeout;
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(None);
            }
            source.set_read_timeout(remaining).map_err(|e| {
                MonitorError::TransportDisconnected(format!("{}: {}", name, e))
            })?;

            match source.read(&mut chunk) {
                Ok(0) if pending.is_empty() => {
                    return Err(MonitorError::TransportDisconnected(format!(
                        "{} stopped sending data",
                        name
                    )));
                }
                // Last unterminated line before the link went away
                Ok(0) => return Ok(Some(std::mem::take(pending))),
                Ok(n) => {
                    pending.extend_from_slice(&chunk[..n]);
                    if let Some(line) = take_line(pending) {
                        return Ok(Some(line));
                    }
                }
                Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                    return Ok(None);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    log::warn!("Device read failed: {}", e);
                    return Err(MonitorError::TransportDisconnected(format!("{}: {}", name, e)));
                }
            }
        }
    }

    fn close(&mut self) {
        self.source = None;
        self.pending.clear();
    }
}

/// A serial port as listed by the operating system
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortCandidate {
    /// Device path, e.g. `/dev/ttyACM0`
    pub name: String,
    /// Manufacturer and product strings, if known
    pub description: String,
}

impl PortCandidate {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }

    fn looks_like_device(&self) -> bool {
        let name = self.name.to_lowercase();
        let description = self.description.to_lowercase();
        NAME_TAGS.iter().any(|tag| name.contains(tag))
            || DESCRIPTION_TAGS.iter().any(|tag| description.contains(tag))
    }
}

/// Pick the port to use: the first that looks like a USB serial board, else
/// the first port listed
pub fn pick_device_candidate(ports: &[PortCandidate]) -> Option<String> {
    ports
        .iter()
        .find(|port| port.looks_like_device())
        .or_else(|| ports.first())
        .map(|port| port.name.clone())
}

fn describe(port_type: &SerialPortType) -> String {
    match port_type {
        SerialPortType::UsbPort(usb) => {
            let mut parts: Vec<&str> = Vec::new();
            if let Some(manufacturer) = &usb.manufacturer {
                parts.push(manufacturer);
            }
            if let Some(product) = &usb.product {
                parts.push(product);
            }
            if parts.is_empty() {
                "USB Serial".to_string()
            } else {
                parts.join(" ")
            }
        }
        SerialPortType::BluetoothPort => "Bluetooth".to_string(),
        _ => String::new(),
    }
}

/// Look for a connected serial device
pub fn autodetect_device_port() -> Option<PathBuf> {
    let ports = match serialport::available_ports() {
        Ok(ports) => ports,
        Err(e) => {
            log::debug!("Cannot list serial ports: {}", e);
            return None;
        }
    };

    let candidates: Vec<PortCandidate> = ports
        .iter()
        .map(|info| PortCandidate::new(info.port_name.clone(), describe(&info.port_type)))
        .collect();

    let port = pick_device_candidate(&candidates).map(PathBuf::from);
    match &port {
        Some(path) => log::info!("Autodetected device {}", path.display()),
        None => log::debug!("No serial ports found"),
    }
    port
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;

    /// In-memory source that never times out
    struct Memory(Cursor<Vec<u8>>);

    impl Read for Memory {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.0.read(buf)
        }
    }

    impl DeviceSource for Memory {
        fn set_read_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }
    }

    /// Source replaying chunks; `None` is a read that times out
    struct Chunks {
        chunks: VecDeque<Option<&'static [u8]>>,
        dropped: Arc<AtomicBool>,
    }

    impl Chunks {
        fn new(chunks: Vec<Option<&'static [u8]>>) -> Self {
            Self {
                chunks: chunks.into_iter().collect(),
                dropped: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl Read for Chunks {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.chunks.pop_front() {
                Some(Some(bytes)) => {
                    buf[..bytes.len()].copy_from_slice(bytes);
                    Ok(bytes.len())
                }
                Some(None) => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
                None => {
                    // Nothing more arrives until the port is closed
                    thread::sleep(Duration::from_millis(20));
                    Err(io::Error::new(ErrorKind::TimedOut, "timed out"))
                }
            }
        }
    }

    impl DeviceSource for Chunks {
        fn set_read_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for Chunks {
        fn drop(&mut self) {
            self.dropped.store(true, Ordering::SeqCst);
        }
    }

    /// Source that honours its read timeout and never sends anything
    #[derive(Default)]
    struct Silent {
        timeout: Duration,
    }

    impl Read for Silent {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            thread::sleep(self.timeout);
            Err(io::Error::new(ErrorKind::TimedOut, "timed out"))
        }
    }

    impl DeviceSource for Silent {
        fn set_read_timeout(&mut self, timeout: Duration) -> io::Result<()> {
            self.timeout = timeout;
            Ok(())
        }
    }

    fn read_all<S: DeviceSource>(transport: &mut DeviceLineTransport<S>) -> (Vec<String>, bool) {
        let mut lines = Vec::new();
        loop {
            match transport.read_line(Duration::from_secs(2)) {
                Ok(Some(line)) => lines.push(String::from_utf8_lossy(&line).into_owned()),
                Ok(None) => return (lines, false),
                Err(_) => return (lines, true),
            }
        }
    }

    #[test]
    fn test_lines_then_disconnect() {
        let source = Memory(Cursor::new(b"HR:70\r\nHR:71\n\nHR:72".to_vec()));
        let mut transport = DeviceLineTransport::new("memory", source);

        let (lines, disconnected) = read_all(&mut transport);
        assert_eq!(lines, vec!["HR:70", "HR:71", "", "HR:72"]);
        assert!(disconnected);
    }

    #[test]
    fn test_timeout_yields_none() {
        let mut transport = DeviceLineTransport::new("silent", Silent::default());
        let started = Instant::now();
        assert_eq!(transport.read_line(Duration::from_millis(30)).unwrap(), None);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_partial_line_survives_timeout() {
        let source = Chunks::new(vec![Some(b"HR:"), None, Some(b"88\r\nHR:9"), Some(b"0\n")]);
        let mut transport = DeviceLineTransport::new("chunks", source);

        assert_eq!(transport.read_line(Duration::from_secs(1)).unwrap(), None);
        assert_eq!(
            transport.read_line(Duration::from_secs(1)).unwrap(),
            Some(b"HR:88".to_vec())
        );
        assert_eq!(
            transport.read_line(Duration::from_secs(1)).unwrap(),
            Some(b"HR:90".to_vec())
        );
    }

    #[test]
    fn test_close_releases_source() {
        let source = Chunks::new(Vec::new());
        let dropped = Arc::clone(&source.dropped);
        let mut transport = DeviceLineTransport::new("idle", source);

        assert_eq!(transport.read_line(Duration::from_millis(10)).unwrap(), None);
        assert!(!dropped.load(Ordering::SeqCst));

        transport.close();
        assert!(dropped.load(Ordering::SeqCst));
        assert!(!transport.is_open());
        assert!(matches!(
            transport.read_line(Duration::from_millis(10)),
            Err(MonitorError::TransportDisconnected(_))
        ));
    }

    #[test]
    fn test_open_missing_device() {
        let result = SerialLineTransport::open(
            Path::new("/dev/definitely-not-a-heart-monitor"),
            DEFAULT_BAUD_RATE,
        );
        assert!(matches!(result, Err(MonitorError::TransportUnavailable(_))));
    }

    #[test]
    fn test_pick_device_by_name() {
        let ports = vec![
            PortCandidate::new("/dev/ttyS0", ""),
            PortCandidate::new("/dev/ttyACM0", ""),
            PortCandidate::new("/dev/ttyUSB1", ""),
        ];
        assert_eq!(pick_device_candidate(&ports), Some("/dev/ttyACM0".to_string()));

        let mac = vec![
            PortCandidate::new("/dev/cu.Bluetooth-Incoming-Port", "Bluetooth"),
            PortCandidate::new("/dev/cu.usbmodem14101", ""),
        ];
        assert_eq!(
            pick_device_candidate(&mac),
            Some("/dev/cu.usbmodem14101".to_string())
        );
    }

    #[test]
    fn test_pick_device_by_description() {
        let ports = vec![
            PortCandidate::new("/dev/ttyS0", ""),
            PortCandidate::new("/dev/ttyS4", "Arduino LLC Arduino Uno"),
        ];
        assert_eq!(pick_device_candidate(&ports), Some("/dev/ttyS4".to_string()));
    }

    #[test]
    fn test_pick_device_falls_back_to_first() {
        let ports = vec![
            PortCandidate::new("/dev/ttyS0", ""),
            PortCandidate::new("/dev/ttyS1", "Bluetooth"),
        ];
        assert_eq!(pick_device_candidate(&ports), Some("/dev/ttyS0".to_string()));
        assert_eq!(pick_device_candidate(&[]), None);
    }
}
