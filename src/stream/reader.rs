//! Reading parser and stream reader

use super::LineTransport;
use crate::error::MonitorError;
use crate::types::Reading;
use serde::Serialize;
use std::time::Duration;

/// Prefix carried by every heart-rate line, e.g. `HR:72`
pub const READING_PREFIX: &str = "HR:";

/// Decode raw line bytes, dropping undecodable sequences
pub fn decode_line(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .collect()
}

/// Parse one protocol line into a bpm value.
///
/// Empty lines, lines without the `HR:` prefix and non-numeric or non-finite
/// payloads all yield `None`.
pub fn parse_reading(line: &str) -> Option<f64> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    let payload = line.strip_prefix(READING_PREFIX)?;
    payload
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|bpm| bpm.is_finite())
}

/// Counters kept by a [`StreamReader`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReaderStats {
    /// Lines received from the transport
    pub lines: u64,
    /// Lines that produced a reading
    pub readings: u64,
    /// Lines dropped as empty or malformed
    pub ignored: u64,
    /// Reads that timed out without a line
    pub timeouts: u64,
}

/// Reader owning a transport for its whole lifetime.
///
/// The transport is closed exactly once: by [`StreamReader::close`] or, on any
/// other exit path, when the reader is dropped.
pub struct StreamReader<T: LineTransport> {
    transport: T,
    timeout: Duration,
    stats: ReaderStats,
    closed: bool,
}

impl<T: LineTransport> StreamReader<T> {
    pub fn new(transport: T, timeout: Duration) -> Self {
        log::info!("Reading heart rate from {}", transport.name());
        Self {
            transport,
            timeout,
            stats: ReaderStats::default(),
            closed: false,
        }
    }

    pub fn name(&self) -> &str {
        self.transport.name()
    }

    pub fn stats(&self) -> ReaderStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read at most one line and parse it.
    ///
    /// Blocks up to the configured timeout. Malformed lines and timeouts give
    /// `Ok(None)`; only a disconnect (or reading after close) is an error.
    pub fn read_one(&mut self) -> Result<Option<Reading>, MonitorError> {
        if self.closed {
            return Err(MonitorError::TransportDisconnected(format!(
                "{} is closed",
                self.transport.name()
            )));
        }

        let bytes = match self.transport.read_line(self.timeout)? {
            Some(bytes) => bytes,
            None => {
                self.stats.timeouts += 1;
                return Ok(None);
            }
        };
        self.stats.lines += 1;

        let line = decode_line(&bytes);
        match parse_reading(&line) {
            Some(bpm) => {
                self.stats.readings += 1;
                Ok(Some(Reading::new(bpm)))
            }
            None => {
                self.stats.ignored += 1;
                log::debug!("Ignoring line {:?}", line.trim());
                Ok(None)
            }
        }
    }

    /// Close the transport. Later calls do nothing.
    pub fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.transport.close();
            log::info!("Closed {}", self.transport.name());
        }
    }
}

impl<T: LineTransport> Drop for StreamReader<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::collections::VecDeque;
    use std::rc::Rc;

    /// In-memory transport: `Some(line)` delivers, `None` times out
    struct ScriptedTransport {
        lines: VecDeque<Option<Vec<u8>>>,
        closes: Rc<Cell<u32>>,
    }

    impl ScriptedTransport {
        fn new(lines: Vec<Option<Vec<u8>>>) -> (Self, Rc<Cell<u32>>) {
            let closes = Rc::new(Cell::new(0));
            let transport = Self {
                lines: lines.into(),
                closes: Rc::clone(&closes),
            };
            (transport, closes)
        }
    }

    impl LineTransport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        fn read_line(&mut self, _timeout: Duration) -> Result<Option<Vec<u8>>, MonitorError> {
            match self.lines.pop_front() {
                Some(line) => Ok(line),
                None => Err(MonitorError::TransportDisconnected("end of script".into())),
            }
        }

        fn close(&mut self) {
            self.closes.set(self.closes.get() + 1);
        }
    }

    fn line(bytes: &[u8]) -> Option<Vec<u8>> {
        Some(bytes.to_vec())
    }

    #[test]
    fn test_parse_reading() {
        assert_eq!(parse_reading("HR:72"), Some(72.0));
        assert_eq!(parse_reading("  HR: 88.5 \r"), Some(88.5));
        assert_eq!(parse_reading("HR:abc"), None);
        assert_eq!(parse_reading("HR:"), None);
        assert_eq!(parse_reading("HR:nan"), None);
        assert_eq!(parse_reading("SPO2:98"), None);
        assert_eq!(parse_reading("hr:72"), None);
        assert_eq!(parse_reading(""), None);
    }

    #[test]
    fn test_decode_drops_invalid_bytes() {
        assert_eq!(decode_line(b"HR:\xff7\xfe2"), "HR:72");
        assert_eq!(parse_reading(&decode_line(b"\x80HR:64")), Some(64.0));
    }

    #[test]
    fn test_read_one_tolerates_noise() {
        let (transport, _) = ScriptedTransport::new(vec![
            line(b"HR:72"),
            line(b""),
            line(b"HR:abc"),
            None,
            line(b"boot ok"),
            line(b"HR:\xff101"),
        ]);
        let mut reader = StreamReader::new(transport, Duration::from_millis(10));

        let bpms: Vec<Option<f64>> = (0..6)
            .map(|_| reader.read_one().unwrap().map(|r| r.bpm))
            .collect();

        assert_eq!(
            bpms,
            vec![Some(72.0), None, None, None, None, Some(101.0)]
        );
        assert_eq!(
            reader.stats(),
            ReaderStats {
                lines: 5,
                readings: 2,
                ignored: 3,
                timeouts: 1,
            }
        );
    }

    #[test]
    fn test_disconnect_is_an_error() {
        let (transport, _) = ScriptedTransport::new(vec![line(b"HR:70")]);
        let mut reader = StreamReader::new(transport, Duration::from_millis(10));

        assert!(reader.read_one().unwrap().is_some());
        assert!(matches!(
            reader.read_one(),
            Err(MonitorError::TransportDisconnected(_))
        ));
    }

    #[test]
    fn test_transport_closed_exactly_once() {
        let (transport, closes) = ScriptedTransport::new(vec![]);
        {
            let mut reader = StreamReader::new(transport, Duration::from_millis(10));
            reader.close();
            reader.close();
            assert!(reader.is_closed());
            assert!(reader.read_one().is_err());
        }
        assert_eq!(closes.get(), 1);

        let (transport, closes) = ScriptedTransport::new(vec![]);
        drop(StreamReader::new(transport, Duration::from_millis(10)));
        assert_eq!(closes.get(), 1);
    }
}
