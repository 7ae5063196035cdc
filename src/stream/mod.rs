//! Device stream
//!
//! This module reads heart-rate readings from a line-oriented device link.
//! Transports deliver raw newline-delimited bytes; the [`StreamReader`] turns
//! them into readings and drops anything that does not parse.

mod device;
mod reader;

pub use device::{
    autodetect_device_port, pick_device_candidate, DeviceLineTransport, DeviceSource,
    PortCandidate, SerialLineTransport, DEFAULT_BAUD_RATE,
};
pub use reader::{decode_line, parse_reading, ReaderStats, StreamReader, READING_PREFIX};

use crate::error::MonitorError;
use std::time::Duration;

/// Trait for line-oriented device transports
pub trait LineTransport {
    /// Human-readable name of the link (e.g. the device path)
    fn name(&self) -> &str;

    /// Wait up to `timeout` for one raw line, without its terminator.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. Only a lost link is an
    /// error, reported as [`MonitorError::TransportDisconnected`].
    fn read_line(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>, MonitorError>;

    /// Release the underlying link. Called exactly once by the owning reader.
    fn close(&mut self);
}
