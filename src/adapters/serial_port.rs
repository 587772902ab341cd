//! OS serial port adapter.
//!
//! Implements [`LinkOpener`] / [`SerialLink`] on top of the `serialport`
//! crate (8N1, no flow control).  Reads use a short OS timeout so the
//! deadline logic in [`LineReader`](crate::link::LineReader) stays in charge.

use std::io::{self, Read, Write};
use std::time::Duration;

use serialport::{ClearBuffer, SerialPort};

use crate::link::{LinkOpener, SerialLink};

/// Per-read OS timeout.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerialOpener;

impl LinkOpener for SystemSerialOpener {
    fn open(&self, port: &str, baud_rate: u32) -> io::Result<Box<dyn SerialLink>> {
        let port = serialport::new(port, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(io::Error::from)?;
        Ok(Box::new(SystemSerialLink { port }))
    }
}

struct SystemSerialLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink for SystemSerialLink {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.port.read(buf) {
            Err(e) if e.kind() == io::ErrorKind::TimedOut => Ok(0),
            other => other,
        }
    }

    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.port.write(data)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.port.flush()
    }

    fn available(&mut self) -> io::Result<usize> {
        self.port
            .bytes_to_read()
            .map(|n| n as usize)
            .map_err(io::Error::from)
    }

    fn discard_input(&mut self) -> io::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io::Error::from)
    }
}
