//! Transport abstraction — a byte-oriented serial channel.
//!
//! Concrete implementations:
//! - USB CDC / UART through the `serialport` crate ([`crate::adapters::serial_port`])
//! - scripted in-memory links in tests
//!
//! The sensor and pump clients are written against [`SerialLink`], so
//! adding a new transport requires zero changes to the protocol logic.

use std::io;

/// Byte-oriented serial channel.
pub trait SerialLink {
    /// Read up to `buf.len()` bytes into `buf`.
    /// Returns the number of bytes actually read (0 if nothing arrived).
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write `data` to the link.
    /// Returns the number of bytes actually written.
    fn write(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Flush any buffered output.
    fn flush(&mut self) -> io::Result<()>;

    /// Number of bytes waiting to be read.
    fn available(&mut self) -> io::Result<usize>;

    /// Drop any bytes received before the request was sent.
    fn discard_input(&mut self) -> io::Result<()>;
}

/// Opens a fresh [`SerialLink`] for one request/response exchange.
///
/// Connections are never held across calls; dropping the returned box
/// closes the port.
pub trait LinkOpener: Send + Sync {
    fn open(&self, port: &str, baud_rate: u32) -> io::Result<Box<dyn SerialLink>>;
}

/// Write the whole of `data`, then flush.
pub fn write_all(link: &mut dyn SerialLink, mut data: &[u8]) -> io::Result<()> {
    while !data.is_empty() {
        match link.write(data)? {
            0 => return Err(io::Error::new(io::ErrorKind::WriteZero, "link accepted no bytes")),
            n => data = &data[n..],
        }
    }
    link.flush()
}
