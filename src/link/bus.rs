//! Scoped, serialized access to serial ports.
//!
//! Every exchange opens the port, runs to completion and closes it again.
//! The sensor and the pump controller may sit on the same physical device,
//! so the bus keeps one lock per port path: two clients can never hold the
//! same port open at once, whatever their configuration says.

use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;

use super::transport::{LinkOpener, SerialLink};

/// Shared gateway to the serial ports of one process.
pub struct SerialBus {
    opener: Box<dyn LinkOpener>,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SerialBus {
    pub fn new(opener: impl LinkOpener + 'static) -> Self {
        Self {
            opener: Box::new(opener),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Open `port`, hand the link to `exchange`, then close it.
    ///
    /// Fails only if the port cannot be opened; errors inside the exchange
    /// are the closure's to report.
    pub fn with_link<T>(
        &self,
        port: &str,
        baud_rate: u32,
        exchange: impl FnOnce(&mut dyn SerialLink) -> T,
    ) -> io::Result<T> {
        let lock = self.port_lock(port);
        let _held = lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut link = self.opener.open(port, baud_rate)?;
        debug!("serial {} opened at {} baud", port, baud_rate);
        let out = exchange(link.as_mut());
        drop(link);
        debug!("serial {} closed", port);
        Ok(out)
    }

    fn port_lock(&self, port: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(port.to_owned()).or_default())
    }
}
