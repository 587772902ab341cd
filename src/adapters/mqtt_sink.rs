//! MQTT telemetry adapter.
//!
//! Implements [`TelemetrySink`] with the synchronous `rumqttc` client.  A
//! background thread drives the connection and counts broker
//! acknowledgments; [`flush`](TelemetrySink::flush) waits (bounded) until
//! every QoS ≥ 1 publish of the cycle has been acknowledged.
//!
//! ```text
//!  publish() ──▶ rumqttc::Client ──request queue──▶ Connection thread ──▶ broker
//!                                                        │
//!  flush()  ◀── Condvar ◀── AckState { acked, failed } ◀──┘ PubAck / PubComp
//! ```
//!
//! The connection thread stops on the first connection error; there is no
//! reconnect loop.  Later publishes fail with [`PublishError::Disconnected`].

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};
use rumqttc::{Client, Event, MqttOptions, Packet, QoS};

use crate::app::ports::{PublishOptions, TelemetrySink};
use crate::config::TelemetryConfig;
use crate::error::PublishError;

const KEEP_ALIVE: Duration = Duration::from_secs(60);
const REQUEST_CAPACITY: usize = 16;

#[derive(Debug, Default)]
struct AckState {
    connected: bool,
    failed: bool,
    acked: u64,
}

type Shared = Arc<(Mutex<AckState>, Condvar)>;

fn to_qos(level: u8) -> QoS {
    match level {
        0 => QoS::AtMostOnce,
        1 => QoS::AtLeastOnce,
        _ => QoS::ExactlyOnce,
    }
}

pub struct MqttTelemetrySink {
    client: Client,
    state: Shared,
    expected_acks: u64,
    flush_timeout: Duration,
    worker: Option<thread::JoinHandle<()>>,
}

impl MqttTelemetrySink {
    /// Queue a connection to the configured broker with a fresh client id.
    ///
    /// Connecting is asynchronous; an unreachable broker shows up as
    /// `Disconnected` on the first publish or flush.
    pub fn connect(config: &TelemetryConfig) -> Self {
        let client_id = format!("irrigator-{}", uuid::Uuid::new_v4());
        let mut options = MqttOptions::new(&client_id, &config.broker_host, config.broker_port);
        options.set_keep_alive(KEEP_ALIVE);
        info!(
            "mqtt: connecting to {}:{} as {}",
            config.broker_host, config.broker_port, client_id
        );

        let (client, mut connection) = Client::new(options, REQUEST_CAPACITY);
        let state: Shared = Arc::new((Mutex::new(AckState::default()), Condvar::new()));

        let worker_state = Arc::clone(&state);
        let worker = thread::Builder::new()
            .name("mqtt-conn".into())
            .spawn(move || {
                let (lock, cvar) = &*worker_state;
                for notification in connection.iter() {
                    let mut st = lock.lock().unwrap_or_else(PoisonError::into_inner);
                    match notification {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            debug!("mqtt: connack {:?}", ack.code);
                            st.connected = true;
                        }
                        Ok(Event::Incoming(Packet::PubAck(_) | Packet::PubComp(_))) => {
                            st.acked += 1;
                            cvar.notify_all();
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("mqtt: connection closed: {}", e);
                            st.failed = true;
                            cvar.notify_all();
                            break;
                        }
                    }
                }
            })
            .ok();
        if worker.is_none() {
            warn!("mqtt: could not start the connection thread");
            state.0.lock().unwrap_or_else(PoisonError::into_inner).failed = true;
        }

        Self {
            client,
            state,
            expected_acks: 0,
            flush_timeout: Duration::from_secs(config.flush_timeout_secs),
            worker,
        }
    }

    fn failed(&self) -> bool {
        self.state
            .0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .failed
    }
}

impl TelemetrySink for MqttTelemetrySink {
    fn publish(
        &mut self,
        topic: &str,
        payload: &str,
        options: PublishOptions,
    ) -> Result<(), PublishError> {
        if self.failed() {
            return Err(PublishError::Disconnected);
        }
        let qos = to_qos(options.qos);
        self.client
            .try_publish(topic, qos, options.retain, payload.as_bytes().to_vec())
            .map_err(|e| {
                warn!("mqtt: publish to {} refused: {}", topic, e);
                PublishError::Rejected
            })?;
        if qos != QoS::AtMostOnce {
            self.expected_acks += 1;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PublishError> {
        let deadline = Instant::now() + self.flush_timeout;
        let (lock, cvar) = &*self.state;
        let mut st = lock.lock().unwrap_or_else(PoisonError::into_inner);
        while st.acked < self.expected_acks && !st.failed {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            st = cvar
                .wait_timeout(st, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        if st.acked >= self.expected_acks {
            debug!("mqtt: {} publish(es) acknowledged", st.acked);
            Ok(())
        } else {
            warn!(
                "mqtt: {}/{} publish(es) acknowledged (connected={})",
                st.acked, self.expected_acks, st.connected
            );
            Err(PublishError::Disconnected)
        }
    }
}

impl Drop for MqttTelemetrySink {
    fn drop(&mut self) {
        if let Err(e) = self.client.try_disconnect() {
            debug!("mqtt: disconnect not queued: {}", e);
        }
        if let Some(worker) = self.worker.take() {
            // The connection thread only outlives the disconnect when the
            // broker is silent; leave it detached in that case.
            if worker.is_finished() {
                let _ = worker.join();
            }
        }
    }
}
