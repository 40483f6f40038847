//! ProcessPacketsUseCase: turns received datagrams into host events.
//!
//! Runs on the receive thread and owns the [`DeviceRegistry`], so the registry
//! needs no lock.  For every datagram it asks the registry for events, pushes
//! them into the event sink, keeps the shared live-device set in step, and
//! acknowledges newly discovered Wings.  The expiry sweep runs from
//! [`DatagramHandler::on_idle`] at most once per sweep interval.
//!
//! # Architecture
//!
//! The use case depends only on the [`ReplySender`] and [`EventSink`] traits,
//! so it is unit-testable without a socket.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use tracing::{debug, warn};
use wing_core::protocol::packets::{Acknowledge, HostPacket};
use wing_core::{encode, DeviceAddress, DeviceRegistry, InputEvent};

use crate::infrastructure::network::transport::{DatagramHandler, SendError, UdpTransport};
use crate::infrastructure::sink::EventSink;

/// Addresses of the Wings currently online, published by the receive thread.
pub type LiveDevices = Arc<RwLock<HashSet<DeviceAddress>>>;

/// Sends datagrams back to Wings.
///
/// Implemented by [`UdpTransport`]; mocked in tests.
#[cfg_attr(test, mockall::automock)]
pub trait ReplySender: Send + Sync {
    fn send_reply(&self, dest: SocketAddr, bytes: &[u8]) -> Result<(), SendError>;
}

impl ReplySender for UdpTransport {
    fn send_reply(&self, dest: SocketAddr, bytes: &[u8]) -> Result<(), SendError> {
        self.send(dest, bytes)
    }
}

/// The receive-thread side of the service.
pub struct ProcessPacketsUseCase {
    registry: DeviceRegistry,
    replies: Arc<dyn ReplySender>,
    sink: Arc<dyn EventSink>,
    live: LiveDevices,
    /// Port advertised in `Acknowledge` packets.
    host_port: u16,
    sweep_interval: Duration,
    last_sweep: Option<Instant>,
}

impl ProcessPacketsUseCase {
    pub fn new(
        registry: DeviceRegistry,
        replies: Arc<dyn ReplySender>,
        sink: Arc<dyn EventSink>,
        live: LiveDevices,
        host_port: u16,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            registry,
            replies,
            sink,
            live,
            host_port,
            sweep_interval,
            last_sweep: None,
        }
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// Runs the expiry sweep if `sweep_interval` has elapsed since the last one.
    fn maybe_sweep(&mut self, now: Instant) {
        let due = match self.last_sweep {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.sweep_interval,
        };
        if !due {
            return;
        }
        self.last_sweep = Some(now);
        let events = self.registry.sweep_expired(now);
        self.publish(events);
    }

    fn publish(&self, events: Vec<InputEvent>) {
        for event in events {
            match &event {
                InputEvent::DeviceDiscovered { address, .. } => {
                    self.live
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .insert(*address);
                    self.acknowledge(*address);
                }
                InputEvent::DeviceOffline { address, .. } => {
                    self.live
                        .write()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(address);
                }
                _ => {}
            }
            self.sink.deliver(event);
        }
    }

    fn acknowledge(&self, address: SocketAddr) {
        let bytes = encode(&HostPacket::Acknowledge(Acknowledge {
            host_port: self.host_port,
        }));
        match self.replies.send_reply(address, &bytes) {
            Ok(()) => debug!("acknowledged {address}"),
            Err(e) => warn!("failed to acknowledge {address}: {e}"),
        }
    }
}

impl DatagramHandler for ProcessPacketsUseCase {
    fn on_datagram(&mut self, from: SocketAddr, bytes: &[u8], now: Instant) {
        let events = self.registry.handle_packet(from, bytes, now);
        self.publish(events);
    }

    fn on_idle(&mut self, now: Instant) {
        self.maybe_sweep(now);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
