//! The host-facing API: start a listener, talk to Wings, stop it.
//!
//! ```text
//! WingService::start()
//!  ├─ UdpTransport::bind()          -- fails fast with BindError
//!  ├─ SinkDispatcher ("wing-events") -- drains events into the host sink
//!  └─ receive thread ("wing-rx")     -- UdpTransport::run(ProcessPacketsUseCase)
//! ```
//!
//! The returned [`WingHandle`] owns the receive thread.  Dropping it stops the
//! service just like [`WingHandle::stop`]; neither waits for the host sink.

use std::collections::HashSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::{Arc, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use thiserror::Error;
use tracing::{error, info, warn};
use wing_core::protocol::packets::{Configure, HostPacket, DEFAULT_WING_PORT};
use wing_core::{encode, DeviceAddress, DeviceRegistry, DEFAULT_LIVENESS_TIMEOUT};

use crate::application::process_packets::{LiveDevices, ProcessPacketsUseCase};
use crate::infrastructure::network::transport::{
    BindError, SendError, TransportStats, UdpTransport,
};
use crate::infrastructure::sink::{EventSink, OverflowPolicy, SinkDispatcher};

/// Runtime settings for a [`WingService`].
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceConfig {
    pub bind_address: SocketAddr,
    /// Silence after which a Wing is reported offline.
    pub liveness_timeout: Duration,
    pub sweep_interval: Duration,
    /// Socket read timeout; `stop` takes at most about this long.
    pub poll_interval: Duration,
    pub overflow: OverflowPolicy,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), DEFAULT_WING_PORT),
            liveness_timeout: DEFAULT_LIVENESS_TIMEOUT,
            sweep_interval: Duration::from_millis(500),
            poll_interval: Duration::from_millis(100),
            overflow: OverflowPolicy::default(),
        }
    }
}

/// The service could not be started.
#[derive(Debug, Error)]
pub enum StartError {
    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("failed to spawn {thread} thread: {source}")]
    Spawn {
        thread: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Entry point for hosts.
pub struct WingService;

impl WingService {
    /// Binds the socket and starts the receive and dispatch threads.
    ///
    /// # Errors
    ///
    /// Returns [`StartError::Bind`] if the port is in use or not permitted,
    /// and [`StartError::Spawn`] if a thread cannot be created.
    pub fn start(
        config: ServiceConfig,
        sink: Arc<dyn EventSink>,
    ) -> Result<WingHandle, StartError> {
        let transport = Arc::new(UdpTransport::bind(
            config.bind_address,
            config.poll_interval,
        )?);
        let local_addr = transport.local_addr().map_err(|source| BindError {
            addr: config.bind_address,
            source,
        })?;

        let (dispatcher, queue) =
            SinkDispatcher::spawn(config.overflow, sink).map_err(|source| StartError::Spawn {
                thread: "wing-events",
                source,
            })?;

        let live = LiveDevices::default();
        let mut use_case = ProcessPacketsUseCase::new(
            DeviceRegistry::new(config.liveness_timeout),
            transport.clone(),
            queue,
            Arc::clone(&live),
            local_addr.port(),
            config.sweep_interval,
        );

        let rx_transport = Arc::clone(&transport);
        let receiver = std::thread::Builder::new()
            .name("wing-rx".to_string())
            .spawn(move || rx_transport.run(&mut use_case))
            .map_err(|source| StartError::Spawn {
                thread: "wing-rx",
                source,
            })?;

        info!("wing service started on {local_addr}");
        Ok(WingHandle {
            transport,
            live,
            receiver: Some(receiver),
            dispatcher: Some(dispatcher),
            local_addr,
        })
    }

    /// Shorthand for [`start`](Self::start) on all interfaces with default
    /// timings.
    ///
    /// # Errors
    ///
    /// See [`start`](Self::start).
    pub fn start_on_port(
        port: u16,
        sink: Arc<dyn EventSink>,
        liveness_timeout: Duration,
    ) -> Result<WingHandle, StartError> {
        let config = ServiceConfig {
            bind_address: SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port),
            liveness_timeout,
            ..ServiceConfig::default()
        };
        Self::start(config, sink)
    }
}

/// A running service.
pub struct WingHandle {
    transport: Arc<UdpTransport>,
    live: LiveDevices,
    receiver: Option<JoinHandle<()>>,
    dispatcher: Option<SinkDispatcher>,
    local_addr: SocketAddr,
}

impl WingHandle {
    /// The address the socket is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Wings currently online, sorted by address.
    pub fn live_devices(&self) -> Vec<DeviceAddress> {
        let mut devices: Vec<DeviceAddress> = self
            .live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        devices.sort();
        devices
    }

    pub fn is_live(&self, address: DeviceAddress) -> bool {
        self.live
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&address)
    }

    /// Sends a page/backlight configuration to a live Wing.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::UnknownDevice`] if `address` is not online, or the
    /// transport error if the datagram cannot be sent.
    pub fn send_configuration(
        &self,
        address: DeviceAddress,
        configure: Configure,
    ) -> Result<(), SendError> {
        if !self.is_live(address) {
            return Err(SendError::UnknownDevice(address));
        }
        let bytes = encode(&HostPacket::Configure(configure));
        self.transport.send(address, &bytes).map_err(|e| {
            warn!("configuration for {address} not sent: {e}");
            e
        })
    }

    pub fn transport_stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Events dropped because the host sink fell behind.
    pub fn dropped_events(&self) -> u64 {
        self.dispatcher.as_ref().map_or(0, SinkDispatcher::dropped)
    }

    /// Stops the receive loop and releases the socket.
    ///
    /// Returns within about one poll interval and never waits for the host
    /// sink, so it may be called from inside [`EventSink::deliver`].  Events
    /// still queued for the host are discarded.
    pub fn stop(mut self) {
        self.shutdown(false);
    }

    /// Like [`stop`](Self::stop), but first delivers every event still queued
    /// for the host.
    ///
    /// Blocks for as long as the host sink takes.  Must not be called from
    /// inside [`EventSink::deliver`].
    pub fn drain_and_stop(mut self) {
        self.shutdown(true);
    }

    fn shutdown(&mut self, drain: bool) {
        let Some(receiver) = self.receiver.take() else {
            return;
        };
        self.transport.stop();
        if receiver.join().is_err() {
            error!("receive thread panicked");
        }
        // The receive thread held the last queue handle, so the dispatcher
        // exits once the backlog is delivered or discarded.
        if let Some(dispatcher) = self.dispatcher.take() {
            if drain {
                dispatcher.shutdown();
            } else {
                dispatcher.detach();
            }
        }
        *self.live.write().unwrap_or_else(PoisonError::into_inner) = HashSet::new();
        info!("wing service on {} stopped", self.local_addr);
    }
}

impl Drop for WingHandle {
    fn drop(&mut self) {
        self.shutdown(false);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
