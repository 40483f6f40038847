//! UDP transport: the bound socket and its blocking receive loop.
//!
//! The transport performs no protocol-level filtering.  Every datagram, from
//! any source, is handed to a [`DatagramHandler`] together with its arrival
//! time.  The handler is also called back on every wake-up so that periodic
//! work (the expiry sweep) runs on the same thread as packet processing.
//!
//! # Read timeout
//!
//! The socket is configured with a short read timeout (the *poll interval*).
//! `recv_from` blocks for at most that long before returning a timeout error.
//! On each wake-up the loop checks the `running` flag, so [`UdpTransport::stop`]
//! takes effect within one poll interval even when no Wing is transmitting.
//!
//! # Sending
//!
//! `UdpSocket::send_to` takes `&self`, so outbound datagrams can be sent from
//! any thread while the receive loop is blocked in `recv_from`.  Sends are
//! fire-and-forget: errors are returned and counted, never retried.  Wings
//! re-announce themselves periodically, which is the protocol's own retry.

use std::net::{SocketAddr, UdpSocket};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, error, info, trace};

/// Largest datagram the receive loop accepts; Wing packets are far smaller.
const RECV_BUFFER_SIZE: usize = 2048;

/// The UDP socket could not be bound.
#[derive(Debug, Error)]
#[error("failed to bind UDP socket on {addr}: {source}")]
pub struct BindError {
    pub addr: SocketAddr,
    #[source]
    pub source: std::io::Error,
}

/// An outbound datagram could not be sent.
#[derive(Debug, Error)]
pub enum SendError {
    /// The OS rejected the datagram.
    #[error("failed to send to {addr}: {source}")]
    Io {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    /// Only Wings that have been heard from may be sent to.
    #[error("no live wing at {0}")]
    UnknownDevice(SocketAddr),
    /// The transport has been stopped.
    #[error("transport is stopped")]
    Stopped,
}

/// Receives datagrams from the transport's receive loop.
pub trait DatagramHandler {
    /// Called once per received datagram.
    fn on_datagram(&mut self, from: SocketAddr, bytes: &[u8], now: Instant);

    /// Called after every wake-up of the receive loop, whether or not a
    /// datagram arrived.
    fn on_idle(&mut self, _now: Instant) {}
}

/// Snapshot of transport counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub packets_received: u64,
    pub packets_sent: u64,
    pub send_failures: u64,
}

/// A bound UDP socket shared between the receive loop and senders.
#[derive(Debug)]
pub struct UdpTransport {
    socket: UdpSocket,
    running: AtomicBool,
    packets_received: AtomicU64,
    packets_sent: AtomicU64,
    send_failures: AtomicU64,
}

impl UdpTransport {
    /// Binds the socket.  Fails immediately if the port is in use or not
    /// permitted; never panics.
    ///
    /// # Errors
    ///
    /// Returns [`BindError`] if the socket cannot be bound or configured.
    pub fn bind(addr: SocketAddr, poll_interval: Duration) -> Result<Self, BindError> {
        let socket = UdpSocket::bind(addr).map_err(|source| BindError { addr, source })?;
        // A zero timeout is rejected by the OS; clamp to 1ms.
        let poll_interval = poll_interval.max(Duration::from_millis(1));
        socket
            .set_read_timeout(Some(poll_interval))
            .map_err(|source| BindError { addr, source })?;

        info!("listening on UDP {}", socket.local_addr().unwrap_or(addr));
        Ok(Self {
            socket,
            running: AtomicBool::new(true),
            packets_received: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            send_failures: AtomicU64::new(0),
        })
    }

    /// Returns the address actually bound (useful when binding port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Blocks, delivering every datagram to `handler`, until [`stop`](Self::stop)
    /// is called.  Per-datagram failures never end the loop.
    pub fn run<H: DatagramHandler>(&self, handler: &mut H) {
        let mut buf = vec![0u8; RECV_BUFFER_SIZE];

        while self.running.load(Ordering::Relaxed) {
            match self.socket.recv_from(&mut buf) {
                Ok((len, src)) => {
                    self.packets_received.fetch_add(1, Ordering::Relaxed);
                    trace!("{len} byte datagram from {src}");
                    handler.on_datagram(src, &buf[..len], Instant::now());
                }
                Err(e) if is_timeout_error(&e) => {}
                Err(e) if is_transient_error(&e) => {
                    debug!("transient recv error: {e}");
                }
                Err(e) => {
                    error!("recv error: {e}");
                }
            }
            handler.on_idle(Instant::now());
        }

        info!("receive loop stopped");
    }

    /// Sends one datagram.  Callable from any thread; never retried.
    ///
    /// # Errors
    ///
    /// Returns [`SendError::Stopped`] after [`stop`](Self::stop), or
    /// [`SendError::Io`] if the OS rejects the datagram.
    pub fn send(&self, dest: SocketAddr, bytes: &[u8]) -> Result<(), SendError> {
        if !self.is_running() {
            return Err(SendError::Stopped);
        }
        match self.socket.send_to(bytes, dest) {
            Ok(_) => {
                self.packets_sent.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(source) => {
                self.send_failures.fetch_add(1, Ordering::Relaxed);
                Err(SendError::Io { addr: dest, source })
            }
        }
    }

    /// Asks the receive loop to return.  Takes effect within one poll interval.
    pub fn stop(&self) {
        if self.running.swap(false, Ordering::Relaxed) {
            debug!("stop requested");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> TransportStats {
        TransportStats {
            packets_received: self.packets_received.load(Ordering::Relaxed),
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
        }
    }
}

/// Returns `true` for OS timeout / would-block errors that should be retried.
fn is_timeout_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
    )
}

/// ICMP port-unreachable replies surface as recv errors on some platforms.
fn is_transient_error(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::Interrupted
    )
}

// ── Tests ─────────────────────────────────────────────────────────────────────
