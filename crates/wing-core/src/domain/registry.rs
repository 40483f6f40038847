//! DeviceRegistry: the set of Wings currently heard on the network.
//!
//! Each address moves through an implicit lifecycle:
//!
//! ```text
//! Unknown ──(first packet)──► Active ──(silence > timeout)──► removed
//!    ▲                                                          │
//!    └──────────────────────(re-contact = rediscovery)──────────┘
//! ```
//!
//! The registry never schedules anything itself: the owner calls
//! [`DeviceRegistry::sweep_expired`] periodically from the same execution
//! context that calls [`DeviceRegistry::handle_packet`].
//!
//! # Undecodable packets
//!
//! A packet that fails to decode still proves the device is alive, so a known
//! device has its `last_seen` refreshed and a
//! [`InputEvent::PacketDecodeFailed`] diagnostic is emitted.  From an unknown
//! address the device is registered only if the header still names a
//! variant; otherwise there is nothing to construct and only the diagnostic
//! is emitted.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::domain::device::WingDevice;
use crate::domain::events::{DeviceAddress, InputEvent};
use crate::protocol::codec::{decode, peek_variant, DecodeError};
use crate::protocol::packets::WingVariant;

/// Liveness timeout used when the host does not configure one.
pub const DEFAULT_LIVENESS_TIMEOUT: Duration = Duration::from_secs(5);

/// Devices keyed by source address.  At most one device exists per address.
#[derive(Debug)]
pub struct DeviceRegistry {
    devices: HashMap<DeviceAddress, WingDevice>,
    timeout: Duration,
}

impl Default for DeviceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_LIVENESS_TIMEOUT)
    }
}

impl DeviceRegistry {
    pub fn new(timeout: Duration) -> Self {
        Self {
            devices: HashMap::new(),
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn contains(&self, address: DeviceAddress) -> bool {
        self.devices.contains_key(&address)
    }

    pub fn get(&self, address: DeviceAddress) -> Option<&WingDevice> {
        self.devices.get(&address)
    }

    /// Iterates over all registered devices in no particular order.
    pub fn devices(&self) -> impl Iterator<Item = &WingDevice> {
        self.devices.values()
    }

    /// Processes one raw datagram from `address` received at `now`.
    pub fn handle_packet(
        &mut self,
        address: DeviceAddress,
        bytes: &[u8],
        now: Instant,
    ) -> Vec<InputEvent> {
        let mut events = Vec::new();
        let decoded = decode(bytes);
        let known_variant = self.devices.get(&address).map(WingDevice::variant);

        match (decoded, known_variant) {
            (Ok(packet), Some(variant)) if packet.variant() == variant => {
                if let Some(device) = self.devices.get_mut(&address) {
                    events.extend(device.apply_packet(&packet, now));
                }
            }
            (Ok(packet), Some(previous)) => {
                info!(
                    "{address}: variant changed from {previous} to {}; treating as a new device",
                    packet.variant()
                );
                self.devices.remove(&address);
                events.push(InputEvent::DeviceOffline {
                    address,
                    variant: previous,
                });
                let device = self.discover(address, packet.variant(), now, &mut events);
                events.extend(device.apply_packet(&packet, now));
            }
            (Ok(packet), None) => {
                let device = self.discover(address, packet.variant(), now, &mut events);
                events.extend(device.apply_packet(&packet, now));
            }
            (Err(error), Some(_)) => {
                if let Some(device) = self.devices.get_mut(&address) {
                    device.record_malformed(now);
                }
                events.push(decode_failed(address, &error));
            }
            (Err(error), None) => {
                if let Ok(variant) = peek_variant(bytes) {
                    let device = self.discover(address, variant, now, &mut events);
                    device.record_malformed(now);
                }
                events.push(decode_failed(address, &error));
            }
        }

        events
    }

    /// Removes every device silent for longer than the timeout.
    ///
    /// Emits exactly one [`InputEvent::DeviceOffline`] per removed device,
    /// ordered by address.  A removed device is never reported again.
    pub fn sweep_expired(&mut self, now: Instant) -> Vec<InputEvent> {
        let timeout = self.timeout;
        let mut expired: Vec<DeviceAddress> = self
            .devices
            .values()
            .filter(|d| d.is_expired(now, timeout))
            .map(WingDevice::address)
            .collect();
        expired.sort_unstable();

        expired
            .into_iter()
            .filter_map(|address| self.devices.remove(&address))
            .map(|device| {
                info!("{} went offline", device.name());
                InputEvent::DeviceOffline {
                    address: device.address(),
                    variant: device.variant(),
                }
            })
            .collect()
    }

    fn discover(
        &mut self,
        address: DeviceAddress,
        variant: WingVariant,
        now: Instant,
        events: &mut Vec<InputEvent>,
    ) -> &mut WingDevice {
        let device = WingDevice::new(address, variant, now);
        info!("discovered {}", device.name());
        events.push(InputEvent::DeviceDiscovered { address, variant });
        match self.devices.entry(address) {
            Entry::Occupied(mut slot) => {
                slot.insert(device);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(device),
        }
    }
}

fn decode_failed(address: DeviceAddress, error: &DecodeError) -> InputEvent {
    debug!("{address}: dropping undecodable packet: {error}");
    InputEvent::PacketDecodeFailed {
        address,
        reason: error.to_string(),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
