//! One physical Wing and the state it last reported.
//!
//! A [`WingDevice`] is a closed tagged variant: the shared fields (address,
//! firmware, liveness, health) live on the struct and the per-variant
//! channel state lives in [`WingState`].  The variant is derived from the
//! state, so it cannot change once the device exists.
//!
//! # Diff-based emission
//!
//! Wings retransmit their whole control surface on every change and
//! periodically while idle.  The device keeps the last data packet and
//! compares each new one field by field, so the host sees exactly one
//! [`InputEvent::ChannelChanged`] per real transition and nothing for a
//! repeated packet.  The first data packet only establishes the baseline.

use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::domain::events::{
    ChannelId, DeviceAddress, InputEvent, OperatingStatus, BUTTON_PRESSED, BUTTON_RELEASED,
};
use crate::protocol::packets::{
    ButtonMask, FirmwareVersion, PlaybackPacket, ProgramPacket, ShortcutPacket, StatusPacket,
    WingPacket, WingVariant,
};

/// Last data payload per variant; `None` until the first data packet arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WingState {
    Playback(Option<PlaybackPacket>),
    Shortcut(Option<ShortcutPacket>),
    Program(Option<ProgramPacket>),
}

impl WingState {
    fn empty(variant: WingVariant) -> Self {
        match variant {
            WingVariant::Playback => WingState::Playback(None),
            WingVariant::Shortcut => WingState::Shortcut(None),
            WingVariant::Program => WingState::Program(None),
        }
    }

    fn variant(&self) -> WingVariant {
        match self {
            WingState::Playback(_) => WingVariant::Playback,
            WingState::Shortcut(_) => WingVariant::Shortcut,
            WingState::Program(_) => WingVariant::Program,
        }
    }
}

/// A Wing known to the registry.
#[derive(Debug, Clone)]
pub struct WingDevice {
    address: DeviceAddress,
    firmware: Option<FirmwareVersion>,
    status: OperatingStatus,
    last_seen: Instant,
    state: WingState,
    packets_received: u64,
    packets_malformed: u64,
}

impl WingDevice {
    /// Creates a device on first contact.  No channel state is known yet.
    pub fn new(address: DeviceAddress, variant: WingVariant, first_seen: Instant) -> Self {
        Self {
            address,
            firmware: None,
            status: OperatingStatus::Nominal,
            last_seen: first_seen,
            state: WingState::empty(variant),
            packets_received: 0,
            packets_malformed: 0,
        }
    }

    pub fn address(&self) -> DeviceAddress {
        self.address
    }

    pub fn variant(&self) -> WingVariant {
        self.state.variant()
    }

    pub fn firmware(&self) -> Option<FirmwareVersion> {
        self.firmware
    }

    pub fn status(&self) -> OperatingStatus {
        self.status
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn state(&self) -> &WingState {
        &self.state
    }

    /// Total packets from this device, including undecodable ones.
    pub fn packets_received(&self) -> u64 {
        self.packets_received
    }

    pub fn packets_malformed(&self) -> u64 {
        self.packets_malformed
    }

    /// Human-readable label, e.g. `"Playback at 192.168.0.20"`.
    pub fn name(&self) -> String {
        format!("{} at {}", self.variant(), self.address.ip())
    }

    /// Current page, once a data packet has been seen.
    pub fn page(&self) -> Option<u8> {
        match &self.state {
            WingState::Playback(p) => p.as_ref().map(|p| p.page),
            WingState::Shortcut(p) => p.as_ref().map(|p| p.page),
            WingState::Program(p) => p.as_ref().map(|p| p.page),
        }
    }

    /// Current button mask, once a data packet has been seen.
    pub fn buttons(&self) -> Option<ButtonMask> {
        match &self.state {
            WingState::Playback(p) => p.as_ref().map(|p| p.buttons),
            WingState::Shortcut(p) => p.as_ref().map(|p| p.buttons),
            WingState::Program(p) => p.as_ref().map(|p| p.buttons),
        }
    }

    /// Fader (Playback) or encoder (Program) positions; empty for Shortcut Wings.
    pub fn analog_values(&self) -> &[u8] {
        match &self.state {
            WingState::Playback(Some(p)) => &p.faders,
            WingState::Program(Some(p)) => &p.encoders,
            _ => &[],
        }
    }

    /// Applies a decoded packet and returns the events it caused.
    ///
    /// `last_seen` is updated even when nothing changed.
    pub fn apply_packet(&mut self, packet: &WingPacket, arrival: Instant) -> Vec<InputEvent> {
        self.touch(arrival);
        let mut events = Vec::new();

        if let WingPacket::Status(status) = packet {
            self.apply_status(status, &mut events);
            return events;
        }

        let address = self.address;
        match (packet, &mut self.state) {
            (WingPacket::Playback(new), WingState::Playback(prev)) => {
                if let Some(old) = prev.as_ref() {
                    diff_buttons(address, old.buttons, new.buttons, &mut events);
                    diff_values(address, &old.faders, &new.faders, ChannelId::Fader, &mut events);
                    diff_page(address, old.page, new.page, &mut events);
                }
                *prev = Some(new.clone());
            }
            (WingPacket::Shortcut(new), WingState::Shortcut(prev)) => {
                if let Some(old) = prev.as_ref() {
                    diff_buttons(address, old.buttons, new.buttons, &mut events);
                    diff_page(address, old.page, new.page, &mut events);
                }
                *prev = Some(new.clone());
            }
            (WingPacket::Program(new), WingState::Program(prev)) => {
                if let Some(old) = prev.as_ref() {
                    diff_buttons(address, old.buttons, new.buttons, &mut events);
                    diff_values(
                        address,
                        &old.encoders,
                        &new.encoders,
                        ChannelId::Encoder,
                        &mut events,
                    );
                    diff_page(address, old.page, new.page, &mut events);
                }
                *prev = Some(new.clone());
            }
            (other, state) => {
                debug!(
                    "{address}: ignoring {} packet on a {} wing",
                    other.variant(),
                    state.variant()
                );
            }
        }

        trace!("{address}: packet produced {} event(s)", events.len());
        events
    }

    /// Records presence without any payload, e.g. for an undecodable packet.
    pub fn touch(&mut self, arrival: Instant) {
        self.last_seen = arrival;
        self.packets_received = self.packets_received.saturating_add(1);
    }

    /// Records presence for a packet that failed to decode.
    pub fn record_malformed(&mut self, arrival: Instant) {
        self.touch(arrival);
        self.packets_malformed = self.packets_malformed.saturating_add(1);
    }

    /// Returns `true` when nothing was heard for longer than `timeout`.
    pub fn is_expired(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > timeout
    }

    fn apply_status(&mut self, status: &StatusPacket, events: &mut Vec<InputEvent>) {
        if status.variant != self.variant() {
            debug!(
                "{}: ignoring {} status report on a {} wing",
                self.address,
                status.variant,
                self.variant()
            );
            return;
        }

        if self.firmware != Some(status.firmware) {
            self.firmware = Some(status.firmware);
            events.push(InputEvent::FirmwareReported {
                address: self.address,
                version: status.firmware,
            });
        }

        let new_status = if status.health.is_nominal() {
            OperatingStatus::Nominal
        } else {
            OperatingStatus::Faulted
        };
        if new_status != self.status {
            events.push(InputEvent::StatusChanged {
                address: self.address,
                old: self.status,
                new: new_status,
            });
            self.status = new_status;
        }
    }
}

// ── Diff helpers ──────────────────────────────────────────────────────────────

fn diff_buttons(
    address: DeviceAddress,
    old: ButtonMask,
    new: ButtonMask,
    events: &mut Vec<InputEvent>,
) {
    let mut changed = old.0 ^ new.0;
    while changed != 0 {
        let index = changed.trailing_zeros() as usize;
        changed &= changed - 1;
        events.push(InputEvent::ChannelChanged {
            address,
            channel: ChannelId::Button(index as u8),
            old: button_value(old.is_pressed(index)),
            new: button_value(new.is_pressed(index)),
        });
    }
}

fn diff_values(
    address: DeviceAddress,
    old: &[u8],
    new: &[u8],
    channel: fn(u8) -> ChannelId,
    events: &mut Vec<InputEvent>,
) {
    for (index, (&before, &after)) in old.iter().zip(new).enumerate() {
        if before != after {
            events.push(InputEvent::ChannelChanged {
                address,
                channel: channel(index as u8),
                old: before,
                new: after,
            });
        }
    }
}

fn diff_page(address: DeviceAddress, old: u8, new: u8, events: &mut Vec<InputEvent>) {
    if old != new {
        events.push(InputEvent::ChannelChanged {
            address,
            channel: ChannelId::Page,
            old,
            new,
        });
    }
}

fn button_value(pressed: bool) -> u8 {
    if pressed {
        BUTTON_PRESSED
    } else {
        BUTTON_RELEASED
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
