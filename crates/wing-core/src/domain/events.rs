//! Semantic input events produced from Wing packets.
//!
//! Events are immutable once emitted and are delivered in packet arrival
//! order for each device.  No ordering is promised across devices.

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::protocol::packets::{FirmwareVersion, WingVariant, PLAYBACK_FADERS, PROGRAM_ENCODERS};

/// Network endpoint identifying one physical Wing.
pub type DeviceAddress = SocketAddr;

/// Channel value reported for a pressed button.
pub const BUTTON_PRESSED: u8 = u8::MAX;

/// Channel value reported for a released button.
pub const BUTTON_RELEASED: u8 = 0;

/// Whether a Wing reports itself healthy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatingStatus {
    #[default]
    Nominal,
    Faulted,
}

/// One individually addressable control on a Wing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelId {
    Button(u8),
    Fader(u8),
    Encoder(u8),
    Page,
}

impl ChannelId {
    /// Maps the channel onto a single input-channel number for the host.
    ///
    /// Faders and encoders come first, then buttons, then the page selector,
    /// so a Playback Wing occupies channels 0-9 (faders), 10-49 (buttons)
    /// and 50 (page).
    pub fn flat_index(self, variant: WingVariant) -> u32 {
        let analog = match variant {
            WingVariant::Playback => PLAYBACK_FADERS,
            WingVariant::Program => PROGRAM_ENCODERS,
            WingVariant::Shortcut => 0,
        } as u32;
        let buttons = variant.button_count() as u32;
        match self {
            ChannelId::Fader(n) | ChannelId::Encoder(n) => u32::from(n),
            ChannelId::Button(n) => analog + u32::from(n),
            ChannelId::Page => analog + buttons,
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelId::Button(n) => write!(f, "button{n}"),
            ChannelId::Fader(n) => write!(f, "fader{n}"),
            ChannelId::Encoder(n) => write!(f, "encoder{n}"),
            ChannelId::Page => f.write_str("page"),
        }
    }
}

/// A discrete change worth telling the host about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputEvent {
    /// First packet seen from an address.
    DeviceDiscovered {
        address: DeviceAddress,
        variant: WingVariant,
    },
    /// A button, fader, encoder or page changed value.
    ChannelChanged {
        address: DeviceAddress,
        channel: ChannelId,
        old: u8,
        new: u8,
    },
    /// The device reported a firmware version not seen before.
    FirmwareReported {
        address: DeviceAddress,
        version: FirmwareVersion,
    },
    /// The device's self-reported health flipped.
    StatusChanged {
        address: DeviceAddress,
        old: OperatingStatus,
        new: OperatingStatus,
    },
    /// Nothing heard within the liveness timeout; the device was removed.
    DeviceOffline {
        address: DeviceAddress,
        variant: WingVariant,
    },
    /// A datagram could not be decoded and was dropped.
    PacketDecodeFailed {
        address: DeviceAddress,
        reason: String,
    },
}

impl InputEvent {
    /// The device this event concerns.
    pub fn address(&self) -> DeviceAddress {
        match self {
            InputEvent::DeviceDiscovered { address, .. }
            | InputEvent::ChannelChanged { address, .. }
            | InputEvent::FirmwareReported { address, .. }
            | InputEvent::StatusChanged { address, .. }
            | InputEvent::DeviceOffline { address, .. }
            | InputEvent::PacketDecodeFailed { address, .. } => *address,
        }
    }
}
