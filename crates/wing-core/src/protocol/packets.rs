//! All Wing protocol packet types.
//!
//! Wings transmit `WODD` ("Wing Output Data") datagrams describing their
//! current control state; the host answers with `WIDD` ("Wing Input Data")
//! datagrams.  Layout constants in this module are fixed by the device
//! firmware and must not change.

use serde::{Deserialize, Serialize};

// ── Protocol constants ────────────────────────────────────────────────────────

/// Magic bytes at the start of every datagram sent by a Wing.
pub const WING_MAGIC: [u8; 4] = *b"WODD";

/// Magic bytes at the start of every datagram sent by the host.
pub const HOST_MAGIC: [u8; 4] = *b"WIDD";

/// Size of the common header: magic (4) + flags/opcode (1) + payload length (1).
pub const HEADER_SIZE: usize = 6;

/// Offset of the flags byte in an inbound packet (opcode byte in outbound ones).
pub const FLAGS_OFFSET: usize = 4;

/// Offset of the declared payload length.
pub const LENGTH_OFFSET: usize = 5;

/// Bits of the flags byte that carry the device type.
pub const FLAGS_TYPE_MASK: u8 = 0x06;

/// Flags bit set when the packet is a firmware/health report instead of data.
pub const FLAGS_STATUS_REPORT: u8 = 0x80;

/// UDP port Wings transmit to.
pub const DEFAULT_WING_PORT: u16 = 3330;

pub const PLAYBACK_BUTTON_BYTES: usize = 5;
pub const PLAYBACK_BUTTONS: usize = 40;
pub const PLAYBACK_FADERS: usize = 10;
/// buttons + faders + page
pub const PLAYBACK_PAYLOAD_SIZE: usize = PLAYBACK_BUTTON_BYTES + PLAYBACK_FADERS + 1;

pub const SHORTCUT_BUTTON_BYTES: usize = 8;
pub const SHORTCUT_BUTTONS: usize = 60;
pub const SHORTCUT_PAYLOAD_SIZE: usize = SHORTCUT_BUTTON_BYTES + 1;

pub const PROGRAM_BUTTON_BYTES: usize = 8;
pub const PROGRAM_BUTTONS: usize = 60;
pub const PROGRAM_ENCODERS: usize = 3;
pub const PROGRAM_PAYLOAD_SIZE: usize = PROGRAM_BUTTON_BYTES + PROGRAM_ENCODERS + 1;

/// firmware major + firmware minor + health flags
pub const STATUS_PAYLOAD_SIZE: usize = 3;

pub const ACKNOWLEDGE_PAYLOAD_SIZE: usize = 2;
pub const CONFIGURE_PAYLOAD_SIZE: usize = 2;

// ── Device variants ───────────────────────────────────────────────────────────

/// The physical Wing model, carried in bits 1-2 of every inbound flags byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WingVariant {
    Program = 0x02,
    Playback = 0x04,
    Shortcut = 0x06,
}

impl TryFrom<u8> for WingVariant {
    type Error = ();

    /// Resolves the variant from a full flags byte; non-type bits are ignored.
    fn try_from(flags: u8) -> Result<Self, ()> {
        match flags & FLAGS_TYPE_MASK {
            0x02 => Ok(WingVariant::Program),
            0x04 => Ok(WingVariant::Playback),
            0x06 => Ok(WingVariant::Shortcut),
            _ => Err(()),
        }
    }
}

impl WingVariant {
    /// Fixed data payload size for this variant.
    pub fn data_payload_size(self) -> usize {
        match self {
            WingVariant::Playback => PLAYBACK_PAYLOAD_SIZE,
            WingVariant::Shortcut => SHORTCUT_PAYLOAD_SIZE,
            WingVariant::Program => PROGRAM_PAYLOAD_SIZE,
        }
    }

    /// Number of buttons physically present on this variant.
    pub fn button_count(self) -> usize {
        match self {
            WingVariant::Playback => PLAYBACK_BUTTONS,
            WingVariant::Shortcut => SHORTCUT_BUTTONS,
            WingVariant::Program => PROGRAM_BUTTONS,
        }
    }
}

impl std::fmt::Display for WingVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            WingVariant::Playback => "Playback",
            WingVariant::Shortcut => "Shortcut",
            WingVariant::Program => "Program",
        };
        f.write_str(name)
    }
}

// ── Shared field types ────────────────────────────────────────────────────────

/// Set of pressed buttons; bit `n` is set while button `n` is held down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ButtonMask(pub u64);

impl ButtonMask {
    /// Returns `true` if button `index` is pressed.
    pub fn is_pressed(self, index: usize) -> bool {
        index < 64 && self.0 & (1u64 << index) != 0
    }

    /// Mask covering the first `count` buttons.
    pub fn valid_bits(count: usize) -> u64 {
        if count >= 64 {
            u64::MAX
        } else {
            (1u64 << count) - 1
        }
    }
}

/// Firmware version reported by a Wing in its status packets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
}

impl std::fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Health flags from a status packet.  Zero means the device is operating correctly.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HealthFlags(pub u8);

impl HealthFlags {
    pub const LAMP_FAULT: u8 = 0x01;
    pub const FADER_FAULT: u8 = 0x02;
    pub const BUTTON_FAULT: u8 = 0x04;
    pub const OVERHEAT: u8 = 0x08;

    pub fn is_nominal(self) -> bool {
        self.0 == 0
    }
}

// ── Inbound packets ───────────────────────────────────────────────────────────

/// State report from a Playback Wing: 40 buttons, 10 faders, current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackPacket {
    pub buttons: ButtonMask,
    pub faders: [u8; PLAYBACK_FADERS],
    pub page: u8,
}

/// State report from a Shortcut Wing: 60 buttons and the current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutPacket {
    pub buttons: ButtonMask,
    pub page: u8,
}

/// State report from a Program Wing: 60 buttons, 3 encoder wheels, current page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramPacket {
    pub buttons: ButtonMask,
    pub encoders: [u8; PROGRAM_ENCODERS],
    pub page: u8,
}

/// Firmware and health report.  Any variant may send one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusPacket {
    pub variant: WingVariant,
    pub firmware: FirmwareVersion,
    pub health: HealthFlags,
}

/// A decoded datagram received from a Wing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WingPacket {
    Playback(PlaybackPacket),
    Shortcut(ShortcutPacket),
    Program(ProgramPacket),
    Status(StatusPacket),
}

impl WingPacket {
    /// The device variant that produced this packet.
    pub fn variant(&self) -> WingVariant {
        match self {
            WingPacket::Playback(_) => WingVariant::Playback,
            WingPacket::Shortcut(_) => WingVariant::Shortcut,
            WingPacket::Program(_) => WingVariant::Program,
            WingPacket::Status(s) => s.variant,
        }
    }

    /// The flags byte this packet carries on the wire.
    pub fn flags(&self) -> u8 {
        let type_bits = self.variant() as u8;
        match self {
            WingPacket::Status(_) => type_bits | FLAGS_STATUS_REPORT,
            _ => type_bits,
        }
    }
}

// ── Outbound packets ──────────────────────────────────────────────────────────

/// Opcode byte of a host → Wing datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum HostOpcode {
    Acknowledge = 0x01,
    Configure = 0x02,
}

impl TryFrom<u8> for HostOpcode {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, ()> {
        match value {
            0x01 => Ok(HostOpcode::Acknowledge),
            0x02 => Ok(HostOpcode::Configure),
            _ => Err(()),
        }
    }
}

/// Bind confirmation sent to a Wing the first time it is heard from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Acknowledge {
    /// UDP port the host is listening on.
    pub host_port: u16,
}

/// Display configuration pushed to a Wing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configure {
    /// Page number shown on the Wing's page display.
    pub page: u8,
    /// Button backlight intensity, 0 (off) to 255 (full).
    pub backlight: u8,
}

/// A datagram the host sends to a Wing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostPacket {
    Acknowledge(Acknowledge),
    Configure(Configure),
}

impl HostPacket {
    pub fn opcode(&self) -> HostOpcode {
        match self {
            HostPacket::Acknowledge(_) => HostOpcode::Acknowledge,
            HostPacket::Configure(_) => HostOpcode::Configure,
        }
    }
}
