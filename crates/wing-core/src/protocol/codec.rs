//! Binary codec for Wing protocol datagrams.
//!
//! Wire format:
//! ```text
//! [magic:4]["WODD" | "WIDD"][flags|opcode:1][payload_len:1][payload:N]
//! ```
//! Button bitmasks are sent LSB first, one bit per button, and a bit is
//! *cleared* while its button is held down.  The decoded [`ButtonMask`] uses
//! the opposite (pressed = set) polarity.
//!
//! Decoding never trusts the datagram: the declared payload length must
//! match both the buffer and the fixed size of the variant.

use crate::protocol::packets::{
    Acknowledge, ButtonMask, Configure, FirmwareVersion, HealthFlags, HostOpcode, HostPacket,
    PlaybackPacket, ProgramPacket, ShortcutPacket, StatusPacket, WingPacket, WingVariant,
    ACKNOWLEDGE_PAYLOAD_SIZE, CONFIGURE_PAYLOAD_SIZE, FLAGS_OFFSET, FLAGS_STATUS_REPORT,
    HEADER_SIZE, HOST_MAGIC, LENGTH_OFFSET, PLAYBACK_BUTTONS, PLAYBACK_BUTTON_BYTES,
    PLAYBACK_FADERS, PROGRAM_BUTTONS, PROGRAM_BUTTON_BYTES, PROGRAM_ENCODERS, SHORTCUT_BUTTONS,
    SHORTCUT_BUTTON_BYTES, STATUS_PAYLOAD_SIZE, WING_MAGIC,
};
use thiserror::Error;

/// Errors that can occur while decoding a datagram.
///
/// Every variant except [`DecodeError::UnknownVariant`] describes a
/// malformed packet; see [`DecodeError::is_malformed`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The datagram is shorter than the fixed header.
    #[error("insufficient data: need at least {needed} bytes, got {available}")]
    InsufficientData { needed: usize, available: usize },

    /// The first four bytes are not the expected magic.
    #[error("bad magic: {0:02X?}")]
    BadMagic([u8; 4]),

    /// The type bits of the flags byte do not name a known Wing.
    #[error("unknown wing variant in flags byte 0x{0:02X}")]
    UnknownVariant(u8),

    /// The payload is structurally invalid: its declared length disagrees
    /// with the bytes present or with the fixed size of its packet type.
    #[error("malformed packet: {0}")]
    MalformedPacket(String),
}

impl DecodeError {
    /// Returns `true` for errors describing a damaged or truncated packet.
    pub fn is_malformed(&self) -> bool {
        !matches!(self, DecodeError::UnknownVariant(_))
    }
}

// ── Public API ────────────────────────────────────────────────────────────────

/// Decodes a datagram received from a Wing.
///
/// # Errors
///
/// Returns [`DecodeError`] if the bytes are malformed or the variant is unknown.
///
/// # Examples
///
/// ```rust
/// use wing_core::protocol::{decode, encode_wing_packet};
/// use wing_core::protocol::packets::{ButtonMask, ShortcutPacket, WingPacket};
///
/// let packet = WingPacket::Shortcut(ShortcutPacket { buttons: ButtonMask(0b101), page: 2 });
/// let bytes = encode_wing_packet(&packet);
/// assert_eq!(decode(&bytes).unwrap(), packet);
/// ```
pub fn decode(bytes: &[u8]) -> Result<WingPacket, DecodeError> {
    let (flags, payload) = split_frame(bytes, WING_MAGIC)?;
    let variant = WingVariant::try_from(flags).map_err(|_| DecodeError::UnknownVariant(flags))?;

    if flags & FLAGS_STATUS_REPORT != 0 {
        return decode_status(variant, payload).map(WingPacket::Status);
    }

    require_exact(payload, variant.data_payload_size(), variant)?;
    let packet = match variant {
        WingVariant::Playback => WingPacket::Playback(decode_playback(payload)),
        WingVariant::Shortcut => WingPacket::Shortcut(decode_shortcut(payload)),
        WingVariant::Program => WingPacket::Program(decode_program(payload)),
    };
    Ok(packet)
}

/// Decodes only the header of a Wing datagram and returns its variant.
///
/// Succeeds even when the payload is damaged, as long as the magic and the
/// type bits are intact.
///
/// # Errors
///
/// Returns [`DecodeError`] if the header is truncated, the magic is wrong, or
/// the variant is unknown.
pub fn peek_variant(bytes: &[u8]) -> Result<WingVariant, DecodeError> {
    let flags = read_header(bytes, WING_MAGIC)?;
    WingVariant::try_from(flags).map_err(|_| DecodeError::UnknownVariant(flags))
}

/// Encodes a host → Wing datagram.  Never fails for a typed packet.
pub fn encode(packet: &HostPacket) -> Vec<u8> {
    let mut payload = Vec::with_capacity(ACKNOWLEDGE_PAYLOAD_SIZE.max(CONFIGURE_PAYLOAD_SIZE));
    match packet {
        HostPacket::Acknowledge(ack) => payload.extend_from_slice(&ack.host_port.to_be_bytes()),
        HostPacket::Configure(cfg) => {
            payload.push(cfg.page);
            payload.push(cfg.backlight);
        }
    }
    frame(HOST_MAGIC, packet.opcode() as u8, &payload)
}

/// Encodes a Wing → host datagram, as a device would.
///
/// Used by emulators and tests.  Button bits beyond the variant's button
/// count are a caller error; they are dropped on the wire.
pub fn encode_wing_packet(packet: &WingPacket) -> Vec<u8> {
    let mut payload = Vec::new();
    match packet {
        WingPacket::Playback(p) => {
            write_buttons(&mut payload, p.buttons, PLAYBACK_BUTTON_BYTES, PLAYBACK_BUTTONS);
            payload.extend_from_slice(&p.faders);
            payload.push(p.page);
        }
        WingPacket::Shortcut(p) => {
            write_buttons(&mut payload, p.buttons, SHORTCUT_BUTTON_BYTES, SHORTCUT_BUTTONS);
            payload.push(p.page);
        }
        WingPacket::Program(p) => {
            write_buttons(&mut payload, p.buttons, PROGRAM_BUTTON_BYTES, PROGRAM_BUTTONS);
            payload.extend_from_slice(&p.encoders);
            payload.push(p.page);
        }
        WingPacket::Status(s) => {
            payload.push(s.firmware.major);
            payload.push(s.firmware.minor);
            payload.push(s.health.0);
        }
    }
    frame(WING_MAGIC, packet.flags(), &payload)
}

/// Decodes a host → Wing datagram, as a device would.
///
/// # Errors
///
/// Returns [`DecodeError`] if the bytes are malformed or the opcode is unknown.
pub fn decode_host_packet(bytes: &[u8]) -> Result<HostPacket, DecodeError> {
    let (opcode_byte, payload) = split_frame(bytes, HOST_MAGIC)?;
    let opcode = HostOpcode::try_from(opcode_byte).map_err(|_| {
        DecodeError::MalformedPacket(format!("unknown host opcode: 0x{opcode_byte:02X}"))
    })?;

    match opcode {
        HostOpcode::Acknowledge => {
            require_exact(payload, ACKNOWLEDGE_PAYLOAD_SIZE, "Acknowledge")?;
            Ok(HostPacket::Acknowledge(Acknowledge {
                host_port: u16::from_be_bytes([payload[0], payload[1]]),
            }))
        }
        HostOpcode::Configure => {
            require_exact(payload, CONFIGURE_PAYLOAD_SIZE, "Configure")?;
            Ok(HostPacket::Configure(Configure {
                page: payload[0],
                backlight: payload[1],
            }))
        }
    }
}

// ── Framing ───────────────────────────────────────────────────────────────────

fn frame(magic: [u8; 4], kind: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(payload.len() <= usize::from(u8::MAX));
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&magic);
    buf.push(kind);
    buf.push(payload.len() as u8);
    buf.extend_from_slice(payload);
    buf
}

/// Validates the magic and returns the flags/opcode byte.
fn read_header(bytes: &[u8], magic: [u8; 4]) -> Result<u8, DecodeError> {
    if bytes.len() < HEADER_SIZE {
        return Err(DecodeError::InsufficientData {
            needed: HEADER_SIZE,
            available: bytes.len(),
        });
    }
    let found = [bytes[0], bytes[1], bytes[2], bytes[3]];
    if found != magic {
        return Err(DecodeError::BadMagic(found));
    }
    Ok(bytes[FLAGS_OFFSET])
}

/// Validates the header and the declared length; returns the kind byte and payload.
fn split_frame(bytes: &[u8], magic: [u8; 4]) -> Result<(u8, &[u8]), DecodeError> {
    let kind = read_header(bytes, magic)?;
    let declared = usize::from(bytes[LENGTH_OFFSET]);
    let available = bytes.len() - HEADER_SIZE;
    if declared != available {
        return Err(DecodeError::MalformedPacket(format!(
            "header declares {declared} payload bytes, {available} present"
        )));
    }
    Ok((kind, &bytes[HEADER_SIZE..]))
}

// ── Payload decoding ──────────────────────────────────────────────────────────

fn decode_playback(p: &[u8]) -> PlaybackPacket {
    let buttons = read_buttons(&p[..PLAYBACK_BUTTON_BYTES], PLAYBACK_BUTTONS);
    let mut faders = [0u8; PLAYBACK_FADERS];
    faders.copy_from_slice(&p[PLAYBACK_BUTTON_BYTES..PLAYBACK_BUTTON_BYTES + PLAYBACK_FADERS]);
    PlaybackPacket {
        buttons,
        faders,
        page: p[PLAYBACK_BUTTON_BYTES + PLAYBACK_FADERS],
    }
}

fn decode_shortcut(p: &[u8]) -> ShortcutPacket {
    ShortcutPacket {
        buttons: read_buttons(&p[..SHORTCUT_BUTTON_BYTES], SHORTCUT_BUTTONS),
        page: p[SHORTCUT_BUTTON_BYTES],
    }
}

fn decode_program(p: &[u8]) -> ProgramPacket {
    let mut encoders = [0u8; PROGRAM_ENCODERS];
    encoders.copy_from_slice(&p[PROGRAM_BUTTON_BYTES..PROGRAM_BUTTON_BYTES + PROGRAM_ENCODERS]);
    ProgramPacket {
        buttons: read_buttons(&p[..PROGRAM_BUTTON_BYTES], PROGRAM_BUTTONS),
        encoders,
        page: p[PROGRAM_BUTTON_BYTES + PROGRAM_ENCODERS],
    }
}

fn decode_status(variant: WingVariant, p: &[u8]) -> Result<StatusPacket, DecodeError> {
    require_exact(p, STATUS_PAYLOAD_SIZE, "Status")?;
    Ok(StatusPacket {
        variant,
        firmware: FirmwareVersion {
            major: p[0],
            minor: p[1],
        },
        health: HealthFlags(p[2]),
    })
}

// ── Utility helpers ───────────────────────────────────────────────────────────

fn require_exact(
    buf: &[u8],
    needed: usize,
    context: impl std::fmt::Display,
) -> Result<(), DecodeError> {
    if buf.len() == needed {
        Ok(())
    } else {
        Err(DecodeError::MalformedPacket(format!(
            "{context}: expected {needed} payload bytes, got {}",
            buf.len()
        )))
    }
}

/// Reads an active-low button field into a pressed-high mask.
fn read_buttons(bytes: &[u8], count: usize) -> ButtonMask {
    let mut raw = 0u64;
    for (i, byte) in bytes.iter().enumerate().take(8) {
        raw |= u64::from(*byte) << (8 * i);
    }
    ButtonMask(!raw & ButtonMask::valid_bits(count))
}

/// Writes a pressed-high mask as an active-low field; unused bits read as released.
fn write_buttons(buf: &mut Vec<u8>, mask: ButtonMask, byte_len: usize, count: usize) {
    let raw = !(mask.0 & ButtonMask::valid_bits(count));
    buf.extend_from_slice(&raw.to_le_bytes()[..byte_len]);
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn playback(buttons: u64, fader0: u8, page: u8) -> WingPacket {
        let mut faders = [0u8; PLAYBACK_FADERS];
        faders[0] = fader0;
        WingPacket::Playback(PlaybackPacket {
            buttons: ButtonMask(buttons),
            faders,
            page,
        })
    }

    // ── Inbound decoding ──────────────────────────────────────────────────────

    #[test]
    fn test_decode_playback_from_raw_bytes() {
        // Arrange: button 0 held (bit cleared), everything else released
        let mut bytes = b"WODD".to_vec();
        bytes.push(0x04);
        bytes.push(16);
        bytes.extend_from_slice(&[0xFE, 0xFF, 0xFF, 0xFF, 0xFF]);
        bytes.extend_from_slice(&[128, 0, 0, 0, 0, 0, 0, 0, 0, 255]);
        bytes.push(3);

        // Act
        let decoded = decode(&bytes).expect("decode");

        // Assert
        let WingPacket::Playback(p) = decoded else {
            panic!("expected playback packet");
        };
        assert!(p.buttons.is_pressed(0));
        assert!(!p.buttons.is_pressed(1));
        assert_eq!(p.faders[0], 128);
        assert_eq!(p.faders[9], 255);
        assert_eq!(p.page, 3);
    }

    #[test]
    fn test_decode_masks_unused_shortcut_bits() {
        // Arrange: all 64 wire bits cleared; only 60 buttons exist
        let mut bytes = b"WODD".to_vec();
        bytes.extend_from_slice(&[0x06, 9]);
        bytes.extend_from_slice(&[0x00; 8]);
        bytes.push(0);

        // Act
        let WingPacket::Shortcut(p) = decode(&bytes).expect("decode") else {
            panic!("expected shortcut packet");
        };

        // Assert
        assert_eq!(p.buttons.0, ButtonMask::valid_bits(60));
    }

    #[test]
    fn test_decode_status_packet() {
        let bytes = [b'W', b'O', b'D', b'D', 0x82, 3, 1, 7, 0x00];
        let decoded = decode(&bytes).expect("decode");
        assert_eq!(
            decoded,
            WingPacket::Status(StatusPacket {
                variant: WingVariant::Program,
                firmware: FirmwareVersion { major: 1, minor: 7 },
                health: HealthFlags(0),
            })
        );
    }

    #[test]
    fn test_decode_rejects_short_header() {
        let result = decode(b"WOD");
        assert_eq!(
            result,
            Err(DecodeError::InsufficientData {
                needed: HEADER_SIZE,
                available: 3
            })
        );
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = encode_wing_packet(&playback(0, 0, 0));
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(DecodeError::BadMagic(_))));
    }

    #[test]
    fn test_decode_rejects_unknown_variant() {
        let mut bytes = encode_wing_packet(&playback(0, 0, 0));
        bytes[FLAGS_OFFSET] = 0x00;
        let err = decode(&bytes).unwrap_err();
        assert_eq!(err, DecodeError::UnknownVariant(0x00));
        assert!(!err.is_malformed());
    }

    #[test]
    fn test_decode_rejects_truncated_payload() {
        // Arrange: drop the page byte but keep the original declared length
        let mut bytes = encode_wing_packet(&playback(0, 10, 1));
        bytes.pop();

        // Act
        let err = decode(&bytes).unwrap_err();

        // Assert
        let expected = "header declares 16 payload bytes, 15 present";
        assert_eq!(err, DecodeError::MalformedPacket(expected.to_string()));
        assert!(err.is_malformed());
    }

    #[test]
    fn test_decode_rejects_consistent_but_wrong_sized_payload() {
        // Declared length agrees with the buffer but not with the variant size.
        let mut bytes = b"WODD".to_vec();
        bytes.extend_from_slice(&[0x04, 2, 0xFF, 0xFF]);
        assert!(matches!(
            decode(&bytes),
            Err(DecodeError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_peek_variant_ignores_damaged_payload() {
        let mut bytes = encode_wing_packet(&playback(0, 0, 0));
        bytes.truncate(HEADER_SIZE + 2);
        assert_eq!(peek_variant(&bytes), Ok(WingVariant::Playback));
        assert!(decode(&bytes).is_err());
    }

    #[test]
    fn test_peek_variant_rejects_host_packets() {
        let bytes = encode(&HostPacket::Configure(Configure {
            page: 1,
            backlight: 2,
        }));
        assert!(matches!(peek_variant(&bytes), Err(DecodeError::BadMagic(_))));
    }

    // ── Round trips ───────────────────────────────────────────────────────────

    #[test]
    fn test_playback_round_trip() {
        let packet = playback(0b1000_0000_0001, 200, 4);
        assert_eq!(decode(&encode_wing_packet(&packet)), Ok(packet));
    }

    #[test]
    fn test_program_round_trip() {
        let packet = WingPacket::Program(ProgramPacket {
            buttons: ButtonMask(1 << 59),
            encoders: [1, 127, 255],
            page: 9,
        });
        assert_eq!(decode(&encode_wing_packet(&packet)), Ok(packet));
    }

    #[test]
    fn test_acknowledge_round_trip() {
        let packet = HostPacket::Acknowledge(Acknowledge { host_port: 3330 });
        assert_eq!(decode_host_packet(&encode(&packet)), Ok(packet));
    }

    #[test]
    fn test_configure_encoding_layout() {
        let bytes = encode(&HostPacket::Configure(Configure {
            page: 5,
            backlight: 200,
        }));
        assert_eq!(bytes, vec![b'W', b'I', b'D', b'D', 0x02, 2, 5, 200]);
    }

    #[test]
    fn test_decode_host_packet_rejects_unknown_opcode() {
        let bytes = [b'W', b'I', b'D', b'D', 0x7F, 0];
        assert!(matches!(
            decode_host_packet(&bytes),
            Err(DecodeError::MalformedPacket(_))
        ));
    }

    #[test]
    fn test_write_buttons_is_active_low() {
        let mut buf = Vec::new();
        write_buttons(&mut buf, ButtonMask(0b1), PLAYBACK_BUTTON_BYTES, PLAYBACK_BUTTONS);
        assert_eq!(buf, vec![0xFE, 0xFF, 0xFF, 0xFF, 0xFF]);
    }
}
