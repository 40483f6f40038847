//! Integration tests for the wing-core protocol codec.
//!
//! These tests verify complete round-trip encoding and decoding of every
//! packet type through the public API, in both directions.

use wing_core::protocol::{
    decode, decode_host_packet, encode, encode_wing_packet,
    packets::{
        Acknowledge, ButtonMask, Configure, FirmwareVersion, HealthFlags, HostPacket,
        PlaybackPacket, ProgramPacket, ShortcutPacket, StatusPacket, WingPacket, WingVariant,
        HEADER_SIZE, PLAYBACK_PAYLOAD_SIZE,
    },
    DecodeError,
};

/// Encodes a Wing packet and decodes it again.
fn roundtrip(packet: &WingPacket) -> WingPacket {
    let bytes = encode_wing_packet(packet);
    decode(&bytes).expect("decode must succeed")
}

#[test]
fn test_roundtrip_playback_packet() {
    let original = WingPacket::Playback(PlaybackPacket {
        buttons: ButtonMask(0x80_0000_0001),
        faders: [0, 25, 50, 75, 100, 125, 150, 175, 200, 255],
        page: 12,
    });

    assert_eq!(original, roundtrip(&original));
}

#[test]
fn test_roundtrip_playback_encoded_size() {
    let bytes = encode_wing_packet(&WingPacket::Playback(PlaybackPacket {
        buttons: ButtonMask(0),
        faders: [0; 10],
        page: 0,
    }));
    assert_eq!(bytes.len(), HEADER_SIZE + PLAYBACK_PAYLOAD_SIZE);
}

#[test]
fn test_roundtrip_shortcut_packet_all_buttons_pressed() {
    let original = WingPacket::Shortcut(ShortcutPacket {
        buttons: ButtonMask(ButtonMask::valid_bits(60)),
        page: 255,
    });

    assert_eq!(original, roundtrip(&original));
}

#[test]
fn test_roundtrip_program_packet() {
    let original = WingPacket::Program(ProgramPacket {
        buttons: ButtonMask(0x0F0F_0F0F),
        encoders: [0, 64, 255],
        page: 1,
    });

    assert_eq!(original, roundtrip(&original));
}

#[test]
fn test_roundtrip_status_packet_for_every_variant() {
    for variant in [WingVariant::Playback, WingVariant::Shortcut, WingVariant::Program] {
        let original = WingPacket::Status(StatusPacket {
            variant,
            firmware: FirmwareVersion { major: 3, minor: 14 },
            health: HealthFlags(HealthFlags::OVERHEAT),
        });
        assert_eq!(original, roundtrip(&original));
    }
}

#[test]
fn test_roundtrip_host_acknowledge() {
    let original = HostPacket::Acknowledge(Acknowledge { host_port: 3330 });
    assert_eq!(decode_host_packet(&encode(&original)), Ok(original));
}

#[test]
fn test_roundtrip_host_configure() {
    let original = HostPacket::Configure(Configure {
        page: 7,
        backlight: 128,
    });
    assert_eq!(decode_host_packet(&encode(&original)), Ok(original));
}

#[test]
fn test_every_truncation_of_a_valid_packet_is_rejected() {
    let bytes = encode_wing_packet(&WingPacket::Program(ProgramPacket {
        buttons: ButtonMask(1),
        encoders: [1, 2, 3],
        page: 4,
    }));

    for len in 0..bytes.len() {
        let result = decode(&bytes[..len]);
        assert!(result.is_err(), "truncation to {len} bytes must fail");
        assert!(result.unwrap_err().is_malformed());
    }
}

#[test]
fn test_trailing_garbage_is_rejected() {
    let mut bytes = encode_wing_packet(&WingPacket::Shortcut(ShortcutPacket {
        buttons: ButtonMask(0),
        page: 0,
    }));
    bytes.push(0xAA);

    assert!(matches!(
        decode(&bytes),
        Err(DecodeError::MalformedPacket(_))
    ));
}

#[test]
fn test_host_packet_is_not_a_wing_packet() {
    let bytes = encode(&HostPacket::Acknowledge(Acknowledge { host_port: 1 }));
    assert!(matches!(decode(&bytes), Err(DecodeError::BadMagic(_))));
}
