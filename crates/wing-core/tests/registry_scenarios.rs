//! Integration tests for the device registry.
//!
//! These tests drive `DeviceRegistry` with encoded datagrams exactly as the
//! receive loop does, and check the event stream a host would observe.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use wing_core::protocol::{
    encode_wing_packet,
    packets::{
        ButtonMask, FirmwareVersion, HealthFlags, PlaybackPacket, ShortcutPacket, StatusPacket,
        WingPacket, WingVariant,
    },
};
use wing_core::{ChannelId, DeviceRegistry, InputEvent, OperatingStatus};

fn wing_a() -> SocketAddr {
    "192.168.0.50:3330".parse().unwrap()
}

fn playback(buttons: u64, fader0: u8, page: u8) -> Vec<u8> {
    let mut faders = [0u8; 10];
    faders[0] = fader0;
    encode_wing_packet(&WingPacket::Playback(PlaybackPacket {
        buttons: ButtonMask(buttons),
        faders,
        page,
    }))
}

/// Discovery, a change, a repeat, and expiry.
#[test]
fn test_playback_lifecycle_scenario() {
    // Arrange
    let timeout = Duration::from_secs(5);
    let mut registry = DeviceRegistry::new(timeout);
    let t0 = Instant::now();

    // Act / Assert: first contact
    let events = registry.handle_packet(wing_a(), &playback(0, 0, 0), t0);
    assert_eq!(
        events,
        vec![InputEvent::DeviceDiscovered {
            address: wing_a(),
            variant: WingVariant::Playback,
        }]
    );

    // fader 0 moves to 128
    let t1 = t0 + Duration::from_millis(100);
    let events = registry.handle_packet(wing_a(), &playback(0, 128, 0), t1);
    assert_eq!(
        events,
        vec![InputEvent::ChannelChanged {
            address: wing_a(),
            channel: ChannelId::Fader(0),
            old: 0,
            new: 128,
        }]
    );

    // identical packet: nothing
    let t2 = t1 + Duration::from_millis(100);
    assert!(registry.handle_packet(wing_a(), &playback(0, 128, 0), t2).is_empty());

    // silence past the timeout
    let events = registry.sweep_expired(t2 + timeout + Duration::from_millis(1));
    assert_eq!(
        events,
        vec![InputEvent::DeviceOffline {
            address: wing_a(),
            variant: WingVariant::Playback,
        }]
    );
    assert!(registry.sweep_expired(t2 + timeout * 10).is_empty());
}

/// The number of channel events equals the number of net value changes,
/// whatever the number of packets.
#[test]
fn test_channel_events_count_net_changes_not_packets() {
    // Arrange: a fader trace with repeats
    let trace: [u8; 12] = [0, 0, 10, 10, 10, 20, 20, 10, 10, 0, 0, 0];
    let expected_changes = trace.windows(2).filter(|w| w[0] != w[1]).count();
    let mut registry = DeviceRegistry::default();
    let now = Instant::now();

    // Act
    let mut fader_events = 0;
    for value in trace {
        for event in registry.handle_packet(wing_a(), &playback(0, value, 0), now) {
            if matches!(
                event,
                InputEvent::ChannelChanged {
                    channel: ChannelId::Fader(0),
                    ..
                }
            ) {
                fader_events += 1;
            }
        }
    }

    // Assert
    assert_eq!(fader_events, expected_changes);
}

#[test]
fn test_button_press_and_release_events_in_order() {
    let mut registry = DeviceRegistry::default();
    let now = Instant::now();
    let addr = wing_a();
    let shortcut = |buttons| {
        encode_wing_packet(&WingPacket::Shortcut(ShortcutPacket {
            buttons: ButtonMask(buttons),
            page: 0,
        }))
    };
    registry.handle_packet(addr, &shortcut(0), now);

    let pressed = registry.handle_packet(addr, &shortcut(1 << 42), now);
    let held = registry.handle_packet(addr, &shortcut(1 << 42), now);
    let released = registry.handle_packet(addr, &shortcut(0), now);

    assert_eq!(
        pressed,
        vec![InputEvent::ChannelChanged {
            address: addr,
            channel: ChannelId::Button(42),
            old: 0,
            new: 255,
        }]
    );
    assert!(held.is_empty());
    assert_eq!(
        released,
        vec![InputEvent::ChannelChanged {
            address: addr,
            channel: ChannelId::Button(42),
            old: 255,
            new: 0,
        }]
    );
}

#[test]
fn test_status_reports_interleave_with_data() {
    let mut registry = DeviceRegistry::default();
    let now = Instant::now();
    let status = |health| {
        encode_wing_packet(&WingPacket::Status(StatusPacket {
            variant: WingVariant::Playback,
            firmware: FirmwareVersion { major: 1, minor: 0 },
            health: HealthFlags(health),
        }))
    };

    registry.handle_packet(wing_a(), &playback(0, 0, 0), now);
    let firmware = registry.handle_packet(wing_a(), &status(0), now);
    let fault = registry.handle_packet(wing_a(), &status(HealthFlags::BUTTON_FAULT), now);
    let data = registry.handle_packet(wing_a(), &playback(0, 0, 1), now);

    assert!(matches!(firmware[..], [InputEvent::FirmwareReported { .. }]));
    assert_eq!(
        fault,
        vec![InputEvent::StatusChanged {
            address: wing_a(),
            old: OperatingStatus::Nominal,
            new: OperatingStatus::Faulted,
        }]
    );
    assert!(matches!(
        data[..],
        [InputEvent::ChannelChanged {
            channel: ChannelId::Page,
            old: 0,
            new: 1,
            ..
        }]
    ));
}

#[test]
fn test_truncated_packet_keeps_device_alive() {
    // Arrange
    let timeout = Duration::from_secs(1);
    let mut registry = DeviceRegistry::new(timeout);
    let t0 = Instant::now();
    registry.handle_packet(wing_a(), &playback(0, 0, 0), t0);
    let mut truncated = playback(0, 99, 0);
    truncated.truncate(9);

    // Act: only a truncated packet arrives shortly before the deadline
    let t1 = t0 + Duration::from_millis(900);
    let events = registry.handle_packet(wing_a(), &truncated, t1);
    let swept = registry.sweep_expired(t0 + Duration::from_millis(1500));

    // Assert
    assert!(matches!(events[..], [InputEvent::PacketDecodeFailed { .. }]));
    assert!(swept.is_empty(), "truncated packet must still count as presence");
}
