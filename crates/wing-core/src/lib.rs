//! # wing-core
//!
//! Protocol engine for Wing lighting-control surfaces: the datagram codec,
//! the per-device state model, and the registry that turns raw packets into
//! semantic input events.
//!
//! This crate has no dependencies on sockets, threads, or the host console.
//! The `wing-host` crate owns the UDP socket and feeds datagrams in here.
//!
//! # Architecture overview
//!
//! - **`protocol`** – Wire format.  Wings send `WODD` datagrams (a 6-byte
//!   header plus a fixed-size payload per variant); the host answers with
//!   `WIDD` acknowledgements and configuration packets.
//!
//! - **`domain`** – [`WingDevice`] diffs each decoded packet against the last
//!   one and yields one [`InputEvent`] per real change; [`DeviceRegistry`]
//!   discovers devices on first contact and expires silent ones.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root.
pub use domain::device::{WingDevice, WingState};
pub use domain::events::{ChannelId, DeviceAddress, InputEvent, OperatingStatus};
pub use domain::registry::{DeviceRegistry, DEFAULT_LIVENESS_TIMEOUT};
pub use protocol::codec::{decode, encode, DecodeError};
pub use protocol::packets::{HostPacket, WingPacket, WingVariant};
