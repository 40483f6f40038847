//! Domain entities for Wing input handling.
//!
//! This module contains pure logic with no infrastructure dependencies: it
//! never touches a socket or a clock.  Callers pass arrival times in, which
//! keeps every liveness decision deterministic under test.

/// One physical Wing and its last reported state.
pub mod device;
/// The event vocabulary delivered to the host.
pub mod events;
/// Address-keyed device set with discovery and expiry.
pub mod registry;
