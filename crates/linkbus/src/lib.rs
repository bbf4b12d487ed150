//! Half-duplex multi-drop serial bus protocol.
//!
//! One master and up to five slaves share a single wire. Slaves announce
//! themselves, are given an address in a nonce-matched handshake, and are
//! kept alive with periodic pings; both sides exchange CRC-checked frames of
//! up to 124 bytes.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte channel, pin and config-store traits, plus a simulated bus
//! - [`frame`]: wire codec, CRC-16, per-node frame engine and request queue
//! - [`node`]: master and slave controllers (behind the `node` feature)

/// Re-export transport types.
pub mod transport {
    pub use linkbus_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use linkbus_frame::*;
}

/// Re-export node types (requires `node` feature).
#[cfg(feature = "node")]
pub mod node {
    pub use linkbus_node::*;
}
