//! Master and slave controllers for a linkbus network.
//!
//! A bus has one [`Master`] at address 0x0F and up to five [`Slave`]s. Slaves
//! start at address 0, announce themselves with a SIGNAL carrying a random
//! nonce, and are handed an address and enrolled by the master in a
//! four-step handshake. The master then pings every enrolled slave
//! periodically and evicts slaves that stop answering.
//!
//! Both controllers are driven the same way from the application loop:
//!
//! ```no_run
//! use linkbus_frame::{Parsed, ReadStatus, TimingConfig, MASTER_ADDR};
//! use linkbus_node::Master;
//! use linkbus_transport::{SimBus, SimClock, SimTxEnable};
//!
//! let bus = SimBus::new();
//! let clock = SimClock::new();
//! let mut master = Master::new(bus.attach(MASTER_ADDR), SimTxEnable::new(), TimingConfig::default());
//! let mut buf = [0u8; 124];
//! loop {
//!     if let Parsed::Data { len, .. } = master.parse() {
//!         if master.read(&mut buf[..usize::from(len)]) == ReadStatus::Valid {
//!             // reply payload in buf[..len]
//!         }
//!     }
//!     master.keep_alive(&clock);
//!     clock.advance(1);
//! }
//! ```
//!
//! Call `parse` whenever convenient to handle protocol traffic and learn of
//! DATA frames, `read` to drain them, and `keep_alive` (or `tick` on a
//! timer) to advance timeouts, liveness and the outbound queue.

pub mod config;
pub mod error;
pub mod master;
pub mod roster;
pub mod slave;
pub mod tick;

pub use config::{SlaveConfig, SlaveMode};
pub use error::{ConfigError, NodeError, Result, RosterError};
pub use master::{Handshake, HandshakeStage, Master};
pub use roster::{
    DisplayUid, PingOutcome, Roster, Slot, SlaveList, Uid, MAX_SLAVES, NOT_IN_SERVICE,
};
pub use slave::{LinkState, Slave};
pub use tick::Ticker;
