//! Hardware abstraction for the linkbus serial protocol.
//!
//! Everything the protocol engine needs from the outside world is expressed
//! as a trait here:
//! - [`ByteChannel`]: a 9-bit UART with address-mark wake-up
//! - [`TxEnable`]: the transceiver write-enable pin
//! - [`PresenceSense`]: physical bus presence
//! - [`TickSource`]: a millisecond clock
//! - [`ConfigStore`]: persisted node configuration
//!
//! This is the lowest layer of linkbus. [`RxBuffer`] is the interrupt-level
//! receive path a driver embeds, and [`sim`] wires several ports onto one
//! in-memory bus so whole networks can run inside a single process.

pub mod error;
pub mod rx;
pub mod sim;
pub mod store;
pub mod traits;

pub use error::{Result, TransportError};
pub use rx::{RxBuffer, FRAME_OVERHEAD, LEN_MASK, RX_BUFFER_SIZE};
pub use sim::{SimBus, SimClock, SimPin, SimPort, SimTxEnable, WireByte};
pub use store::{MemoryConfigStore, UID_SIZE};
pub use traits::{ByteChannel, ConfigStore, PresenceSense, TickSource, TxEnable};
