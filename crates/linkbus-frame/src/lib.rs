//! Addressed, CRC-checked framing for a half-duplex multi-drop serial bus.
//!
//! Every frame on the wire is:
//! - a break and a sync byte (0x55)
//! - an address-marked ADDR byte (source nibble, destination nibble)
//! - a META byte (mode bit, 7-bit payload length)
//! - 0 to 124 payload bytes
//! - a big-endian CRC-16/CCITT-FALSE over everything from ADDR on
//!
//! [`FrameEngine`] runs the per-node receive/reply state machine on top of a
//! [`ByteChannel`](linkbus_transport::ByteChannel); [`RequestQueue`] feeds it
//! outbound application requests. Nothing here allocates.

pub mod codec;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod queue;

pub use codec::{
    crc16, crc16_update, decode_frame, encode_frame, hton16, hton32, ntoh16, ntoh32, AddrByte,
    Frame, MetaByte, Mode, BROADCAST_ADDR, CRC_INIT, CRC_LEN, CRC_POLY, DEFAULT_ADDR, HEADER_LEN,
    MASTER_ADDR, MAX_FRAME_LEN, MAX_PAYLOAD, SYNC_BYTE,
};
pub use command::{command_name, Command, CMD_MAX_ARGS, CMD_MAX_LEN, HSK_VER, NONCE_LEN};
pub use config::TimingConfig;
pub use engine::{
    CommandFrame, FrameEngine, Incoming, NodeStatus, Parsed, ReadStatus, ReplyState, Role,
    RxState, MAX_CMD_PAYLOAD,
};
pub use error::{FrameError, QueueError, Result};
pub use queue::{Request, RequestQueue, QUEUE_CAPACITY, QUEUE_SLOTS};
