use linkbus_frame::QueueError;
use linkbus_transport::TransportError;

use crate::roster::{DisplayUid, Uid};

/// Persisted configuration that makes a slave unusable. Fatal at startup.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Mode byte is 0 (never configured) or not a known mode.
    #[error("node not configured (mode byte {0})")]
    Mode(u8),

    /// A zero seed would give every node the same nonce sequence.
    #[error("random seed missing (stored seed is 0)")]
    Seed,

    /// Mode says the node has an identity, but none is stored.
    #[error("identity missing for a node configured with one")]
    Uid,

    /// The config store itself failed.
    #[error("config store error: {0}")]
    Store(#[from] TransportError),
}

/// Roster updates that would break the slot/address pairing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RosterError {
    /// Slave addresses start at 1 and stop at the roster size.
    #[error("address {0} has no roster slot")]
    InvalidAddress(u8),

    #[error("roster slot for address {0} already occupied")]
    Occupied(u8),

    #[error("identity too long ({len} bytes, max {max})")]
    UidTooLong { len: usize, max: usize },
}

/// Errors surfaced by the master and slave controllers.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// No roster slot carries this identity. Holds at most the first
    /// `UID_SIZE` bytes of what was asked for.
    #[error("no slave with identity '{}'", DisplayUid(.0.as_slice()))]
    UnknownIdentity(Uid),

    /// The outbound queue refused the request.
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, NodeError>;
