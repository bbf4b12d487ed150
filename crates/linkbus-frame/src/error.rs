/// Errors that can occur during offline frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the 124-byte frame limit.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Fewer bytes than the header announces.
    #[error("truncated frame (need {needed} bytes, have {available})")]
    Truncated { needed: usize, available: usize },

    /// Trailing bytes after the frame the header describes.
    #[error("frame length mismatch (header declares {declared} bytes, got {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// The trailing CRC does not match the frame contents.
    #[error("bad CRC (computed {computed:#06x}, received {received:#06x})")]
    BadCrc { computed: u16, received: u16 },

    /// A node address outside the 4-bit range.
    #[error("node address {0:#04x} out of range (max 0x0f)")]
    InvalidAddress(u8),

    /// The destination buffer cannot hold the encoded frame.
    #[error("output buffer too small (need {needed} bytes, have {available})")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Errors from the outbound request queue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    /// Every usable slot is taken.
    #[error("request queue full ({capacity} requests pending)")]
    Full { capacity: usize },

    /// The payload would not fit in a single frame.
    #[error("request payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
