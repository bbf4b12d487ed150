use crate::error::Result;
use crate::store::UID_SIZE;

/// A half-duplex byte channel with 9-bit address-mark wake-up.
///
/// Reception is interrupt fed: the driver pushes bytes through its
/// [`RxBuffer`](crate::RxBuffer) and raises a ready flag once a whole frame is
/// buffered. Everything else here runs at tick level.
pub trait ByteChannel {
    /// Re-initialize the channel: flush, mute, set both the current and the
    /// default wake-up address, enable reception.
    fn reset(&mut self, default_addr: u8);

    /// Change the wake-up address. The default address keeps waking the port.
    fn set_addr(&mut self, addr: u8);

    /// Pop one buffered byte, or 0 when the buffer is empty.
    fn read_byte(&mut self) -> u8;

    /// Write one data byte, blocking until the hardware confirms it.
    fn write_byte(&mut self, byte: u8);

    /// Write one byte with the address mark (9th bit) set.
    fn write_addr(&mut self, addr: u8);

    /// Emit a break condition ahead of a frame.
    fn write_break(&mut self);

    /// Re-enable reception. A stale frame-ready flag is discarded.
    fn enable_rx(&mut self);

    /// Stop reception entirely (no interrupts, no busy detection).
    fn disable_rx(&mut self);

    /// True if any byte was seen on the bus since the last [`clear_busy`](Self::clear_busy).
    fn is_busy(&self) -> bool;

    /// Clear the bus activity flag.
    fn clear_busy(&mut self);

    /// Consume the frame-ready flag raised by the receive interrupt.
    fn take_frame_ready(&mut self) -> bool;
}

/// Transceiver write-enable control.
pub trait TxEnable {
    /// Put the transceiver in transmit mode.
    fn enable_tx(&mut self);

    /// Release the transceiver back to receive-only mode.
    fn disable_tx(&mut self);
}

/// Physical bus presence (typically the idle-high RX line).
pub trait PresenceSense {
    fn is_present(&self) -> bool;
}

/// Free-running millisecond clock.
pub trait TickSource {
    fn millis(&self) -> u32;
}

/// Persisted node configuration.
pub trait ConfigStore {
    /// Operation mode byte: 0 = unconfigured, 1 = no identity, 2 = has identity.
    fn load_mode(&mut self) -> Result<u8>;

    /// Seed for the node's pseudo random generator.
    fn load_seed(&mut self) -> Result<u32>;

    /// Factory identity, zero padded.
    fn load_uid(&mut self, uid: &mut [u8; UID_SIZE]) -> Result<()>;
}

/// Boards without a transceiver enable line.
impl TxEnable for () {
    fn enable_tx(&mut self) {}

    fn disable_tx(&mut self) {}
}
