//! Interrupt-level receive path.
//!
//! A driver calls [`RxBuffer::on_byte`] from its receive interrupt. The
//! buffer applies the address-mark wake-up filter, stores accepted bytes and
//! counts them against the frame length announced in the META byte. When a
//! whole frame is buffered it mutes and disables itself, then raises the
//! ready flag; tick-level code owns the buffer until reception is re-enabled.

use std::sync::atomic::{AtomicBool, Ordering};

use heapless::Deque;

/// Receive FIFO capacity: the largest frame (124 byte payload + 4).
pub const RX_BUFFER_SIZE: usize = 128;

/// ADDR + META + CRC(2).
pub const FRAME_OVERHEAD: u8 = 4;

/// Length bits of the META byte.
pub const LEN_MASK: u8 = 0x7F;

const LEN_UNKNOWN: u8 = u8::MAX;

/// Receive FIFO plus the frame byte accumulator.
#[derive(Debug)]
pub struct RxBuffer {
    fifo: Deque<u8, RX_BUFFER_SIZE>,
    addr: u8,
    default_addr: u8,
    muted: bool,
    enabled: bool,
    busy: bool,
    count: u8,
    expected: u8,
    ready: AtomicBool,
}

impl RxBuffer {
    /// Create a muted, enabled buffer waking on `default_addr`.
    pub fn new(default_addr: u8) -> Self {
        Self {
            fifo: Deque::new(),
            addr: default_addr & 0x0F,
            default_addr: default_addr & 0x0F,
            muted: true,
            enabled: true,
            busy: false,
            count: 0,
            expected: LEN_UNKNOWN,
            ready: AtomicBool::new(false),
        }
    }

    /// Back to the power-on state with a new default address.
    pub fn reset(&mut self, default_addr: u8) {
        *self = Self::new(default_addr);
    }

    pub fn set_addr(&mut self, addr: u8) {
        if addr <= 0x0F {
            self.addr = addr;
        }
    }

    pub fn addr(&self) -> u8 {
        self.addr
    }

    /// Receive interrupt entry point. Bounded work, never blocks.
    pub fn on_byte(&mut self, byte: u8, addr_mark: bool) {
        if !self.enabled {
            return;
        }
        self.busy = true;

        if addr_mark {
            let target = byte & 0x0F;
            if target == self.addr || target == self.default_addr {
                self.muted = false;
                self.fifo.clear();
            } else {
                self.muted = true;
            }
        }

        if self.muted || self.fifo.push_back(byte).is_err() {
            return;
        }
        self.accumulate(byte, addr_mark);
    }

    /// A break condition only counts as bus activity.
    pub fn on_break(&mut self) {
        if self.enabled {
            self.busy = true;
        }
    }

    fn accumulate(&mut self, byte: u8, addr_mark: bool) {
        if addr_mark {
            self.count = 1;
            self.expected = LEN_UNKNOWN;
            return;
        }

        self.count = self.count.saturating_add(1);
        if self.count == 2 {
            self.expected = (byte & LEN_MASK) + FRAME_OVERHEAD;
        } else if self.count == self.expected {
            // One frame at a time: stay deaf until the consumer releases us.
            self.muted = true;
            self.enabled = false;
            self.ready.store(true, Ordering::Release);
        }
    }

    pub fn read_byte(&mut self) -> u8 {
        self.fifo.pop_front().unwrap_or(0)
    }

    pub fn enable(&mut self) {
        self.ready.store(false, Ordering::Release);
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }

    pub fn clear_busy(&mut self) {
        self.busy = false;
    }

    pub fn take_frame_ready(&self) -> bool {
        self.ready.swap(false, Ordering::AcqRel)
    }

    /// Number of bytes currently buffered.
    pub fn len(&self) -> usize {
        self.fifo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fifo.is_empty()
    }
}
