//! In-memory bus for tests and simulation.
//!
//! A [`SimBus`] connects any number of [`SimPort`]s. A byte written by one
//! port is delivered synchronously to the receive path of every other port,
//! the same way a shared RS-485 pair would carry it. The bus can drop or
//! corrupt bytes in flight and keeps a log of everything that crossed it.
//!
//! Single threaded: handles are `Rc` based and meant to be driven from one
//! tick loop.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use crate::rx::RxBuffer;
use crate::traits::{ByteChannel, PresenceSense, TickSource, TxEnable};

/// One byte as seen on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireByte {
    /// Index of the transmitting port.
    pub from: usize,
    pub byte: u8,
    pub addr_mark: bool,
}

#[derive(Debug, Default)]
struct BusInner {
    ports: Vec<Rc<RefCell<RxBuffer>>>,
    drop_remaining: usize,
    corrupt: Option<(usize, u8)>,
    log: Vec<WireByte>,
}

/// Shared wire joining simulated ports.
#[derive(Debug, Clone, Default)]
pub struct SimBus {
    inner: Rc<RefCell<BusInner>>,
}

impl SimBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a new port whose receive path wakes on `default_addr`.
    pub fn attach(&self, default_addr: u8) -> SimPort {
        let rx = Rc::new(RefCell::new(RxBuffer::new(default_addr)));
        let mut inner = self.inner.borrow_mut();
        let id = inner.ports.len();
        inner.ports.push(Rc::clone(&rx));
        SimPort {
            id,
            rx,
            bus: self.clone(),
        }
    }

    /// Silently lose the next `n` bytes put on the wire.
    pub fn drop_next(&self, n: usize) {
        self.inner.borrow_mut().drop_remaining = n;
    }

    /// XOR the next byte put on the wire with `mask`.
    pub fn corrupt_next(&self, mask: u8) {
        self.corrupt_byte(0, mask);
    }

    /// XOR one upcoming byte with `mask`, after letting `skip` bytes through.
    pub fn corrupt_byte(&self, skip: usize, mask: u8) {
        self.inner.borrow_mut().corrupt = Some((skip, mask));
    }

    /// Drain the wire log.
    pub fn take_log(&self) -> Vec<WireByte> {
        std::mem::take(&mut self.inner.borrow_mut().log)
    }

    pub fn port_count(&self) -> usize {
        self.inner.borrow().ports.len()
    }

    fn transmit(&self, from: usize, byte: u8, addr_mark: bool) {
        let mut inner = self.inner.borrow_mut();
        if inner.drop_remaining > 0 {
            inner.drop_remaining -= 1;
            tracing::trace!(from, byte, "sim bus dropped byte");
            return;
        }

        let byte = match inner.corrupt {
            Some((0, mask)) => {
                inner.corrupt = None;
                tracing::trace!(from, byte, mask, "sim bus corrupted byte");
                byte ^ mask
            }
            Some((skip, mask)) => {
                inner.corrupt = Some((skip - 1, mask));
                byte
            }
            None => byte,
        };

        inner.log.push(WireByte {
            from,
            byte,
            addr_mark,
        });
        for (idx, port) in inner.ports.iter().enumerate() {
            if idx != from {
                port.borrow_mut().on_byte(byte, addr_mark);
            }
        }
    }

    fn signal_break(&self, from: usize) {
        let inner = self.inner.borrow();
        for (idx, port) in inner.ports.iter().enumerate() {
            if idx != from {
                port.borrow_mut().on_break();
            }
        }
    }
}

/// One node's UART on a [`SimBus`].
#[derive(Debug)]
pub struct SimPort {
    id: usize,
    rx: Rc<RefCell<RxBuffer>>,
    bus: SimBus,
}

impl SimPort {
    /// Index of this port on its bus.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Current wake-up address of the receive path.
    pub fn addr(&self) -> u8 {
        self.rx.borrow().addr()
    }

    pub fn rx_enabled(&self) -> bool {
        self.rx.borrow().is_enabled()
    }
}

impl ByteChannel for SimPort {
    fn reset(&mut self, default_addr: u8) {
        self.rx.borrow_mut().reset(default_addr);
    }

    fn set_addr(&mut self, addr: u8) {
        self.rx.borrow_mut().set_addr(addr);
    }

    fn read_byte(&mut self) -> u8 {
        self.rx.borrow_mut().read_byte()
    }

    fn write_byte(&mut self, byte: u8) {
        self.bus.transmit(self.id, byte, false);
    }

    fn write_addr(&mut self, addr: u8) {
        self.bus.transmit(self.id, addr, true);
    }

    fn write_break(&mut self) {
        self.bus.signal_break(self.id);
    }

    fn enable_rx(&mut self) {
        self.rx.borrow_mut().enable();
    }

    fn disable_rx(&mut self) {
        self.rx.borrow_mut().disable();
    }

    fn is_busy(&self) -> bool {
        self.rx.borrow().is_busy()
    }

    fn clear_busy(&mut self) {
        self.rx.borrow_mut().clear_busy();
    }

    fn take_frame_ready(&mut self) -> bool {
        self.rx.borrow().take_frame_ready()
    }
}

/// Presence line that tests can pull up or down.
#[derive(Debug, Clone)]
pub struct SimPin {
    level: Rc<Cell<bool>>,
}

impl SimPin {
    pub fn new(present: bool) -> Self {
        Self {
            level: Rc::new(Cell::new(present)),
        }
    }

    pub fn set(&self, present: bool) {
        self.level.set(present);
    }
}

impl PresenceSense for SimPin {
    fn is_present(&self) -> bool {
        self.level.get()
    }
}

/// Transceiver enable line that records its level and how often it toggled.
#[derive(Debug, Clone, Default)]
pub struct SimTxEnable {
    level: Rc<Cell<bool>>,
    toggles: Rc<Cell<u32>>,
}

impl SimTxEnable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.level.get()
    }

    pub fn toggles(&self) -> u32 {
        self.toggles.get()
    }

    fn drive(&self, level: bool) {
        if self.level.get() != level {
            self.toggles.set(self.toggles.get() + 1);
        }
        self.level.set(level);
    }
}

impl TxEnable for SimTxEnable {
    fn enable_tx(&mut self) {
        self.drive(true);
    }

    fn disable_tx(&mut self) {
        self.drive(false);
    }
}

/// Manually advanced millisecond clock.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now: Rc<Cell<u32>>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }

    pub fn set(&self, ms: u32) {
        self.now.set(ms);
    }
}

impl TickSource for SimClock {
    fn millis(&self) -> u32 {
        self.now.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn send(port: &mut SimPort, addr: u8, rest: &[u8]) {
        port.write_break();
        port.write_byte(0x55);
        port.write_addr(addr);
        for &b in rest {
            port.write_byte(b);
        }
    }

    #[test]
    fn bytes_reach_every_other_port() {
        let bus = SimBus::new();
        let mut master = bus.attach(0x0F);
        let mut a = bus.attach(0x00);
        let mut b = bus.attach(0x00);

        send(&mut master, 0xF0, &[0x00, 0x11, 0x22]);

        assert!(a.take_frame_ready());
        assert!(b.take_frame_ready());
        assert!(!master.take_frame_ready());
        assert_eq!(a.read_byte(), 0xF0);
        assert_eq!(bus.take_log().len(), 5);
    }

    #[test]
    fn break_marks_listeners_busy() {
        let bus = SimBus::new();
        let mut master = bus.attach(0x0F);
        let a = bus.attach(0x00);

        master.write_break();
        assert!(a.is_busy());
        assert!(!master.is_busy());
    }

    #[test]
    fn dropped_bytes_never_arrive() {
        let bus = SimBus::new();
        let mut master = bus.attach(0x0F);
        let mut a = bus.attach(0x00);

        bus.drop_next(2);
        send(&mut master, 0xF0, &[0x00, 0x11, 0x22]);

        assert!(!a.take_frame_ready());
        assert_eq!(bus.take_log().len(), 3);
    }

    #[test]
    fn corruption_flips_exactly_one_byte() {
        let bus = SimBus::new();
        let mut master = bus.attach(0x0F);
        let _a = bus.attach(0x00);

        bus.corrupt_next(0x01);
        master.write_byte(0x55);
        master.write_byte(0x55);

        let log = bus.take_log();
        assert_eq!(log[0].byte, 0x54);
        assert_eq!(log[1].byte, 0x55);
    }

    #[test]
    fn corruption_can_target_a_later_byte() {
        let bus = SimBus::new();
        let mut master = bus.attach(0x0F);
        let _a = bus.attach(0x00);

        bus.corrupt_byte(2, 0x80);
        for _ in 0..4 {
            master.write_byte(0x01);
        }

        let bytes: Vec<u8> = bus.take_log().iter().map(|w| w.byte).collect();
        assert_eq!(bytes, [0x01, 0x01, 0x81, 0x01]);
    }

    #[test]
    fn readdressed_port_ignores_old_traffic() {
        let bus = SimBus::new();
        let mut master = bus.attach(0x0F);
        let mut a = bus.attach(0x00);
        a.set_addr(0x02);

        send(&mut master, 0xF3, &[0x00, 0x11, 0x22]);
        assert!(!a.take_frame_ready());

        send(&mut master, 0xF2, &[0x00, 0x11, 0x22]);
        assert!(a.take_frame_ready());
        assert_eq!(a.addr(), 0x02);
    }

    #[test]
    fn tx_enable_counts_level_changes() {
        let mut pin = SimTxEnable::new();
        pin.enable_tx();
        pin.enable_tx();
        pin.disable_tx();
        assert_eq!(pin.toggles(), 2);
        assert!(!pin.is_enabled());
    }

    #[test]
    fn clock_wraps() {
        let clock = SimClock::new();
        clock.set(u32::MAX - 10);
        clock.advance(20);
        assert_eq!(clock.millis(), 9);
    }

    #[test]
    fn presence_pin_is_shared_between_clones() {
        let pin = SimPin::new(false);
        let sensed = pin.clone();
        pin.set(true);
        assert!(sensed.is_present());
    }
}
