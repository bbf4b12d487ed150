//! The master's table of known slaves.
//!
//! Slot `i` always belongs to address `i + 1`, so an address maps straight to
//! its slot. An empty slot has address 0.

use core::fmt;

use heapless::Vec;
use linkbus_transport::UID_SIZE;

use crate::error::RosterError;

/// Roster size, and so the number of slaves one master serves.
pub const MAX_SLAVES: usize = 5;

/// Ping countdown of a slot that has not answered its first ping yet.
pub const NOT_IN_SERVICE: u8 = 0xFF;

const EMPTY: u8 = 0;

/// A slave identity as held in the roster.
pub type Uid = Vec<u8, UID_SIZE>;

/// Shows an identity as text, with U+FFFD for bytes that are not UTF-8.
#[derive(Debug, Clone, Copy)]
pub struct DisplayUid<'a>(pub &'a [u8]);

impl fmt::Display for DisplayUid<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for chunk in self.0.utf8_chunks() {
            f.write_str(chunk.valid())?;
            if !chunk.invalid().is_empty() {
                f.write_str("\u{FFFD}")?;
            }
        }
        Ok(())
    }
}

/// One known slave.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Slot {
    addr: u8,
    uid: Uid,
    ping_count: u8,
    ping_error: u8,
}

impl Slot {
    fn empty() -> Self {
        Self {
            addr: EMPTY,
            uid: Vec::new(),
            ping_count: NOT_IN_SERVICE,
            ping_error: 0,
        }
    }

    pub fn addr(&self) -> u8 {
        self.addr
    }

    pub fn uid(&self) -> &[u8] {
        &self.uid
    }

    /// Roster ticks until the next ping; 0 means a ping is due.
    pub fn ping_count(&self) -> u8 {
        self.ping_count
    }

    pub fn ping_error(&self) -> u8 {
        self.ping_error
    }

    pub fn is_occupied(&self) -> bool {
        self.addr != EMPTY
    }

    pub fn in_service(&self) -> bool {
        self.is_occupied() && self.ping_count != NOT_IN_SERVICE
    }
}

/// Result of charging a slot with a missed ping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    /// Still below the ceiling; the slot is due for another ping.
    Retry { errors: u8 },
    /// Ceiling reached; the slot was cleared.
    Evicted,
    /// Nothing lives at that address.
    Unknown,
}

/// Identities of the slaves currently on the roster.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlaveList {
    pub uids: Vec<Uid, MAX_SLAVES>,
}

impl SlaveList {
    pub fn count(&self) -> usize {
        self.uids.len()
    }
}

#[derive(Debug, Clone)]
pub struct Roster {
    slots: [Slot; MAX_SLAVES],
    ping_flag: bool,
    cursor: usize,
    max_ping_errors: u8,
}

impl Roster {
    pub fn new(max_ping_errors: u8) -> Self {
        Self {
            slots: core::array::from_fn(|_| Slot::empty()),
            ping_flag: false,
            cursor: 0,
            max_ping_errors: max_ping_errors.max(1),
        }
    }

    /// Address of the first free slot.
    pub fn available(&self) -> Option<u8> {
        self.slots
            .iter()
            .position(|slot| !slot.is_occupied())
            .map(index_to_addr)
    }

    /// Commit a slave to the slot its address owns.
    ///
    /// The slot stays out of the ping rotation until
    /// [`set_ping_period`](Self::set_ping_period) puts it in service.
    pub fn add(&mut self, addr: u8, uid: &[u8]) -> Result<(), RosterError> {
        let index = addr_to_index(addr).ok_or(RosterError::InvalidAddress(addr))?;
        let uid = Vec::from_slice(uid).map_err(|()| RosterError::UidTooLong {
            len: uid.len(),
            max: UID_SIZE,
        })?;

        let slot = &mut self.slots[index];
        if slot.is_occupied() {
            return Err(RosterError::Occupied(addr));
        }
        *slot = Slot {
            addr,
            uid,
            ping_count: NOT_IN_SERVICE,
            ping_error: 0,
        };
        Ok(())
    }

    pub fn evict(&mut self, addr: u8) {
        if let Some(index) = addr_to_index(addr) {
            self.slots[index] = Slot::empty();
        }
    }

    /// Count a missed ping against `addr`.
    pub fn ping_error(&mut self, addr: u8) -> PingOutcome {
        let max = self.max_ping_errors;
        let Some(slot) = self.slot_mut(addr) else {
            return PingOutcome::Unknown;
        };

        slot.ping_error += 1;
        if slot.ping_error >= max {
            *slot = Slot::empty();
            return PingOutcome::Evicted;
        }

        let errors = slot.ping_error;
        slot.ping_count = 0;
        self.ping_flag = true;
        PingOutcome::Retry { errors }
    }

    /// Re-arm the ping countdown of `addr` after it answered.
    pub fn set_ping_period(&mut self, addr: u8, ticks: u8) {
        if ticks == 0 {
            return;
        }
        if let Some(slot) = self.slot_mut(addr) {
            slot.ping_count = ticks;
            slot.ping_error = 0;
        }
    }

    /// Advance every in-service countdown by one roster tick.
    pub fn ping_tick(&mut self) {
        for slot in self.slots.iter_mut().filter(|slot| slot.in_service()) {
            if slot.ping_count > 0 {
                slot.ping_count -= 1;
                if slot.ping_count == 0 {
                    self.ping_flag = true;
                }
            }
        }
    }

    /// Next address due for a ping.
    ///
    /// The scan resumes after the slot returned last time and wraps once, so
    /// every slot gets its turn before any is repeated.
    pub fn next_ping(&mut self) -> Option<u8> {
        if !self.ping_flag {
            return None;
        }

        let due = (self.cursor..MAX_SLAVES)
            .chain(0..self.cursor)
            .find(|&i| self.slots[i].is_occupied() && self.slots[i].ping_count == 0);

        match due {
            Some(index) => {
                self.cursor = index + 1;
                Some(index_to_addr(index))
            }
            None => {
                self.ping_flag = false;
                None
            }
        }
    }

    /// Address of the slave whose stored identity equals `uid`.
    pub fn map_uid_to_addr(&self, uid: &[u8]) -> Option<u8> {
        if uid.is_empty() {
            return None;
        }
        self.iter()
            .find(|slot| slot.uid.as_slice() == uid)
            .map(Slot::addr)
    }

    pub fn slot(&self, addr: u8) -> Option<&Slot> {
        addr_to_index(addr)
            .map(|index| &self.slots[index])
            .filter(|slot| slot.is_occupied())
    }

    /// Occupied slots, in address order.
    pub fn iter(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|slot| slot.is_occupied())
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slave_list(&self) -> SlaveList {
        let mut list = SlaveList::default();
        for slot in self.iter() {
            // At most MAX_SLAVES occupied slots.
            let _ = list.uids.push(slot.uid.clone());
        }
        list
    }

    fn slot_mut(&mut self, addr: u8) -> Option<&mut Slot> {
        let index = addr_to_index(addr)?;
        let slot = &mut self.slots[index];
        slot.is_occupied().then_some(slot)
    }
}

fn addr_to_index(addr: u8) -> Option<usize> {
    let index = usize::from(addr).checked_sub(1)?;
    (index < MAX_SLAVES).then_some(index)
}

fn index_to_addr(index: usize) -> u8 {
    index as u8 + 1
}
