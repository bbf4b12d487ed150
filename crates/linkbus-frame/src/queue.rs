use heapless::{Deque, Vec};
use linkbus_transport::{ByteChannel, TxEnable};
use tracing::debug;

use crate::codec::{Mode, MAX_PAYLOAD};
use crate::command::EXTERNAL_REQUEST;
use crate::engine::FrameEngine;
use crate::error::QueueError;

/// Ring slots; one is always kept free.
pub const QUEUE_SLOTS: usize = 5;

/// Requests the queue can hold at once.
pub const QUEUE_CAPACITY: usize = QUEUE_SLOTS - 1;

/// One pending outbound DATA frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub dst: u8,
    pub payload: Vec<u8, MAX_PAYLOAD>,
    pub wait_reply: bool,
}

/// Bounded FIFO of outbound application requests.
///
/// Payloads are copied in, so callers may reuse their buffers right away.
#[derive(Debug)]
pub struct RequestQueue {
    ring: Deque<Request, QUEUE_CAPACITY>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self { ring: Deque::new() }
    }

    pub fn push(&mut self, dst: u8, payload: &[u8], wait_reply: bool) -> Result<(), QueueError> {
        let payload = Vec::from_slice(payload).map_err(|()| QueueError::PayloadTooLarge {
            size: payload.len(),
            max: MAX_PAYLOAD,
        })?;
        self.ring
            .push_back(Request {
                dst,
                payload,
                wait_reply,
            })
            .map_err(|_| QueueError::Full {
                capacity: QUEUE_CAPACITY,
            })
    }

    /// Try to send the oldest request.
    ///
    /// Only attempted when the engine is safe to send. The request leaves the
    /// queue only if it actually went out; a busy bus keeps it for a later tick.
    pub fn dispatch<C: ByteChannel, T: TxEnable>(&mut self, engine: &mut FrameEngine<C, T>) -> bool {
        if !engine.safe_to_send() {
            return false;
        }
        let Some(head) = self.ring.front() else {
            return false;
        };

        let (dst, wait_reply) = (head.dst, head.wait_reply);
        if !engine.send(dst, Mode::Data, &head.payload, false) {
            return false;
        }
        if wait_reply {
            engine.arm_reply(dst, EXTERNAL_REQUEST);
        }
        debug!(dst, wait_reply, pending = self.ring.len() - 1, "request dispatched");
        self.ring.pop_front();
        true
    }

    pub fn front(&self) -> Option<&Request> {
        self.ring.front()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }

    pub fn clear(&mut self) {
        self.ring.clear();
    }
}

impl Default for RequestQueue {
    fn default() -> Self {
        Self::new()
    }
}
