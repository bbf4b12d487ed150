//! Per-node frame engine.
//!
//! A [`FrameEngine`] owns one node's view of the bus: the single in-flight
//! received frame, the single outstanding reply wait and the bus-busy
//! backoff. It is driven once per tick by a controller and never blocks.
//!
//! Receive lifecycle: `Idle → Ready → Processing → Idle`. A frame becomes
//! Ready when the channel raises its frame-ready flag, Processing once
//! [`parse`](FrameEngine::parse) consumes its header, and Idle again when a
//! reply is sent, the CRC fails, a release rule fires or the busy timeout
//! expires.

use heapless::Vec;
use linkbus_transport::{ByteChannel, TxEnable};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::codec::{
    crc16_update, encode_frame, AddrByte, MetaByte, Mode, BROADCAST_ADDR, CRC_INIT,
    DEFAULT_ADDR, MASTER_ADDR, MAX_FRAME_LEN, MAX_PAYLOAD, SYNC_BYTE,
};
use crate::command::{command_name, CMD_MAX_ARGS, CMD_MAX_LEN};
use crate::config::TimingConfig;

/// Argument bytes a CMD frame can carry after its command byte.
pub const MAX_CMD_PAYLOAD: usize = MAX_PAYLOAD - 1;

const NO_ADDR: u8 = 0xFF;
const NO_CMD: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Master,
    Slave,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    Idle,
    /// A whole frame is buffered, header not yet consumed.
    Ready,
    /// Header consumed; the frame holds the channel.
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    None,
    Pending,
    /// A frame from the awaited node is being processed.
    Received,
    TimedOut,
}

/// Outcome of one [`FrameEngine::update`] tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Ok,
    /// A received frame held the channel past its ceiling and was dropped.
    SendTimeout,
    /// The outstanding request got no reply in time.
    ReceiveTimeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// No frame is being processed.
    Idle,
    /// Payload bytes remain.
    Incomplete,
    Valid,
    Corrupt,
}

/// A validated CMD frame, ready for a controller's dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandFrame {
    pub src: u8,
    pub dst: u8,
    pub code: u8,
    pub args: Vec<u8, MAX_CMD_PAYLOAD>,
    /// The frame came from the node this engine was waiting on.
    pub is_reply: bool,
}

/// What [`FrameEngine::parse`] found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    NotReady,
    Command(CommandFrame),
    /// A CMD frame that was empty or failed its CRC.
    Discarded,
    /// A DATA frame whose `len` payload bytes await [`FrameEngine::read`].
    Data { src: u8, len: u8 },
}

/// What a controller's `parse` hands to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parsed {
    NotReady,
    /// A command or a damaged frame was consumed internally; no bytes for
    /// the application.
    Command,
    Data { src: u8, len: u8 },
}

#[derive(Debug)]
struct RxFrame {
    state: RxState,
    busy_time: u8,
    src: u8,
    dst: u8,
    mode: Mode,
    remaining: u8,
    crc: u16,
    verdict: Option<bool>,
}

impl RxFrame {
    fn idle() -> Self {
        Self {
            state: RxState::Idle,
            busy_time: 0,
            src: 0,
            dst: 0,
            mode: Mode::Data,
            remaining: 0,
            crc: CRC_INIT,
            verdict: None,
        }
    }
}

#[derive(Debug)]
struct LastRequest {
    state: ReplyState,
    busy_time: u8,
    dst: u8,
    cmd: u8,
}

impl LastRequest {
    fn idle() -> Self {
        Self {
            state: ReplyState::None,
            busy_time: 0,
            dst: NO_ADDR,
            cmd: NO_CMD,
        }
    }
}

/// One node's communication state over a [`ByteChannel`].
#[derive(Debug)]
pub struct FrameEngine<C, T> {
    channel: C,
    tx: T,
    role: Role,
    addr: u8,
    rx: RxFrame,
    request: LastRequest,
    bus_busy: bool,
    busy_count: u8,
    rng: SmallRng,
    timing: TimingConfig,
}

impl<C: ByteChannel, T: TxEnable> FrameEngine<C, T> {
    /// Create an engine and bring the channel up at the role's address.
    ///
    /// `seed` drives the slave's bus backoff and anything else the
    /// controller draws from [`rng`](Self::rng).
    pub fn new(channel: C, tx: T, role: Role, timing: TimingConfig, seed: u64) -> Self {
        let addr = match role {
            Role::Master => MASTER_ADDR,
            Role::Slave => DEFAULT_ADDR,
        };
        let mut engine = Self {
            channel,
            tx,
            role,
            addr,
            rx: RxFrame::idle(),
            request: LastRequest::idle(),
            bus_busy: true,
            busy_count: 0,
            rng: SmallRng::seed_from_u64(seed),
            timing,
        };
        engine.channel.reset(addr);
        match role {
            Role::Master => engine.tx.enable_tx(),
            Role::Slave => engine.tx.disable_tx(),
        }
        engine
    }

    /// Consume the header of a buffered frame.
    ///
    /// CMD frames are read to the end and CRC checked here. The channel stays
    /// held afterwards unless a release rule fired; the caller either answers
    /// or calls [`release_if_processing`](Self::release_if_processing).
    pub fn parse(&mut self) -> Incoming {
        self.poll_rx();
        if self.rx.state != RxState::Ready {
            return Incoming::NotReady;
        }

        self.rx.state = RxState::Processing;
        self.rx.crc = CRC_INIT;
        self.rx.verdict = None;

        let addr = AddrByte::unpack(self.next_byte());
        self.rx.src = addr.src;
        self.rx.dst = addr.dst;

        let is_reply =
            self.request.state == ReplyState::Pending && self.request.dst == addr.src;
        if is_reply {
            self.request.state = ReplyState::Received;
        }

        let meta = MetaByte::unpack(self.next_byte());
        self.rx.mode = meta.mode;
        self.rx.remaining = meta.len;

        match meta.mode {
            Mode::Data => Incoming::Data {
                src: addr.src,
                len: meta.len,
            },
            Mode::Cmd => {
                let len = usize::from(meta.len).min(MAX_PAYLOAD);
                let mut buf = [0u8; MAX_PAYLOAD];
                if self.read(&mut buf[..len]) != ReadStatus::Valid || len == 0 {
                    self.release_if_processing();
                    debug!(src = addr.src, dst = addr.dst, "command frame discarded");
                    return Incoming::Discarded;
                }

                let Ok(args) = Vec::from_slice(&buf[1..len]) else {
                    self.release_if_processing();
                    return Incoming::Discarded;
                };
                debug!(
                    src = addr.src,
                    dst = addr.dst,
                    cmd = command_name(buf[0]),
                    "command received"
                );
                Incoming::Command(CommandFrame {
                    src: addr.src,
                    dst: addr.dst,
                    code: buf[0],
                    args,
                    is_reply,
                })
            }
        }
    }

    /// Copy up to `buf.len()` payload bytes of the frame being processed.
    ///
    /// Once the last payload byte is taken the trailing CRC is consumed and
    /// the verdict reported. Asking again before the channel is released
    /// repeats the verdict.
    pub fn read(&mut self, buf: &mut [u8]) -> ReadStatus {
        if self.rx.state != RxState::Processing {
            return ReadStatus::Idle;
        }
        if let Some(valid) = self.rx.verdict {
            return verdict_status(valid);
        }

        let n = buf.len().min(usize::from(self.rx.remaining));
        for slot in &mut buf[..n] {
            *slot = self.next_byte();
        }
        self.rx.remaining -= n as u8;
        if self.rx.remaining > 0 {
            return ReadStatus::Incomplete;
        }

        self.next_byte();
        self.next_byte();
        let valid = self.rx.crc == 0;
        self.rx.verdict = Some(valid);

        if !valid {
            // The awaited node may still answer before the reply timeout.
            if self.request.state == ReplyState::Received {
                self.request.state = ReplyState::Pending;
            }
            debug!(src = self.rx.src, addr = self.addr, "frame failed CRC check");
            self.release();
            return ReadStatus::Corrupt;
        }

        if self.request.state == ReplyState::Received {
            self.request.state = ReplyState::None;
            self.release();
        } else if self.rx.dst == BROADCAST_ADDR && self.addr != DEFAULT_ADDR {
            self.release();
        }
        ReadStatus::Valid
    }

    /// Serialize and transmit one frame.
    ///
    /// Returns `false` if nothing was written: the payload was too large, or
    /// the send was not forced and the channel saw recent traffic. Reception
    /// is re-enabled and the receive state reset either way.
    pub fn send(&mut self, dst: u8, mode: Mode, payload: &[u8], force: bool) -> bool {
        let mut frame = [0u8; MAX_FRAME_LEN];
        let mut cursor = &mut frame[..];
        let written = match encode_frame(self.addr, dst, mode, payload, &mut cursor) {
            Ok(written) => written,
            Err(err) => {
                debug!(dst, error = %err, "frame not sent");
                self.release();
                return false;
            }
        };

        let sent = force || !self.channel.is_busy();
        if sent {
            if self.role == Role::Slave {
                self.tx.enable_tx();
            }
            self.channel.disable_rx();
            self.channel.write_break();
            self.channel.write_byte(SYNC_BYTE);
            self.channel.write_addr(frame[0]);
            for &byte in &frame[1..written] {
                self.channel.write_byte(byte);
            }
            if self.role == Role::Slave {
                self.tx.disable_tx();
            }
            debug!(src = self.addr, dst, ?mode, len = payload.len(), force, "frame sent");
        } else {
            debug!(dst, "bus busy, send deferred");
        }

        self.release();
        sent
    }

    /// Send a command byte with up to 15 argument bytes.
    ///
    /// With `wait_reply` the reply wait is armed for `dst`, replacing any
    /// earlier wait.
    pub fn send_cmd(
        &mut self,
        dst: u8,
        cmd: u8,
        args: &[u8],
        wait_reply: bool,
        force: bool,
    ) -> bool {
        if args.len() > CMD_MAX_ARGS {
            return false;
        }

        let mut buf = [0u8; CMD_MAX_LEN];
        buf[0] = cmd;
        buf[1..=args.len()].copy_from_slice(args);

        if !self.send(dst, Mode::Cmd, &buf[..=args.len()], force) {
            return false;
        }
        if wait_reply {
            self.arm_reply(dst, cmd);
        }
        true
    }

    /// Answer the DATA frame being processed, addressed to its source.
    pub fn send_reply(&mut self, payload: &[u8]) -> bool {
        if self.rx.state != RxState::Processing || self.rx.mode != Mode::Data {
            return false;
        }
        let src = self.rx.src;
        self.send(src, Mode::Data, payload, true)
    }

    /// Start waiting for a reply from `dst` to `cmd`.
    pub fn arm_reply(&mut self, dst: u8, cmd: u8) {
        self.request = LastRequest {
            state: ReplyState::Pending,
            busy_time: self.timing.receive_reply_timeout,
            dst: dst & 0x0F,
            cmd,
        };
    }

    /// Drop whatever frame is held and listen again.
    pub fn release(&mut self) {
        self.channel.enable_rx();
        self.rx.state = RxState::Idle;
    }

    pub fn release_if_processing(&mut self) {
        if self.rx.state == RxState::Processing {
            self.release();
        }
    }

    /// Advance the timeouts and the bus-busy debounce by one tick.
    pub fn update(&mut self) -> NodeStatus {
        self.poll_rx();
        let mut status = NodeStatus::Ok;

        if self.rx.state != RxState::Idle {
            self.rx.busy_time = self.rx.busy_time.saturating_sub(1);
            if self.rx.busy_time == 0 {
                debug!(addr = self.addr, state = ?self.rx.state, "frame held too long, releasing channel");
                if self.request.state == ReplyState::Received {
                    self.request.state = ReplyState::None;
                }
                self.release();
                status = NodeStatus::SendTimeout;
            }
        }

        if self.request.state == ReplyState::Pending {
            self.request.busy_time = self.request.busy_time.saturating_sub(1);
            if self.request.busy_time == 0 {
                self.request.state = ReplyState::TimedOut;
                debug!(
                    dst = self.request.dst,
                    cmd = command_name(self.request.cmd),
                    "reply timed out"
                );
                status = NodeStatus::ReceiveTimeout;
            }
        }

        if self.busy_count == 0 {
            self.bus_busy = self.channel.is_busy();
            if self.bus_busy {
                self.channel.clear_busy();
                self.busy_count = self.bus_wait();
            }
        } else {
            self.busy_count -= 1;
        }

        status
    }

    /// Nothing held, nothing awaited, no recent traffic.
    pub fn safe_to_send(&self) -> bool {
        self.rx.state == RxState::Idle
            && !matches!(
                self.request.state,
                ReplyState::Pending | ReplyState::Received
            )
            && !self.bus_busy
    }

    /// Forget all frame and reply state and restart the channel at `default_addr`.
    pub fn reset(&mut self, default_addr: u8) {
        self.addr = default_addr & 0x0F;
        self.channel.disable_rx();
        self.channel.reset(self.addr);
        self.rx = RxFrame::idle();
        self.request = LastRequest::idle();
        self.bus_busy = true;
        self.busy_count = 0;
    }

    pub fn set_addr(&mut self, addr: u8) {
        self.channel.disable_rx();
        self.addr = addr & 0x0F;
        self.channel.set_addr(self.addr);
        self.channel.enable_rx();
    }

    pub fn addr(&self) -> u8 {
        self.addr
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn rx_state(&self) -> RxState {
        self.rx.state
    }

    pub fn reply_state(&self) -> ReplyState {
        self.request.state
    }

    /// Destination of the last request that armed a reply wait.
    pub fn last_dest(&self) -> u8 {
        self.request.dst
    }

    /// Command of the last request that armed a reply wait.
    pub fn last_cmd(&self) -> u8 {
        self.request.cmd
    }

    pub fn bus_busy(&self) -> bool {
        self.bus_busy
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }

    pub fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }

    pub fn channel(&self) -> &C {
        &self.channel
    }

    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    fn poll_rx(&mut self) {
        if self.rx.state == RxState::Idle && self.channel.take_frame_ready() {
            self.rx.state = RxState::Ready;
            self.rx.busy_time = self.timing.send_reply_timeout;
        }
    }

    fn next_byte(&mut self) -> u8 {
        let byte = self.channel.read_byte();
        self.rx.crc = crc16_update(self.rx.crc, byte);
        byte
    }

    fn bus_wait(&mut self) -> u8 {
        match self.role {
            Role::Master => 0,
            Role::Slave => self.rng.gen_range(1..=self.timing.bus_wait_max.max(1)),
        }
    }
}

fn verdict_status(valid: bool) -> ReadStatus {
    if valid {
        ReadStatus::Valid
    } else {
        ReadStatus::Corrupt
    }
}
