//! Master controller.
//!
//! Discovers slaves through the four-step handshake, keeps them alive with
//! round-robin pings and feeds application requests to the bus.
//!
//! ```text
//! slave  ── SIGNAL {ver, nonce} ──────────▶ master   (slave at address 0)
//! master ── FIND {nonce, addr} ───────────▶ 0        step 1
//! slave  ── ACK ──────────────────────────▶ master
//! master ── GET_UID ──────────────────────▶ addr     step 2
//! slave  ── ACK {uid} ────────────────────▶ master   step 3: slot committed
//! master ── PING ─────────────────────────▶ addr
//! slave  ── ACK ──────────────────────────▶ master   step 4: slot in service
//! ```

use linkbus_frame::command::{find_args, ACK, ALERT, FIND, GET_UID, NACK, PING, SIGNAL};
use linkbus_frame::{
    command_name, CommandFrame, FrameEngine, Incoming, NodeStatus, Parsed, ReadStatus,
    ReplyState, RequestQueue, Role, TimingConfig, BROADCAST_ADDR, DEFAULT_ADDR, HSK_VER,
    NONCE_LEN,
};
use linkbus_transport::{ByteChannel, TickSource, TxEnable, UID_SIZE};
use tracing::{debug, info, warn};

use crate::error::{NodeError, Result};
use crate::roster::{DisplayUid, PingOutcome, Roster, SlaveList, Uid};
use crate::tick::Ticker;

/// Where an in-progress handshake stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeStage {
    /// FIND sent, waiting for the slave to take the address.
    AwaitAddrAck,
    /// GET_UID sent.
    AwaitUid,
    /// Slot committed, first PING sent.
    AwaitFirstPing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handshake {
    pub addr: u8,
    pub stage: HandshakeStage,
}

#[derive(Debug)]
pub struct Master<C, T> {
    engine: FrameEngine<C, T>,
    roster: Roster,
    queue: RequestQueue,
    handshake: Option<Handshake>,
    cycles: u8,
    ticker: Ticker,
}

impl<C: ByteChannel, T: TxEnable> Master<C, T> {
    pub fn new(channel: C, tx: T, timing: TimingConfig) -> Self {
        let roster = Roster::new(timing.max_ping_errors);
        let ticker = Ticker::new(timing.tick_ms);
        Self {
            engine: FrameEngine::new(channel, tx, Role::Master, timing, 0),
            roster,
            queue: RequestQueue::new(),
            handshake: None,
            cycles: 0,
            ticker,
        }
    }

    /// Queue `data` for the slave known as `uid`, waiting for its reply.
    pub fn push_request(&mut self, uid: &[u8], data: &[u8]) -> Result<()> {
        let Some(addr) = self.roster.map_uid_to_addr(uid) else {
            let known_as: Uid = uid.iter().take(UID_SIZE).copied().collect();
            return Err(NodeError::UnknownIdentity(known_as));
        };
        self.queue.push(addr, data, true)?;
        Ok(())
    }

    /// Queue `data` for every slave. Nobody replies to a broadcast.
    pub fn push_broadcast(&mut self, data: &[u8]) -> Result<()> {
        self.queue.push(BROADCAST_ADDR, data, false)?;
        Ok(())
    }

    /// Take the next received frame. Protocol commands are handled here;
    /// DATA frames are left for [`read`](Self::read).
    pub fn parse(&mut self) -> Parsed {
        match self.engine.parse() {
            Incoming::NotReady => Parsed::NotReady,
            Incoming::Discarded => Parsed::Command,
            Incoming::Command(cmd) => {
                self.route_command(&cmd);
                self.engine.release_if_processing();
                Parsed::Command
            }
            Incoming::Data { src, len } => Parsed::Data { src, len },
        }
    }

    pub fn read(&mut self, buf: &mut [u8]) -> ReadStatus {
        self.engine.read(buf)
    }

    /// Answer the DATA frame being read.
    pub fn send_reply(&mut self, payload: &[u8]) -> bool {
        self.engine.send_reply(payload)
    }

    /// Run [`tick`](Self::tick) if a tick period has passed on `clock`.
    pub fn keep_alive(&mut self, clock: &impl TickSource) -> Option<NodeStatus> {
        self.ticker.due(clock.millis()).then(|| self.tick())
    }

    /// One protocol tick: timeouts, liveness, then at most one outbound frame.
    pub fn tick(&mut self) -> NodeStatus {
        self.cycles += 1;
        if self.cycles >= self.engine.timing().roster_tick_cycles {
            self.cycles = 0;
            self.roster.ping_tick();
        }

        let status = self.engine.update();
        if status == NodeStatus::ReceiveTimeout {
            self.on_reply_timeout();
        }
        if self.handshake.is_some() && self.engine.reply_state() == ReplyState::None {
            // Some other frame satisfied the reply wait.
            self.abort_handshake();
        }

        if self.engine.safe_to_send() {
            match self.roster.next_ping() {
                Some(addr) => {
                    if self.engine.send_cmd(addr, PING, &[], true, false) {
                        debug!(addr, "ping sent");
                    }
                }
                None => {
                    self.queue.dispatch(&mut self.engine);
                }
            }
        }

        status
    }

    pub fn slave_list(&self) -> SlaveList {
        self.roster.slave_list()
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn handshake(&self) -> Option<Handshake> {
        self.handshake
    }

    pub fn engine(&self) -> &FrameEngine<C, T> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut FrameEngine<C, T> {
        &mut self.engine
    }

    fn route_command(&mut self, cmd: &CommandFrame) {
        if cmd.is_reply && cmd.code != ACK && self.handshake.is_some() {
            debug!(src = cmd.src, cmd = command_name(cmd.code), "handshake reply expected");
            self.abort_handshake();
            return;
        }
        match cmd.code {
            SIGNAL => self.handle_signal(cmd),
            ACK => self.handle_ack(cmd),
            ALERT | NACK => {
                debug!(src = cmd.src, cmd = command_name(cmd.code), "ignored");
            }
            code => debug!(src = cmd.src, cmd = command_name(code), "unexpected command"),
        }
    }

    fn handle_signal(&mut self, cmd: &CommandFrame) {
        if self.handshake.is_some() || self.engine.reply_state() == ReplyState::Pending {
            debug!(src = cmd.src, "busy, SIGNAL ignored");
            return;
        }
        if cmd.args.len() < 1 + NONCE_LEN || cmd.args[0] != HSK_VER {
            debug!(src = cmd.src, "unsupported handshake version");
            return;
        }
        let Some(addr) = self.roster.available() else {
            warn!("roster full, SIGNAL ignored");
            return;
        };

        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(&cmd.args[1..=NONCE_LEN]);
        if self
            .engine
            .send_cmd(DEFAULT_ADDR, FIND, &find_args(&nonce, addr), true, true)
        {
            self.handshake = Some(Handshake {
                addr,
                stage: HandshakeStage::AwaitAddrAck,
            });
            info!(addr, "new slave signalled, offering address");
        }
    }

    fn handle_ack(&mut self, cmd: &CommandFrame) {
        if !cmd.is_reply {
            debug!(src = cmd.src, "unsolicited ACK ignored");
            return;
        }

        let last_cmd = self.engine.last_cmd();
        match (self.handshake, last_cmd) {
            (
                Some(Handshake {
                    addr,
                    stage: HandshakeStage::AwaitAddrAck,
                }),
                FIND,
            ) => self.advance_handshake(addr, GET_UID, HandshakeStage::AwaitUid),
            (
                Some(Handshake {
                    addr,
                    stage: HandshakeStage::AwaitUid,
                }),
                GET_UID,
            ) => self.commit_slave(addr, &cmd.args),
            (
                Some(Handshake {
                    addr,
                    stage: HandshakeStage::AwaitFirstPing,
                }),
                PING,
            ) => {
                self.roster
                    .set_ping_period(addr, self.engine.timing().ping_period);
                self.handshake = None;
                info!(addr, "slave in service");
            }
            (None, PING) => {
                self.roster
                    .set_ping_period(cmd.src, self.engine.timing().ping_period);
                debug!(addr = cmd.src, "ping answered");
            }
            (_, other) => {
                debug!(src = cmd.src, last = command_name(other), "ACK ignored");
                self.abort_handshake();
            }
        }
    }

    fn advance_handshake(&mut self, addr: u8, next: u8, stage: HandshakeStage) {
        if self.engine.send_cmd(addr, next, &[], true, true) {
            self.handshake = Some(Handshake { addr, stage });
        } else {
            self.abort_handshake();
        }
    }

    fn commit_slave(&mut self, addr: u8, uid: &[u8]) {
        if uid.len() > UID_SIZE {
            warn!(addr, len = uid.len(), "identity too long, handshake aborted");
            self.abort_handshake();
            return;
        }

        let synthesized = [b'0' + addr];
        let uid = if uid.is_empty() { &synthesized[..] } else { uid };
        if let Err(err) = self.roster.add(addr, uid) {
            warn!(addr, error = %err, "cannot commit slave, handshake aborted");
            self.abort_handshake();
            return;
        }

        info!(addr, uid = %DisplayUid(uid), "slave joined roster");
        self.advance_handshake(addr, PING, HandshakeStage::AwaitFirstPing);
    }

    fn on_reply_timeout(&mut self) {
        let dst = self.engine.last_dest();
        if self.engine.last_cmd() == PING {
            match self.roster.ping_error(dst) {
                PingOutcome::Retry { errors } => warn!(addr = dst, errors, "ping unanswered"),
                PingOutcome::Evicted => warn!(addr = dst, "slave evicted after missed pings"),
                PingOutcome::Unknown => {}
            }
        }
        if self.handshake.is_some() {
            self.abort_handshake();
        }
    }

    fn abort_handshake(&mut self) {
        if let Some(handshake) = self.handshake.take() {
            warn!(addr = handshake.addr, stage = ?handshake.stage, "handshake aborted");
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use linkbus_frame::command::signal_args;
    use linkbus_frame::{Mode, MASTER_ADDR};
    use linkbus_transport::{SimBus, SimPort, SimTxEnable};

    type Engine = FrameEngine<SimPort, SimTxEnable>;

    struct Rig {
        master: Master<SimPort, SimTxEnable>,
        first: Engine,
        second: Engine,
    }

    fn rig() -> Rig {
        let bus = SimBus::new();
        let master = Master::new(
            bus.attach(MASTER_ADDR),
            SimTxEnable::new(),
            TimingConfig::default(),
        );
        let joiner = |seed| {
            FrameEngine::new(
                bus.attach(DEFAULT_ADDR),
                SimTxEnable::new(),
                Role::Slave,
                TimingConfig::default(),
                seed,
            )
        };
        Rig {
            first: joiner(1),
            second: joiner(2),
            master,
        }
    }

    fn signal(slave: &mut Engine, nonce: u32) {
        assert!(slave.send_cmd(MASTER_ADDR, SIGNAL, &signal_args(nonce), false, true));
    }

    fn offering(addr: u8) -> Option<Handshake> {
        Some(Handshake {
            addr,
            stage: HandshakeStage::AwaitAddrAck,
        })
    }

    #[test]
    fn test_signal_gets_an_address_offer() {
        let mut rig = rig();
        signal(&mut rig.first, 0xA1);

        assert_eq!(rig.master.parse(), Parsed::Command);
        assert_eq!(rig.master.handshake(), offering(1));
        assert_eq!(rig.master.engine().reply_state(), ReplyState::Pending);
        assert_eq!(rig.master.engine().last_cmd(), FIND);
    }

    #[test]
    fn test_second_signal_during_offer_abandons_handshake() {
        let mut rig = rig();
        signal(&mut rig.first, 0xA1);
        assert_eq!(rig.master.parse(), Parsed::Command);
        assert_eq!(rig.master.handshake(), offering(1));

        // Both joiners send from address 0, so this lands as the awaited reply.
        signal(&mut rig.second, 0xB2);
        assert_eq!(rig.master.parse(), Parsed::Command);
        assert_eq!(rig.master.handshake(), None);
        assert!(rig.master.roster().is_empty());

        // The late ACK no longer matches anything.
        assert!(rig.first.send_cmd(MASTER_ADDR, ACK, &[], false, true));
        assert_eq!(rig.master.parse(), Parsed::Command);
        assert_eq!(rig.master.handshake(), None);

        for _ in 0..10 {
            rig.master.tick();
        }
        signal(&mut rig.second, 0xB3);
        assert_eq!(rig.master.parse(), Parsed::Command);
        assert_eq!(rig.master.handshake(), offering(1));
    }

    #[test]
    fn test_data_from_awaited_source_abandons_handshake() {
        let mut rig = rig();
        signal(&mut rig.first, 0xA1);
        assert_eq!(rig.master.parse(), Parsed::Command);

        assert!(rig.second.send(MASTER_ADDR, Mode::Data, b"hi", true));
        assert_eq!(
            rig.master.parse(),
            Parsed::Data {
                src: DEFAULT_ADDR,
                len: 2
            }
        );
        let mut buf = [0u8; 2];
        assert_eq!(rig.master.read(&mut buf), ReadStatus::Valid);
        assert_eq!(rig.master.engine().reply_state(), ReplyState::None);

        rig.master.tick();
        assert_eq!(rig.master.handshake(), None);
    }

    #[test]
    fn test_unknown_identity_error_names_it() {
        let mut rig = rig();
        let err = rig.master.push_request(b"NOBODY", b"x").unwrap_err();
        assert_eq!(err.to_string(), "no slave with identity 'NOBODY'");

        let long = [b'Z'; UID_SIZE + 4];
        match rig.master.push_request(&long, b"x") {
            Err(NodeError::UnknownIdentity(uid)) => assert_eq!(uid.as_slice(), &long[..UID_SIZE]),
            other => panic!("unexpected {other:?}"),
        }
    }
}
