//! Slave controller: joins the bus, answers the master and supervises its
//! own link.
//!
//! ```text
//! Disconnected ─present 20 ticks─▶ PluggedIn ─SIGNAL─▶ SignalSent
//!     ▲                                                   │ FIND (nonce ok)
//!     │ lost 10 ticks / handshake 40 ticks / no ping 60 s ▼
//!     └──────────── Connected ◀─PING── UidSent ◀─GET_UID── AddrSet
//! ```

use linkbus_frame::command::{parse_find, signal_args, ACK, FIND, GET_UID, PING, SIGNAL};
use linkbus_frame::{
    command_name, CommandFrame, FrameEngine, Incoming, NodeStatus, Parsed, QueueError, ReadStatus,
    RequestQueue, Role, TimingConfig, DEFAULT_ADDR, MASTER_ADDR,
};
use linkbus_transport::{ByteChannel, ConfigStore, PresenceSense, TickSource, TxEnable};
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::config::SlaveConfig;
use crate::error::ConfigError;
use crate::roster::DisplayUid;
use crate::tick::Ticker;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Disconnected,
    PluggedIn,
    SignalSent,
    AddrSet,
    UidSent,
    Connected,
}

#[derive(Debug, Default)]
struct Counters {
    plug_in: u8,
    disconnect: u8,
    no_config: u8,
    no_ping: u16,
}

#[derive(Debug)]
pub struct Slave<C, T, P> {
    engine: FrameEngine<C, T>,
    presence: P,
    config: SlaveConfig,
    state: LinkState,
    nonce: u32,
    received_ping: bool,
    counters: Counters,
    queue: RequestQueue,
    ticker: Ticker,
}

impl<C: ByteChannel, T: TxEnable, P: PresenceSense> Slave<C, T, P> {
    /// Load the persisted configuration and bring the node up disconnected.
    ///
    /// A configuration error is fatal: there is no slave to run.
    pub fn new(
        channel: C,
        tx: T,
        presence: P,
        store: &mut impl ConfigStore,
        timing: TimingConfig,
    ) -> Result<Self, ConfigError> {
        let config = match SlaveConfig::load(store) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "slave configuration invalid, node halted");
                return Err(err);
            }
        };

        let ticker = Ticker::new(timing.tick_ms);
        let engine = FrameEngine::new(channel, tx, Role::Slave, timing, u64::from(config.seed));
        let mut slave = Self {
            engine,
            presence,
            config,
            state: LinkState::Disconnected,
            nonce: 0,
            received_ping: false,
            counters: Counters::default(),
            queue: RequestQueue::new(),
            ticker,
        };
        slave.set_default();
        Ok(slave)
    }

    /// Queue `data` for the master, waiting for its reply. Sent once connected.
    pub fn push_request(&mut self, data: &[u8]) -> Result<(), QueueError> {
        self.queue.push(MASTER_ADDR, data, true)
    }

    /// Take the next received frame. Protocol commands are answered here;
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

    pub fn send_reply(&mut self, payload: &[u8]) -> bool {
        self.engine.send_reply(payload)
    }

    /// Run [`tick`](Self::tick) if a tick period has passed on `clock`.
    pub fn keep_alive(&mut self, clock: &impl TickSource) -> Option<NodeStatus> {
        self.ticker.due(clock.millis()).then(|| self.tick())
    }

    /// One protocol tick: presence, timeouts, link supervision, then at most
    /// one queued request.
    pub fn tick(&mut self) -> NodeStatus {
        self.check_bus_connection();
        let status = self.engine.update();

        match self.state {
            LinkState::Disconnected => {}
            LinkState::PluggedIn => self.join_bus(),
            LinkState::SignalSent | LinkState::AddrSet | LinkState::UidSent => {
                self.check_handshake()
            }
            LinkState::Connected => self.check_ping(),
        }

        if self.state == LinkState::Connected {
            self.queue.dispatch(&mut self.engine);
        }

        status
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn addr(&self) -> u8 {
        self.engine.addr()
    }

    /// Nonce announced in this node's SIGNAL.
    pub fn nonce(&self) -> u32 {
        self.nonce
    }

    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    pub fn engine(&self) -> &FrameEngine<C, T> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut FrameEngine<C, T> {
        &mut self.engine
    }

    fn set_default(&mut self) {
        self.engine.reset(DEFAULT_ADDR);
        self.nonce = self.engine.rng().next_u32();
        self.state = LinkState::Disconnected;
        self.received_ping = false;
        self.counters = Counters::default();
        debug!(nonce = self.nonce, "link reset");
    }

    fn check_bus_connection(&mut self) {
        let timing = self.engine.timing();
        let (plug_in_ticks, disconnect_ticks) = (timing.plug_in_ticks, timing.disconnect_ticks);

        if self.presence.is_present() {
            self.counters.disconnect = 0;
            if self.state == LinkState::Disconnected {
                self.counters.plug_in += 1;
                if self.counters.plug_in >= plug_in_ticks {
                    self.counters.plug_in = 0;
                    self.state = LinkState::PluggedIn;
                    info!("bus detected");
                }
            }
        } else {
            self.counters.plug_in = 0;
            if self.state != LinkState::Disconnected {
                self.counters.disconnect += 1;
                if self.counters.disconnect >= disconnect_ticks {
                    warn!(addr = self.addr(), state = ?self.state, "bus lost");
                    self.set_default();
                }
            }
        }
    }

    fn join_bus(&mut self) {
        if self.engine.safe_to_send()
            && self
                .engine
                .send_cmd(MASTER_ADDR, SIGNAL, &signal_args(self.nonce), false, false)
        {
            self.state = LinkState::SignalSent;
            debug!(nonce = self.nonce, "SIGNAL sent");
        }
    }

    fn check_handshake(&mut self) {
        self.counters.no_config += 1;
        if self.counters.no_config >= self.engine.timing().no_config_ticks {
            warn!(state = ?self.state, "handshake stalled");
            self.set_default();
        }
    }

    fn check_ping(&mut self) {
        if self.received_ping {
            self.received_ping = false;
            self.counters.no_ping = 0;
            return;
        }
        self.counters.no_ping += 1;
        if self.counters.no_ping >= self.engine.timing().no_ping_ticks {
            warn!(addr = self.addr(), "master silent, leaving bus");
            self.set_default();
        }
    }

    fn route_command(&mut self, cmd: &CommandFrame) {
        match cmd.code {
            FIND => self.handle_find(cmd),
            GET_UID => {
                if self.state == LinkState::AddrSet {
                    self.state = LinkState::UidSent;
                }
                let uid = self.config.uid.clone();
                self.engine.send_cmd(MASTER_ADDR, ACK, &uid, false, true);
                debug!(uid = %DisplayUid(&uid), "identity sent");
            }
            PING => {
                if self.state == LinkState::UidSent {
                    self.state = LinkState::Connected;
                    info!(addr = self.addr(), "connected");
                }
                self.engine.send_cmd(MASTER_ADDR, ACK, &[], false, true);
                self.received_ping = true;
            }
            code => debug!(src = cmd.src, cmd = command_name(code), "ignored"),
        }
    }

    fn handle_find(&mut self, cmd: &CommandFrame) {
        if self.state != LinkState::SignalSent {
            return;
        }
        let Some((nonce, addr)) = parse_find(&cmd.args) else {
            return;
        };
        if nonce != self.nonce {
            debug!(nonce, "FIND for another slave");
            return;
        }
        if addr == DEFAULT_ADDR || addr >= MASTER_ADDR {
            warn!(addr, "offered address unusable");
            return;
        }

        // Acknowledge from the default address, then move.
        self.engine.send_cmd(MASTER_ADDR, ACK, &[], false, true);
        self.engine.set_addr(addr);
        self.state = LinkState::AddrSet;
        info!(addr, "address assigned");
    }
}
