#![allow(dead_code)]

use linkbus_frame::{Parsed, ReadStatus, TimingConfig, DEFAULT_ADDR, MASTER_ADDR, MAX_PAYLOAD};
use linkbus_node::{LinkState, Master, Slave};
use linkbus_transport::{MemoryConfigStore, SimBus, SimPin, SimPort, SimTxEnable};

pub type SimMaster = Master<SimPort, SimTxEnable>;
pub type SimSlave = Slave<SimPort, SimTxEnable, SimPin>;

pub struct Node {
    pub slave: SimSlave,
    pub pin: SimPin,
    /// Valid DATA payloads this slave has read.
    pub inbox: Vec<Vec<u8>>,
    /// Stepped by [`Network::step`] while set.
    pub powered: bool,
}

/// One master and any number of slaves on a simulated bus, stepped in lock
/// step: the master parses and ticks, then each slave does the same.
///
/// Unsolicited DATA is echoed back by whoever reads it.
pub struct Network {
    pub bus: SimBus,
    pub master: SimMaster,
    pub master_inbox: Vec<(u8, Vec<u8>)>,
    pub master_powered: bool,
    pub nodes: Vec<Node>,
    timing: TimingConfig,
}

impl Network {
    pub fn new(timing: TimingConfig) -> Self {
        let bus = SimBus::new();
        let master = Master::new(bus.attach(MASTER_ADDR), SimTxEnable::new(), timing.clone());
        Self {
            bus,
            master,
            master_inbox: Vec::new(),
            master_powered: true,
            nodes: Vec::new(),
            timing,
        }
    }

    /// Attach a present slave with identity `uid` (mode 2), or no identity
    /// (mode 1) when `uid` is empty.
    pub fn add_slave(&mut self, uid: &[u8], seed: u32) -> usize {
        let mode = if uid.is_empty() { 1 } else { 2 };
        let mut store = MemoryConfigStore::with_uid(mode, seed, uid);
        let pin = SimPin::new(true);
        let slave = Slave::new(
            self.bus.attach(DEFAULT_ADDR),
            SimTxEnable::new(),
            pin.clone(),
            &mut store,
            self.timing.clone(),
        )
        .expect("valid slave configuration");
        self.nodes.push(Node {
            slave,
            pin,
            inbox: Vec::new(),
            powered: true,
        });
        self.nodes.len() - 1
    }

    pub fn step(&mut self) {
        let mut buf = [0u8; MAX_PAYLOAD];

        if self.master_powered {
            if let Parsed::Data { src, len } = self.master.parse() {
                let len = usize::from(len);
                if self.master.read(&mut buf[..len]) == ReadStatus::Valid {
                    self.master_inbox.push((src, buf[..len].to_vec()));
                    self.master.send_reply(&buf[..len]);
                }
            }
            self.master.tick();
        }

        for node in self.nodes.iter_mut().filter(|node| node.powered) {
            if let Parsed::Data { len, .. } = node.slave.parse() {
                let len = usize::from(len);
                if node.slave.read(&mut buf[..len]) == ReadStatus::Valid {
                    node.inbox.push(buf[..len].to_vec());
                    if node.slave.state() == LinkState::Connected {
                        node.slave.send_reply(&buf[..len]);
                    }
                }
            }
            node.slave.tick();
        }
    }

    pub fn run(&mut self, steps: usize) {
        for _ in 0..steps {
            self.step();
        }
    }

    /// Step until `done` holds, failing the test after `limit` steps.
    pub fn run_until(&mut self, limit: usize, mut done: impl FnMut(&Self) -> bool) -> usize {
        for step in 0..limit {
            if done(self) {
                return step;
            }
            self.step();
        }
        panic!("condition not reached within {limit} steps");
    }

    /// Step until every powered slave is connected and the master is idle.
    pub fn connect_all(&mut self) -> usize {
        self.run_until(5_000, |net| {
            net.master.handshake().is_none()
                && net
                    .nodes
                    .iter()
                    .filter(|node| node.powered)
                    .all(|node| node.slave.state() == LinkState::Connected)
        })
    }
}
