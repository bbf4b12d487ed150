mod common;

use common::Network;
use linkbus_frame::{TimingConfig, DEFAULT_ADDR};
use linkbus_node::{ConfigError, HandshakeStage, LinkState, Slave, MAX_SLAVES};
use linkbus_transport::{MemoryConfigStore, SimBus, SimPin, SimTxEnable};

#[test]
fn test_single_slave_joins_at_first_address() {
    let mut net = Network::new(TimingConfig::default());
    net.add_slave(b"ABC123456789", 0x1234);

    net.connect_all();

    assert_eq!(net.nodes[0].slave.addr(), 1);
    let list = net.master.slave_list();
    assert_eq!(list.count(), 1);
    assert_eq!(list.uids[0].as_slice(), b"ABC123456789");

    let slot = net.master.roster().slot(1).unwrap();
    assert!(slot.in_service());
    assert_eq!(slot.ping_error(), 0);
}

#[test]
fn test_handshake_completes_quickly_on_a_quiet_bus() {
    let mut net = Network::new(TimingConfig::default());
    net.add_slave(b"QUIET", 7);

    // 20 ticks of presence, then four request/answer exchanges.
    let steps = net.connect_all();
    assert!(steps <= 30, "took {steps} steps");
}

#[test]
fn test_several_slaves_get_distinct_addresses() {
    let mut net = Network::new(TimingConfig::default());
    net.add_slave(b"METER-A", 11);
    net.add_slave(b"METER-B", 22);
    net.add_slave(b"METER-C", 33);

    net.connect_all();

    let mut addrs: Vec<u8> = net.nodes.iter().map(|node| node.slave.addr()).collect();
    addrs.sort_unstable();
    assert_eq!(addrs, vec![1, 2, 3]);

    for node in &net.nodes {
        let addr = net
            .master
            .roster()
            .map_uid_to_addr(node.slave.config().uid.as_slice());
        assert_eq!(addr, Some(node.slave.addr()));
    }
}

#[test]
fn test_slave_without_identity_is_named_after_its_address() {
    let mut net = Network::new(TimingConfig::default());
    net.add_slave(b"", 99);

    net.connect_all();

    assert_eq!(net.master.roster().map_uid_to_addr(b"1"), Some(1));
    assert_eq!(net.master.slave_list().uids[0].as_slice(), b"1");
}

#[test]
fn test_roster_fills_up_to_five_slaves() {
    let mut net = Network::new(TimingConfig::default());
    for i in 0..=MAX_SLAVES {
        let uid = format!("NODE{i}");
        net.add_slave(uid.as_bytes(), 100 + i as u32);
    }

    net.run_until(20_000, |net| net.master.roster().len() == MAX_SLAVES);
    net.run(400);

    assert_eq!(net.master.roster().len(), MAX_SLAVES);
    assert_eq!(net.master.roster().available(), None);
    let stranded = net
        .nodes
        .iter()
        .filter(|node| node.slave.state() != LinkState::Connected)
        .count();
    assert_eq!(stranded, 1);
}

/// Power the slave off as soon as it reaches `state`, then let the master
/// take one more step.
fn silence_after(state: LinkState) -> Network {
    let mut net = Network::new(TimingConfig::default());
    net.add_slave(b"SHY", 5);
    net.run_until(200, |net| net.nodes[0].slave.state() == state);
    net.nodes[0].powered = false;
    net.step();
    net
}

fn stage(net: &Network) -> Option<HandshakeStage> {
    net.master.handshake().map(|handshake| handshake.stage)
}

#[test]
fn test_unanswered_address_offer_leaves_no_trace() {
    let mut net = silence_after(LinkState::SignalSent);
    assert_eq!(stage(&net), Some(HandshakeStage::AwaitAddrAck));

    net.run(10);
    assert_eq!(net.master.handshake(), None);
    assert!(net.master.roster().is_empty());
}

#[test]
fn test_unanswered_identity_request_leaves_no_trace() {
    let mut net = silence_after(LinkState::AddrSet);
    assert_eq!(stage(&net), Some(HandshakeStage::AwaitUid));
    assert!(net.master.roster().is_empty());

    net.run(10);
    assert_eq!(net.master.handshake(), None);
    assert!(net.master.roster().is_empty());
    assert_eq!(net.master.roster().available(), Some(1));
}

#[test]
fn test_unanswered_first_ping_counts_against_committed_slot() {
    let mut net = silence_after(LinkState::UidSent);
    assert_eq!(stage(&net), Some(HandshakeStage::AwaitFirstPing));
    assert!(!net.master.roster().slot(1).unwrap().in_service());

    net.run(10);
    assert_eq!(net.master.handshake(), None);
    let slot = net.master.roster().slot(1).unwrap();
    assert_eq!(slot.uid(), b"SHY");
    assert_eq!(slot.ping_error(), 1);
    assert!(!slot.in_service());
}

#[test]
fn test_unplugged_slave_resets_and_is_evicted() {
    let mut net = Network::new(TimingConfig::default());
    net.add_slave(b"UNPLUG", 5);
    net.connect_all();

    net.nodes[0].pin.set(false);
    net.run(10);
    assert_eq!(net.nodes[0].slave.state(), LinkState::Disconnected);
    assert_eq!(net.nodes[0].slave.addr(), DEFAULT_ADDR);

    net.run_until(1_000, |net| net.master.roster().is_empty());
    assert_eq!(net.master.slave_list().count(), 0);
}

#[test]
fn test_silent_slave_is_evicted_after_missed_pings() {
    let mut net = Network::new(TimingConfig::default());
    net.add_slave(b"GONE", 5);
    net.connect_all();

    net.nodes[0].powered = false;
    net.run(50);
    assert_eq!(net.master.roster().len(), 1);

    net.run_until(1_000, |net| net.master.roster().is_empty());
}

#[test]
fn test_answered_pings_keep_slave_in_service() {
    let mut net = Network::new(TimingConfig::default());
    net.add_slave(b"ALIVE", 5);
    net.connect_all();

    // Several ping periods.
    net.run(1_000);

    assert_eq!(net.nodes[0].slave.state(), LinkState::Connected);
    let slot = net.master.roster().slot(1).unwrap();
    assert!(slot.in_service());
    assert_eq!(slot.ping_error(), 0);
}

#[test]
fn test_unpinged_slave_leaves_the_bus() {
    let timing = TimingConfig {
        no_ping_ticks: 30,
        ..TimingConfig::default()
    };
    let mut net = Network::new(timing);
    net.add_slave(b"LONELY", 5);
    net.connect_all();
    let nonce = net.nodes[0].slave.nonce();

    net.master_powered = false;
    net.run(28);
    assert_eq!(net.nodes[0].slave.state(), LinkState::Connected);

    net.run(2);
    assert_eq!(net.nodes[0].slave.state(), LinkState::Disconnected);
    assert_eq!(net.nodes[0].slave.addr(), DEFAULT_ADDR);
    assert_ne!(net.nodes[0].slave.nonce(), nonce);
}

#[test]
fn test_slave_rejoins_after_reset() {
    let mut net = Network::new(TimingConfig::default());
    net.add_slave(b"BOUNCE", 5);
    net.connect_all();

    net.nodes[0].pin.set(false);
    net.run_until(1_000, |net| net.master.roster().is_empty());
    net.nodes[0].pin.set(true);

    net.connect_all();
    assert_eq!(net.master.roster().map_uid_to_addr(b"BOUNCE"), Some(1));
}

#[test]
fn test_unconfigured_slave_never_starts() {
    let bus = SimBus::new();
    for (mode, seed, uid, want_seed_error) in [
        (0u8, 5u32, &b"A"[..], false),
        (1, 0, &b""[..], true),
        (2, 5, &b""[..], false),
    ] {
        let mut store = MemoryConfigStore::with_uid(mode, seed, uid);
        let result = Slave::new(
            bus.attach(DEFAULT_ADDR),
            SimTxEnable::new(),
            SimPin::new(true),
            &mut store,
            TimingConfig::default(),
        );
        match result {
            Err(ConfigError::Seed) => assert!(want_seed_error),
            Err(ConfigError::Mode(_) | ConfigError::Uid) => assert!(!want_seed_error),
            other => panic!("mode {mode} started: {:?}", other.map(|s| s.state())),
        }
    }
}
