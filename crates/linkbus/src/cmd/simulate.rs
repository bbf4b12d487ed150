use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use linkbus_frame::{NodeStatus, Parsed, ReadStatus, TimingConfig, DEFAULT_ADDR, MASTER_ADDR, MAX_PAYLOAD};
use linkbus_node::{LinkState, Master, Slave};
use linkbus_transport::{SimBus, SimPin, SimPort, SimTxEnable};
use serde::Serialize;

use crate::cmd::SimulateArgs;
use crate::exit::{config_error, io_error, json_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};
use crate::store::JsonConfigStore;

type SimSlave = Slave<SimPort, SimTxEnable, SimPin>;

#[derive(Serialize)]
struct RosterEntry {
    addr: u8,
    uid: String,
    in_service: bool,
    ping_errors: u8,
}

#[derive(Serialize)]
struct SlaveEntry {
    index: usize,
    uid: String,
    addr: u8,
    state: String,
}

#[derive(Serialize, Default)]
struct Counters {
    send_timeouts: u32,
    receive_timeouts: u32,
    data_frames: u32,
}

#[derive(Serialize)]
struct SimulationReport {
    ticks: u32,
    interrupted: bool,
    roster: Vec<RosterEntry>,
    slaves: Vec<SlaveEntry>,
    counters: Counters,
}

pub fn run(args: SimulateArgs, format: OutputFormat) -> CliResult<i32> {
    let timing = match &args.timing {
        Some(path) => load_timing(path)?,
        None => TimingConfig::default(),
    };
    let stores = match &args.slave_config {
        Some(path) => JsonConfigStore::load_all(path)?,
        None => generated_stores(&args),
    };

    let bus = SimBus::new();
    let mut master = Master::new(bus.attach(MASTER_ADDR), SimTxEnable::new(), timing.clone());
    let mut slaves = Vec::with_capacity(stores.len());
    for (index, mut store) in stores.into_iter().enumerate() {
        let slave = Slave::new(
            bus.attach(DEFAULT_ADDR),
            SimTxEnable::new(),
            SimPin::new(true),
            &mut store,
            timing.clone(),
        )
        .map_err(|err| config_error(&format!("slave {index} refused to start"), err))?;
        slaves.push(slave);
    }
    tracing::info!(slaves = slaves.len(), ticks = args.ticks, "simulation started");

    if args.drop_bytes > 0 {
        bus.drop_next(args.drop_bytes);
    }

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut counters = Counters::default();
    let mut ticks = 0;
    while ticks < args.ticks && running.load(Ordering::SeqCst) {
        step(&mut master, &mut slaves, &mut counters);
        ticks += 1;
    }

    let report = SimulationReport {
        ticks,
        interrupted: ticks < args.ticks,
        roster: master
            .roster()
            .iter()
            .map(|slot| RosterEntry {
                addr: slot.addr(),
                uid: String::from_utf8_lossy(slot.uid()).into_owned(),
                in_service: slot.in_service(),
                ping_errors: slot.ping_error(),
            })
            .collect(),
        slaves: slaves
            .iter()
            .enumerate()
            .map(|(index, slave)| SlaveEntry {
                index,
                uid: String::from_utf8_lossy(&slave.config().uid).into_owned(),
                addr: slave.addr(),
                state: format!("{:?}", slave.state()),
            })
            .collect(),
        counters,
    };
    tracing::info!(
        ticks = report.ticks,
        enrolled = report.roster.len(),
        "simulation finished"
    );

    print_report(&report, format);
    Ok(SUCCESS)
}

/// One tick of the whole bus: the master, then each slave, parses one frame
/// and ticks. Connected slaves echo unsolicited DATA; so does the master.
fn step(
    master: &mut Master<SimPort, SimTxEnable>,
    slaves: &mut [SimSlave],
    counters: &mut Counters,
) {
    let mut buf = [0u8; MAX_PAYLOAD];

    if let Parsed::Data { len, .. } = master.parse() {
        let len = usize::from(len);
        if master.read(&mut buf[..len]) == ReadStatus::Valid {
            counters.data_frames += 1;
            master.send_reply(&buf[..len]);
        }
    }
    count_status(master.tick(), counters);

    for slave in slaves.iter_mut() {
        if let Parsed::Data { len, .. } = slave.parse() {
            let len = usize::from(len);
            if slave.read(&mut buf[..len]) == ReadStatus::Valid {
                counters.data_frames += 1;
                if slave.state() == LinkState::Connected {
                    slave.send_reply(&buf[..len]);
                }
            }
        }
        count_status(slave.tick(), counters);
    }
}

fn count_status(status: NodeStatus, counters: &mut Counters) {
    match status {
        NodeStatus::Ok => {}
        NodeStatus::SendTimeout => counters.send_timeouts += 1,
        NodeStatus::ReceiveTimeout => counters.receive_timeouts += 1,
    }
}

fn load_timing(path: &Path) -> CliResult<TimingConfig> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| io_error(&format!("cannot read {}", path.display()), err))?;
    serde_json::from_str(&text)
        .map_err(|err| json_error(&format!("invalid timing config {}", path.display()), err))
}

fn generated_stores(args: &SimulateArgs) -> Vec<JsonConfigStore> {
    (0..usize::from(args.slaves))
        .map(|i| JsonConfigStore {
            mode: 2,
            seed: 0x1000 + i as u32,
            uid: args
                .uid
                .get(i)
                .cloned()
                .unwrap_or_else(|| format!("SLAVE-{:02}", i + 1)),
        })
        .collect()
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

fn print_report(report: &SimulationReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(report),
        OutputFormat::Table => {
            print_table(
                vec!["ADDR", "UID", "IN SERVICE", "PING ERRORS"],
                report
                    .roster
                    .iter()
                    .map(|entry| {
                        vec![
                            entry.addr.to_string(),
                            entry.uid.clone(),
                            entry.in_service.to_string(),
                            entry.ping_errors.to_string(),
                        ]
                    })
                    .collect(),
            );
            print_table(
                vec!["SLAVE", "UID", "ADDR", "STATE"],
                report
                    .slaves
                    .iter()
                    .map(|entry| {
                        vec![
                            entry.index.to_string(),
                            entry.uid.clone(),
                            entry.addr.to_string(),
                            entry.state.clone(),
                        ]
                    })
                    .collect(),
            );
        }
        OutputFormat::Pretty => {
            println!(
                "ticks={} interrupted={} enrolled={}",
                report.ticks,
                report.interrupted,
                report.roster.len()
            );
            for entry in &report.slaves {
                println!(
                    "slave={} uid={} addr={} state={}",
                    entry.index, entry.uid, entry.addr, entry.state
                );
            }
        }
    }
}
