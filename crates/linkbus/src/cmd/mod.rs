use clap::{Args, Subcommand};
use std::path::PathBuf;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod crc;
pub mod decode;
pub mod encode;
pub mod simulate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a master and slaves on a simulated bus and report the roster.
    Simulate(SimulateArgs),
    /// Build a wire frame.
    Encode(EncodeArgs),
    /// Decode and CRC-check a wire frame.
    Decode(DecodeArgs),
    /// Compute the CRC-16/CCITT-FALSE of some bytes.
    Crc(CrcArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Simulate(args) => simulate::run(args, format),
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Crc(args) => crc::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct SimulateArgs {
    /// Number of slaves on the bus.
    #[arg(long, default_value = "2", value_parser = clap::value_parser!(u8).range(1..=14))]
    pub slaves: u8,
    /// Ticks to run.
    #[arg(long, default_value = "600")]
    pub ticks: u32,
    /// Slave identities, in attach order. Missing ones are generated.
    #[arg(long, value_delimiter = ',', conflicts_with = "slave_config")]
    pub uid: Vec<String>,
    /// JSON file with timing overrides.
    #[arg(long, value_name = "FILE", env = "LINKBUS_TIMING")]
    pub timing: Option<PathBuf>,
    /// JSON array of slave configurations (mode, seed, uid); sets the slave count.
    #[arg(long, value_name = "FILE")]
    pub slave_config: Option<PathBuf>,
    /// Drop the first K bytes put on the bus.
    #[arg(long, value_name = "K", default_value = "0")]
    pub drop_bytes: usize,
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// Source address (0-15).
    #[arg(long)]
    pub src: u8,
    /// Destination address (0-15).
    #[arg(long)]
    pub dst: u8,
    /// Mark the frame as a protocol command.
    #[arg(long)]
    pub cmd: bool,
    /// Payload as hex.
    #[arg(default_value = "")]
    pub payload: String,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Frame as hex, from the ADDR byte to the CRC.
    pub frame: String,
}

#[derive(Args, Debug)]
pub struct CrcArgs {
    /// Bytes as hex.
    pub data: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
