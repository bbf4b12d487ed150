use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use linkbus_frame::{command_name, Frame, Mode};
use serde::Serialize;

use crate::hex;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

/// Print `value` as one JSON line.
pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Print a header row and data rows in the table preset every command shares.
pub fn print_table(header: Vec<&str>, rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}

#[derive(Serialize)]
struct FrameOutput<'a> {
    src: u8,
    dst: u8,
    mode: &'a str,
    command: Option<&'a str>,
    payload_size: usize,
    payload: String,
    broadcast: bool,
}

pub fn print_frame(frame: &Frame, format: OutputFormat) {
    let command = match frame.mode {
        Mode::Cmd => frame.payload.first().map(|&code| command_name(code)),
        Mode::Data => None,
    };
    let out = FrameOutput {
        src: frame.src,
        dst: frame.dst,
        mode: mode_name(frame.mode),
        command,
        payload_size: frame.payload.len(),
        payload: hex::format(&frame.payload),
        broadcast: frame.is_broadcast(),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            vec!["SRC", "DST", "MODE", "COMMAND", "SIZE", "PAYLOAD"],
            vec![vec![
                format!("{:#04x}", out.src),
                format!("{:#04x}", out.dst),
                out.mode.to_string(),
                out.command.unwrap_or("-").to_string(),
                out.payload_size.to_string(),
                out.payload.clone(),
            ]],
        ),
        OutputFormat::Pretty => println!(
            "src={:#04x} dst={:#04x} mode={} command={} size={} payload={}",
            out.src,
            out.dst,
            out.mode,
            out.command.unwrap_or("-"),
            out.payload_size,
            out.payload
        ),
    }
}

pub fn mode_name(mode: Mode) -> &'static str {
    match mode {
        Mode::Data => "DATA",
        Mode::Cmd => "CMD",
    }
}
