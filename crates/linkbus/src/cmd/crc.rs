use linkbus_frame::crc16;
use serde::Serialize;

use crate::cmd::CrcArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::hex;
use crate::output::{print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct CrcOutput {
    len: usize,
    crc: String,
}

pub fn run(args: CrcArgs, format: OutputFormat) -> CliResult<i32> {
    let data = hex::parse(&args.data)?;
    let out = CrcOutput {
        len: data.len(),
        crc: format!("{:#06x}", crc16(&data)),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(vec!["LEN", "CRC"], vec![vec![out.len.to_string(), out.crc]]),
        OutputFormat::Pretty => println!("{}", out.crc),
    }
    Ok(SUCCESS)
}
