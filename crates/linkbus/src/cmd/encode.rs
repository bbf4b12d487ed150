use linkbus_frame::{encode_frame, Mode};
use serde::Serialize;

use crate::cmd::EncodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::hex;
use crate::output::{mode_name, print_json, print_table, OutputFormat};

#[derive(Serialize)]
struct EncodeOutput {
    mode: &'static str,
    len: usize,
    frame: String,
}

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let payload = hex::parse(&args.payload)?;
    let mode = if args.cmd { Mode::Cmd } else { Mode::Data };

    let mut wire = Vec::new();
    let len = encode_frame(args.src, args.dst, mode, &payload, &mut wire)
        .map_err(|err| frame_error("encode failed", err))?;
    tracing::debug!(src = args.src, dst = args.dst, len, "frame encoded");

    let out = EncodeOutput {
        mode: mode_name(mode),
        len,
        frame: hex::format(&wire),
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_table(
            vec!["MODE", "LEN", "FRAME"],
            vec![vec![out.mode.to_string(), out.len.to_string(), out.frame]],
        ),
        OutputFormat::Pretty => println!("{}", out.frame),
    }
    Ok(SUCCESS)
}
