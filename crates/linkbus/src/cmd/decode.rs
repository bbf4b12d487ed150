use linkbus_frame::decode_frame;

use crate::cmd::DecodeArgs;
use crate::exit::{frame_error, CliResult, SUCCESS};
use crate::hex;
use crate::output::{print_frame, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let wire = hex::parse(&args.frame)?;
    let frame = decode_frame(&wire).map_err(|err| frame_error("decode failed", err))?;
    print_frame(&frame, format);
    Ok(SUCCESS)
}
