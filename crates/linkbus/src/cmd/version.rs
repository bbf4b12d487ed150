use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("linkbus {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: linkbus");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("LINKBUS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("features: node={}, cli=true", cfg!(feature = "node"));
    println!(
        "protocol: handshake v{}, max payload {} bytes, max slaves {}",
        linkbus_frame::HSK_VER,
        linkbus_frame::MAX_PAYLOAD,
        linkbus_node::MAX_SLAVES
    );

    Ok(SUCCESS)
}
