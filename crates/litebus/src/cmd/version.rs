use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("litebus {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: litebus");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!("target: {}", option_env!("LITEBUS_BUILD_TARGET").unwrap_or("unknown"));
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("features: async={}, cli=true", cfg!(feature = "async"));
    println!(
        "framing: eom={} eof={} chunk={} max_buffer={}",
        litebus_frame::EOM,
        litebus_frame::EOF,
        litebus_frame::DEFAULT_CHUNK_SIZE,
        litebus_frame::DEFAULT_MAX_BUFFER
    );

    Ok(SUCCESS)
}
