//! Logging bootstrap for the `acc` binary.
//!
//! `RUST_LOG` takes precedence when set. Otherwise the level follows the
//! command-line flags: `-q` shows errors only, no flag shows warnings, and
//! each `-v` adds one level (info, debug, trace).

use std::env;
use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Installs the global logger. Call once, before anything logs.
pub fn init_logging(verbose: u8, quiet: bool) {
    let mut builder = Builder::new();
    if env::var_os("RUST_LOG").is_some() {
        builder.parse_default_env();
    } else {
        builder.filter_level(determine_level(verbose, quiet));
    }
    builder.format(|buf, record| {
        writeln!(buf, "[{}] {}", record.level().as_str().to_lowercase(), record.args())
    });
    // a second init (tests) keeps the first logger
    let _ = builder.try_init();
}

fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}
