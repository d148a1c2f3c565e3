// privgate/src/logger.rs
//! Logger initialization for the daemon.
//!
//! Respects `RUST_LOG` unless an explicit level is forced by `--quiet` or
//! `--debug`. Safe to call more than once; later calls are no-ops.
//!
//! License: MIT OR Apache-2.0

use std::io::Write;

use env_logger::Builder;
use log::LevelFilter;

/// Initializes the global logger.
///
/// `level` overrides `RUST_LOG` when set; otherwise the environment decides,
/// defaulting to `info`.
pub fn init_logger(level: Option<LevelFilter>) {
    let mut builder = Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(level) = level {
        builder.filter_level(level);
    }
    builder
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                record.level(),
                record.target(),
                record.args()
            )
        })
        .try_init()
        .ok();
}
