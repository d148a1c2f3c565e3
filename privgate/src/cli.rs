// privgate/src/cli.rs
//! Command-line interface for the privgate daemon.
//! License: MIT OR Apache-2.0

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(
    name = "privgate",
    author = "Privgate Team",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inline privacy gateway for file ingestion",
    long_about = "Privgate sits in a file-ingestion path, attributes each file to an owner, \
                  classifies it to a privacy level, redacts or blocks sensitive content, and \
                  commits an audit record before anything is forwarded. A local HTTP control \
                  API exposes rules, per-path overrides, statistics, and the audit trail."
)]
pub struct Cli {
    /// Address the control API listens on.
    #[arg(
        long,
        short = 'l',
        value_name = "ADDR",
        env = "PRIVGATE_LISTEN",
        default_value = "127.0.0.1:8377",
        help = "Bind address for the HTTP control API."
    )]
    pub listen: SocketAddr,

    /// Path to a custom detector/ownership configuration file (YAML).
    #[arg(
        long = "config",
        value_name = "FILE",
        env = "PRIVGATE_CONFIG",
        help = "Path to a custom filter configuration file (YAML); defaults are embedded."
    )]
    pub config: Option<PathBuf>,

    /// Where privacy rules and overrides are persisted.
    #[arg(
        long = "policy-file",
        value_name = "FILE",
        env = "PRIVGATE_POLICY_FILE",
        default_value = "privgate-policy.yaml",
        help = "YAML file the rule set and manual overrides are persisted to."
    )]
    pub policy_file: PathBuf,

    /// Where the audit trail is written.
    #[arg(
        long = "audit-file",
        value_name = "FILE",
        env = "PRIVGATE_AUDIT_FILE",
        default_value = "privgate-audit.jsonl",
        help = "JSONL file the audit trail is appended to."
    )]
    pub audit_file: PathBuf,

    /// Suppress informational messages.
    #[arg(long, short = 'q', help = "Suppress all informational and debug messages.")]
    pub quiet: bool,

    /// Enable debug logging.
    #[arg(long, short = 'd', help = "Enable debug logging.")]
    pub debug: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_parse() {
        let cli = Cli::parse_from(["privgate"]);
        assert_eq!(cli.listen.port(), 8377);
        assert!(cli.config.is_none());
        assert!(!cli.debug);
    }

    #[test]
    fn test_explicit_flags() {
        let cli = Cli::parse_from([
            "privgate",
            "--listen",
            "0.0.0.0:9000",
            "--config",
            "/etc/privgate/filters.yaml",
            "--debug",
        ]);
        assert_eq!(cli.listen.port(), 9000);
        assert_eq!(cli.config.unwrap(), PathBuf::from("/etc/privgate/filters.yaml"));
        assert!(cli.debug);
    }
}
