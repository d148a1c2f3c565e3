// privgate/src/lib.rs
//! # Privgate Daemon
//!
//! The daemon wraps the `privgate-core` engine with a command line, a logger,
//! and the HTTP control API used by operators to manage rules, overrides, and
//! the audit trail.

pub mod cli;
pub mod logger;
pub mod server;

pub use server::{build_router, AppState};
