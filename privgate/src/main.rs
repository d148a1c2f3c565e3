// privgate/src/main.rs
//! Privgate daemon entry point.
//!
//! Loads the filter configuration, opens the policy store and audit trail,
//! assembles the ingestion pipeline, and serves the control API.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use privgate::cli::Cli;
use privgate::logger;
use privgate_core::{AuditStore, FilterConfig, IngestionPipeline, PolicyEngine};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Cli::parse();

    if args.quiet {
        logger::init_logger(Some(log::LevelFilter::Off));
    } else if args.debug {
        logger::init_logger(Some(log::LevelFilter::Debug));
    } else {
        logger::init_logger(None);
    }

    let config = match &args.config {
        Some(path) => FilterConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => FilterConfig::load_default().context("Failed to load embedded config")?,
    };

    let policy = Arc::new(
        PolicyEngine::with_persistence(config.settings.clone(), &args.policy_file)
            .with_context(|| {
                format!("Failed to open policy store at {}", args.policy_file.display())
            })?,
    );
    let audit = Arc::new(AuditStore::open(&args.audit_file).with_context(|| {
        format!("Failed to open audit trail at {}", args.audit_file.display())
    })?);
    let pipeline = Arc::new(
        IngestionPipeline::new(&config, policy, audit)
            .context("Failed to initialize ingestion pipeline")?,
    );

    let router = privgate::build_router(pipeline);
    let listener = tokio::net::TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("Failed to bind {}", args.listen))?;
    info!("Control API listening on {}.", args.listen);

    axum::serve(listener, router)
        .await
        .context("Control API server failed")?;

    Ok(())
}
