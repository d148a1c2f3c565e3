//! # privgate-core
//!
//! The classification and redaction engine behind `privgate`.
//!
//! Every file crossing the gateway is attributed to an owner, classified to a
//! privacy level, transformed accordingly, and audited, in that order. The
//! engine guarantees:
//!
//! - **Fail closed.** An internal transform error blocks the file rather than
//!   letting it through unfiltered.
//! - **Audit before forward.** A file's transformed content is only returned
//!   after its audit record is durably committed; if the audit store is
//!   unavailable, processing fails and nothing is forwarded.
//! - **Idempotent transforms.** Running any level's transform over its own
//!   output changes nothing.
//! - **Monotonic levels.** A higher level never redacts less than a lower one,
//!   and detection-driven escalation only ever raises a level.
//!
//! The typical embedding:
//!
//! ```no_run
//! use std::sync::Arc;
//! use privgate_core::{
//!     AuditStore, FileMetadata, FilterConfig, IngestionPipeline, PolicyEngine,
//! };
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = FilterConfig::load_default()?;
//! let policy = Arc::new(PolicyEngine::with_persistence(
//!     config.settings.clone(),
//!     "policy.yaml",
//! )?);
//! let audit = Arc::new(AuditStore::open("audit.jsonl")?);
//! let pipeline = IngestionPipeline::new(&config, policy, audit)?;
//!
//! let result = pipeline.process(
//!     "/home/alice/mail_export.txt",
//!     &FileMetadata::default(),
//!     b"reach me at alice@example.com",
//! )?;
//! println!("{}: {}", result.level, result.action);
//! # Ok(())
//! # }
//! ```
//!
//! License: MIT OR Apache-2.0

pub mod audit;
pub mod compiler;
pub mod config;
pub mod detect;
pub mod detection;
pub mod errors;
pub mod levels;
pub mod ownership;
pub mod pipeline;
pub mod policy;
pub mod redact;
pub mod validators;

pub use audit::{AuditDraft, AuditFilter, AuditRecord, AuditStore};
pub use config::{DetectorRule, EngineSettings, FilterConfig, OwnershipRule, SensitivePathRule};
pub use detect::PatternLibrary;
pub use detection::{content_hash, CategoryCount, DetectionHit, PatternCategory};
pub use errors::PrivacyError;
pub use levels::{Action, OwnerIdentity, PrivacyLevel};
pub use ownership::OwnershipResolver;
pub use pipeline::{FileMetadata, IngestionPipeline, ProcessingResult, StatsSnapshot};
pub use policy::{LevelSource, PathClassifier, PolicyEngine, PrivacyRule, ResolvedPolicy};
pub use redact::{
    transform, transform_with_limit, Redaction, BLOCKED_SENTINEL, DEFAULT_MAX_RESTRICTED_LEN,
    TRUNCATION_MARKER,
};
