//! pipeline.rs - The ingestion pipeline: classify, transform, audit, count.
//!
//! `process` is the single entry point for a file flowing through the engine.
//! Ordering is fixed: the audit record is committed before the result is
//! returned, so content is never forwarded unaudited; if the audit store is
//! unavailable the whole call fails and the caller retries later. An internal
//! transform error fails closed: the file is blocked, and the audit record
//! carries a failure flag.
//!
//! License: MIT OR Apache-2.0

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{debug, error, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditDraft, AuditStore};
use crate::config::FilterConfig;
use crate::detect::PatternLibrary;
use crate::detection::{content_hash, DetectionHit};
use crate::errors::PrivacyError;
use crate::levels::{Action, OwnerIdentity, PrivacyLevel};
use crate::ownership::OwnershipResolver;
use crate::policy::{PathClassifier, PolicyEngine};
use crate::redact::{self, BLOCKED_SENTINEL};

/// Ingest-time metadata accompanying a file's content.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FileMetadata {
    /// Identity hint from the transport (e.g., share credentials); wins over
    /// path-based ownership when it names a known identity.
    pub owner_hint: Option<String>,
    pub size: Option<u64>,
    pub modified_at: Option<DateTime<Utc>>,
}

/// The outcome of processing one file.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    /// Id of the audit record committed for this file.
    pub audit_id: u64,
    pub owner: OwnerIdentity,
    /// Effective level after escalation (and fail-closed blocking).
    pub level: PrivacyLevel,
    pub action: Action,
    /// The content as it may be forwarded.
    pub transformed: Vec<u8>,
    /// Number of sensitive spans detected (not necessarily replaced).
    pub detections: usize,
}

/// Point-in-time view of pipeline counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub files_processed: u64,
    pub by_level: BTreeMap<String, u64>,
    pub by_action: BTreeMap<String, u64>,
    pub detections: u64,
    pub failures: u64,
}

/// Lock-free counters, updated once per successfully audited file.
#[derive(Debug, Default)]
struct PipelineStats {
    files_processed: AtomicU64,
    by_level: [AtomicU64; 5],
    by_action: [AtomicU64; 3],
    detections: AtomicU64,
    failures: AtomicU64,
}

impl PipelineStats {
    fn record(&self, level: PrivacyLevel, action: Action, detections: usize, failure: bool) {
        self.files_processed.fetch_add(1, Ordering::Relaxed);
        self.by_level[level.index()].fetch_add(1, Ordering::Relaxed);
        self.by_action[action.index()].fetch_add(1, Ordering::Relaxed);
        self.detections.fetch_add(detections as u64, Ordering::Relaxed);
        if failure {
            self.failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            files_processed: self.files_processed.load(Ordering::Relaxed),
            by_level: PrivacyLevel::ALL
                .iter()
                .map(|l| (l.as_str().to_string(), self.by_level[l.index()].load(Ordering::Relaxed)))
                .collect(),
            by_action: Action::ALL
                .iter()
                .map(|a| (a.as_str().to_string(), self.by_action[a.index()].load(Ordering::Relaxed)))
                .collect(),
            detections: self.detections.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }
}

/// The assembled engine: detection, ownership, policy, redaction, audit.
///
/// `process` takes `&self` and every component is internally synchronized, so
/// one pipeline can be shared across threads behind an `Arc`.
pub struct IngestionPipeline {
    library: PatternLibrary,
    ownership: OwnershipResolver,
    sensitive_paths: PathClassifier,
    policy: Arc<PolicyEngine>,
    audit: Arc<AuditStore>,
    stats: PipelineStats,
    run_id: Uuid,
    max_restricted_len: usize,
}

impl IngestionPipeline {
    pub fn new(
        config: &FilterConfig,
        policy: Arc<PolicyEngine>,
        audit: Arc<AuditStore>,
    ) -> Result<Self, PrivacyError> {
        let library = PatternLibrary::from_config(config)?;
        let run_id = Uuid::new_v4();
        info!("Ingestion pipeline initialized (run {run_id}).");
        Ok(Self {
            library,
            ownership: OwnershipResolver::from_rules(&config.ownership),
            sensitive_paths: PathClassifier::from_rules(&config.sensitive_paths)?,
            policy,
            audit,
            stats: PipelineStats::default(),
            run_id,
            max_restricted_len: config.settings.max_restricted_len,
        })
    }

    /// Identifier of this pipeline run, stamped on every audit record.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn policy(&self) -> &Arc<PolicyEngine> {
        &self.policy
    }

    pub fn audit(&self) -> &Arc<AuditStore> {
        &self.audit
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Classifies, transforms, and audits one file.
    ///
    /// Returns `StorageUnavailable` without forwarding anything when the
    /// audit record cannot be committed; counters are only updated for
    /// audited files.
    pub fn process(
        &self,
        path: &str,
        metadata: &FileMetadata,
        content: &[u8],
    ) -> Result<ProcessingResult, PrivacyError> {
        let owner = self.ownership.resolve(path, metadata.owner_hint.as_deref());
        let hits = self.library.detect(content);
        let resolved = self.policy.resolve(path, owner);

        let mut escalated = resolved.level;
        if let Some(floor) = self.sensitive_paths.floor(path) {
            escalated = escalated.max(floor);
        }
        escalated = escalate(escalated, &hits);
        if escalated > resolved.level {
            debug!(
                "Escalated {path} from {} to {escalated} (sensitive type or {} detections).",
                resolved.level,
                hits.len()
            );
        }

        let (level, output, action, failure) =
            match redact::transform_with_limit(content, escalated, &hits, self.max_restricted_len) {
                Ok(redaction) => {
                    let action = if escalated == PrivacyLevel::Blocked {
                        Action::Blocked
                    } else if redaction.output != content {
                        Action::Redacted
                    } else {
                        Action::Passed
                    };
                    (escalated, redaction.output, action, false)
                }
                Err(e) => {
                    error!("Transform failed for {path}; blocking content: {e}");
                    (
                        PrivacyLevel::Blocked,
                        BLOCKED_SENTINEL.as_bytes().to_vec(),
                        Action::Blocked,
                        true,
                    )
                }
            };

        let record = self.audit.append(AuditDraft {
            run_id: self.run_id,
            file_path: path.to_string(),
            owner,
            resolved_level: level,
            action,
            hits: hits.clone(),
            failure,
            content_hash_before: content_hash(content),
            content_hash_after: content_hash(&output),
        })?;

        self.stats.record(level, action, hits.len(), failure);
        debug!(
            "Processed {path}: owner={owner} level={level} action={action} audit_id={}.",
            record.id
        );

        Ok(ProcessingResult {
            audit_id: record.id,
            owner,
            level,
            action,
            transformed: output,
            detections: hits.len(),
        })
    }
}

/// Raises `base` to the highest escalation floor among the detected
/// categories. Never lowers.
fn escalate(base: PrivacyLevel, hits: &[DetectionHit]) -> PrivacyLevel {
    hits.iter()
        .map(|h| h.category.escalation_floor())
        .fold(base, PrivacyLevel::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::AuditFilter;
    use crate::config::EngineSettings;

    fn pipeline(dir: &tempfile::TempDir) -> IngestionPipeline {
        let config = FilterConfig::load_default().unwrap();
        let policy = Arc::new(PolicyEngine::new(config.settings.clone()));
        let audit = Arc::new(AuditStore::open(dir.path().join("audit.jsonl")).unwrap());
        IngestionPipeline::new(&config, policy, audit).unwrap()
    }

    #[test]
    fn test_clean_shared_file_passes() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir);
        let content = b"quarterly numbers look fine";
        let r = p
            .process("/shared/report.txt", &FileMetadata::default(), content)
            .unwrap();
        assert_eq!(r.owner, OwnerIdentity::Shared);
        assert_eq!(r.level, PrivacyLevel::Public);
        assert_eq!(r.action, Action::Passed);
        assert_eq!(r.transformed, content);
    }

    #[test]
    fn test_escalation_raises_owner_default() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir);
        // Bob defaults to Public, but an SSN escalates to Restricted.
        let r = p
            .process(
                "/home/bob/notes.txt",
                &FileMetadata::default(),
                b"my ssn is 123-45-6789",
            )
            .unwrap();
        assert_eq!(r.owner, OwnerIdentity::Bob);
        assert_eq!(r.level, PrivacyLevel::Restricted);
        assert_eq!(r.action, Action::Redacted);
        let text = String::from_utf8(r.transformed).unwrap();
        assert!(text.contains("[SSN_REDACTED]"));
    }

    #[test]
    fn test_exactly_one_audit_record_per_call() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir);
        p.process("/shared/a.txt", &FileMetadata::default(), b"one").unwrap();
        p.process("/shared/b.txt", &FileMetadata::default(), b"two").unwrap();
        let records = p.audit().query(&AuditFilter::default()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].run_id, p.run_id());
    }

    #[test]
    fn test_storage_unavailable_blocks_forwarding_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir);
        p.audit().set_offline(true);
        let err = p
            .process("/shared/a.txt", &FileMetadata::default(), b"data")
            .unwrap_err();
        assert!(matches!(err, PrivacyError::StorageUnavailable(_)));
        assert_eq!(p.stats().files_processed, 0);

        p.audit().set_offline(false);
        let r = p
            .process("/shared/a.txt", &FileMetadata::default(), b"data")
            .unwrap();
        assert_eq!(r.audit_id, 1);
        assert_eq!(p.stats().files_processed, 1);
    }

    #[test]
    fn test_blocked_rule_yields_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir);
        p.policy().add_rule("**/*.key", PrivacyLevel::Blocked, 100).unwrap();
        let r = p
            .process("/home/alice/server.key", &FileMetadata::default(), b"secret bytes")
            .unwrap();
        assert_eq!(r.action, Action::Blocked);
        assert_eq!(r.transformed, BLOCKED_SENTINEL.as_bytes());
    }

    #[test]
    fn test_owner_hint_beats_path() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir);
        let meta = FileMetadata { owner_hint: Some("alice".to_string()), ..Default::default() };
        let r = p.process("/shared/x.txt", &meta, b"nothing sensitive").unwrap();
        assert_eq!(r.owner, OwnerIdentity::Alice);
        // Alice defaults to Private.
        assert_eq!(r.level, PrivacyLevel::Private);
    }

    #[test]
    fn test_sensitive_file_types_are_floored_by_path() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir);

        // Key material is Restricted no matter whose it is or what it holds.
        let long = "-- placeholder certificate text --\n".repeat(30);
        let r = p
            .process("/home/bob/server.pem", &FileMetadata::default(), long.as_bytes())
            .unwrap();
        assert_eq!(r.level, PrivacyLevel::Restricted);
        assert_eq!(r.action, Action::Redacted);
        assert!(r.transformed.len() <= redact::DEFAULT_MAX_RESTRICTED_LEN);

        // Browser artifacts are at least Private.
        let r = p
            .process(
                "/home/bob/.mozilla/places.sqlite",
                &FileMetadata::default(),
                b"not a real db",
            )
            .unwrap();
        assert_eq!(r.level, PrivacyLevel::Private);

        // The floor never lowers a stricter resolution.
        p.policy().set_override("/home/bob/vault.kdbx", PrivacyLevel::Blocked).unwrap();
        let r = p
            .process("/home/bob/vault.kdbx", &FileMetadata::default(), b"payload")
            .unwrap();
        assert_eq!(r.level, PrivacyLevel::Blocked);
        assert_eq!(r.action, Action::Blocked);
    }

    #[test]
    fn test_binary_content_flows_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir);
        let content = [0xde, 0xad, 0xbe, 0xef, 0x00, 0xff];
        let r = p
            .process("/home/alice/blob.bin", &FileMetadata::default(), &content)
            .unwrap();
        assert_eq!(r.detections, 0);
        assert_eq!(r.action, Action::Passed);
        assert_eq!(r.transformed, content);
    }

    #[test]
    fn test_restricted_truncation_counts_as_redacted() {
        let dir = tempfile::tempdir().unwrap();
        let config = FilterConfig::load_default().unwrap();
        let policy = Arc::new(PolicyEngine::new(EngineSettings::default()));
        policy.add_rule("**/medical/**", PrivacyLevel::Restricted, 10).unwrap();
        let audit = Arc::new(AuditStore::open(dir.path().join("audit.jsonl")).unwrap());
        let p = IngestionPipeline::new(&config, policy, audit).unwrap();

        let long = "clinical note ".repeat(100);
        let r = p
            .process("/shared/medical/note.txt", &FileMetadata::default(), long.as_bytes())
            .unwrap();
        assert_eq!(r.level, PrivacyLevel::Restricted);
        assert_eq!(r.action, Action::Redacted);
        assert_eq!(r.transformed.len(), redact::DEFAULT_MAX_RESTRICTED_LEN);
    }

    #[test]
    fn test_stats_track_levels_and_actions() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(&dir);
        p.process("/shared/clean.txt", &FileMetadata::default(), b"ok").unwrap();
        p.process(
            "/home/bob/pii.txt",
            &FileMetadata::default(),
            b"mail me at bob@example.com",
        )
        .unwrap();

        let stats = p.stats();
        assert_eq!(stats.files_processed, 2);
        assert_eq!(stats.by_action["passed"], 1);
        assert_eq!(stats.by_action["redacted"], 1);
        assert_eq!(stats.by_level["PUBLIC"], 1);
        assert_eq!(stats.by_level["PERSONAL"], 1);
        assert_eq!(stats.detections, 1);
        assert_eq!(stats.failures, 0);
    }
}
