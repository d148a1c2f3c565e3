//! audit.rs - Append-only audit trail for processed files.
//!
//! One JSON record per line, one line per processed file. Ids are assigned
//! under the store lock and committed only after the line is written and
//! flushed, so ids are unique, strictly increasing, and gap-free: a failed
//! append consumes no id. Records never carry raw sensitive content, only
//! digests and per-category hit counts.
//!
//! The store can be placed offline (an operator hold, or a detected disk
//! fault); while offline every append fails with `StorageUnavailable` and
//! callers must not forward the affected file.
//!
//! License: MIT OR Apache-2.0

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detection::{CategoryCount, DetectionHit};
use crate::errors::PrivacyError;
use crate::levels::{Action, OwnerIdentity, PrivacyLevel};

/// A single committed audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    /// Identifies the pipeline run that produced this record.
    pub run_id: Uuid,
    pub file_path: String,
    pub owner: OwnerIdentity,
    pub resolved_level: PrivacyLevel,
    pub action: Action,
    /// Per-category detection counts; empty when nothing was detected.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub hits: Vec<CategoryCount>,
    /// True when the record covers a fail-closed outcome after an internal
    /// transform error.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub failure: bool,
    pub content_hash_before: String,
    pub content_hash_after: String,
}

/// The fields the pipeline supplies; id and timestamp are assigned by the
/// store at commit time.
#[derive(Debug, Clone)]
pub struct AuditDraft {
    pub run_id: Uuid,
    pub file_path: String,
    pub owner: OwnerIdentity,
    pub resolved_level: PrivacyLevel,
    pub action: Action,
    pub hits: Vec<DetectionHit>,
    pub failure: bool,
    pub content_hash_before: String,
    pub content_hash_after: String,
}

/// Query filter for reading the trail back. All fields are conjunctive.
#[derive(Debug, Clone, Default)]
pub struct AuditFilter {
    /// Exclusive lower bound: only records with `id > since_id`.
    pub since_id: Option<u64>,
    /// Substring match against `file_path`.
    pub path: Option<String>,
    pub owner: Option<OwnerIdentity>,
    /// Only records at or above this level.
    pub min_level: Option<PrivacyLevel>,
    /// Cap on returned records, applied after filtering, oldest first.
    pub limit: Option<usize>,
}

impl AuditFilter {
    fn matches(&self, record: &AuditRecord) -> bool {
        if let Some(since) = self.since_id {
            if record.id <= since {
                return false;
            }
        }
        if let Some(path) = &self.path {
            if !record.file_path.contains(path.as_str()) {
                return false;
            }
        }
        if let Some(owner) = self.owner {
            if record.owner != owner {
                return false;
            }
        }
        if let Some(min) = self.min_level {
            if record.resolved_level < min {
                return false;
            }
        }
        true
    }
}

struct StoreInner {
    file: File,
    last_id: u64,
}

/// Durable, lock-serialized audit log over a JSONL file.
pub struct AuditStore {
    path: PathBuf,
    inner: Mutex<StoreInner>,
    offline: AtomicBool,
}

impl AuditStore {
    /// Opens (or creates) the trail at `path`, recovering the last committed
    /// id by scanning existing records.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, PrivacyError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut last_id = 0;
        if path.exists() {
            for record in read_records(&path)? {
                last_id = last_id.max(record.id);
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(
            "Opened audit trail at {} (last committed id: {last_id}).",
            path.display()
        );
        Ok(Self {
            path,
            inner: Mutex::new(StoreInner { file, last_id }),
            offline: AtomicBool::new(false),
        })
    }

    /// Commits one record and returns it with its assigned id.
    ///
    /// The id is taken and advanced only after the line is durably written,
    /// so failed appends leave no gap in the sequence. A torn line left by an
    /// earlier failed write is terminated first, and a write that fails
    /// partway is rolled back to the pre-append length, so a committed record
    /// never shares a line with a torn one.
    pub fn append(&self, draft: AuditDraft) -> Result<AuditRecord, PrivacyError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(PrivacyError::StorageUnavailable(
                "audit store is offline".to_string(),
            ));
        }

        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        if !ends_with_newline(&self.path)
            .map_err(|e| PrivacyError::StorageUnavailable(e.to_string()))?
        {
            warn!(
                "Audit trail {} has a torn final line; terminating it before append.",
                self.path.display()
            );
            inner
                .file
                .write_all(b"\n")
                .and_then(|_| inner.file.flush())
                .map_err(|e| PrivacyError::StorageUnavailable(e.to_string()))?;
        }
        let pre_len = inner
            .file
            .metadata()
            .map_err(|e| PrivacyError::StorageUnavailable(e.to_string()))?
            .len();

        let record = AuditRecord {
            id: inner.last_id + 1,
            timestamp: Utc::now(),
            run_id: draft.run_id,
            file_path: draft.file_path,
            owner: draft.owner,
            resolved_level: draft.resolved_level,
            action: draft.action,
            hits: crate::detection::count_by_category(&draft.hits),
            failure: draft.failure,
            content_hash_before: draft.content_hash_before,
            content_hash_after: draft.content_hash_after,
        };

        let line = serde_json::to_string(&record)
            .map_err(|e| PrivacyError::Serialization(e.to_string()))?;
        if let Err(e) = writeln!(inner.file, "{line}").and_then(|_| inner.file.flush()) {
            // Discard whatever partial line made it out; the trail must stay
            // parseable and the id stays unconsumed.
            let _ = inner.file.set_len(pre_len);
            return Err(PrivacyError::StorageUnavailable(e.to_string()));
        }

        inner.last_id = record.id;
        debug!("Committed audit record {} for {}.", record.id, record.file_path);
        Ok(record)
    }

    /// Reads records matching `filter`, in ascending id order.
    ///
    /// Reads from a fresh handle so queries never disturb the append cursor.
    pub fn query(&self, filter: &AuditFilter) -> Result<Vec<AuditRecord>, PrivacyError> {
        let mut out: Vec<AuditRecord> = read_records(&self.path)?
            .into_iter()
            .filter(|r| filter.matches(r))
            .collect();
        if let Some(limit) = filter.limit {
            out.truncate(limit);
        }
        Ok(out)
    }

    /// The highest committed record id, 0 when the trail is empty.
    pub fn last_id(&self) -> u64 {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).last_id
    }

    /// Places the store offline or back online.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
        if offline {
            warn!("Audit store placed offline; appends will be refused.");
        } else {
            info!("Audit store back online.");
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline.load(Ordering::SeqCst)
    }

    /// Administrative retention pass: drops records older than `cutoff`.
    ///
    /// Rewrites the trail atomically (temp file plus rename) under the store
    /// lock; committed ids are never reused, so `last_id` is unaffected.
    /// Returns the number of records removed.
    pub fn prune_older_than(&self, cutoff: DateTime<Utc>) -> Result<usize, PrivacyError> {
        let mut inner = self.inner.lock().unwrap_or_else(|e| e.into_inner());

        let records = read_records(&self.path)?;
        let kept: Vec<&AuditRecord> = records.iter().filter(|r| r.timestamp >= cutoff).collect();
        let removed = records.len() - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = File::create(&tmp)?;
            for record in &kept {
                let line = serde_json::to_string(record)
                    .map_err(|e| PrivacyError::Serialization(e.to_string()))?;
                writeln!(file, "{line}")?;
            }
            file.flush()?;
        }
        std::fs::rename(&tmp, &self.path)?;

        // The append handle still points at the replaced inode; reopen.
        inner.file = OpenOptions::new().append(true).open(&self.path)?;
        info!("Pruned {removed} audit records older than {cutoff}.");
        Ok(removed)
    }
}

/// Whether the file's final byte is a newline. An empty (or absent) file
/// counts as terminated.
fn ends_with_newline(path: &Path) -> std::io::Result<bool> {
    let mut file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e),
    };
    if file.metadata()?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Parses every record in the file, skipping lines that fail to parse (a
/// torn write from a crashed append) with a warning.
fn read_records(path: &Path) -> Result<Vec<AuditRecord>, PrivacyError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let reader = BufReader::new(File::open(path)?);
    let mut records = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<AuditRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => warn!(
                "Skipping unparseable audit line {} in {}: {e}",
                idx + 1,
                path.display()
            ),
        }
    }
    Ok(records)
}
