// tests/audit_concurrency.rs
// Stress and durability behavior of the audit store.
//
// License: MIT OR Apache-2.0

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use privgate_core::{
    Action, AuditDraft, AuditFilter, AuditStore, OwnerIdentity, PrivacyLevel,
};
use test_log::test;
use uuid::Uuid;

fn draft(path: &str) -> AuditDraft {
    AuditDraft {
        run_id: Uuid::nil(),
        file_path: path.to_string(),
        owner: OwnerIdentity::Shared,
        resolved_level: PrivacyLevel::Public,
        action: Action::Passed,
        hits: Vec::new(),
        failure: false,
        content_hash_before: "0".repeat(64),
        content_hash_after: "0".repeat(64),
    }
}

#[test]
fn append_storm_yields_unique_gap_free_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(AuditStore::open(dir.path().join("audit.jsonl")).unwrap());
    let threads = 50;
    let per_thread = 20;

    let handles: Vec<_> = (0..threads)
        .map(|t| {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                let mut ids = Vec::with_capacity(per_thread);
                for i in 0..per_thread {
                    let record = store.append(draft(&format!("/t{t}/f{i}"))).unwrap();
                    ids.push(record.id);
                }
                ids
            })
        })
        .collect();

    let mut all_ids = Vec::new();
    for handle in handles {
        all_ids.extend(handle.join().unwrap());
    }

    let total = (threads * per_thread) as u64;
    assert_eq!(all_ids.len() as u64, total);
    let unique: HashSet<_> = all_ids.iter().copied().collect();
    assert_eq!(unique.len() as u64, total);
    assert_eq!(*all_ids.iter().max().unwrap(), total);
    assert_eq!(*all_ids.iter().min().unwrap(), 1);
    assert_eq!(store.last_id(), total);

    // The file holds exactly one well-formed record per append.
    let records = store.query(&AuditFilter::default()).unwrap();
    assert_eq!(records.len(), total as usize);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.id, i as u64 + 1);
    }
}

#[test]
fn offline_window_mid_storm_loses_no_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(AuditStore::open(dir.path().join("audit.jsonl")).unwrap());

    for i in 0..10 {
        store.append(draft(&format!("/pre/{i}"))).unwrap();
    }
    store.set_offline(true);
    for i in 0..10 {
        assert!(store.append(draft(&format!("/held/{i}"))).is_err());
    }
    store.set_offline(false);
    for i in 0..10 {
        store.append(draft(&format!("/post/{i}"))).unwrap();
    }

    // Refused appends consumed no ids.
    assert_eq!(store.last_id(), 20);
    let records = store.query(&AuditFilter::default()).unwrap();
    assert_eq!(records.len(), 20);
    assert!(records.iter().all(|r| !r.file_path.starts_with("/held/")));
}

#[test]
fn reopen_after_storm_continues_the_sequence() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audit.jsonl");
    {
        let store = AuditStore::open(&path).unwrap();
        for i in 0..100 {
            store.append(draft(&format!("/f{i}"))).unwrap();
        }
    }

    let store = AuditStore::open(&path).unwrap();
    assert_eq!(store.last_id(), 100);
    let record = store.append(draft("/after-restart")).unwrap();
    assert_eq!(record.id, 101);
}

#[test]
fn concurrent_queries_during_appends_see_consistent_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(AuditStore::open(dir.path().join("audit.jsonl")).unwrap());

    let writer = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            for i in 0..200 {
                store.append(draft(&format!("/w/{i}"))).unwrap();
            }
        })
    };
    let reader = {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
            for _ in 0..50 {
                let records = store.query(&AuditFilter::default()).unwrap();
                // Whatever prefix of the stream we observe is well ordered.
                for window in records.windows(2) {
                    assert!(window[0].id < window[1].id);
                }
            }
        })
    };

    writer.join().unwrap();
    reader.join().unwrap();
    assert_eq!(store.last_id(), 200);
}

#[test]
fn retention_prune_is_atomic_under_follow_up_appends() {
    let dir = tempfile::tempdir().unwrap();
    let store = AuditStore::open(dir.path().join("audit.jsonl")).unwrap();
    for i in 0..5 {
        store.append(draft(&format!("/old/{i}"))).unwrap();
    }

    let removed = store
        .prune_older_than(Utc::now() + chrono::Duration::seconds(5))
        .unwrap();
    assert_eq!(removed, 5);

    // The trail stays writable and the id sequence continues.
    let record = store.append(draft("/new/0")).unwrap();
    assert_eq!(record.id, 6);
    let records = store.query(&AuditFilter::default()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file_path, "/new/0");
}
