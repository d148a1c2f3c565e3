//! policy.rs - Privacy rule storage and level resolution.
//!
//! Rules map path globs to privacy levels. The active rule set lives in a
//! copy-on-write snapshot behind an `RwLock<Arc<_>>`: readers clone the `Arc`
//! and resolve against an immutable snapshot while writers build and swap in
//! a replacement, so a resolution mid-update sees either the old set or the
//! new set, never a mix. Rules are never edited in place; an update appends a
//! successor and marks the old rule superseded, keeping history queryable.
//!
//! License: MIT OR Apache-2.0

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use globset::{Glob, GlobMatcher};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{EngineSettings, SensitivePathRule};
use crate::errors::PrivacyError;
use crate::levels::{OwnerIdentity, PrivacyLevel};

/// A path-glob privacy rule.
///
/// Superseded rules stay in the set for history but never match; the
/// `superseded_by` field points at the successor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivacyRule {
    pub id: u64,
    /// Path glob, e.g. `**/medical/**` or `*.key`.
    pub pattern: String,
    pub level: PrivacyLevel,
    pub priority: i32,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub superseded_by: Option<u64>,
}

/// How a resolved level was decided, recorded for audit purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LevelSource {
    Override,
    Rule,
    OwnerDefault,
}

/// The outcome of policy resolution for a single path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPolicy {
    pub level: PrivacyLevel,
    pub source: LevelSource,
    /// Set when `source` is `Rule`.
    pub rule_id: Option<u64>,
}

/// Serialized form of the mutable policy state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct PolicyFile {
    rules: Vec<PrivacyRule>,
    overrides: HashMap<String, PrivacyLevel>,
}

/// An immutable, fully compiled rule set.
struct RuleSnapshot {
    rules: Vec<PrivacyRule>,
    /// Parallel to `rules`; `None` only for superseded entries, which are
    /// never matched.
    matchers: Vec<Option<GlobMatcher>>,
    overrides: HashMap<String, PrivacyLevel>,
    next_id: u64,
}

impl RuleSnapshot {
    fn compile(
        rules: Vec<PrivacyRule>,
        overrides: HashMap<String, PrivacyLevel>,
    ) -> Result<Self, PrivacyError> {
        let mut matchers = Vec::with_capacity(rules.len());
        for rule in &rules {
            if rule.superseded_by.is_some() {
                matchers.push(None);
                continue;
            }
            let glob = Glob::new(&rule.pattern)
                .map_err(|e| PrivacyError::InvalidGlob(rule.pattern.clone(), e.to_string()))?;
            matchers.push(Some(glob.compile_matcher()));
        }
        let next_id = rules.iter().map(|r| r.id).max().unwrap_or(0) + 1;
        Ok(Self { rules, matchers, overrides, next_id })
    }
}

/// Static classifier for known-sensitive file types.
///
/// Compiled once from the engine config; private key material, certificates,
/// and credential stores carry a level floor that applies regardless of
/// owner, rules, or overrides. Floors only raise.
#[derive(Debug)]
pub struct PathClassifier {
    matchers: Vec<(GlobMatcher, PrivacyLevel)>,
}

impl PathClassifier {
    pub fn from_rules(rules: &[SensitivePathRule]) -> Result<Self, PrivacyError> {
        let mut matchers = Vec::with_capacity(rules.len());
        for rule in rules {
            let glob = Glob::new(&rule.pattern)
                .map_err(|e| PrivacyError::InvalidGlob(rule.pattern.clone(), e.to_string()))?;
            matchers.push((glob.compile_matcher(), rule.level));
        }
        Ok(Self { matchers })
    }

    /// The highest floor any matching rule demands for `path`.
    pub fn floor(&self, path: &str) -> Option<PrivacyLevel> {
        self.matchers
            .iter()
            .filter(|(matcher, _)| matcher.is_match(path))
            .map(|&(_, level)| level)
            .max()
    }
}

/// Thread-safe policy engine: rules, manual overrides, owner defaults.
pub struct PolicyEngine {
    snapshot: RwLock<Arc<RuleSnapshot>>,
    settings: EngineSettings,
    /// Serializes mutations, including persistence, so concurrent writers
    /// cannot interleave file writes or lose each other's changes.
    write_lock: Mutex<()>,
    persist_path: Option<PathBuf>,
}

impl PolicyEngine {
    /// Creates an engine with no rules, no overrides, and no persistence.
    pub fn new(settings: EngineSettings) -> Self {
        let snapshot = RuleSnapshot::compile(Vec::new(), HashMap::new())
            .unwrap_or_else(|_| unreachable!("empty rule set always compiles"));
        Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            settings,
            write_lock: Mutex::new(()),
            persist_path: None,
        }
    }

    /// Creates an engine persisted at `path`, loading existing state if the
    /// file is present.
    pub fn with_persistence<P: AsRef<Path>>(
        settings: EngineSettings,
        path: P,
    ) -> Result<Self, PrivacyError> {
        let path = path.as_ref().to_path_buf();
        let file = if path.exists() {
            let text = std::fs::read_to_string(&path)?;
            serde_yml::from_str::<PolicyFile>(&text).map_err(|e| {
                PrivacyError::Serialization(format!(
                    "policy file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            PolicyFile::default()
        };
        info!(
            "Loaded policy state: {} rules, {} overrides from {}.",
            file.rules.len(),
            file.overrides.len(),
            path.display()
        );
        let snapshot = RuleSnapshot::compile(file.rules, file.overrides)?;
        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            settings,
            write_lock: Mutex::new(()),
            persist_path: Some(path),
        })
    }

    fn current(&self) -> Arc<RuleSnapshot> {
        Arc::clone(&self.snapshot.read().unwrap_or_else(|e| e.into_inner()))
    }

    /// Rebuilds the snapshot from modified state, persists, and swaps it in.
    /// Callers must hold `write_lock`.
    fn commit(
        &self,
        rules: Vec<PrivacyRule>,
        overrides: HashMap<String, PrivacyLevel>,
    ) -> Result<(), PrivacyError> {
        if let Some(path) = &self.persist_path {
            let file = PolicyFile { rules: rules.clone(), overrides: overrides.clone() };
            let text = serde_yml::to_string(&file)
                .map_err(|e| PrivacyError::Serialization(e.to_string()))?;
            let tmp = path.with_extension("tmp");
            std::fs::write(&tmp, text)?;
            std::fs::rename(&tmp, path)?;
        }
        let snapshot = Arc::new(RuleSnapshot::compile(rules, overrides)?);
        *self.snapshot.write().unwrap_or_else(|e| e.into_inner()) = snapshot;
        Ok(())
    }

    /// Adds a new privacy rule and returns it with its assigned id.
    pub fn add_rule(
        &self,
        pattern: &str,
        level: PrivacyLevel,
        priority: i32,
    ) -> Result<PrivacyRule, PrivacyError> {
        // Reject bad globs before touching state.
        Glob::new(pattern)
            .map_err(|e| PrivacyError::InvalidGlob(pattern.to_string(), e.to_string()))?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current();
        let rule = PrivacyRule {
            id: current.next_id,
            pattern: pattern.to_string(),
            level,
            priority,
            created_at: Utc::now(),
            superseded_by: None,
        };
        let mut rules = current.rules.clone();
        rules.push(rule.clone());
        self.commit(rules, current.overrides.clone())?;
        info!(
            "Added privacy rule {} ('{}' -> {}, priority {}).",
            rule.id, rule.pattern, rule.level, rule.priority
        );
        Ok(rule)
    }

    /// Replaces rule `id` with a successor carrying the new fields.
    ///
    /// The old rule is retained, marked superseded. Fails if `id` does not
    /// name an active rule.
    pub fn update_rule(
        &self,
        id: u64,
        pattern: &str,
        level: PrivacyLevel,
        priority: i32,
    ) -> Result<PrivacyRule, PrivacyError> {
        Glob::new(pattern)
            .map_err(|e| PrivacyError::InvalidGlob(pattern.to_string(), e.to_string()))?;

        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current();
        let mut rules = current.rules.clone();
        let old = rules
            .iter_mut()
            .find(|r| r.id == id && r.superseded_by.is_none())
            .ok_or(PrivacyError::RuleNotFound(id))?;

        let successor = PrivacyRule {
            id: current.next_id,
            pattern: pattern.to_string(),
            level,
            priority,
            created_at: Utc::now(),
            superseded_by: None,
        };
        old.superseded_by = Some(successor.id);
        rules.push(successor.clone());
        self.commit(rules, current.overrides.clone())?;
        info!("Rule {id} superseded by rule {}.", successor.id);
        Ok(successor)
    }

    /// Pins an exact path to a level, bypassing rules and owner defaults.
    pub fn set_override(&self, path: &str, level: PrivacyLevel) -> Result<(), PrivacyError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current();
        let mut overrides = current.overrides.clone();
        overrides.insert(path.to_string(), level);
        self.commit(current.rules.clone(), overrides)?;
        info!("Set manual override for {path}: {level}.");
        Ok(())
    }

    /// Removes a manual override. Returns whether one was present.
    pub fn clear_override(&self, path: &str) -> Result<bool, PrivacyError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let current = self.current();
        let mut overrides = current.overrides.clone();
        let removed = overrides.remove(path).is_some();
        if removed {
            self.commit(current.rules.clone(), overrides)?;
            info!("Cleared manual override for {path}.");
        }
        Ok(removed)
    }

    /// All rules, active and superseded, in insertion order.
    pub fn rules(&self) -> Vec<PrivacyRule> {
        self.current().rules.clone()
    }

    /// Current manual overrides.
    pub fn overrides(&self) -> HashMap<String, PrivacyLevel> {
        self.current().overrides.clone()
    }

    /// Resolves the base privacy level for `path` owned by `owner`.
    ///
    /// Precedence: manual override, then the best-matching active rule, then
    /// the owner's default level. Among matching rules, higher priority wins;
    /// full ties fall to the newest rule and are logged. Detection-driven
    /// escalation is applied downstream and only ever raises this level.
    pub fn resolve(&self, path: &str, owner: OwnerIdentity) -> ResolvedPolicy {
        let snapshot = self.current();

        if let Some(&level) = snapshot.overrides.get(path) {
            debug!("Manual override for {path}: {level}.");
            return ResolvedPolicy { level, source: LevelSource::Override, rule_id: None };
        }

        let mut matched: Vec<&PrivacyRule> = snapshot
            .rules
            .iter()
            .zip(&snapshot.matchers)
            .filter_map(|(rule, matcher)| {
                matcher.as_ref().filter(|m| m.is_match(path)).map(|_| rule)
            })
            .collect();

        if !matched.is_empty() {
            matched.sort_by(|a, b| {
                b.priority
                    .cmp(&a.priority)
                    .then_with(|| b.created_at.cmp(&a.created_at))
                    .then_with(|| b.pattern.len().cmp(&a.pattern.len()))
                    .then_with(|| b.id.cmp(&a.id))
            });
            let winner = matched[0];
            if let Some(second) = matched.get(1) {
                if second.priority == winner.priority
                    && second.created_at == winner.created_at
                    && second.pattern.len() == winner.pattern.len()
                {
                    warn!(
                        "Ambiguous policy match for {path}: rules {} and {} tie; \
                         applying rule {}.",
                        winner.id, second.id, winner.id
                    );
                }
            }
            return ResolvedPolicy {
                level: winner.level,
                source: LevelSource::Rule,
                rule_id: Some(winner.id),
            };
        }

        ResolvedPolicy {
            level: self.settings.default_level_for(owner),
            source: LevelSource::OwnerDefault,
            rule_id: None,
        }
    }

    /// Engine settings this policy engine was built with.
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }
}
