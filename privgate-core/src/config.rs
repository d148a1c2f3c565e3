//! Configuration management for `privgate-core`.
//!
//! This module defines the data structures for detector definitions,
//! ownership prefix rules, and engine settings. It handles
//! serialization/deserialization of YAML configurations and provides
//! utilities for loading and validating them. The default configuration is
//! embedded in the binary; a user-supplied file replaces it wholesale.
//!
//! License: MIT OR Apache-2.0

use std::collections::{HashMap, HashSet};
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::{debug, info};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::detection::PatternCategory;
use crate::levels::{OwnerIdentity, PrivacyLevel};

/// Maximum allowed length for a detector pattern string.
pub const MAX_PATTERN_LENGTH: usize = 500;

/// Represents a single pattern detector used by the pattern library.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(default)]
pub struct DetectorRule {
    /// The category this detector reports hits under.
    pub category: PatternCategory,
    /// Human-readable description of what the detector targets.
    pub description: Option<String>,
    /// The regex pattern string.
    pub pattern: String,
    /// If true, enables multiline mode for the regex engine.
    pub multiline: bool,
    /// If true, the dot character `.` in regex will match newlines.
    pub dot_matches_new_line: bool,
    /// If true, requires external programmatic validation (e.g., Luhn checksum).
    pub programmatic_validation: bool,
    /// Explicit override for enabling/disabling the detector.
    pub enabled: Option<bool>,
}

impl Default for DetectorRule {
    fn default() -> Self {
        Self {
            category: PatternCategory::Email,
            description: None,
            pattern: String::new(),
            multiline: false,
            dot_matches_new_line: false,
            programmatic_validation: false,
            enabled: None,
        }
    }
}

/// Maps a path fragment to an owner identity.
///
/// The fragment is matched case-insensitively anywhere in the path (user
/// directories appear under varying share roots). Higher priority wins; ties
/// break toward the longer, more specific fragment.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct OwnershipRule {
    pub owner: OwnerIdentity,
    pub prefix: String,
    pub priority: i32,
}

impl Default for OwnershipRule {
    fn default() -> Self {
        Self {
            owner: OwnerIdentity::Unknown,
            prefix: String::new(),
            priority: 0,
        }
    }
}

/// A path-glob classification floor for known-sensitive file types.
///
/// Unlike operator privacy rules these ship with the engine config, never
/// change at runtime, and act as floors: a matching file is raised to at
/// least `level` no matter who owns it or what rules say.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SensitivePathRule {
    pub pattern: String,
    pub level: PrivacyLevel,
}

/// Tunables for the redaction transformer and owner defaults.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Byte cap applied to `Restricted` output, truncation marker included.
    pub max_restricted_len: usize,
    /// Per-identity default levels; identities absent here fall back to the
    /// built-in defaults.
    pub default_levels: HashMap<OwnerIdentity, PrivacyLevel>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_restricted_len: crate::redact::DEFAULT_MAX_RESTRICTED_LEN,
            default_levels: HashMap::new(),
        }
    }
}

impl EngineSettings {
    /// The default privacy level for `owner` when no path rule matches.
    pub fn default_level_for(&self, owner: OwnerIdentity) -> PrivacyLevel {
        self.default_levels
            .get(&owner)
            .copied()
            .unwrap_or_else(|| owner.builtin_default_level())
    }
}

/// Top-level engine configuration: detectors, ownership table, settings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    pub detectors: Vec<DetectorRule>,
    pub ownership: Vec<OwnershipRule>,
    pub sensitive_paths: Vec<SensitivePathRule>,
    pub settings: EngineSettings,
}

impl FilterConfig {
    /// Loads the engine configuration from a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        info!("Loading filter config from: {}", path.display());
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: FilterConfig = serde_yml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.validate()?;
        info!(
            "Loaded {} detectors and {} ownership rules from {}.",
            config.detectors.len(),
            config.ownership.len(),
            path.display()
        );
        Ok(config)
    }

    /// Loads the default configuration from the embedded YAML.
    pub fn load_default() -> Result<Self> {
        debug!("Loading default filter config from embedded string...");
        let default_yaml = include_str!("../config/default_rules.yaml");
        let config: FilterConfig =
            serde_yml::from_str(default_yaml).context("Failed to parse default filter config")?;
        config.validate().context("Embedded default config is invalid")?;

        debug!("Loaded {} default detectors.", config.detectors.len());
        Ok(config)
    }

    /// Validates detector and ownership integrity, collecting all errors
    /// before rejecting.
    pub fn validate(&self) -> Result<()> {
        let mut errors = Vec::new();
        let mut categories = HashSet::new();

        for detector in &self.detectors {
            let name = detector.category.as_str();
            if !categories.insert(detector.category) {
                errors.push(format!("Duplicate detector for category '{name}'."));
            }
            if detector.pattern.is_empty() {
                errors.push(format!("Detector '{name}' has an empty `pattern` field."));
                continue;
            }
            if detector.pattern.len() > MAX_PATTERN_LENGTH {
                errors.push(format!(
                    "Detector '{name}': pattern length ({}) exceeds maximum allowed ({MAX_PATTERN_LENGTH}).",
                    detector.pattern.len()
                ));
            }
            if let Err(e) = Regex::new(&detector.pattern) {
                errors.push(format!("Detector '{name}' has an invalid regex pattern: {e}"));
            }
        }

        for rule in &self.ownership {
            if rule.prefix.is_empty() {
                errors.push(format!(
                    "Ownership rule for '{}' has an empty `prefix` field.",
                    rule.owner
                ));
            }
        }

        for rule in &self.sensitive_paths {
            if let Err(e) = globset::Glob::new(&rule.pattern) {
                errors.push(format!(
                    "Sensitive-path rule '{}' has an invalid glob: {e}",
                    rule.pattern
                ));
            }
        }

        // The cap is inclusive of the truncation marker; anything smaller
        // than the marker itself cannot be honored.
        let min_restricted_len = crate::redact::TRUNCATION_MARKER.len() + 1;
        if self.settings.max_restricted_len < min_restricted_len {
            errors.push(format!(
                "`settings.max_restricted_len` ({}) must be at least {min_restricted_len}.",
                self.settings.max_restricted_len
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(anyhow!("Config validation failed:\n{}", errors.join("\n")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_default_config() {
        let config = FilterConfig::load_default().unwrap();
        assert_eq!(config.detectors.len(), PatternCategory::ALL.len());
        let ssn = config
            .detectors
            .iter()
            .find(|d| d.category == PatternCategory::Ssn)
            .unwrap();
        assert!(ssn.programmatic_validation);
        assert!(!config.ownership.is_empty());
    }

    #[test]
    fn test_default_levels_fall_back_to_builtin() {
        let settings = EngineSettings::default();
        assert_eq!(
            settings.default_level_for(OwnerIdentity::Alice),
            PrivacyLevel::Private
        );
        assert_eq!(
            settings.default_level_for(OwnerIdentity::Shared),
            PrivacyLevel::Public
        );
        let mut settings = settings;
        settings
            .default_levels
            .insert(OwnerIdentity::Shared, PrivacyLevel::Personal);
        assert_eq!(
            settings.default_level_for(OwnerIdentity::Shared),
            PrivacyLevel::Personal
        );
    }

    #[test]
    fn test_validate_rejects_duplicate_category() {
        let config = FilterConfig {
            detectors: vec![
                DetectorRule {
                    category: PatternCategory::Email,
                    pattern: "a".to_string(),
                    ..Default::default()
                },
                DetectorRule {
                    category: PatternCategory::Email,
                    pattern: "b".to_string(),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("Duplicate detector"));
    }

    #[test]
    fn test_validate_rejects_cap_below_truncation_marker() {
        let mut config = FilterConfig::default();
        config.settings.max_restricted_len = crate::redact::TRUNCATION_MARKER.len();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_restricted_len"));

        config.settings.max_restricted_len = crate::redact::TRUNCATION_MARKER.len() + 1;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_regex_and_empty_prefix() {
        let config = FilterConfig {
            detectors: vec![DetectorRule {
                category: PatternCategory::Email,
                pattern: "(unclosed".to_string(),
                ..Default::default()
            }],
            ownership: vec![OwnershipRule {
                owner: OwnerIdentity::Alice,
                prefix: String::new(),
                priority: 0,
            }],
            ..Default::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("invalid regex"));
        assert!(err.contains("empty `prefix`"));
    }
}
