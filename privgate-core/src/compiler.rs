//! compiler.rs - Manages the compilation and caching of pattern detectors.
//!
//! This module provides a thread-safe, cached mechanism to convert the
//! detector section of a `FilterConfig` into `CompiledDetectors`, optimized
//! for repeated application across a scan. It uses a global, shared cache to
//! avoid redundant compilation when multiple pipelines share a config.
//!
//! License: MIT OR Apache-2.0

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;
use log::debug;
use regex::{Regex, RegexBuilder};

use crate::config::{DetectorRule, MAX_PATTERN_LENGTH};
use crate::detection::PatternCategory;
use crate::errors::PrivacyError;

/// A single compiled pattern detector, ready for application to content.
#[derive(Debug)]
pub struct CompiledDetector {
    /// The compiled regular expression used for matching.
    pub regex: Regex,
    /// The category hits from this detector are reported under.
    pub category: PatternCategory,
    /// A flag indicating if matches require additional programmatic validation.
    pub programmatic_validation: bool,
}

/// The full set of compiled detectors, in registration order.
#[derive(Debug)]
pub struct CompiledDetectors {
    pub detectors: Vec<CompiledDetector>,
}

lazy_static! {
    /// A thread-safe, global cache for compiled detectors, keyed by a hash of
    /// the detector configuration.
    static ref COMPILED_DETECTOR_CACHE: RwLock<HashMap<u64, Arc<CompiledDetectors>>> =
        RwLock::new(HashMap::new());
}

/// Hashes the detector list to create a stable, unique cache key.
///
/// Rules are sorted by category name before hashing so ordering differences
/// do not defeat the cache.
fn hash_detectors(rules: &[DetectorRule]) -> u64 {
    let mut hasher = DefaultHasher::new();
    let mut rules_to_hash = rules.to_vec();
    rules_to_hash.sort_by(|a, b| a.category.as_str().cmp(b.category.as_str()));
    rules_to_hash.hash(&mut hasher);
    hasher.finish()
}

/// Compiles detector rules, skipping disabled ones.
///
/// Fails if any enabled rule has an oversized or invalid pattern; partial
/// detector sets are never produced.
pub fn compile_detectors(rules: &[DetectorRule]) -> Result<CompiledDetectors, PrivacyError> {
    debug!("Starting compilation of {} detectors.", rules.len());

    let mut compiled = Vec::new();

    for rule in rules {
        if let Some(false) = rule.enabled {
            debug!("Skipping disabled detector '{}'.", rule.category);
            continue;
        }

        if rule.pattern.len() > MAX_PATTERN_LENGTH {
            return Err(PrivacyError::PatternLengthExceeded(
                rule.category.as_str().to_string(),
                rule.pattern.len(),
                MAX_PATTERN_LENGTH,
            ));
        }

        let regex = RegexBuilder::new(&rule.pattern)
            .multi_line(rule.multiline)
            .dot_matches_new_line(rule.dot_matches_new_line)
            .size_limit(10 * (1 << 20)) // 10 MB limit for compiled regex
            .build()
            .map_err(|e| {
                PrivacyError::DetectorCompilation(rule.category.as_str().to_string(), e)
            })?;

        compiled.push(CompiledDetector {
            regex,
            category: rule.category,
            programmatic_validation: rule.programmatic_validation,
        });
    }

    debug!("Finished compiling detectors. Total compiled: {}.", compiled.len());
    Ok(CompiledDetectors { detectors: compiled })
}

/// Gets a `CompiledDetectors` instance from the cache, compiling on miss.
///
/// Returns an `Arc`, allowing cheap sharing between concurrent pipelines.
pub fn get_or_compile_detectors(
    rules: &[DetectorRule],
) -> Result<Arc<CompiledDetectors>, PrivacyError> {
    let cache_key = hash_detectors(rules);

    {
        let cache = COMPILED_DETECTOR_CACHE
            .read()
            .unwrap_or_else(|e| e.into_inner());
        if let Some(detectors) = cache.get(&cache_key) {
            debug!("Serving compiled detectors from cache for key: {cache_key}");
            return Ok(Arc::clone(detectors));
        }
    }

    let compiled = Arc::new(compile_detectors(rules)?);

    COMPILED_DETECTOR_CACHE
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .insert(cache_key, Arc::clone(&compiled));

    debug!("Compiled and cached detectors for key: {cache_key}");
    Ok(compiled)
}
