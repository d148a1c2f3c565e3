// privgate-core/src/detection.rs
//! Pattern categories, detection hits, and digest helpers.
//!
//! A `DetectionHit` records *where* a sensitive span was found and a hash of
//! what was found — never the raw matched text. Audit records store only
//! category counts and digests.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::levels::PrivacyLevel;

/// Closed set of sensitive-data categories the pattern library detects.
///
/// Declared in registration order: detection runs one pass per category in
/// this order, and aggregated counts are reported in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternCategory {
    Ssn,
    CreditCard,
    Email,
    Phone,
    IpAddress,
    Password,
    ApiKey,
    PrivateKey,
    #[serde(rename = "url_personal")]
    PersonalUrl,
}

impl PatternCategory {
    /// All categories in registration order.
    pub const ALL: [PatternCategory; 9] = [
        PatternCategory::Ssn,
        PatternCategory::CreditCard,
        PatternCategory::Email,
        PatternCategory::Phone,
        PatternCategory::IpAddress,
        PatternCategory::Password,
        PatternCategory::ApiKey,
        PatternCategory::PrivateKey,
        PatternCategory::PersonalUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PatternCategory::Ssn => "ssn",
            PatternCategory::CreditCard => "credit_card",
            PatternCategory::Email => "email",
            PatternCategory::Phone => "phone",
            PatternCategory::IpAddress => "ip_address",
            PatternCategory::Password => "password",
            PatternCategory::ApiKey => "api_key",
            PatternCategory::PrivateKey => "private_key",
            PatternCategory::PersonalUrl => "url_personal",
        }
    }

    /// The fixed replacement token for this category.
    ///
    /// Tokens are chosen so that no placeholder is itself a valid match for
    /// any detector; this is what makes redaction idempotent.
    pub fn placeholder(&self) -> &'static str {
        match self {
            PatternCategory::Ssn => "[SSN_REDACTED]",
            PatternCategory::CreditCard => "[CC_REDACTED]",
            PatternCategory::Email => "[EMAIL_REDACTED]",
            PatternCategory::Phone => "[PHONE_REDACTED]",
            PatternCategory::IpAddress => "[IP_REDACTED]",
            PatternCategory::Password => "[PASSWORD_REDACTED]",
            PatternCategory::ApiKey => "[API_KEY_REDACTED]",
            PatternCategory::PrivateKey => "[PRIVATE_KEY_REDACTED]",
            PatternCategory::PersonalUrl => "[PERSONAL_URL_REDACTED]",
        }
    }

    /// Relative severity used to pick a single winner when detections from
    /// different categories overlap at the same offset. Higher wins.
    pub fn severity(&self) -> u8 {
        match self {
            PatternCategory::PrivateKey => 9,
            PatternCategory::Password => 8,
            PatternCategory::ApiKey => 7,
            PatternCategory::Ssn => 6,
            PatternCategory::CreditCard => 5,
            PatternCategory::IpAddress => 4,
            PatternCategory::PersonalUrl => 3,
            PatternCategory::Email => 2,
            PatternCategory::Phone => 1,
        }
    }

    /// The minimum privacy level a file containing this category is escalated
    /// to. Escalation only ever raises a candidate level.
    pub fn escalation_floor(&self) -> PrivacyLevel {
        match self {
            PatternCategory::Password
            | PatternCategory::ApiKey
            | PatternCategory::PrivateKey
            | PatternCategory::Ssn
            | PatternCategory::CreditCard => PrivacyLevel::Restricted,
            PatternCategory::IpAddress | PatternCategory::PersonalUrl => PrivacyLevel::Private,
            PatternCategory::Email | PatternCategory::Phone => PrivacyLevel::Personal,
        }
    }

    /// The lowest privacy level at which spans of this category are replaced.
    ///
    /// The replacement set at level N is by construction a superset of the
    /// set at N-1 (monotonic redaction).
    pub fn redaction_threshold(&self) -> PrivacyLevel {
        match self {
            PatternCategory::Email | PatternCategory::Phone => PrivacyLevel::Personal,
            PatternCategory::Ssn
            | PatternCategory::CreditCard
            | PatternCategory::Password
            | PatternCategory::ApiKey
            | PatternCategory::PersonalUrl => PrivacyLevel::Private,
            PatternCategory::IpAddress | PatternCategory::PrivateKey => PrivacyLevel::Restricted,
        }
    }
}

impl std::fmt::Display for PatternCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single detected sensitive span.
///
/// `start`/`end` are byte offsets into the decoded content; `excerpt_hash`
/// is a canonical digest of the matched text. The raw text is never stored
/// outside the transformed output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionHit {
    pub category: PatternCategory,
    pub start: usize,
    pub end: usize,
    pub excerpt_hash: String,
}

/// Aggregated per-category hit count, as persisted in audit records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: PatternCategory,
    pub count: u32,
}

/// Full SHA-256 digest of a content blob, hex-encoded.
pub fn content_hash(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Canonical digest of a matched excerpt: whitespace-collapsed, lowercased,
/// and keyed by category so equal values under different detectors hash
/// differently.
pub fn excerpt_hash(category: PatternCategory, excerpt: &str) -> String {
    let normalized = excerpt
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut hasher = Sha256::new();
    hasher.update(category.as_str().as_bytes());
    hasher.update(b":");
    hasher.update(normalized.as_bytes());
    hex::encode(hasher.finalize())
}

/// Collapses hits into per-category counts, in registration order, dropping
/// categories with no hits.
pub fn count_by_category(hits: &[DetectionHit]) -> Vec<CategoryCount> {
    PatternCategory::ALL
        .iter()
        .filter_map(|&category| {
            let count = hits.iter().filter(|h| h.category == category).count() as u32;
            (count > 0).then_some(CategoryCount { category, count })
        })
        .collect()
}
