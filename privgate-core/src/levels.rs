// privgate-core/src/levels.rs
//! Privacy levels, processing actions, and file-ownership identities.
//!
//! `PrivacyLevel` is a total order; a higher level always implies a strictly
//! more aggressive transformation than the level below it. `OwnerIdentity` is
//! a closed set derived from paths and metadata hints, never from raw
//! credentials.
//!
//! License: MIT OR Apache-2.0

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::PrivacyError;

/// Ordered privacy classification for a piece of content.
///
/// The derived `Ord` follows declaration order, so
/// `Public < Personal < Private < Restricted < Blocked` holds and escalation
/// can be expressed as `level.max(floor)`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum PrivacyLevel {
    /// No filtering.
    #[default]
    Public = 0,
    /// Basic PII removal (emails, phone numbers).
    Personal = 1,
    /// Enhanced filtering (identifiers, credentials).
    Private = 2,
    /// Heavy redaction plus truncation.
    Restricted = 3,
    /// Complete blocking; content is replaced with a sentinel.
    Blocked = 4,
}

impl PrivacyLevel {
    /// All levels in ascending order.
    pub const ALL: [PrivacyLevel; 5] = [
        PrivacyLevel::Public,
        PrivacyLevel::Personal,
        PrivacyLevel::Private,
        PrivacyLevel::Restricted,
        PrivacyLevel::Blocked,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PrivacyLevel::Public => "PUBLIC",
            PrivacyLevel::Personal => "PERSONAL",
            PrivacyLevel::Private => "PRIVATE",
            PrivacyLevel::Restricted => "RESTRICTED",
            PrivacyLevel::Blocked => "BLOCKED",
        }
    }

    /// Stable numeric index, matching the on-record discriminant.
    pub fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for PrivacyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PrivacyLevel {
    type Err = PrivacyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "PUBLIC" => Ok(PrivacyLevel::Public),
            "PERSONAL" => Ok(PrivacyLevel::Personal),
            "PRIVATE" => Ok(PrivacyLevel::Private),
            "RESTRICTED" => Ok(PrivacyLevel::Restricted),
            "BLOCKED" => Ok(PrivacyLevel::Blocked),
            _ => Err(PrivacyError::InvalidLevel(s.to_string())),
        }
    }
}

/// The disposition recorded for a processed file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Content forwarded unchanged.
    Passed,
    /// One or more spans were replaced (or the content was truncated).
    Redacted,
    /// Content was withheld entirely and replaced with the sentinel.
    Blocked,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Passed, Action::Redacted, Action::Blocked];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Passed => "passed",
            Action::Redacted => "redacted",
            Action::Blocked => "blocked",
        }
    }

    pub fn index(&self) -> usize {
        match self {
            Action::Passed => 0,
            Action::Redacted => 1,
            Action::Blocked => 2,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of identities a file can be attributed to.
///
/// Derived from path-prefix rules and metadata hints. Each identity carries a
/// configurable default privacy level used when no path rule matches.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum OwnerIdentity {
    Alice,
    Bob,
    Shared,
    #[default]
    Unknown,
}

impl OwnerIdentity {
    pub const ALL: [OwnerIdentity; 4] = [
        OwnerIdentity::Alice,
        OwnerIdentity::Bob,
        OwnerIdentity::Shared,
        OwnerIdentity::Unknown,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OwnerIdentity::Alice => "alice",
            OwnerIdentity::Bob => "bob",
            OwnerIdentity::Shared => "shared",
            OwnerIdentity::Unknown => "unknown",
        }
    }

    /// Built-in default level for this identity, used when the engine
    /// configuration does not override it.
    pub fn builtin_default_level(&self) -> PrivacyLevel {
        match self {
            OwnerIdentity::Alice => PrivacyLevel::Private,
            OwnerIdentity::Bob => PrivacyLevel::Public,
            OwnerIdentity::Shared => PrivacyLevel::Public,
            OwnerIdentity::Unknown => PrivacyLevel::Personal,
        }
    }
}

impl fmt::Display for OwnerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OwnerIdentity {
    type Err = PrivacyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "alice" => Ok(OwnerIdentity::Alice),
            "bob" => Ok(OwnerIdentity::Bob),
            "shared" => Ok(OwnerIdentity::Shared),
            "unknown" => Ok(OwnerIdentity::Unknown),
            _ => Err(PrivacyError::InvalidOwner(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_privacy_level_total_order() {
        let mut sorted = PrivacyLevel::ALL;
        sorted.sort();
        assert_eq!(sorted, PrivacyLevel::ALL);
        assert!(PrivacyLevel::Public < PrivacyLevel::Personal);
        assert!(PrivacyLevel::Restricted < PrivacyLevel::Blocked);
    }

    #[test]
    fn test_privacy_level_round_trip() {
        for level in PrivacyLevel::ALL {
            assert_eq!(level.as_str().parse::<PrivacyLevel>().unwrap(), level);
        }
        assert!("SECRET".parse::<PrivacyLevel>().is_err());
    }

    #[test]
    fn test_level_serde_names() {
        let json = serde_json::to_string(&PrivacyLevel::Restricted).unwrap();
        assert_eq!(json, "\"RESTRICTED\"");
        let json = serde_json::to_string(&Action::Redacted).unwrap();
        assert_eq!(json, "\"redacted\"");
        let json = serde_json::to_string(&OwnerIdentity::Shared).unwrap();
        assert_eq!(json, "\"shared\"");
    }

    #[test]
    fn test_owner_parse_case_insensitive() {
        assert_eq!("Alice".parse::<OwnerIdentity>().unwrap(), OwnerIdentity::Alice);
        assert!("mallory".parse::<OwnerIdentity>().is_err());
    }

    #[test]
    fn test_escalation_is_max() {
        let level = PrivacyLevel::Personal;
        assert_eq!(level.max(PrivacyLevel::Restricted), PrivacyLevel::Restricted);
        // Escalation never lowers.
        assert_eq!(PrivacyLevel::Blocked.max(PrivacyLevel::Personal), PrivacyLevel::Blocked);
    }
}
