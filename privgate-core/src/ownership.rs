// privgate-core/src/ownership.rs
//! Maps file paths and metadata hints to owner identities.
//!
//! Resolution is deterministic and total: a metadata `owner_hint` naming a
//! known identity wins outright; otherwise configured path fragments are
//! tried in priority order; anything else is `Unknown`. No I/O, no side
//! effects beyond the in-memory table.
//!
//! License: MIT OR Apache-2.0

use log::debug;

use crate::config::OwnershipRule;
use crate::levels::OwnerIdentity;

#[derive(Debug, Clone)]
struct CompiledOwnerRule {
    owner: OwnerIdentity,
    fragment_lower: String,
    priority: i32,
}

/// Table-driven owner resolution.
#[derive(Debug, Clone)]
pub struct OwnershipResolver {
    /// Sorted by (priority desc, fragment length desc) so the first match is
    /// the winner under the standard tie-break discipline.
    rules: Vec<CompiledOwnerRule>,
}

impl OwnershipResolver {
    pub fn from_rules(rules: &[OwnershipRule]) -> Self {
        let mut compiled: Vec<CompiledOwnerRule> = rules
            .iter()
            .map(|r| CompiledOwnerRule {
                owner: r.owner,
                fragment_lower: r.prefix.to_lowercase(),
                priority: r.priority,
            })
            .collect();
        compiled.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| b.fragment_lower.len().cmp(&a.fragment_lower.len()))
        });
        Self { rules: compiled }
    }

    /// Resolves the owner of `path`.
    ///
    /// `owner_hint` comes from ingest metadata (e.g., the share credentials
    /// the file was read with) and short-circuits path matching when it names
    /// a concrete identity; an `unknown` hint carries no information and
    /// falls through to the path rules. Fragments match case-insensitively
    /// anywhere in the path, since user directories appear under varying
    /// share roots.
    pub fn resolve(&self, path: &str, owner_hint: Option<&str>) -> OwnerIdentity {
        if let Some(hint) = owner_hint {
            match hint.parse::<OwnerIdentity>() {
                Ok(OwnerIdentity::Unknown) => {}
                Ok(owner) => return owner,
                Err(_) => debug!("Ignoring unrecognized owner hint '{hint}' for {path}"),
            }
        }

        let path_lower = path.to_lowercase();
        for rule in &self.rules {
            if path_lower.contains(&rule.fragment_lower) {
                return rule.owner;
            }
        }

        OwnerIdentity::Unknown
    }
}
