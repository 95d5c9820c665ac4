use std::collections::HashMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use crate::secondary_fetch::{SearchCandidate, SecondarySource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMethod {
    Alias,
    UniqueCandidate,
    BirthdateMatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum UnresolvedReason {
    NoCandidates,
    NoBirthdateMatch,
    /// Several candidates and no birth date to tell them apart.
    Ambiguous,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Resolved {
        secondary_id: u64,
        method: MatchMethod,
    },
    Unresolved(UnresolvedReason),
}

impl Resolution {
    pub fn secondary_id(&self) -> Option<u64> {
        match self {
            Resolution::Resolved { secondary_id, .. } => Some(*secondary_id),
            Resolution::Unresolved(_) => None,
        }
    }
}

/// What the primary source knows about a player.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerIdentity<'a> {
    pub full_name: Option<&'a str>,
    pub short_name: Option<&'a str>,
    pub birth_date: Option<NaiveDate>,
}

/// Search names in priority order: full name, short name, then each token of the full name.
/// Blank and repeated names are dropped.
pub fn candidate_names(full_name: Option<&str>, short_name: Option<&str>) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut push = |name: &str| {
        let name = name.trim();
        if !name.is_empty() && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
    };
    if let Some(full) = full_name {
        push(full);
    }
    if let Some(short) = short_name {
        push(short);
    }
    if let Some(full) = full_name {
        for token in full.split_whitespace() {
            push(token);
        }
    }
    names
}

pub struct IdentityReconciler<'a, S: SecondarySource + ?Sized> {
    source: &'a S,
    aliases: &'a HashMap<String, u64>,
}

impl<'a, S: SecondarySource + ?Sized> IdentityReconciler<'a, S> {
    pub fn new(source: &'a S, aliases: &'a HashMap<String, u64>) -> Self {
        Self { source, aliases }
    }

    fn alias_for(&self, identity: &PlayerIdentity<'_>) -> Option<u64> {
        [identity.full_name, identity.short_name]
            .into_iter()
            .flatten()
            .find_map(|name| self.aliases.get(name.trim()).copied())
    }

    pub fn resolve(&self, identity: &PlayerIdentity<'_>) -> Resolution {
        if let Some(secondary_id) = self.alias_for(identity) {
            return Resolution::Resolved {
                secondary_id,
                method: MatchMethod::Alias,
            };
        }

        let mut reason = UnresolvedReason::NoCandidates;
        for name in candidate_names(identity.full_name, identity.short_name) {
            let candidates = match self.source.search_players(&name) {
                Ok(candidates) => candidates,
                Err(err) => {
                    warn!(name = %name, error = %err, "secondary search failed");
                    continue;
                }
            };
            match candidates.as_slice() {
                [] => continue,
                [only] => {
                    return Resolution::Resolved {
                        secondary_id: only.id,
                        method: MatchMethod::UniqueCandidate,
                    };
                }
                many => {
                    let Some(birth_date) = identity.birth_date else {
                        debug!(name = %name, candidates = many.len(), "ambiguous name without birth date");
                        reason = reason.max(UnresolvedReason::Ambiguous);
                        continue;
                    };
                    if let Some(found) = self.first_with_birthdate(many, birth_date) {
                        return Resolution::Resolved {
                            secondary_id: found,
                            method: MatchMethod::BirthdateMatch,
                        };
                    }
                    reason = reason.max(UnresolvedReason::NoBirthdateMatch);
                }
            }
        }
        Resolution::Unresolved(reason)
    }

    fn first_with_birthdate(
        &self,
        candidates: &[SearchCandidate],
        birth_date: NaiveDate,
    ) -> Option<u64> {
        candidates.iter().find_map(|candidate| {
            match self.source.profile_birthdate(candidate) {
                Ok(Some(found)) if found == birth_date => Some(candidate.id),
                Ok(_) => None,
                Err(err) => {
                    debug!(candidate = candidate.id, error = %err, "candidate profile unavailable");
                    None
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_keep_priority_and_skip_repeats() {
        assert_eq!(
            candidate_names(Some("Son Heung-Min"), Some("H. Son")),
            vec!["Son Heung-Min", "H. Son", "Son", "Heung-Min"]
        );
        assert_eq!(candidate_names(Some("Neymar"), Some("Neymar")), vec!["Neymar"]);
        assert!(candidate_names(Some("  "), None).is_empty());
    }
}
