//! Presenter identity resolution
//!
//! Authentication happens upstream. The engine only needs to map the
//! credential a presenter connects with to a user and a stable login
//! session id, which becomes the presenter's entity identifier.

use std::collections::HashMap;

use podium_core::config::IdentityEntry;
use podium_core::{AuthenticatedUser, Snowflake, SnowflakeGenerator};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIdentity {
    pub user: AuthenticatedUser,
    /// Stable across reconnects of the same login
    pub session_id: Snowflake,
}

pub trait IdentityResolver: Send + Sync {
    /// Resolve a presenter credential; `None` if it is not recognised
    fn resolve(&self, credential: &str) -> Option<ResolvedIdentity>;
}

/// Fixed token table loaded from configuration
#[derive(Default)]
pub struct StaticIdentities {
    by_token: HashMap<String, ResolvedIdentity>,
}

impl StaticIdentities {
    /// Entries without a session id get one generated now
    pub fn from_entries(entries: &[IdentityEntry], ids: &SnowflakeGenerator) -> Self {
        let by_token = entries
            .iter()
            .map(|entry| {
                let identity = ResolvedIdentity {
                    user: entry.user(),
                    session_id: entry.session_id.unwrap_or_else(|| ids.generate()),
                };
                (entry.token.clone(), identity)
            })
            .collect();
        Self { by_token }
    }

    pub fn insert(&mut self, token: impl Into<String>, identity: ResolvedIdentity) {
        self.by_token.insert(token.into(), identity);
    }

    pub fn len(&self) -> usize {
        self.by_token.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_token.is_empty()
    }
}

impl IdentityResolver for StaticIdentities {
    fn resolve(&self, credential: &str) -> Option<ResolvedIdentity> {
        self.by_token.get(credential).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(token: &str, session_id: Option<Snowflake>) -> IdentityEntry {
        IdentityEntry {
            token: token.to_string(),
            user_id: format!("user-{}", token),
            name: Some("Ada".to_string()),
            email: None,
            session_id,
        }
    }

    #[test]
    fn test_resolves_known_tokens_only() {
        let ids = SnowflakeGenerator::default();
        let identities = StaticIdentities::from_entries(
            &[entry("a", Some(Snowflake::from_raw(77))), entry("b", None)],
            &ids,
        );

        let a = identities.resolve("a").unwrap();
        assert_eq!(a.session_id, Snowflake::from_raw(77));
        assert_eq!(a.user.id, "user-a");

        // Generated session ids stay fixed for the life of the table
        let b1 = identities.resolve("b").unwrap();
        let b2 = identities.resolve("b").unwrap();
        assert_eq!(b1.session_id, b2.session_id);

        assert!(identities.resolve("c").is_none());
        assert_eq!(identities.len(), 2);
    }
}
