//! Shared participant shape
//!
//! Presenters, screens and spectators all carry the same presence fields:
//! which room they joined, whether a live connection backs them, and when
//! that connection went away.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ids::Snowflake;

/// Opaque handle of one live connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anything stored in an entity registry
pub trait Entity: Clone + Send + Sync + 'static {
    /// Build a blank entity keyed by `id`
    fn with_identifier(id: Snowflake) -> Self;

    fn identifier(&self) -> Snowflake;

    /// Room code currently joined, empty if none
    fn room_code(&self) -> &str;

    fn set_room_code(&mut self, code: String);
}

/// An entity backed by client connections
pub trait Participant: Entity {
    fn presence(&self) -> &Presence;

    fn presence_mut(&mut self) -> &mut Presence;
}

/// Connection lifecycle fields shared by every participant kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presence {
    pub identifier: Snowflake,
    pub room_code: String,
    pub is_connected: bool,
    pub connection_id: Option<ConnectionId>,
    pub disconnected_at: Option<DateTime<Utc>>,
}

impl Presence {
    pub fn new(identifier: Snowflake) -> Self {
        Self {
            identifier,
            room_code: String::new(),
            is_connected: false,
            connection_id: None,
            disconnected_at: None,
        }
    }

    pub fn has_room(&self) -> bool {
        !self.room_code.is_empty()
    }

    /// Transition to connected on `connection`
    pub fn mark_connected(&mut self, connection: ConnectionId) {
        self.is_connected = true;
        self.connection_id = Some(connection);
        self.disconnected_at = None;
    }

    pub fn mark_disconnected(&mut self, at: DateTime<Utc>) {
        self.is_connected = false;
        self.disconnected_at = Some(at);
    }

    /// Disconnected before `cutoff`
    pub fn is_stale(&self, cutoff: DateTime<Utc>) -> bool {
        !self.is_connected && self.disconnected_at.is_some_and(|at| at < cutoff)
    }

    /// Connected, or disconnected after `cutoff`
    pub fn is_active(&self, cutoff: DateTime<Utc>) -> bool {
        self.is_connected || self.disconnected_at.is_some_and(|at| at > cutoff)
    }
}

/// Implements [`Entity`] and [`Participant`] for a struct with a `presence` field
macro_rules! impl_participant {
    ($ty:ty) => {
        impl $crate::models::Entity for $ty {
            fn with_identifier(id: $crate::ids::Snowflake) -> Self {
                <$ty>::new(id)
            }

            fn identifier(&self) -> $crate::ids::Snowflake {
                self.presence.identifier
            }

            fn room_code(&self) -> &str {
                &self.presence.room_code
            }

            fn set_room_code(&mut self, code: String) {
                self.presence.room_code = code;
            }
        }

        impl $crate::models::Participant for $ty {
            fn presence(&self) -> &$crate::models::Presence {
                &self.presence
            }

            fn presence_mut(&mut self) -> &mut $crate::models::Presence {
                &mut self.presence
            }
        }
    };
}

pub(crate) use impl_participant;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_connect_clears_disconnect_stamp() {
        let mut presence = Presence::new(Snowflake::from_raw(1));
        presence.mark_disconnected(Utc::now());
        presence.mark_connected(ConnectionId::new());
        assert!(presence.is_connected);
        assert!(presence.disconnected_at.is_none());
    }

    #[test]
    fn test_staleness_window() {
        let now = Utc::now();
        let cutoff = now - Duration::hours(24);

        let mut recent = Presence::new(Snowflake::from_raw(1));
        recent.mark_disconnected(now - Duration::hours(23));
        assert!(!recent.is_stale(cutoff));
        assert!(recent.is_active(cutoff));

        let mut old = Presence::new(Snowflake::from_raw(2));
        old.mark_disconnected(now - Duration::hours(25));
        assert!(old.is_stale(cutoff));
        assert!(!old.is_active(cutoff));
    }

    #[test]
    fn test_never_connected_is_neither_stale_nor_active() {
        let presence = Presence::new(Snowflake::from_raw(1));
        let cutoff = Utc::now();
        assert!(!presence.is_stale(cutoff));
        assert!(!presence.is_active(cutoff));
    }
}
