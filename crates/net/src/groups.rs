//! Channel group spaces
//!
//! Each connection kind has its own independent space of named groups.
//! A room's connections join the group named by the room identifier in
//! whichever space matches their kind, so reaching everyone in a room
//! means addressing all three spaces.

use std::collections::HashSet;

use dashmap::DashMap;
use podium_core::ConnectionId;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::protocol::{ConnectionKind, ServerFrame};

/// Outbound queue of one live connection
pub type FrameSender = mpsc::Sender<ServerFrame>;

/// Named groups of live connections of a single kind
pub struct GroupSpace {
    kind: ConnectionKind,
    connections: DashMap<ConnectionId, FrameSender>,
    groups: DashMap<String, HashSet<ConnectionId>>,
}

impl GroupSpace {
    pub fn new(kind: ConnectionKind) -> Self {
        Self {
            kind,
            connections: DashMap::new(),
            groups: DashMap::new(),
        }
    }

    pub fn kind(&self) -> ConnectionKind {
        self.kind
    }

    /// Register a connection's outbound queue
    pub fn register(&self, connection: ConnectionId, tx: FrameSender) {
        self.connections.insert(connection, tx);
    }

    /// Drop a connection and its membership in every group
    pub fn unregister(&self, connection: ConnectionId) {
        self.connections.remove(&connection);
        self.groups.retain(|_, members| {
            members.remove(&connection);
            !members.is_empty()
        });
    }

    pub fn is_registered(&self, connection: ConnectionId) -> bool {
        self.connections.contains_key(&connection)
    }

    pub fn add_to_group(&self, connection: ConnectionId, group: &str) {
        self.groups
            .entry(group.to_string())
            .or_default()
            .insert(connection);
        debug!(kind = %self.kind, connection = %connection, group = %group, "Joined group");
    }

    pub fn remove_from_group(&self, connection: ConnectionId, group: &str) {
        self.groups.remove_if_mut(group, |_, members| {
            members.remove(&connection);
            members.is_empty()
        });
        debug!(kind = %self.kind, connection = %connection, group = %group, "Left group");
    }

    /// Current members of `group`
    pub fn members(&self, group: &str) -> Vec<ConnectionId> {
        self.groups
            .get(group)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, connection: ConnectionId, group: &str) -> bool {
        self.groups
            .get(group)
            .is_some_and(|members| members.contains(&connection))
    }

    /// Queue `frame` for every member of `group`.
    ///
    /// Never waits on a destination: a full or closed queue is skipped
    /// and the others still receive the frame. Returns how many queues
    /// accepted it.
    pub fn send_to_group(&self, group: &str, frame: &ServerFrame) -> usize {
        // Collect senders first so no map guard is held while queueing
        let targets: Vec<(ConnectionId, FrameSender)> = self
            .members(group)
            .into_iter()
            .filter_map(|id| self.connections.get(&id).map(|tx| (id, tx.value().clone())))
            .collect();

        targets
            .into_iter()
            .filter(|(id, tx)| self.offer(*id, tx, frame.clone()))
            .count()
    }

    /// Queue `frame` for one connection; false if it is gone or backed up
    pub fn send_to(&self, connection: ConnectionId, frame: ServerFrame) -> bool {
        let Some(tx) = self.connections.get(&connection).map(|tx| tx.value().clone()) else {
            return false;
        };
        self.offer(connection, &tx, frame)
    }

    fn offer(&self, connection: ConnectionId, tx: &FrameSender, frame: ServerFrame) -> bool {
        match tx.try_send(frame) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                debug!(kind = %self.kind, connection = %connection, "Skipping frame for slow connection");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(kind = %self.kind, connection = %connection, "Dropped frame for closed connection");
                false
            }
        }
    }
}

/// The three group spaces of the real-time surface
pub struct ChannelGroups {
    pub presenter: GroupSpace,
    pub screen: GroupSpace,
    pub spectator: GroupSpace,
}

impl ChannelGroups {
    pub fn new() -> Self {
        Self {
            presenter: GroupSpace::new(ConnectionKind::Presenter),
            screen: GroupSpace::new(ConnectionKind::Screen),
            spectator: GroupSpace::new(ConnectionKind::Spectator),
        }
    }

    pub fn space(&self, kind: ConnectionKind) -> &GroupSpace {
        match kind {
            ConnectionKind::Presenter => &self.presenter,
            ConnectionKind::Screen => &self.screen,
            ConnectionKind::Spectator => &self.spectator,
        }
    }
}

impl Default for ChannelGroups {
    fn default() -> Self {
        Self::new()
    }
}
