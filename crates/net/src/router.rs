//! Broadcast router
//!
//! Fans a room event out to the group named by the room identifier in
//! every connection-kind space. Queueing never waits on a destination, so
//! a slow or failed connection never affects the others or the caller.

use std::sync::Arc;

use podium_core::{Registries, RoomSnapshot, Snowflake};
use serde_json::Value;
use tracing::{debug, warn};

use crate::groups::ChannelGroups;
use crate::protocol::{ConnectionKind, ServerFrame, REFRESH_EVENT};

pub struct BroadcastRouter {
    registries: Arc<Registries>,
    groups: Arc<ChannelGroups>,
    default_presenter_name: String,
}

impl BroadcastRouter {
    pub fn new(
        registries: Arc<Registries>,
        groups: Arc<ChannelGroups>,
        default_presenter_name: impl Into<String>,
    ) -> Self {
        Self {
            registries,
            groups,
            default_presenter_name: default_presenter_name.into(),
        }
    }

    pub fn groups(&self) -> &Arc<ChannelGroups> {
        &self.groups
    }

    pub fn default_presenter_name(&self) -> &str {
        &self.default_presenter_name
    }

    /// Point-in-time snapshot of room `room_id`
    pub fn snapshot(&self, room_id: Snowflake) -> Option<RoomSnapshot> {
        let room = self.registries.rooms.get_by_id(room_id)?;
        Some(self.registries.snapshot(&room, &self.default_presenter_name))
    }

    /// Push a `Refresh` with the room's snapshot to all of its connections
    pub fn broadcast_room(&self, room_id: Snowflake) -> Option<RoomSnapshot> {
        let snapshot = self.snapshot(room_id)?;
        let payload = match serde_json::to_value(&snapshot) {
            Ok(value) => value,
            Err(e) => {
                warn!(room = %room_id, error = %e, "Failed to encode room snapshot");
                return None;
            }
        };
        self.send_event(room_id, REFRESH_EVENT, vec![payload]);
        Some(snapshot)
    }

    pub fn broadcast_room_by_code(&self, room_code: &str) -> Option<RoomSnapshot> {
        let room = self.registries.rooms.get_by_room_code(room_code)?;
        self.broadcast_room(room.identifier)
    }

    /// Send a named event to room `room_id` across all group spaces.
    ///
    /// Returns the number of connections that accepted it.
    pub fn send_event(&self, room_id: Snowflake, name: &str, args: Vec<Value>) -> usize {
        let group = room_id.to_string();
        let frame = ServerFrame::Event {
            name: name.to_string(),
            args,
        };

        let presenters = self.groups.presenter.send_to_group(&group, &frame);
        let screens = self.groups.screen.send_to_group(&group, &frame);
        let spectators = self.groups.spectator.send_to_group(&group, &frame);

        debug!(
            room = %room_id,
            event = name,
            presenters,
            screens,
            spectators,
            "Event fanned out"
        );
        presenters + screens + spectators
    }

    /// Send a named event to one group of one connection kind
    pub fn send_to_group(
        &self,
        kind: ConnectionKind,
        group: &str,
        name: &str,
        args: Vec<Value>,
    ) -> usize {
        let frame = ServerFrame::Event {
            name: name.to_string(),
            args,
        };
        self.groups.space(kind).send_to_group(group, &frame)
    }
}
