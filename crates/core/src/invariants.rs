//! Developer guardrails and invariants
//!
//! Debug assertions for detecting impossible states during development.
//! These checks are compiled out in release builds.

use crate::models::{Presence, Room};

/// Validate that a room's page position fits its keynote
pub fn assert_room_invariants(room: &Room) {
    match room.total_frames() {
        Some(total) => debug_assert!(
            (0..=total).contains(&room.current_frame),
            "Room {} at frame {} outside [0, {}]",
            room.identifier,
            room.current_frame,
            total
        ),
        None => debug_assert!(
            room.current_frame >= 0,
            "Room {} has negative frame {}",
            room.identifier,
            room.current_frame
        ),
    }

    debug_assert!(
        !room.room_code.trim().is_empty(),
        "Room {} has empty code",
        room.identifier
    );
}

/// Validate that connection fields agree with the connected flag
pub fn assert_presence_invariants(presence: &Presence) {
    debug_assert!(
        !(presence.is_connected && presence.disconnected_at.is_some()),
        "Entity {} is connected but has a disconnect stamp",
        presence.identifier
    );

    debug_assert!(
        !presence.is_connected || presence.connection_id.is_some(),
        "Entity {} is connected without a connection id",
        presence.identifier
    );
}
