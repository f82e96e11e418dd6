//! Room - one live presentation session
//!
//! A room stores only its own fields. Its presenter, screens and spectators
//! are derived on demand by querying the participant registries for
//! entities carrying the room's code.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::keynote::Keynote;
use crate::ids::Snowflake;
use crate::room_code;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Room {
    pub identifier: Snowflake,
    pub room_code: String,
    pub keynote: Option<Keynote>,
    pub current_frame: i32,
    pub show_spectator_qr: bool,
    /// Spectator currently allowed to turn pages
    pub temp_control_spectator_id: Option<Snowflake>,
}

/// Clamp a requested page into `[0, total_frames]`.
///
/// Pages arrive as any integer the client sends, so the input is wider
/// than a frame index.
pub fn clamp_frame(page: i64, total_frames: i32) -> i32 {
    let upper = total_frames.max(0);
    // Within [0, upper], so it fits back into i32
    page.clamp(0, i64::from(upper)) as i32
}

impl Room {
    pub fn new(identifier: Snowflake, room_code: String) -> Self {
        Self {
            identifier,
            room_code,
            keynote: None,
            current_frame: 0,
            show_spectator_qr: false,
            temp_control_spectator_id: None,
        }
    }

    /// Creation instant, taken from the identifier's timestamp bits
    pub fn created_at(&self) -> DateTime<Utc> {
        self.identifier.timestamp()
    }

    pub fn total_frames(&self) -> Option<i32> {
        self.keynote.as_ref().map(|k| k.total_frames)
    }

    /// Assign a keynote.
    ///
    /// Switching to a different deck restarts at frame 0; re-assigning the
    /// same deck keeps the position, clamped to its (possibly changed) size.
    pub fn assign_keynote(&mut self, keynote: Keynote) {
        let same_deck = self.keynote.as_ref().is_some_and(|k| k.id == keynote.id);
        self.current_frame = if same_deck {
            clamp_frame(i64::from(self.current_frame), keynote.total_frames)
        } else {
            0
        };
        self.keynote = Some(keynote);
    }

    /// Move to `page`, clamped. Returns false if no keynote is assigned.
    pub fn set_page(&mut self, page: i64) -> bool {
        match self.total_frames() {
            Some(total) => {
                self.current_frame = clamp_frame(page, total);
                true
            }
            None => false,
        }
    }

    /// Toggle the spectator QR overlay. Returns false if no keynote is assigned.
    pub fn set_show_spectator_qr(&mut self, show: bool) -> bool {
        if self.keynote.is_none() {
            return false;
        }
        self.show_spectator_qr = show;
        true
    }

    pub fn has_temp_control(&self, spectator: Snowflake) -> bool {
        self.temp_control_spectator_id == Some(spectator)
    }
}

impl Entity for Room {
    fn with_identifier(id: Snowflake) -> Self {
        Room::new(id, room_code::generate(room_code::DEFAULT_ROOM_CODE_LENGTH))
    }

    fn identifier(&self) -> Snowflake {
        self.identifier
    }

    fn room_code(&self) -> &str {
        &self.room_code
    }

    fn set_room_code(&mut self, code: String) {
        self.room_code = code;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room() -> Room {
        Room::new(Snowflake::from_raw(1), "ABC123".to_string())
    }

    #[test]
    fn test_clamp_frame() {
        for total in [0, 1, 10] {
            for page in [-5, -1, 0, 3, 10, 15, i64::from(i32::MAX), i64::from(i32::MIN)] {
                assert_eq!(i64::from(clamp_frame(page, total)), page.min(i64::from(total)).max(0));
            }
        }
        assert_eq!(clamp_frame(15, 10), 10);
        assert_eq!(clamp_frame(-3, 10), 0);
        assert_eq!(clamp_frame(3_000_000_000, 10), 10);
        assert_eq!(clamp_frame(i64::MIN, 10), 0);
    }

    #[test]
    fn test_set_page_without_keynote_is_noop() {
        let mut room = room();
        room.current_frame = 4;
        assert!(!room.set_page(2));
        assert_eq!(room.current_frame, 4);
        assert!(!room.set_show_spectator_qr(true));
        assert!(!room.show_spectator_qr);
    }

    #[test]
    fn test_new_keynote_resets_frame() {
        let mut room = room();
        room.assign_keynote(Keynote::new(1, 10));
        assert!(room.set_page(7));
        room.assign_keynote(Keynote::new(2, 20));
        assert_eq!(room.current_frame, 0);
    }

    #[test]
    fn test_same_keynote_keeps_frame_clamped() {
        let mut room = room();
        room.assign_keynote(Keynote::new(1, 10));
        room.set_page(7);
        room.assign_keynote(Keynote::new(1, 10));
        assert_eq!(room.current_frame, 7);
        room.assign_keynote(Keynote::new(1, 5));
        assert_eq!(room.current_frame, 5);
    }
}
