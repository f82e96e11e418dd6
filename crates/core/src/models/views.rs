//! Client-facing views of rooms and participants

use serde::{Deserialize, Serialize};

use super::entity::ConnectionId;
use super::keynote::Keynote;
use super::presenter::Presenter;
use super::room::Room;
use super::screen::Screen;
use super::spectator::Spectator;
use super::Presence;
use crate::ids::Snowflake;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceView {
    pub identifier: Snowflake,
    pub room_code: String,
    pub is_connected: bool,
    pub connection_id: Option<ConnectionId>,
    pub disconnected_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<&Presence> for PresenceView {
    fn from(p: &Presence) -> Self {
        Self {
            identifier: p.identifier,
            room_code: p.room_code.clone(),
            is_connected: p.is_connected,
            connection_id: p.connection_id,
            disconnected_at: p.disconnected_at,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenterView {
    #[serde(flatten)]
    pub presence: PresenceView,
    pub name: String,
}

impl PresenterView {
    pub fn new(presenter: &Presenter, default_name: &str) -> Self {
        Self {
            presence: (&presenter.presence).into(),
            name: presenter.display_name(default_name),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenView {
    #[serde(flatten)]
    pub presence: PresenceView,
}

impl From<&Screen> for ScreenView {
    fn from(screen: &Screen) -> Self {
        Self {
            presence: (&screen.presence).into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpectatorView {
    #[serde(flatten)]
    pub presence: PresenceView,
    pub name: String,
    pub is_hand_raised: bool,
}

impl From<&Spectator> for SpectatorView {
    fn from(spectator: &Spectator) -> Self {
        Self {
            presence: (&spectator.presence).into(),
            name: spectator.name.clone(),
            is_hand_raised: spectator.is_hand_raised,
        }
    }
}

/// Point-in-time room state pushed with every `Refresh`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomSnapshot {
    pub identifier: Snowflake,
    pub room_code: String,
    pub keynote: Option<Keynote>,
    pub current_frame: i32,
    #[serde(rename = "showSpectatorQR")]
    pub show_spectator_qr: bool,
    pub temp_control_spectator_id: Option<Snowflake>,
    pub presentor: Option<PresenterView>,
    pub screen: Option<ScreenView>,
    pub spectators: Vec<SpectatorView>,
}

impl RoomSnapshot {
    /// Room fields only; members are filled in by the registries
    pub fn bare(room: &Room) -> Self {
        Self {
            identifier: room.identifier,
            room_code: room.room_code.clone(),
            keynote: room.keynote.clone(),
            current_frame: room.current_frame,
            show_spectator_qr: room.show_spectator_qr,
            temp_control_spectator_id: room.temp_control_spectator_id,
            presentor: None,
            screen: None,
            spectators: Vec::new(),
        }
    }
}
