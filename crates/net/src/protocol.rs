//! Network protocol message types
//!
//! All frames are JSON-serialized and length-prefixed on the wire. A
//! connection opens with either `Bootstrap` (obtain a session and close)
//! or `Connect` (join as one connection kind), then exchanges `Invoke` /
//! `Completion` pairs while the server pushes `Event`s.

use std::fmt;

use podium_core::{SessionGrant, Snowflake};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Event carrying a full room snapshot
pub const REFRESH_EVENT: &str = "Refresh";

/// Event delivering a room code to a waiting screen
pub const ROOM_CODE_EVENT: &str = "RoomCode";

/// Which real-time surface a connection uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    Presenter,
    Screen,
    Spectator,
}

impl ConnectionKind {
    pub const ALL: [ConnectionKind; 3] = [
        ConnectionKind::Presenter,
        ConnectionKind::Screen,
        ConnectionKind::Spectator,
    ];
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionKind::Presenter => "presenter",
            ConnectionKind::Screen => "screen",
            ConnectionKind::Spectator => "spectator",
        };
        f.write_str(name)
    }
}

/// Operations a client can invoke.
///
/// Identifiers travel as strings; a malformed one makes the call a no-op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method")]
pub enum Request {
    // Shared
    Me,
    GetCurrentRoom,
    SetPage { page: i64 },

    // Presenter
    CreateRoom,
    SetKeynote { keynote_id: String },
    #[serde(rename = "SetShowSpectatorQR")]
    SetShowSpectatorQr { show: bool },
    GiveTempControl { spectator_id: String },
    TakeTempControl,
    RemoveSpectator { identifier: String },
    RemoveScreen { identifier: String },
    SetPresentorName { name: String },
    SendRoomCodeToScreen { room_code: String, screen_identifier: String },

    // Screen
    WaitRoomAsScreen,
    JoinRoomAsScreen { room_code: String },
    LeaveRoom,

    // Spectator
    SetName { name: String },
    JoinRoom { room_code: String },
    RaiseHand,
    LowerHand,
}

impl Request {
    /// Whether a connection of `kind` exposes this operation
    pub fn allowed_for(&self, kind: ConnectionKind) -> bool {
        use ConnectionKind::*;
        match self {
            Request::Me | Request::GetCurrentRoom | Request::SetPage { .. } => true,
            Request::CreateRoom
            | Request::SetKeynote { .. }
            | Request::SetShowSpectatorQr { .. }
            | Request::GiveTempControl { .. }
            | Request::TakeTempControl
            | Request::RemoveSpectator { .. }
            | Request::RemoveScreen { .. }
            | Request::SetPresentorName { .. }
            | Request::SendRoomCodeToScreen { .. } => kind == Presenter,
            Request::WaitRoomAsScreen
            | Request::JoinRoomAsScreen { .. }
            | Request::LeaveRoom => kind == Screen,
            Request::SetName { .. }
            | Request::JoinRoom { .. }
            | Request::RaiseHand
            | Request::LowerHand => kind == Spectator,
        }
    }
}

/// Frames sent by clients
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientFrame {
    /// Obtain a screen or spectator session, then close
    Bootstrap { kind: ConnectionKind },

    /// Open a live connection. `credential` is the bearer token for
    /// presenters and the session identifier for screens and spectators.
    Connect {
        kind: ConnectionKind,
        credential: String,
    },

    /// Call an operation. `request` is decoded per call so a malformed
    /// one fails that call alone.
    Invoke { call_id: u64, request: Value },

    /// Ping to keep connection alive
    Ping,
}

/// Frames sent by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerFrame {
    /// Connect accepted
    Connected {
        kind: ConnectionKind,
        identifier: Snowflake,
    },

    /// Screen or spectator connected without a bootstrapped session
    SessionRequired,

    /// Answer to `Bootstrap`
    SessionGranted { grant: SessionGrant },

    /// Connect refused for another reason
    Rejected { reason: String },

    /// Result of an `Invoke`; `null` when nothing changed
    Completion { call_id: u64, result: Value },

    /// Server-pushed named event
    Event { name: String, args: Vec<Value> },

    /// Pong response to ping
    Pong,
}
