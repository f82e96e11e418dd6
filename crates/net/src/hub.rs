//! Hub - the composed real-time engine
//!
//! Owns one instance of every service and routes invoked requests to the
//! room state machine. Every registry and collaborator is passed in; the
//! hub holds no global state.

use std::sync::Arc;

use podium_core::config::ReaperConfig;
use podium_core::{
    Config, ConnectionId, IdleReaper, KeynoteLookup, Registries, SessionBootstrap, SessionGrant,
    Snowflake,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::groups::{ChannelGroups, FrameSender};
use crate::identity::IdentityResolver;
use crate::presence::PresenceCoordinator;
use crate::protocol::{ConnectionKind, Request};
use crate::rooms::{Caller, RoomService};
use crate::router::BroadcastRouter;

/// Tunables the hub needs from configuration
#[derive(Debug, Clone)]
pub struct HubSettings {
    pub code_length: usize,
    pub default_presenter_name: String,
    pub reaper: ReaperConfig,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for HubSettings {
    fn from(config: &Config) -> Self {
        Self {
            code_length: config.rooms.code_length,
            default_presenter_name: config.rooms.default_presenter_name.clone(),
            reaper: config.reaper.clone(),
        }
    }
}

pub struct Hub {
    registries: Arc<Registries>,
    groups: Arc<ChannelGroups>,
    router: Arc<BroadcastRouter>,
    presence: PresenceCoordinator,
    rooms: RoomService,
    sessions: SessionBootstrap,
    reaper: Arc<IdleReaper>,
}

impl Hub {
    pub fn new(
        registries: Arc<Registries>,
        keynotes: Arc<dyn KeynoteLookup>,
        identities: Arc<dyn IdentityResolver>,
        settings: HubSettings,
    ) -> Self {
        let groups = Arc::new(ChannelGroups::new());
        let router = Arc::new(BroadcastRouter::new(
            registries.clone(),
            groups.clone(),
            settings.default_presenter_name,
        ));
        let reaper = Arc::new(IdleReaper::new(registries.clone(), settings.reaper));

        Self {
            presence: PresenceCoordinator::new(
                registries.clone(),
                router.clone(),
                identities,
                reaper.clone(),
            ),
            rooms: RoomService::new(
                registries.clone(),
                router.clone(),
                keynotes,
                settings.code_length,
            ),
            sessions: SessionBootstrap::new(registries.clone()),
            registries,
            groups,
            router,
            reaper,
        }
    }

    pub fn registries(&self) -> &Arc<Registries> {
        &self.registries
    }

    pub fn router(&self) -> &Arc<BroadcastRouter> {
        &self.router
    }

    pub fn rooms(&self) -> &RoomService {
        &self.rooms
    }

    pub fn reaper(&self) -> &Arc<IdleReaper> {
        &self.reaper
    }

    /// Create a screen or spectator session ahead of its connection
    pub fn bootstrap(&self, kind: ConnectionKind) -> Option<SessionGrant> {
        match kind {
            ConnectionKind::Screen => Some(self.sessions.create_screen()),
            ConnectionKind::Spectator => Some(self.sessions.create_spectator()),
            ConnectionKind::Presenter => None,
        }
    }

    /// Register `tx` and attach the connection to its entity.
    ///
    /// On `None` the connection is left unregistered.
    pub fn connect(
        &self,
        kind: ConnectionKind,
        connection: ConnectionId,
        credential: &str,
        tx: FrameSender,
    ) -> Option<Caller> {
        let space = self.groups.space(kind);
        space.register(connection, tx);

        match self.presence.connect(kind, connection, credential) {
            Some(identifier) => Some(Caller::new(kind, connection, identifier)),
            None => {
                space.unregister(connection);
                None
            }
        }
    }

    /// Run the disconnect path for a connection that attached as `caller`
    pub fn disconnect(&self, caller: &Caller) -> Option<Snowflake> {
        self.rooms.forget(caller);
        self.groups.space(caller.kind).unregister(caller.connection);
        self.presence.disconnect(caller.kind, caller.connection)
    }

    /// Decode a raw invocation payload and dispatch it.
    ///
    /// A payload naming no known operation, or carrying arguments of the
    /// wrong shape, yields `null` like any other failed precondition.
    pub async fn invoke(&self, caller: &Caller, payload: Value) -> Value {
        match serde_json::from_value::<Request>(payload) {
            Ok(request) => self.dispatch(caller, request).await,
            Err(e) => {
                debug!(kind = %caller.kind, error = %e, "Malformed request");
                Value::Null
            }
        }
    }

    /// Execute `request` for `caller`.
    ///
    /// Yields JSON `null` when the request is not exposed to the caller's
    /// kind or its preconditions fail.
    pub async fn dispatch(&self, caller: &Caller, request: Request) -> Value {
        if !request.allowed_for(caller.kind) {
            debug!(kind = %caller.kind, request = ?request, "Request not available to connection kind");
            return Value::Null;
        }

        let rooms = &self.rooms;
        match request {
            Request::Me => match caller.kind {
                ConnectionKind::Presenter => to_json(rooms.presenter_me(caller)),
                ConnectionKind::Screen => to_json(rooms.screen_me(caller)),
                ConnectionKind::Spectator => to_json(rooms.spectator_me(caller)),
            },
            Request::GetCurrentRoom => to_json(rooms.current_room(caller)),
            Request::SetPage { page } => to_json(rooms.set_page(caller, page)),

            Request::CreateRoom => to_json(rooms.create_room(caller)),
            Request::SetKeynote { keynote_id } => {
                to_json(rooms.set_keynote(caller, &keynote_id).await)
            }
            Request::SetShowSpectatorQr { show } => {
                to_json(rooms.set_show_spectator_qr(caller, show))
            }
            Request::GiveTempControl { spectator_id } => {
                to_json(rooms.give_temp_control(caller, &spectator_id))
            }
            Request::TakeTempControl => to_json(rooms.take_temp_control(caller)),
            Request::RemoveSpectator { identifier } => {
                to_json(rooms.remove_spectator(caller, &identifier))
            }
            Request::RemoveScreen { identifier } => {
                to_json(rooms.remove_screen(caller, &identifier))
            }
            Request::SetPresentorName { name } => {
                to_json(rooms.set_presenter_name(caller, &name))
            }
            Request::SendRoomCodeToScreen {
                room_code,
                screen_identifier,
            } => to_json(
                rooms
                    .send_room_code_to_screen(caller, &room_code, &screen_identifier),
            ),

            Request::WaitRoomAsScreen => to_json(rooms.wait_room_as_screen(caller)),
            Request::JoinRoomAsScreen { room_code } => {
                to_json(rooms.join_room_as_screen(caller, &room_code))
            }
            Request::LeaveRoom => to_json(rooms.leave_room(caller)),

            Request::SetName { name } => to_json(rooms.set_name(caller, &name)),
            Request::JoinRoom { room_code } => to_json(rooms.join_room(caller, &room_code)),
            Request::RaiseHand => to_json(rooms.raise_hand(caller)),
            Request::LowerHand => to_json(rooms.lower_hand(caller)),
        }
    }
}

fn to_json<T: Serialize>(result: Option<T>) -> Value {
    match result.map(serde_json::to_value) {
        Some(Ok(value)) => value,
        Some(Err(e)) => {
            warn!(error = %e, "Failed to encode completion");
            Value::Null
        }
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ResolvedIdentity, StaticIdentities};
    use crate::protocol::{ServerFrame, ROOM_CODE_EVENT};
    use podium_core::{AuthenticatedUser, Keynote, StaticKeynotes};
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::mpsc;

    fn hub() -> Hub {
        let mut identities = StaticIdentities::default();
        identities.insert(
            "secret",
            ResolvedIdentity {
                user: AuthenticatedUser {
                    id: "u-1".to_string(),
                    name: None,
                    email: None,
                },
                session_id: Snowflake::from_raw(99),
            },
        );
        Hub::new(
            Arc::new(Registries::default()),
            Arc::new(StaticKeynotes::with_keynotes([Keynote::new(42, 10)])),
            Arc::new(identities),
            HubSettings::default(),
        )
    }

    #[tokio::test]
    async fn test_disallowed_request_is_null() {
        let hub = hub();
        let grant = hub.bootstrap(ConnectionKind::Spectator).unwrap();
        let (tx, _rx) = mpsc::channel(8);
        let caller = hub
            .connect(
                ConnectionKind::Spectator,
                ConnectionId::new(),
                &grant.identifier.to_string(),
                tx,
            )
            .unwrap();

        assert_eq!(hub.dispatch(&caller, Request::CreateRoom).await, Value::Null);
        assert!(hub.registries().rooms.is_empty());

        let me = hub.dispatch(&caller, Request::Me).await;
        assert_eq!(me["identifier"], grant.identifier.to_string());
    }

    #[test]
    fn test_presenter_cannot_bootstrap() {
        assert!(hub().bootstrap(ConnectionKind::Presenter).is_none());
    }

    #[test]
    fn test_rejected_connect_leaves_no_registration() {
        let hub = hub();
        let (tx, _rx) = mpsc::channel(8);
        let connection = ConnectionId::new();
        assert!(hub
            .connect(ConnectionKind::Screen, connection, "404", tx)
            .is_none());
        assert!(!hub.groups.screen.is_registered(connection));
    }

    #[tokio::test]
    async fn test_dispatch_drives_room() {
        let hub = hub();
        let (tx, _rx) = mpsc::channel(32);
        let presenter = hub
            .connect(ConnectionKind::Presenter, ConnectionId::new(), "secret", tx)
            .unwrap();

        let room = hub.dispatch(&presenter, Request::CreateRoom).await;
        assert!(room["roomCode"].is_string());
        hub.dispatch(
            &presenter,
            Request::SetKeynote {
                keynote_id: "42".to_string(),
            },
        )
        .await;
        let paged = hub.dispatch(&presenter, Request::SetPage { page: 15 }).await;
        assert_eq!(paged["currentFrame"], 10);

        assert_eq!(hub.disconnect(&presenter), Some(presenter.identifier));
        let stored = hub
            .registries()
            .presenters
            .get_by_id(presenter.identifier)
            .unwrap();
        assert!(!stored.presence.is_connected);
    }

    async fn presenter_with_deck(hub: &Hub) -> (Caller, String) {
        let (tx, _rx) = mpsc::channel(256);
        let presenter = hub
            .connect(ConnectionKind::Presenter, ConnectionId::new(), "secret", tx)
            .unwrap();
        let room = hub.dispatch(&presenter, Request::CreateRoom).await;
        hub.dispatch(
            &presenter,
            Request::SetKeynote {
                keynote_id: "42".to_string(),
            },
        )
        .await;
        let code = room["roomCode"].as_str().unwrap().to_string();
        (presenter, code)
    }

    #[tokio::test]
    async fn test_stalled_member_does_not_block_caller() {
        let hub = hub();
        let (presenter, code) = presenter_with_deck(&hub).await;

        // Spectator whose queue is never drained
        let grant = hub.bootstrap(ConnectionKind::Spectator).unwrap();
        let (stalled_tx, _stalled_rx) = mpsc::channel(1);
        let spectator = hub
            .connect(
                ConnectionKind::Spectator,
                ConnectionId::new(),
                &grant.identifier.to_string(),
                stalled_tx,
            )
            .unwrap();
        hub.dispatch(&spectator, Request::JoinRoom { room_code: code }).await;

        let pages = async {
            let mut last = Value::Null;
            for page in 1..=5 {
                last = hub.dispatch(&presenter, Request::SetPage { page }).await;
            }
            last
        };
        let last = tokio::time::timeout(Duration::from_secs(2), pages)
            .await
            .expect("page changes blocked on a stalled spectator");
        assert_eq!(last["currentFrame"], 5);
    }

    #[tokio::test]
    async fn test_malformed_payload_is_null() {
        let hub = hub();
        let (presenter, _) = presenter_with_deck(&hub).await;

        let unknown = hub.invoke(&presenter, json!({"method": "Teleport"})).await;
        assert_eq!(unknown, Value::Null);
        let wrong_type = hub
            .invoke(&presenter, json!({"method": "SetPage", "page": "three"}))
            .await;
        assert_eq!(wrong_type, Value::Null);

        let huge = hub
            .invoke(&presenter, json!({"method": "SetPage", "page": 3_000_000_000_i64}))
            .await;
        assert_eq!(huge["currentFrame"], 10);
        let negative = hub
            .invoke(&presenter, json!({"method": "SetPage", "page": -3_000_000_000_i64}))
            .await;
        assert_eq!(negative["currentFrame"], 0);
    }

    #[tokio::test]
    async fn test_stale_screen_disconnect_keeps_newer_wait() {
        let hub = hub();
        let (presenter, code) = presenter_with_deck(&hub).await;
        let grant = hub.bootstrap(ConnectionKind::Screen).unwrap();
        let credential = grant.identifier.to_string();

        let (old_tx, _old_rx) = mpsc::channel(8);
        let old = hub
            .connect(ConnectionKind::Screen, ConnectionId::new(), &credential, old_tx)
            .unwrap();
        let (new_tx, mut new_rx) = mpsc::channel(8);
        let current = hub
            .connect(ConnectionKind::Screen, ConnectionId::new(), &credential, new_tx)
            .unwrap();
        let token = hub.dispatch(&current, Request::WaitRoomAsScreen).await;
        assert!(token.is_string());

        // Old connection's close is noticed only now
        hub.disconnect(&old);

        let sent = hub
            .dispatch(
                &presenter,
                Request::SendRoomCodeToScreen {
                    room_code: code.clone(),
                    screen_identifier: credential,
                },
            )
            .await;
        assert_ne!(sent, Value::Null);
        match new_rx.try_recv() {
            Ok(ServerFrame::Event { name, args }) => {
                assert_eq!(name, ROOM_CODE_EVENT);
                assert_eq!(args[0], code);
            }
            other => panic!("Expected room code, got {:?}", other),
        }
    }
}
