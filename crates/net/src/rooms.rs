//! Room state machine
//!
//! Every mutation follows the same steps: resolve the caller's entity,
//! resolve its room by the bound code, build the new value, upsert it once,
//! then broadcast. A failed precondition (unknown caller, no room, no
//! keynote, unauthorised actor, malformed id) returns `None` and changes
//! nothing.
//!
//! Read-modify-write sequences are not atomic across a room. Two concurrent
//! `set_page` calls on one room both succeed and the later upsert wins;
//! each broadcast snapshot is still internally consistent.

use std::sync::Arc;

use dashmap::DashMap;
use podium_core::{
    invariants, room_code, ConnectionId, Entity, KeynoteLookup, Presenter, PresenterView,
    Registries, Room, RoomSnapshot, Screen, ScreenView, Snowflake, Spectator, SpectatorView,
};
use tracing::{debug, info, warn};

use crate::protocol::{ConnectionKind, ROOM_CODE_EVENT};
use crate::router::BroadcastRouter;

/// Who is invoking an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub kind: ConnectionKind,
    pub connection: ConnectionId,
    /// Entity identifier bound at connect
    pub identifier: Snowflake,
}

impl Caller {
    pub fn new(kind: ConnectionKind, connection: ConnectionId, identifier: Snowflake) -> Self {
        Self {
            kind,
            connection,
            identifier,
        }
    }
}

pub struct RoomService {
    registries: Arc<Registries>,
    router: Arc<BroadcastRouter>,
    keynotes: Arc<dyn KeynoteLookup>,
    code_length: usize,
    /// Screen id -> connection waiting and the single-use group it
    /// listens on for a room code
    waiting_screens: DashMap<Snowflake, (ConnectionId, String)>,
}

impl RoomService {
    pub fn new(
        registries: Arc<Registries>,
        router: Arc<BroadcastRouter>,
        keynotes: Arc<dyn KeynoteLookup>,
        code_length: usize,
    ) -> Self {
        Self {
            registries,
            router,
            keynotes,
            code_length,
            waiting_screens: DashMap::new(),
        }
    }

    // -- caller resolution --------------------------------------------------

    fn presenter(&self, caller: &Caller) -> Option<Presenter> {
        if caller.kind != ConnectionKind::Presenter {
            return None;
        }
        self.registries.presenters.get_by_id(caller.identifier)
    }

    fn screen(&self, caller: &Caller) -> Option<Screen> {
        if caller.kind != ConnectionKind::Screen {
            return None;
        }
        self.registries.screens.get_by_id(caller.identifier)
    }

    fn spectator(&self, caller: &Caller) -> Option<Spectator> {
        if caller.kind != ConnectionKind::Spectator {
            return None;
        }
        self.registries.spectators.get_by_id(caller.identifier)
    }

    /// Room code the caller's entity is bound to
    fn bound_code(&self, caller: &Caller) -> Option<String> {
        let code = match caller.kind {
            ConnectionKind::Presenter => self.presenter(caller)?.room_code().to_string(),
            ConnectionKind::Screen => self.screen(caller)?.room_code().to_string(),
            ConnectionKind::Spectator => self.spectator(caller)?.room_code().to_string(),
        };
        (!code.is_empty()).then_some(code)
    }

    fn caller_room(&self, caller: &Caller) -> Option<Room> {
        let code = self.bound_code(caller)?;
        self.registries.rooms.get_by_room_code(&code)
    }

    fn join_group(&self, caller: &Caller, room: &Room) {
        self.router
            .groups()
            .space(caller.kind)
            .add_to_group(caller.connection, &room.identifier.to_string());
    }

    /// Leave the group of the room `code` names, if it still exists
    fn leave_group_of(&self, kind: ConnectionKind, connection: ConnectionId, code: &str) {
        if let Some(room) = self.registries.rooms.get_by_room_code(code) {
            self.router
                .groups()
                .space(kind)
                .remove_from_group(connection, &room.identifier.to_string());
        }
    }

    /// Store `room` and push the resulting snapshot to its connections
    fn commit(&self, room: Room) -> Option<RoomSnapshot> {
        invariants::assert_room_invariants(&room);
        let room = self.registries.rooms.add_or_update(room);
        self.router.broadcast_room(room.identifier)
    }

    // -- shared -------------------------------------------------------------

    /// Snapshot of the caller's current room
    pub fn current_room(&self, caller: &Caller) -> Option<RoomSnapshot> {
        let room = self.caller_room(caller)?;
        self.router.snapshot(room.identifier)
    }

    pub fn presenter_me(&self, caller: &Caller) -> Option<PresenterView> {
        let presenter = self.presenter(caller)?;
        Some(PresenterView::new(
            &presenter,
            self.router.default_presenter_name(),
        ))
    }

    pub fn screen_me(&self, caller: &Caller) -> Option<ScreenView> {
        self.screen(caller).as_ref().map(ScreenView::from)
    }

    pub fn spectator_me(&self, caller: &Caller) -> Option<SpectatorView> {
        self.spectator(caller).as_ref().map(SpectatorView::from)
    }

    /// Move the deck to `page`, clamped into `[0, totalFrames]`.
    ///
    /// Presenters and screens may always turn pages; a spectator only while
    /// holding temporary control.
    pub fn set_page(&self, caller: &Caller, page: i64) -> Option<RoomSnapshot> {
        let mut room = self.caller_room(caller)?;
        if caller.kind == ConnectionKind::Spectator && !room.has_temp_control(caller.identifier) {
            debug!(spectator = %caller.identifier, room = %room.identifier, "Page change without temp control ignored");
            return None;
        }
        if !room.set_page(page) {
            return None;
        }
        self.commit(room)
    }

    // -- presenter ----------------------------------------------------------

    /// Create a room for the presenter, or return the one it already has
    pub fn create_room(&self, caller: &Caller) -> Option<RoomSnapshot> {
        let presenter = self.presenter(caller)?;

        if let Some(existing) = self.registries.rooms.get_by_room_code(presenter.room_code()) {
            self.join_group(caller, &existing);
            return self.router.snapshot(existing.identifier);
        }

        let room = self.registries.rooms.create(self.code_length);
        self.registries
            .presenters
            .join_room(caller.identifier, &room.room_code, &self.registries.rooms)?;
        self.join_group(caller, &room);
        self.router.broadcast_room(room.identifier)
    }

    /// Assign the keynote with numeric id `keynote_id`.
    ///
    /// A different keynote restarts at frame 0; the same one keeps its
    /// position, clamped.
    pub async fn set_keynote(&self, caller: &Caller, keynote_id: &str) -> Option<RoomSnapshot> {
        self.presenter(caller)?;
        let mut room = self.caller_room(caller)?;

        let Ok(id) = keynote_id.trim().parse::<i64>() else {
            debug!(keynote = keynote_id, "Malformed keynote id");
            return None;
        };
        let keynote = match self.keynotes.keynote_by_id(id).await {
            Ok(Some(keynote)) => keynote,
            Ok(None) => {
                debug!(keynote = id, "Keynote not found");
                return None;
            }
            Err(e) => {
                warn!(keynote = id, error = %e, "Keynote lookup failed");
                return None;
            }
        };

        room.assign_keynote(keynote);
        info!(room = %room.identifier, keynote = id, "Keynote assigned");
        self.commit(room)
    }

    pub fn set_show_spectator_qr(&self, caller: &Caller, show: bool) -> Option<RoomSnapshot> {
        self.presenter(caller)?;
        let mut room = self.caller_room(caller)?;
        if !room.set_show_spectator_qr(show) {
            return None;
        }
        self.commit(room)
    }

    /// Delegate page control to a spectator of the presenter's room
    pub fn give_temp_control(
        &self,
        caller: &Caller,
        spectator_id: &str,
    ) -> Option<RoomSnapshot> {
        self.presenter(caller)?;
        let mut room = self.caller_room(caller)?;
        let spectator = self
            .registries
            .spectators
            .get_by_id(Snowflake::parse(spectator_id)?)?;
        if spectator.room_code() != room.room_code {
            debug!(spectator = %spectator.identifier(), room = %room.identifier, "Temp control target not in room");
            return None;
        }

        room.temp_control_spectator_id = Some(spectator.identifier());
        info!(room = %room.identifier, spectator = %spectator.identifier(), "Temp control given");
        self.commit(room)
    }

    pub fn take_temp_control(&self, caller: &Caller) -> Option<RoomSnapshot> {
        self.presenter(caller)?;
        let mut room = self.caller_room(caller)?;
        room.temp_control_spectator_id = None;
        self.commit(room)
    }

    /// Detach a spectator from the presenter's room.
    ///
    /// Revokes temp control if that spectator held it.
    pub fn remove_spectator(&self, caller: &Caller, identifier: &str) -> Option<RoomSnapshot> {
        self.presenter(caller)?;
        let mut room = self.caller_room(caller)?;
        let mut spectator = self
            .registries
            .spectators
            .get_by_id(Snowflake::parse(identifier)?)?;
        if spectator.room_code() != room.room_code {
            return None;
        }

        if let Some(connection) = spectator.presence.connection_id {
            self.leave_group_of(ConnectionKind::Spectator, connection, &room.room_code);
        }
        spectator.set_room_code(String::new());
        spectator.is_hand_raised = false;
        let spectator = self.registries.spectators.add_or_update(spectator);
        info!(room = %room.identifier, spectator = %spectator.identifier(), "Spectator removed");

        if room.has_temp_control(spectator.identifier()) {
            room.temp_control_spectator_id = None;
            return self.commit(room);
        }
        self.router.broadcast_room(room.identifier)
    }

    /// Detach a screen from the presenter's room
    pub fn remove_screen(&self, caller: &Caller, identifier: &str) -> Option<RoomSnapshot> {
        self.presenter(caller)?;
        let room = self.caller_room(caller)?;
        let mut screen = self
            .registries
            .screens
            .get_by_id(Snowflake::parse(identifier)?)?;
        if screen.room_code() != room.room_code {
            return None;
        }

        if let Some(connection) = screen.presence.connection_id {
            self.leave_group_of(ConnectionKind::Screen, connection, &room.room_code);
        }
        screen.set_room_code(String::new());
        let screen = self.registries.screens.add_or_update(screen);
        info!(room = %room.identifier, screen = %screen.identifier(), "Screen removed");
        self.router.broadcast_room(room.identifier)
    }

    pub fn set_presenter_name(&self, caller: &Caller, name: &str) -> Option<PresenterView> {
        let mut presenter = self.presenter(caller)?;
        presenter.name = Some(name.to_string());
        let presenter = self.registries.presenters.add_or_update(presenter);

        if let Some(room) = self.registries.rooms.get_by_room_code(presenter.room_code()) {
            self.router.broadcast_room(room.identifier);
        }
        Some(PresenterView::new(
            &presenter,
            self.router.default_presenter_name(),
        ))
    }

    /// Push the presenter's room code to a screen waiting for one
    pub fn send_room_code_to_screen(
        &self,
        caller: &Caller,
        code: &str,
        screen_identifier: &str,
    ) -> Option<RoomSnapshot> {
        self.presenter(caller)?;
        let room = self.caller_room(caller)?;
        if room.room_code != room_code::normalize(code) {
            debug!(room = %room.identifier, code = code, "Room code does not belong to presenter");
            return None;
        }

        let screen = self
            .registries
            .screens
            .get_by_id(Snowflake::parse(screen_identifier)?)?;
        let group = self
            .waiting_screens
            .get(&screen.identifier())
            .map(|entry| entry.value().1.clone())?;

        self.router.send_to_group(
            ConnectionKind::Screen,
            &group,
            ROOM_CODE_EVENT,
            vec![room.room_code.clone().into()],
        );
        debug!(room = %room.identifier, screen = %screen.identifier(), "Room code sent to screen");
        self.router.snapshot(room.identifier)
    }

    // -- screen -------------------------------------------------------------

    /// Listen on a fresh single-use group until a presenter pushes a code.
    ///
    /// Returns the group id the screen shows so the presenter can find it.
    pub fn wait_room_as_screen(&self, caller: &Caller) -> Option<String> {
        let screen = self.screen(caller)?;
        let token = self.registries.ids.generate().to_string();
        let space = self.router.groups().space(ConnectionKind::Screen);

        let waiting = (caller.connection, token.clone());
        if let Some((connection, previous)) = self.waiting_screens.insert(screen.identifier(), waiting)
        {
            space.remove_from_group(connection, &previous);
        }
        space.add_to_group(caller.connection, &token);
        Some(token)
    }

    pub fn join_room_as_screen(&self, caller: &Caller, code: &str) -> Option<RoomSnapshot> {
        let screen = self.screen(caller)?;
        let room = self
            .registries
            .rooms
            .get_by_room_code(&room_code::normalize(code))?;

        if let Some((_, (connection, token))) = self.waiting_screens.remove(&screen.identifier()) {
            self.router
                .groups()
                .screen
                .remove_from_group(connection, &token);
        }
        if screen.room_code() != room.room_code {
            self.leave_group_of(caller.kind, caller.connection, screen.room_code());
        }

        self.registries
            .screens
            .join_room(screen.identifier(), &room.room_code, &self.registries.rooms)?;
        self.join_group(caller, &room);
        info!(room = %room.identifier, screen = %screen.identifier(), "Screen joined room");
        self.router.broadcast_room(room.identifier)
    }

    /// Unbind the screen from its room; returns the room as left behind
    pub fn leave_room(&self, caller: &Caller) -> Option<RoomSnapshot> {
        let screen = self.screen(caller)?;
        let room = self.registries.rooms.get_by_room_code(screen.room_code())?;

        self.registries.screens.leave_room(screen.identifier())?;
        self.router
            .groups()
            .screen
            .remove_from_group(caller.connection, &room.identifier.to_string());
        info!(room = %room.identifier, screen = %screen.identifier(), "Screen left room");
        self.router.broadcast_room(room.identifier)
    }

    // -- spectator ----------------------------------------------------------

    /// Set the spectator's display name; refreshes its room if it has one
    pub fn set_name(&self, caller: &Caller, name: &str) -> Option<SpectatorView> {
        let mut spectator = self.spectator(caller)?;
        spectator.name = name.trim().to_string();
        let spectator = self.registries.spectators.add_or_update(spectator);

        if let Some(room) = self.registries.rooms.get_by_room_code(spectator.room_code()) {
            self.router.broadcast_room(room.identifier);
        }
        Some(SpectatorView::from(&spectator))
    }

    pub fn join_room(&self, caller: &Caller, code: &str) -> Option<RoomSnapshot> {
        let spectator = self.spectator(caller)?;
        let room = self
            .registries
            .rooms
            .get_by_room_code(&room_code::normalize(code))?;

        if spectator.room_code() != room.room_code {
            self.leave_group_of(caller.kind, caller.connection, spectator.room_code());
        }
        self.registries
            .spectators
            .join_room(spectator.identifier(), &room.room_code, &self.registries.rooms)?;
        self.join_group(caller, &room);
        info!(room = %room.identifier, spectator = %spectator.identifier(), "Spectator joined room");
        self.router.broadcast_room(room.identifier)
    }

    pub fn raise_hand(&self, caller: &Caller) -> Option<SpectatorView> {
        self.set_hand(caller, true)
    }

    pub fn lower_hand(&self, caller: &Caller) -> Option<SpectatorView> {
        self.set_hand(caller, false)
    }

    fn set_hand(&self, caller: &Caller, raised: bool) -> Option<SpectatorView> {
        let mut spectator = self.spectator(caller)?;
        let room = self.registries.rooms.get_by_room_code(spectator.room_code())?;
        spectator.is_hand_raised = raised;
        let spectator = self.registries.spectators.add_or_update(spectator);
        self.router.broadcast_room(room.identifier);
        Some(SpectatorView::from(&spectator))
    }

    /// Drop per-connection state kept outside the registries.
    ///
    /// A wait registered by a newer connection of the same screen is kept.
    pub fn forget(&self, caller: &Caller) {
        if caller.kind == ConnectionKind::Screen {
            self.waiting_screens
                .remove_if(&caller.identifier, |_, (connection, _)| {
                    *connection == caller.connection
                });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::groups::ChannelGroups;
    use crate::protocol::{ServerFrame, REFRESH_EVENT};
    use podium_core::{Keynote, StaticKeynotes};
    use tokio::sync::mpsc;

    struct Fixture {
        registries: Arc<Registries>,
        groups: Arc<ChannelGroups>,
        rooms: RoomService,
    }

    fn fixture() -> Fixture {
        let registries = Arc::new(Registries::default());
        let groups = Arc::new(ChannelGroups::new());
        let router = Arc::new(BroadcastRouter::new(registries.clone(), groups.clone(), "Host"));
        let keynotes = StaticKeynotes::with_keynotes([Keynote::new(42, 10), Keynote::new(7, 3)]);
        let rooms = RoomService::new(registries.clone(), router, Arc::new(keynotes), 6);
        Fixture {
            registries,
            groups,
            rooms,
        }
    }

    impl Fixture {
        fn caller(&self, kind: ConnectionKind) -> (Caller, mpsc::Receiver<ServerFrame>) {
            let identifier = match kind {
                ConnectionKind::Presenter => self.registries.presenters.create().identifier(),
                ConnectionKind::Screen => self.registries.screens.create().identifier(),
                ConnectionKind::Spectator => self.registries.spectators.create().identifier(),
            };
            let connection = ConnectionId::new();
            let (tx, rx) = mpsc::channel(32);
            self.groups.space(kind).register(connection, tx);
            (Caller::new(kind, connection, identifier), rx)
        }

        async fn room_with_keynote(&self) -> (Caller, RoomSnapshot) {
            let (presenter, _rx) = self.caller(ConnectionKind::Presenter);
            self.rooms.create_room(&presenter).unwrap();
            let snapshot = self.rooms.set_keynote(&presenter, "42").await.unwrap();
            (presenter, snapshot)
        }
    }

    fn drain_refreshes(rx: &mut mpsc::Receiver<ServerFrame>) -> Vec<serde_json::Value> {
        let mut snapshots = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let ServerFrame::Event { name, mut args } = frame {
                if name == REFRESH_EVENT {
                    snapshots.push(args.remove(0));
                }
            }
        }
        snapshots
    }

    #[test]
    fn test_create_room_is_idempotent() {
        let f = fixture();
        let (presenter, mut rx) = f.caller(ConnectionKind::Presenter);

        let first = f.rooms.create_room(&presenter).unwrap();
        let second = f.rooms.create_room(&presenter).unwrap();
        assert_eq!(first.identifier, second.identifier);
        assert_eq!(first.room_code, second.room_code);
        assert_eq!(first.room_code.len(), 6);
        assert_eq!(f.registries.rooms.len(), 1);

        let bound = f.registries.presenters.get_by_id(presenter.identifier).unwrap();
        assert_eq!(bound.presence.room_code, first.room_code);
        assert_eq!(drain_refreshes(&mut rx).len(), 1);
    }

    #[test]
    fn test_only_presenters_create_rooms() {
        let f = fixture();
        let (spectator, _rx) = f.caller(ConnectionKind::Spectator);
        assert!(f.rooms.create_room(&spectator).is_none());
        assert!(f.registries.rooms.is_empty());
    }

    #[tokio::test]
    async fn test_set_page_clamps() {
        let f = fixture();
        let (presenter, _) = f.room_with_keynote().await;

        for (page, expected) in [(15, 10), (-4, 0), (3, 3), (10, 10), (0, 0)] {
            let snapshot = f.rooms.set_page(&presenter, page).unwrap();
            assert_eq!(snapshot.current_frame, expected, "page {}", page);
        }
    }

    #[test]
    fn test_no_keynote_is_noop() {
        let f = fixture();
        let (presenter, mut rx) = f.caller(ConnectionKind::Presenter);
        let created = f.rooms.create_room(&presenter).unwrap();
        drain_refreshes(&mut rx);

        assert!(f.rooms.set_page(&presenter, 5).is_none());
        assert!(f.rooms.set_show_spectator_qr(&presenter, true).is_none());

        let room = f.registries.rooms.get_by_id(created.identifier).unwrap();
        assert_eq!(room.current_frame, 0);
        assert!(!room.show_spectator_qr);
        assert!(drain_refreshes(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn test_set_keynote_resets_frame_on_change() {
        let f = fixture();
        let (presenter, snapshot) = f.room_with_keynote().await;
        assert_eq!(snapshot.keynote.as_ref().unwrap().total_frames, 10);

        f.rooms.set_page(&presenter, 8).unwrap();
        let same = f.rooms.set_keynote(&presenter, "42").await.unwrap();
        assert_eq!(same.current_frame, 8);

        let other = f.rooms.set_keynote(&presenter, "7").await.unwrap();
        assert_eq!(other.current_frame, 0);
        assert_eq!(other.keynote.unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_set_keynote_unknown_or_malformed() {
        let f = fixture();
        let (presenter, _) = f.room_with_keynote().await;
        assert!(f.rooms.set_keynote(&presenter, "999").await.is_none());
        assert!(f.rooms.set_keynote(&presenter, "forty-two").await.is_none());

        let snapshot = f.rooms.current_room(&presenter).unwrap();
        assert_eq!(snapshot.keynote.unwrap().id, 42);
    }

    struct OfflineKeynoteStore;

    #[async_trait::async_trait]
    impl KeynoteLookup for OfflineKeynoteStore {
        async fn keynote_by_id(&self, _id: i64) -> podium_core::Result<Option<Keynote>> {
            Err(podium_core::Error::KeynoteLookup("store offline".into()))
        }
    }

    #[tokio::test]
    async fn test_keynote_store_failure_is_none() {
        let registries = Arc::new(Registries::default());
        let groups = Arc::new(ChannelGroups::new());
        let router = Arc::new(BroadcastRouter::new(registries.clone(), groups, "Host"));
        let rooms = RoomService::new(registries.clone(), router, Arc::new(OfflineKeynoteStore), 6);
        let presenter = registries.presenters.create();
        let caller = Caller::new(
            ConnectionKind::Presenter,
            ConnectionId::new(),
            presenter.identifier(),
        );

        let created = rooms.create_room(&caller).unwrap();
        assert!(rooms.set_keynote(&caller, "42").await.is_none());
        let room = registries.rooms.get_by_id(created.identifier).unwrap();
        assert!(room.keynote.is_none());
    }

    #[tokio::test]
    async fn test_spectator_needs_temp_control() {
        let f = fixture();
        let (presenter, snapshot) = f.room_with_keynote().await;
        f.rooms.set_page(&presenter, 10).unwrap();

        let (spectator, _rx) = f.caller(ConnectionKind::Spectator);
        f.rooms.join_room(&spectator, &snapshot.room_code).unwrap();

        assert!(f.rooms.set_page(&spectator, 3).is_none());
        assert_eq!(f.rooms.current_room(&presenter).unwrap().current_frame, 10);

        f.rooms
            .give_temp_control(&presenter, &spectator.identifier.to_string())
            .unwrap();
        let updated = f.rooms.set_page(&spectator, 3).unwrap();
        assert_eq!(updated.current_frame, 3);

        f.rooms.take_temp_control(&presenter).unwrap();
        assert!(f.rooms.set_page(&spectator, 5).is_none());
    }

    #[tokio::test]
    async fn test_temp_control_requires_room_member() {
        let f = fixture();
        let (presenter, _) = f.room_with_keynote().await;
        let (outsider, _rx) = f.caller(ConnectionKind::Spectator);

        assert!(f
            .rooms
            .give_temp_control(&presenter, &outsider.identifier.to_string())
            .is_none());
        assert!(f.rooms.give_temp_control(&presenter, "bogus").is_none());
    }

    #[tokio::test]
    async fn test_screen_may_set_page() {
        let f = fixture();
        let (_, snapshot) = f.room_with_keynote().await;
        let (screen, _rx) = f.caller(ConnectionKind::Screen);
        f.rooms
            .join_room_as_screen(&screen, &snapshot.room_code.to_lowercase())
            .unwrap();
        assert_eq!(f.rooms.set_page(&screen, 4).unwrap().current_frame, 4);
    }

    #[test]
    fn test_join_unknown_room_is_none() {
        let f = fixture();
        let (screen, _rx) = f.caller(ConnectionKind::Screen);
        let (spectator, _rx2) = f.caller(ConnectionKind::Spectator);
        assert!(f.rooms.join_room_as_screen(&screen, "ZZZZZZ").is_none());
        assert!(f.rooms.join_room(&spectator, "ZZZZZZ").is_none());
    }

    #[tokio::test]
    async fn test_remove_spectator_revokes_control() {
        let f = fixture();
        let (presenter, snapshot) = f.room_with_keynote().await;
        let (spectator, _rx) = f.caller(ConnectionKind::Spectator);
        f.rooms.join_room(&spectator, &snapshot.room_code).unwrap();
        f.rooms
            .give_temp_control(&presenter, &spectator.identifier.to_string())
            .unwrap();

        let after = f
            .rooms
            .remove_spectator(&presenter, &spectator.identifier.to_string())
            .unwrap();
        assert!(after.spectators.is_empty());
        assert!(after.temp_control_spectator_id.is_none());
        assert!(!f
            .groups
            .spectator
            .contains(spectator.connection, &snapshot.identifier.to_string()));

        // Already removed: no longer in the room
        assert!(f
            .rooms
            .remove_spectator(&presenter, &spectator.identifier.to_string())
            .is_none());
    }

    #[tokio::test]
    async fn test_remove_screen() {
        let f = fixture();
        let (presenter, snapshot) = f.room_with_keynote().await;
        let (screen, _rx) = f.caller(ConnectionKind::Screen);
        f.rooms
            .join_room_as_screen(&screen, &snapshot.room_code)
            .unwrap();

        let after = f
            .rooms
            .remove_screen(&presenter, &screen.identifier.to_string())
            .unwrap();
        assert!(after.screen.is_none());
        assert!(f.rooms.current_room(&screen).is_none());
    }

    #[tokio::test]
    async fn test_wait_and_receive_room_code() {
        let f = fixture();
        let (presenter, snapshot) = f.room_with_keynote().await;
        let (screen, mut rx) = f.caller(ConnectionKind::Screen);

        // Not waiting yet
        assert!(f
            .rooms
            .send_room_code_to_screen(&presenter, &snapshot.room_code, &screen.identifier.to_string())
            .is_none());

        let token = f.rooms.wait_room_as_screen(&screen).unwrap();
        assert!(f.groups.screen.contains(screen.connection, &token));

        f.rooms
            .send_room_code_to_screen(&presenter, &snapshot.room_code, &screen.identifier.to_string())
            .unwrap();
        match rx.try_recv() {
            Ok(ServerFrame::Event { name, args }) => {
                assert_eq!(name, ROOM_CODE_EVENT);
                assert_eq!(args[0], snapshot.room_code);
            }
            other => panic!("Expected room code, got {:?}", other),
        }

        let joined = f
            .rooms
            .join_room_as_screen(&screen, &snapshot.room_code)
            .unwrap();
        assert!(joined.screen.is_some());
        assert!(!f.groups.screen.contains(screen.connection, &token));
    }

    #[tokio::test]
    async fn test_stale_screen_connection_keeps_newer_wait() {
        let f = fixture();
        let (presenter, snapshot) = f.room_with_keynote().await;
        let (old, _old_rx) = f.caller(ConnectionKind::Screen);
        f.rooms.wait_room_as_screen(&old).unwrap();

        // Same screen reconnects before the old connection's close is seen
        let (tx, mut rx) = mpsc::channel(32);
        let current = Caller::new(ConnectionKind::Screen, ConnectionId::new(), old.identifier);
        f.groups.screen.register(current.connection, tx);
        let token = f.rooms.wait_room_as_screen(&current).unwrap();
        assert!(f.groups.screen.contains(current.connection, &token));

        f.rooms.forget(&old);
        f.groups.screen.unregister(old.connection);

        f.rooms
            .send_room_code_to_screen(&presenter, &snapshot.room_code, &current.identifier.to_string())
            .unwrap();
        match rx.try_recv() {
            Ok(ServerFrame::Event { name, .. }) => assert_eq!(name, ROOM_CODE_EVENT),
            other => panic!("Expected room code, got {:?}", other),
        }

        // The owning connection going away does clear the wait
        f.rooms.forget(&current);
        assert!(f
            .rooms
            .send_room_code_to_screen(&presenter, &snapshot.room_code, &current.identifier.to_string())
            .is_none());
    }

    #[tokio::test]
    async fn test_screen_leave_room() {
        let f = fixture();
        let (_, snapshot) = f.room_with_keynote().await;
        let (screen, _rx) = f.caller(ConnectionKind::Screen);
        f.rooms
            .join_room_as_screen(&screen, &snapshot.room_code)
            .unwrap();

        let left = f.rooms.leave_room(&screen).unwrap();
        assert!(left.screen.is_none());
        assert!(f.rooms.leave_room(&screen).is_none());
    }

    #[tokio::test]
    async fn test_names_and_hands() {
        let f = fixture();
        let (presenter, snapshot) = f.room_with_keynote().await;
        let (spectator, _rx) = f.caller(ConnectionKind::Spectator);

        // Hand needs a room; name does not
        assert!(f.rooms.raise_hand(&spectator).is_none());
        assert_eq!(f.rooms.set_name(&spectator, " Grace ").unwrap().name, "Grace");

        f.rooms.join_room(&spectator, &snapshot.room_code).unwrap();
        assert!(f.rooms.raise_hand(&spectator).unwrap().is_hand_raised);
        let room = f.rooms.current_room(&presenter).unwrap();
        assert!(room.spectators[0].is_hand_raised);
        assert!(!f.rooms.lower_hand(&spectator).unwrap().is_hand_raised);

        let me = f.rooms.set_presenter_name(&presenter, "Keynote Host").unwrap();
        assert_eq!(me.name, "Keynote Host");
        assert_eq!(
            f.rooms.current_room(&presenter).unwrap().presentor.unwrap().name,
            "Keynote Host"
        );
    }

    #[tokio::test]
    async fn test_refresh_reaches_all_kinds() {
        let f = fixture();
        let (presenter, mut presenter_rx) = f.caller(ConnectionKind::Presenter);
        let created = f.rooms.create_room(&presenter).unwrap();
        f.rooms.set_keynote(&presenter, "42").await.unwrap();

        let (screen, mut screen_rx) = f.caller(ConnectionKind::Screen);
        f.rooms.join_room_as_screen(&screen, &created.room_code).unwrap();
        let (spectator, mut spectator_rx) = f.caller(ConnectionKind::Spectator);
        f.rooms.join_room(&spectator, &created.room_code).unwrap();

        drain_refreshes(&mut presenter_rx);
        drain_refreshes(&mut screen_rx);
        drain_refreshes(&mut spectator_rx);

        f.rooms.set_page(&presenter, 6).unwrap();
        for rx in [&mut presenter_rx, &mut screen_rx, &mut spectator_rx] {
            let refreshes = drain_refreshes(rx);
            assert_eq!(refreshes.len(), 1);
            assert_eq!(refreshes[0]["currentFrame"], 6);
        }
    }
}
