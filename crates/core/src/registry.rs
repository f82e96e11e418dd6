//! In-memory entity registries
//!
//! One registry per entity kind, each an explicitly constructed instance
//! shared through `Arc`. Every single operation is atomic; a
//! read-modify-write sequence across operations is not, so concurrent
//! mutations of the same record resolve as last writer wins.

use std::sync::Arc;

use dashmap::DashMap;

use crate::ids::{Snowflake, SnowflakeGenerator};
use crate::models::{
    Entity, Presenter, PresenterView, Room, RoomSnapshot, Screen, ScreenView, Spectator,
    SpectatorView,
};
use crate::room_code;

/// Thread-safe store of entities of one kind, keyed by identifier
///
/// Query predicates run while a shard is read-locked and must not call
/// back into the same registry.
pub struct EntityRegistry<T: Entity> {
    items: DashMap<Snowflake, T>,
    ids: Arc<SnowflakeGenerator>,
}

impl<T: Entity> EntityRegistry<T> {
    pub fn new(ids: Arc<SnowflakeGenerator>) -> Self {
        Self {
            items: DashMap::new(),
            ids,
        }
    }

    /// Point lookup
    pub fn get_by_id(&self, id: Snowflake) -> Option<T> {
        self.items.get(&id).map(|entry| entry.value().clone())
    }

    /// First entity bound to `code`; meant for kinds expecting at most one
    pub fn get_by_room_code(&self, code: &str) -> Option<T> {
        if code.is_empty() {
            return None;
        }
        self.query_single(|e| e.room_code() == code)
    }

    /// Return the entity keyed by `id`, creating it if absent.
    ///
    /// With no id a fresh one is generated. Concurrent calls with the same
    /// id observe the same entity.
    pub fn get_or_create(&self, id: Option<Snowflake>) -> T {
        let id = id.unwrap_or_else(|| self.ids.generate());
        self.items
            .entry(id)
            .or_insert_with(|| {
                tracing::debug!(id = %id, "Creating entity");
                T::with_identifier(id)
            })
            .value()
            .clone()
    }

    /// Create and store a new entity with a generated id
    pub fn create(&self) -> T {
        self.get_or_create(None)
    }

    /// Upsert keyed by the entity's identifier; last writer wins
    pub fn add_or_update(&self, entity: T) -> T {
        self.items.insert(entity.identifier(), entity.clone());
        entity
    }

    /// Delete if present
    pub fn remove(&self, id: Snowflake) -> Option<T> {
        self.items.remove(&id).map(|(_, entity)| entity)
    }

    pub fn query_single(&self, predicate: impl Fn(&T) -> bool) -> Option<T> {
        self.items
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
    }

    pub fn query_many(&self, predicate: impl Fn(&T) -> bool) -> Vec<T> {
        self.items
            .iter()
            .filter(|entry| predicate(entry.value()))
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Bind entity `id` to `code` if both the entity and the room exist.
    ///
    /// Silently does nothing otherwise.
    pub fn join_room(&self, id: Snowflake, code: &str, rooms: &RoomRegistry) -> Option<T> {
        let mut entity = self.get_by_id(id)?;
        rooms.get_by_room_code(code)?;
        entity.set_room_code(code.to_string());
        Some(self.add_or_update(entity))
    }

    /// Clear the room binding of entity `id`
    pub fn leave_room(&self, id: Snowflake) -> Option<T> {
        let mut entity = self.get_by_id(id)?;
        entity.set_room_code(String::new());
        Some(self.add_or_update(entity))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Registry of rooms; `room_code` is the natural external key
pub struct RoomRegistry {
    rooms: EntityRegistry<Room>,
    ids: Arc<SnowflakeGenerator>,
}

impl RoomRegistry {
    pub fn new(ids: Arc<SnowflakeGenerator>) -> Self {
        Self {
            rooms: EntityRegistry::new(ids.clone()),
            ids,
        }
    }

    /// Create and store a room with a fresh id and an unused code
    pub fn create(&self, code_length: usize) -> Room {
        let code = room_code::generate_unique(code_length, |c| self.contains_code(c));
        let room = Room::new(self.ids.generate(), code);
        tracing::info!(room = %room.identifier, code = %room.room_code, "Room created");
        self.rooms.add_or_update(room)
    }

    pub fn get_by_id(&self, id: Snowflake) -> Option<Room> {
        self.rooms.get_by_id(id)
    }

    pub fn get_by_room_code(&self, code: &str) -> Option<Room> {
        self.rooms.get_by_room_code(code)
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.get_by_room_code(code).is_some()
    }

    pub fn add_or_update(&self, room: Room) -> Room {
        self.rooms.add_or_update(room)
    }

    pub fn remove(&self, id: Snowflake) -> Option<Room> {
        let removed = self.rooms.remove(id);
        if let Some(room) = &removed {
            tracing::info!(room = %room.identifier, code = %room.room_code, "Room removed");
        }
        removed
    }

    pub fn query_single(&self, predicate: impl Fn(&Room) -> bool) -> Option<Room> {
        self.rooms.query_single(predicate)
    }

    pub fn query_many(&self, predicate: impl Fn(&Room) -> bool) -> Vec<Room> {
        self.rooms.query_many(predicate)
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }
}

/// All registries of one process, owned by the composition root
#[derive(Clone)]
pub struct Registries {
    pub ids: Arc<SnowflakeGenerator>,
    pub presenters: Arc<EntityRegistry<Presenter>>,
    pub screens: Arc<EntityRegistry<Screen>>,
    pub spectators: Arc<EntityRegistry<Spectator>>,
    pub rooms: Arc<RoomRegistry>,
}

impl Registries {
    pub fn new(ids: Arc<SnowflakeGenerator>) -> Self {
        Self {
            presenters: Arc::new(EntityRegistry::new(ids.clone())),
            screens: Arc::new(EntityRegistry::new(ids.clone())),
            spectators: Arc::new(EntityRegistry::new(ids.clone())),
            rooms: Arc::new(RoomRegistry::new(ids.clone())),
            ids,
        }
    }

    pub fn presenter_of(&self, room: &Room) -> Option<Presenter> {
        self.presenters.get_by_room_code(&room.room_code)
    }

    pub fn screen_of(&self, room: &Room) -> Option<Screen> {
        self.screens.get_by_room_code(&room.room_code)
    }

    pub fn spectators_of(&self, room: &Room) -> Vec<Spectator> {
        let code = room.room_code.as_str();
        let mut spectators = self.spectators.query_many(|s| s.room_code() == code);
        spectators.sort_by_key(|s| s.presence.identifier);
        spectators
    }

    /// Build a snapshot with members resolved from the registries
    pub fn snapshot(&self, room: &Room, default_presenter_name: &str) -> RoomSnapshot {
        let mut snapshot = RoomSnapshot::bare(room);
        snapshot.presentor = self
            .presenter_of(room)
            .map(|p| PresenterView::new(&p, default_presenter_name));
        snapshot.screen = self.screen_of(room).as_ref().map(ScreenView::from);
        snapshot.spectators = self
            .spectators_of(room)
            .iter()
            .map(SpectatorView::from)
            .collect();
        snapshot
    }
}

impl Default for Registries {
    fn default() -> Self {
        Self::new(Arc::new(SnowflakeGenerator::default()))
    }
}
