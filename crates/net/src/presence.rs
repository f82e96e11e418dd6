//! Presence coordinator
//!
//! Binds live connections to participant entities. Presenters are resolved
//! through the identity collaborator and keyed by their login session id;
//! screens and spectators must present the identifier of a session created
//! earlier by bootstrap.
//!
//! Entity lifecycle: `Created -> Connected <-> Disconnected -> Removed`.

use std::sync::Arc;

use chrono::Utc;
use podium_core::{
    invariants, ConnectionId, EntityRegistry, IdleReaper, Participant, Registries, Snowflake,
};
use tracing::{debug, info};

use crate::identity::IdentityResolver;
use crate::protocol::ConnectionKind;
use crate::router::BroadcastRouter;

pub struct PresenceCoordinator {
    registries: Arc<Registries>,
    router: Arc<BroadcastRouter>,
    identities: Arc<dyn IdentityResolver>,
    reaper: Arc<IdleReaper>,
}

impl PresenceCoordinator {
    pub fn new(
        registries: Arc<Registries>,
        router: Arc<BroadcastRouter>,
        identities: Arc<dyn IdentityResolver>,
        reaper: Arc<IdleReaper>,
    ) -> Self {
        Self {
            registries,
            router,
            identities,
            reaper,
        }
    }

    /// Attach `connection` to the entity named by `credential`.
    ///
    /// The connection must already be registered in its kind's group space.
    /// Returns the entity identifier, or `None` when the credential does not
    /// resolve; in that case nothing was mutated and the caller rejects the
    /// connection.
    pub fn connect(
        &self,
        kind: ConnectionKind,
        connection: ConnectionId,
        credential: &str,
    ) -> Option<Snowflake> {
        let identifier = match kind {
            ConnectionKind::Presenter => self.connect_presenter(connection, credential)?,
            ConnectionKind::Screen => {
                let id = Snowflake::parse(credential)?;
                let screen = self.registries.screens.get_by_id(id)?;
                self.attach(&self.registries.screens, kind, screen, connection)
            }
            ConnectionKind::Spectator => {
                let id = Snowflake::parse(credential)?;
                let spectator = self.registries.spectators.get_by_id(id)?;
                self.attach(&self.registries.spectators, kind, spectator, connection)
            }
        };

        info!(kind = %kind, id = %identifier, connection = %connection, "Participant connected");
        self.reaper.sweep();
        Some(identifier)
    }

    fn connect_presenter(
        &self,
        connection: ConnectionId,
        credential: &str,
    ) -> Option<Snowflake> {
        let identity = self.identities.resolve(credential)?;
        let mut presenter = self
            .registries
            .presenters
            .get_or_create(Some(identity.session_id));
        presenter.bind_identity(identity.user);
        Some(
            self.attach(
                &self.registries.presenters,
                ConnectionKind::Presenter,
                presenter,
                connection,
            ),
        )
    }

    /// Mark connected, store, then restore any room binding
    fn attach<T: Participant>(
        &self,
        registry: &EntityRegistry<T>,
        kind: ConnectionKind,
        mut entity: T,
        connection: ConnectionId,
    ) -> Snowflake {
        entity.presence_mut().mark_connected(connection);
        invariants::assert_presence_invariants(entity.presence());
        let entity = registry.add_or_update(entity);
        let identifier = entity.identifier();

        if entity.room_code().is_empty() {
            return identifier;
        }

        match self.registries.rooms.get_by_room_code(entity.room_code()) {
            Some(room) => {
                self.router
                    .groups()
                    .space(kind)
                    .add_to_group(connection, &room.identifier.to_string());
                debug!(kind = %kind, id = %identifier, room = %room.identifier, "Rejoined room");
                self.router.broadcast_room(room.identifier);
            }
            None => {
                debug!(kind = %kind, id = %identifier, code = %entity.room_code(), "Clearing binding to deleted room");
                registry.leave_room(identifier);
            }
        }
        identifier
    }

    /// Mark whichever entity holds `connection` as disconnected.
    ///
    /// A connection that matches nothing (never attached, or already
    /// reaped) is ignored.
    pub fn disconnect(&self, kind: ConnectionKind, connection: ConnectionId) -> Option<Snowflake> {
        let identifier = match kind {
            ConnectionKind::Presenter => detach(&self.registries.presenters, connection),
            ConnectionKind::Screen => detach(&self.registries.screens, connection),
            ConnectionKind::Spectator => detach(&self.registries.spectators, connection),
        };
        match identifier {
            Some(id) => info!(kind = %kind, id = %id, connection = %connection, "Participant disconnected"),
            None => debug!(kind = %kind, connection = %connection, "Disconnect matched no entity"),
        }
        identifier
    }
}

fn detach<T: Participant>(registry: &EntityRegistry<T>, connection: ConnectionId) -> Option<Snowflake> {
    let mut entity =
        registry.query_single(|e| e.presence().connection_id == Some(connection))?;
    entity.presence_mut().mark_disconnected(Utc::now());
    invariants::assert_presence_invariants(entity.presence());
    Some(registry.add_or_update(entity).identifier())
}
