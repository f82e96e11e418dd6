//! Podium Network Library
//!
//! Real-time surface of the room engine over TCP.
//!
//! # Architecture
//!
//! - **Server**: accepts presenter, screen and spectator connections
//! - **Hub**: composes presence, room state machine and broadcast routing
//! - **Groups**: one channel group space per connection kind
//! - **Client**: async client for tooling and tests
//! - **Protocol**: length-prefixed JSON frames
//!
//! # Usage
//!
//! ```ignore
//! let hub = Arc::new(Hub::new(registries, keynotes, identities, HubSettings::from(&config)));
//! let server = Server::start(addr, hub).await?;
//!
//! let presenter = Client::connect(server.addr(), ConnectionKind::Presenter, token).await?;
//! let room = presenter.invoke(Request::CreateRoom).await?;
//! ```

pub mod client;
pub mod error;
mod frame;
pub mod groups;
pub mod hub;
pub mod identity;
pub mod presence;
pub mod protocol;
pub mod rooms;
pub mod router;
pub mod server;

pub use client::{Client, PushEvent};
pub use error::{Error, Result};
pub use groups::{ChannelGroups, GroupSpace};
pub use hub::{Hub, HubSettings};
pub use identity::{IdentityResolver, ResolvedIdentity, StaticIdentities};
pub use presence::PresenceCoordinator;
pub use protocol::{ClientFrame, ConnectionKind, Request, ServerFrame};
pub use rooms::{Caller, RoomService};
pub use router::BroadcastRouter;
pub use server::Server;
