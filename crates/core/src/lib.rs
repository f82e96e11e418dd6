//! Podium Core Library
//!
//! Room model, in-memory registries, session bootstrap and idle reaping for
//! live presentation rooms. Nothing here is persisted; a restart loses all
//! live state.

pub mod config;
pub mod error;
pub mod ids;
pub mod invariants;
pub mod keynotes;
pub mod models;
pub mod reaper;
pub mod registry;
pub mod room_code;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
pub use ids::{Snowflake, SnowflakeGenerator};
pub use keynotes::{KeynoteLookup, StaticKeynotes};
pub use models::*;
pub use reaper::{IdleReaper, ReapReport};
pub use registry::{EntityRegistry, Registries, RoomRegistry};
pub use session::{SessionBootstrap, SessionCookie, SessionGrant};
