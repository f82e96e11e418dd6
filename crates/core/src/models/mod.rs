//! Data model for live presentation rooms

mod entity;
mod identity;
mod keynote;
mod presenter;
mod room;
mod screen;
mod spectator;
mod views;

pub use entity::*;
pub use identity::*;
pub use keynote::*;
pub use presenter::*;
pub use room::*;
pub use screen::*;
pub use spectator::*;
pub use views::*;
