//! Spectator - an unauthenticated viewer

use serde::{Deserialize, Serialize};

use super::entity::{impl_participant, Presence};
use crate::ids::Snowflake;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Spectator {
    pub presence: Presence,
    /// Self-chosen display name
    pub name: String,
    pub is_hand_raised: bool,
}

impl Spectator {
    pub fn new(identifier: Snowflake) -> Self {
        Self {
            presence: Presence::new(identifier),
            name: String::new(),
            is_hand_raised: false,
        }
    }
}

impl_participant!(Spectator);
