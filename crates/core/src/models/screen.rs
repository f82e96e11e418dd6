//! Screen - a passive display surface

use serde::{Deserialize, Serialize};

use super::entity::{impl_participant, Presence};
use crate::ids::Snowflake;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Screen {
    pub presence: Presence,
}

impl Screen {
    pub fn new(identifier: Snowflake) -> Self {
        Self {
            presence: Presence::new(identifier),
        }
    }
}

impl_participant!(Screen);
