//! Presenter - the authenticated controller of a room

use serde::{Deserialize, Serialize};

use super::entity::{impl_participant, Presence};
use super::identity::AuthenticatedUser;
use crate::ids::Snowflake;

/// Name shown when nothing better is known
pub const ANONYMOUS_NAME: &str = "Anonymous";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Presenter {
    pub presence: Presence,
    /// Identity bound on the last connect
    pub user: Option<AuthenticatedUser>,
    /// Explicitly chosen name
    pub name: Option<String>,
}

impl Presenter {
    pub fn new(identifier: Snowflake) -> Self {
        Self {
            presence: Presence::new(identifier),
            user: None,
            name: None,
        }
    }

    /// Bind the authenticated identity; seeds the name from it
    pub fn bind_identity(&mut self, user: AuthenticatedUser) {
        if let Some(seed) = user.name.clone().or_else(|| user.email.clone()) {
            self.name = Some(seed);
        }
        self.user = Some(user);
    }

    /// Identity name, then chosen name, then `default_name`, then "Anonymous"
    pub fn display_name(&self, default_name: &str) -> String {
        self.user
            .as_ref()
            .and_then(|u| u.name.clone())
            .or_else(|| self.name.clone())
            .filter(|n| !n.trim().is_empty())
            .or_else(|| (!default_name.trim().is_empty()).then(|| default_name.to_string()))
            .unwrap_or_else(|| ANONYMOUS_NAME.to_string())
    }
}

impl_participant!(Presenter);
