//! Session bootstrap for unauthenticated participants
//!
//! Screens and spectators have no login. Before opening a real-time
//! connection they obtain an identifier, delivered as a cookie, which
//! later connects present to prove the session exists.

use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::ids::Snowflake;
use crate::registry::Registries;

/// Cookie carrying a screen session
pub const SCREEN_COOKIE: &str = "ScreenIdentifier";

/// Cookie carrying a spectator session
pub const SPECTATOR_COOKIE: &str = "SpectatorIdentifier";

/// Lifetime of a session cookie
pub const SESSION_COOKIE_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

/// Cookie handed to the client on bootstrap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub max_age_secs: i64,
    pub path: String,
    pub same_site: SameSite,
    pub http_only: bool,
    pub secure: bool,
}

impl SessionCookie {
    pub fn new(name: &str, value: Snowflake) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
            max_age_secs: Duration::hours(SESSION_COOKIE_HOURS).num_seconds(),
            path: "/".to_string(),
            same_site: SameSite::Lax,
            http_only: true,
            secure: true,
        }
    }

    /// Render as a `Set-Cookie` header value
    pub fn header_value(&self) -> String {
        let mut header = format!(
            "{}={}; Max-Age={}; Path={}; SameSite={:?}",
            self.name, self.value, self.max_age_secs, self.path, self.same_site
        );
        if self.http_only {
            header.push_str("; HttpOnly");
        }
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

/// Result of a bootstrap call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
    pub identifier: Snowflake,
    pub cookie: SessionCookie,
}

/// Creates screen and spectator entities ahead of their connection
pub struct SessionBootstrap {
    registries: Arc<Registries>,
}

impl SessionBootstrap {
    pub fn new(registries: Arc<Registries>) -> Self {
        Self { registries }
    }

    pub fn create_screen(&self) -> SessionGrant {
        let screen = self.registries.screens.create();
        tracing::info!(screen = %screen.presence.identifier, "Screen session created");
        grant(SCREEN_COOKIE, screen.presence.identifier)
    }

    pub fn create_spectator(&self) -> SessionGrant {
        let spectator = self.registries.spectators.create();
        tracing::info!(spectator = %spectator.presence.identifier, "Spectator session created");
        grant(SPECTATOR_COOKIE, spectator.presence.identifier)
    }
}

fn grant(cookie_name: &str, identifier: Snowflake) -> SessionGrant {
    SessionGrant {
        identifier,
        cookie: SessionCookie::new(cookie_name, identifier),
    }
}
