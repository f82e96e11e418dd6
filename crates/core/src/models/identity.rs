//! Authenticated identity supplied by the external identity provider

use serde::{Deserialize, Serialize};

/// A user already authenticated upstream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}
