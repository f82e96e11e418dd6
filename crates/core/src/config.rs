//! Runtime configuration
//!
//! Loaded from TOML. Every field has a default so an empty file (or no
//! file at all) yields a working server.
//!
//! ```toml
//! [server]
//! port = 7331
//!
//! [rooms]
//! code_length = 6
//! default_presenter_name = "Presenter"
//!
//! [reaper]
//! retention_hours = 24
//! grace_minutes = 5
//! interval_secs = 600
//!
//! [[keynotes]]
//! id = 42
//! totalFrames = 10
//!
//! [[identities]]
//! token = "secret"
//! user_id = "u-1"
//! name = "Ada"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use chrono::Duration;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ids::Snowflake;
use crate::models::{AuthenticatedUser, Keynote};
use crate::room_code::DEFAULT_ROOM_CODE_LENGTH;

/// Default listening port
pub const DEFAULT_PORT: u16 = 7331;

/// File name looked up in the platform config directory
pub const CONFIG_FILE_NAME: &str = "podium.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub rooms: RoomsConfig,
    #[serde(default)]
    pub reaper: ReaperConfig,
    /// Keynotes served by the built-in keynote table
    #[serde(default)]
    pub keynotes: Vec<Keynote>,
    /// Bearer tokens accepted for presenter connections
    #[serde(default)]
    pub identities: Vec<IdentityEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomsConfig {
    #[serde(default = "default_code_length")]
    pub code_length: usize,
    /// Presenter name used when the identity carries none
    #[serde(default = "default_presenter_name")]
    pub default_presenter_name: String,
}

impl Default for RoomsConfig {
    fn default() -> Self {
        Self {
            code_length: DEFAULT_ROOM_CODE_LENGTH,
            default_presenter_name: default_presenter_name(),
        }
    }
}

/// Idle reaper windows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    /// How long a disconnected participant is kept
    #[serde(default = "default_retention_hours")]
    pub retention_hours: i64,
    /// Rooms younger than this are never deleted
    #[serde(default = "default_grace_minutes")]
    pub grace_minutes: i64,
    /// Also sweep on a timer when set
    #[serde(default)]
    pub interval_secs: Option<u64>,
}

impl ReaperConfig {
    pub fn retention(&self) -> Duration {
        Duration::hours(self.retention_hours)
    }

    pub fn room_grace_period(&self) -> Duration {
        Duration::minutes(self.grace_minutes)
    }

    pub fn interval(&self) -> Option<StdDuration> {
        self.interval_secs.filter(|s| *s > 0).map(StdDuration::from_secs)
    }

    pub fn retention_hours(mut self, hours: i64) -> Self {
        self.retention_hours = hours;
        self
    }

    pub fn grace_minutes(mut self, minutes: i64) -> Self {
        self.grace_minutes = minutes;
        self
    }
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            retention_hours: default_retention_hours(),
            grace_minutes: default_grace_minutes(),
            interval_secs: None,
        }
    }
}

/// One accepted presenter token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityEntry {
    pub token: String,
    pub user_id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Stable login session id; generated at startup when omitted
    #[serde(default)]
    pub session_id: Option<Snowflake>,
}

impl IdentityEntry {
    pub fn user(&self) -> AuthenticatedUser {
        AuthenticatedUser {
            id: self.user_id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
        }
    }
}

fn default_bind_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_code_length() -> usize {
    DEFAULT_ROOM_CODE_LENGTH
}

fn default_presenter_name() -> String {
    crate::models::ANONYMOUS_NAME.to_string()
}

fn default_retention_hours() -> i64 {
    24
}

fn default_grace_minutes() -> i64 {
    5
}

impl Config {
    /// Parse configuration from TOML content
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load from `path` if given, else from the platform config directory,
    /// else fall back to defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match Self::default_path() {
            Some(path) if path.exists() => Self::load(&path),
            _ => Ok(Self::default()),
        }
    }

    /// `<config dir>/podium.toml` for this platform
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("dev", "onyx", "podium").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    fn validate(&self) -> Result<()> {
        if self.rooms.code_length == 0 {
            return Err(Error::Config("rooms.code_length must be at least 1".into()));
        }
        if self.reaper.retention_hours < 0 || self.reaper.grace_minutes < 0 {
            return Err(Error::Config("reaper windows must not be negative".into()));
        }
        if let Some(keynote) = self.keynotes.iter().find(|k| k.total_frames < 0) {
            return Err(Error::Config(format!(
                "keynote {} has negative totalFrames",
                keynote.id
            )));
        }
        Ok(())
    }
}
