//! Error types for Podium Core
//!
//! The room operation surface reports missing preconditions as `None`;
//! these errors cover genuine faults only.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Keynote lookup failed: {0}")]
    KeynoteLookup(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
