//! Application state
//!
//! The composition root: every registry, collaborator and service is
//! constructed here and handed down explicitly.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use podium_core::{Config, Error, Registries, Result, StaticKeynotes};
use podium_net::{Hub, HubSettings, StaticIdentities};

pub struct AppState {
    pub config: Config,
    pub hub: Arc<Hub>,
}

impl AppState {
    /// Load configuration from `path`, or the default location, then wire
    /// up the engine
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = Config::load_or_default(path)?;
        Ok(Self::from_config(config))
    }

    pub fn from_config(config: Config) -> Self {
        let registries = Arc::new(Registries::default());
        let keynotes = Arc::new(StaticKeynotes::with_keynotes(config.keynotes.iter().cloned()));
        let identities = Arc::new(StaticIdentities::from_entries(
            &config.identities,
            &registries.ids,
        ));

        if identities.is_empty() {
            tracing::warn!("No presenter identities configured; presenters cannot connect");
        }
        tracing::info!(
            keynotes = keynotes.len(),
            identities = identities.len(),
            "Collaborators loaded"
        );

        let hub = Arc::new(Hub::new(
            registries,
            keynotes,
            identities,
            HubSettings::from(&config),
        ));
        Self { config, hub }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        let addr = format!("{}:{}", self.config.server.bind_addr, self.config.server.port);
        addr.parse()
            .map_err(|_| Error::Config(format!("invalid listen address {}", addr)))
    }
}
