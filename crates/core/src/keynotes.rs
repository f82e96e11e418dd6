//! Keynote lookup collaborator
//!
//! Keynote records live in an external store. The room engine only needs
//! to resolve an id to a record carrying the frame count. Lookups are
//! async so a store backed by I/O never parks a runtime worker.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::Keynote;

/// Resolves keynote ids against the external keynote store
#[async_trait]
pub trait KeynoteLookup: Send + Sync {
    /// Find a keynote by id; `Ok(None)` when it does not exist
    async fn keynote_by_id(&self, id: i64) -> Result<Option<Keynote>>;
}

/// In-memory keynote table, seeded from configuration or tests
#[derive(Default)]
pub struct StaticKeynotes {
    keynotes: RwLock<HashMap<i64, Keynote>>,
}

impl StaticKeynotes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keynotes(keynotes: impl IntoIterator<Item = Keynote>) -> Self {
        let table = Self::new();
        for keynote in keynotes {
            table.insert(keynote);
        }
        table
    }

    pub fn insert(&self, keynote: Keynote) {
        self.keynotes
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(keynote.id, keynote);
    }

    pub fn len(&self) -> usize {
        self.keynotes.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeynoteLookup for StaticKeynotes {
    async fn keynote_by_id(&self, id: i64) -> Result<Option<Keynote>> {
        Ok(self
            .keynotes
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&id)
            .cloned())
    }
}
