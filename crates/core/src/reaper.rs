//! Idle entity reaper
//!
//! Participants disconnected longer than the retention window are removed.
//! Rooms they were bound to are then checked: a room past its creation
//! grace period with no connected or recently disconnected member is
//! deleted. Participants are never cascade-deleted with their room.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::config::ReaperConfig;
use crate::models::{Entity, Participant};
use crate::registry::{EntityRegistry, Registries};

/// Counts from one sweep
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReapReport {
    pub presenters_removed: usize,
    pub screens_removed: usize,
    pub spectators_removed: usize,
    pub rooms_removed: usize,
}

impl ReapReport {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

pub struct IdleReaper {
    registries: Arc<Registries>,
    config: ReaperConfig,
}

impl IdleReaper {
    pub fn new(registries: Arc<Registries>, config: ReaperConfig) -> Self {
        Self { registries, config }
    }

    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    /// Sweep against the current time
    pub fn sweep(&self) -> ReapReport {
        self.sweep_at(Utc::now())
    }

    /// Sweep as if the current time were `now`
    pub fn sweep_at(&self, now: DateTime<Utc>) -> ReapReport {
        let cutoff = now - self.config.retention();
        let mut candidates = HashSet::new();

        let mut report = ReapReport {
            presenters_removed: sweep_kind(&self.registries.presenters, cutoff, &mut candidates),
            screens_removed: sweep_kind(&self.registries.screens, cutoff, &mut candidates),
            spectators_removed: sweep_kind(&self.registries.spectators, cutoff, &mut candidates),
            rooms_removed: 0,
        };

        for code in candidates {
            if self.delete_room_if_idle(&code, now) {
                report.rooms_removed += 1;
            }
        }

        if !report.is_empty() {
            tracing::info!(
                presenters = report.presenters_removed,
                screens = report.screens_removed,
                spectators = report.spectators_removed,
                rooms = report.rooms_removed,
                "Reaped idle entities"
            );
        }
        report
    }

    /// Delete the room with `code` unless it is young or still in use.
    ///
    /// Returns true if the room was removed.
    pub fn delete_room_if_idle(&self, code: &str, now: DateTime<Utc>) -> bool {
        let Some(room) = self.registries.rooms.get_by_room_code(code) else {
            return false;
        };

        if room.created_at() > now - self.config.room_grace_period() {
            tracing::debug!(room = %room.identifier, "Room within creation grace period");
            return false;
        }

        let cutoff = now - self.config.retention();
        let in_use = self
            .registries
            .presenters
            .query_single(|p| p.room_code() == code && p.presence.is_active(cutoff))
            .is_some()
            || self
                .registries
                .screens
                .query_single(|s| s.room_code() == code && s.presence.is_active(cutoff))
                .is_some()
            || self
                .registries
                .spectators
                .query_single(|s| s.room_code() == code && s.presence.is_active(cutoff))
                .is_some();

        if in_use {
            return false;
        }
        self.registries.rooms.remove(room.identifier).is_some()
    }
}

/// Remove stale entities of one kind, collecting their room codes
fn sweep_kind<T: Participant>(
    registry: &EntityRegistry<T>,
    cutoff: DateTime<Utc>,
    rooms: &mut HashSet<String>,
) -> usize {
    let stale = registry.query_many(|e| e.presence().is_stale(cutoff));
    for entity in &stale {
        if !entity.room_code().is_empty() {
            rooms.insert(entity.room_code().to_string());
        }
        registry.remove(entity.identifier());
        tracing::debug!(id = %entity.identifier(), "Removed stale entity");
    }
    stale.len()
}
