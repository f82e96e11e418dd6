//! Keynote record owned by the external keynote store

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeynoteKind {
    #[default]
    Pdf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    None,
}

/// A slide deck; only `total_frames` matters to room coordination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Keynote {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: KeynoteKind,
    #[serde(default)]
    pub transition_type: TransitionKind,
    pub total_frames: i32,
    #[serde(default)]
    pub keynote_url: String,
    #[serde(default)]
    pub mobile_keynote_url: Option<String>,
    #[serde(default)]
    pub presentor_notes_url: Option<String>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Keynote {
    pub fn new(id: i64, total_frames: i32) -> Self {
        Self {
            id,
            name: None,
            description: None,
            kind: KeynoteKind::Pdf,
            transition_type: TransitionKind::None,
            total_frames,
            keynote_url: String::new(),
            mobile_keynote_url: None,
            presentor_notes_url: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}
