// SPDX-License-Identifier: MIT
//! Project model and lifecycle.

pub mod backup;
pub mod files;
pub mod registry;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub use backup::BackupManager;
pub use files::ProjectFileStore;
pub use registry::ProjectRegistry;

/// Opaque handle naming an authoring project. Persistence operations are
/// scoped to it; absent means "no project open".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(String);

impl ProjectId {
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl std::fmt::Display for ProjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub id: ProjectId,
    pub name: String,
    pub created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

/// A project document as written to disk (`{name}_{id}.courseproj`).
///
/// `content` maps content keys (e.g. `"courseSettings"`) to the opaque JSON
/// records the wizard steps persist. The map is ordered so documents diff
/// cleanly under version control.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDocument {
    pub project: ProjectMetadata,
    #[serde(default)]
    pub content: BTreeMap<String, Value>,
    /// Wizard step the author last had open. None for new projects.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_step: Option<String>,
}

impl ProjectDocument {
    pub fn new(name: &str) -> Self {
        let now = Utc::now();
        Self {
            project: ProjectMetadata {
                id: ProjectId::generate(),
                name: name.to_string(),
                created: now,
                last_modified: now,
            },
            content: BTreeMap::new(),
            current_step: None,
        }
    }
}
