// SPDX-License-Identifier: MIT
//! Courseforge — host-side engine for a web-view course-authoring shell.
//!
//! The shell renders the wizard; this crate owns the stateful parts behind
//! it: the settings draft lifecycle (load, debounced autosave, commit on
//! step advance), project documents on disk, backup snapshots, and the
//! events the shell subscribes to.

pub mod config;
pub mod dirty;
pub mod error;
pub mod events;
pub mod observability;
pub mod project;
pub mod settings;
pub mod storage;

use std::sync::Arc;
use std::time::Duration;

use config::HostConfig;
use dirty::DirtyTracker;
use error::StoreError;
use events::EventBroadcaster;
use project::{BackupManager, ProjectFileStore, ProjectRegistry};
use settings::SettingsController;
use storage::file::FileContentStore;
use storage::{ContentStore, SqliteContentStore};

/// Shared application state handed to every wizard step and background task.
#[derive(Clone)]
pub struct AuthoringContext {
    pub config: Arc<HostConfig>,
    /// Primary autosave path (SQLite).
    pub store: Arc<SqliteContentStore>,
    /// Secondary path through the on-disk project document.
    pub file_store: Arc<FileContentStore>,
    pub files: ProjectFileStore,
    pub backups: Arc<BackupManager>,
    pub dirty: Arc<DirtyTracker>,
    pub broadcaster: EventBroadcaster,
    pub projects: Arc<ProjectRegistry>,
}

impl AuthoringContext {
    pub async fn new(config: HostConfig) -> anyhow::Result<Self> {
        let store = Arc::new(
            SqliteContentStore::new_with_slow_query(
                &config.data_dir,
                config.slow_query_threshold_ms,
            )
            .await?,
        );
        let files = ProjectFileStore::new(&config.projects_dir);
        let file_store = Arc::new(FileContentStore::new(files.clone()));
        let backups = Arc::new(BackupManager::new(files.clone(), config.backup.keep));
        let broadcaster = EventBroadcaster::new();
        let dirty = Arc::new(DirtyTracker::new(broadcaster.clone()));
        let projects = Arc::new(ProjectRegistry::new(broadcaster.clone()));

        Ok(Self {
            config: Arc::new(config),
            store,
            file_store,
            files,
            backups,
            dirty,
            broadcaster,
            projects,
        })
    }

    /// Persist a content record for the current project.
    ///
    /// Wizard steps other than settings (media, topics, assessment) go
    /// through this. Returns [`StoreError::NoProjectOpen`] when no project
    /// is open — an expected state the caller treats as a no-op.
    pub async fn save_step_content(
        &self,
        key: &str,
        value: &serde_json::Value,
    ) -> Result<(), StoreError> {
        let project_id = self.projects.current().ok_or(StoreError::NoProjectOpen)?;
        self.store.save_content(&project_id, key, value).await
    }

    /// Read a content record for the current project.
    pub async fn get_step_content(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let project_id = self.projects.current().ok_or(StoreError::NoProjectOpen)?;
        self.store.get_content(&project_id, key).await
    }

    /// Build the controller for one activation of the settings step.
    ///
    /// Each activation gets a fresh controller; call
    /// [`SettingsController::close`] when the step unmounts.
    pub fn settings_controller(&self) -> Arc<SettingsController> {
        SettingsController::new(
            self.store.clone(),
            self.file_store.clone(),
            self.dirty.clone(),
            self.projects.clone(),
            self.broadcaster.clone(),
            Duration::from_millis(self.config.autosave.debounce_ms),
            Duration::from_millis(self.config.autosave.readiness_wait_ms),
        )
    }
}
