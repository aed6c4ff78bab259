// SPDX-License-Identifier: MIT
//! Backup snapshots of project documents.
//!
//! A snapshot is taken before risky operations (import, recovery, step
//! transitions that rewrite the document). Snapshot failures degrade to a
//! warning — a backup must never block the save it precedes.

use super::files::{ProjectFileStore, PROJECT_EXTENSION};
use super::ProjectId;
use anyhow::{Context as _, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryInfo {
    pub has_recovery: bool,
    pub backup_timestamp: Option<String>,
    pub backup_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupResult {
    pub deleted_count: usize,
    pub kept_count: usize,
}

pub struct BackupManager {
    files: ProjectFileStore,
    keep: usize,
}

impl BackupManager {
    pub fn new(files: ProjectFileStore, keep: usize) -> Self {
        Self { files, keep }
    }

    /// Snapshot the current document. Missing document is a no-op.
    ///
    /// Old snapshots beyond the retention count are pruned afterwards.
    pub async fn create_backup(&self, project_id: &ProjectId) -> Result<()> {
        let Some(doc_path) = self.files.find_document_path(project_id).await else {
            debug!(project_id = %project_id, "no document yet — skipping backup");
            return Ok(());
        };

        let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
        let backup_path = doc_path.with_extension(format!("{PROJECT_EXTENSION}.backup-{stamp}"));

        if let Err(e) = tokio::fs::copy(&doc_path, &backup_path).await {
            // Degrade: the upcoming save matters more than its snapshot
            warn!(project_id = %project_id, err = %e, "failed to create backup");
            return Ok(());
        }
        debug!(project_id = %project_id, path = %backup_path.display(), "backup created");

        if let Err(e) = self.cleanup_old_backups(project_id, self.keep).await {
            warn!(project_id = %project_id, err = %e, "backup cleanup failed");
        }
        Ok(())
    }

    /// Probe for a recoverable snapshot.
    pub async fn check_recovery(&self, project_id: &ProjectId) -> Result<RecoveryInfo> {
        match self.newest_backup(project_id).await? {
            Some((path, modified)) => Ok(RecoveryInfo {
                has_recovery: true,
                backup_timestamp: Some(modified.to_rfc3339()),
                backup_path: Some(path.to_string_lossy().to_string()),
            }),
            None => Ok(RecoveryInfo {
                has_recovery: false,
                backup_timestamp: None,
                backup_path: None,
            }),
        }
    }

    /// Load the newest snapshot, stamped with recovery metadata.
    pub async fn recover(&self, project_id: &ProjectId) -> Result<serde_json::Value> {
        let (path, _) = self
            .newest_backup(project_id)
            .await?
            .context("no backup found")?;

        let contents = tokio::fs::read_to_string(&path)
            .await
            .context("read backup")?;
        let mut doc: serde_json::Value =
            serde_json::from_str(&contents).context("parse backup")?;

        if let Some(obj) = doc.as_object_mut() {
            obj.insert(
                "recovery".to_string(),
                serde_json::json!({
                    "recovered": true,
                    "timestamp": Utc::now().to_rfc3339(),
                }),
            );
        }
        Ok(doc)
    }

    /// Prune snapshots, newest-first retention.
    pub async fn cleanup_old_backups(
        &self,
        project_id: &ProjectId,
        keep: usize,
    ) -> Result<CleanupResult> {
        let mut backups = self.backups_for(project_id).await?;
        backups.sort_by(|a, b| b.1.cmp(&a.1));

        let mut deleted_count = 0;
        for (path, _) in backups.iter().skip(keep) {
            if tokio::fs::remove_file(path).await.is_ok() {
                deleted_count += 1;
                debug!(path = %path.display(), "deleted old backup");
            }
        }
        Ok(CleanupResult {
            deleted_count,
            kept_count: backups.len().min(keep),
        })
    }

    async fn newest_backup(
        &self,
        project_id: &ProjectId,
    ) -> Result<Option<(PathBuf, DateTime<Utc>)>> {
        let mut backups = self.backups_for(project_id).await?;
        backups.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(backups.into_iter().next())
    }

    /// All snapshot files for a project: `*_{id}.courseproj.backup-*`.
    async fn backups_for(&self, project_id: &ProjectId) -> Result<Vec<(PathBuf, DateTime<Utc>)>> {
        let marker = format!("_{}.{}.backup-", project_id, PROJECT_EXTENSION);
        let mut found = Vec::new();
        let mut entries = match tokio::fs::read_dir(self.files.projects_dir()).await {
            Ok(entries) => entries,
            Err(_) => return Ok(found),
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.contains(&marker) {
                continue;
            }
            let modified = entry
                .metadata()
                .await
                .ok()
                .and_then(|m| m.modified().ok())
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(Utc::now);
            found.push((path, modified));
        }
        Ok(found)
    }
}
