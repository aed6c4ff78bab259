//! One-shot import of settings persisted by the legacy shell.
//!
//! Earlier shell versions kept per-project settings in a single flat JSON
//! blob (`{"<project_id>": { ...camelCase settings... }}`) exported from the
//! web-view's local storage. This imports that blob into the content store.
//! Projects that already have a stored draft are skipped — the store wins
//! over the legacy blob. Malformed entries are logged and skipped; the
//! import never fails wholesale because one entry is bad.

use super::{CourseSettings, COURSE_SETTINGS_KEY};
use crate::project::ProjectId;
use crate::storage::ContentStore;
use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Import a legacy settings blob into `store`.
pub async fn migrate_legacy_settings(
    path: &Path,
    store: &dyn ContentStore,
) -> Result<MigrationReport> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("read legacy settings blob {}", path.display()))?;
    let blob: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(&contents).context("parse legacy settings blob")?;

    let mut report = MigrationReport::default();

    for (raw_id, entry) in blob {
        let project_id = ProjectId::from(raw_id.as_str());

        let existing = match store.get_content(&project_id, COURSE_SETTINGS_KEY).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(project_id = %project_id, err = %e, "could not probe store — entry not migrated");
                report.failed += 1;
                continue;
            }
        };
        if existing.is_some() {
            report.skipped += 1;
            continue;
        }

        let mut settings = match serde_json::from_value::<CourseSettings>(entry) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(project_id = %project_id, err = %e, "malformed legacy entry — skipped");
                report.failed += 1;
                continue;
            }
        };
        settings.clamp_ranges();

        let value = serde_json::to_value(&settings).context("serialize migrated settings")?;
        match store
            .save_content(&project_id, COURSE_SETTINGS_KEY, &value)
            .await
        {
            Ok(()) => report.migrated += 1,
            Err(e) => {
                warn!(project_id = %project_id, err = %e, "could not write migrated entry");
                report.failed += 1;
            }
        }
    }

    info!(
        migrated = report.migrated,
        skipped = report.skipped,
        failed = report.failed,
        "legacy settings migration finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SqliteContentStore;
    use tempfile::TempDir;

    async fn write_blob(dir: &TempDir, blob: serde_json::Value) -> std::path::PathBuf {
        let path = dir.path().join("legacy-settings.json");
        tokio::fs::write(&path, blob.to_string()).await.unwrap();
        path
    }

    #[tokio::test]
    async fn imports_entries_into_store() {
        let dir = TempDir::new().unwrap();
        let store = SqliteContentStore::in_memory().await.unwrap();
        let path = write_blob(
            &dir,
            serde_json::json!({
                "p1": {"navigationMode": "linear", "passMark": 70},
                "p2": {"passMark": 95}
            }),
        )
        .await;

        let report = migrate_legacy_settings(&path, &store).await.unwrap();
        assert_eq!(report, MigrationReport { migrated: 2, skipped: 0, failed: 0 });

        let p1 = store
            .get_content(&ProjectId::from("p1"), COURSE_SETTINGS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p1["navigationMode"], "linear");
        assert_eq!(p1["passMark"], 70);
    }

    #[tokio::test]
    async fn existing_store_entries_win() {
        let dir = TempDir::new().unwrap();
        let store = SqliteContentStore::in_memory().await.unwrap();
        store
            .save_content(
                &ProjectId::from("p1"),
                COURSE_SETTINGS_KEY,
                &serde_json::json!({"passMark": 88}),
            )
            .await
            .unwrap();
        let path = write_blob(&dir, serde_json::json!({"p1": {"passMark": 40}})).await;

        let report = migrate_legacy_settings(&path, &store).await.unwrap();
        assert_eq!(report.skipped, 1);
        assert_eq!(report.migrated, 0);

        let p1 = store
            .get_content(&ProjectId::from("p1"), COURSE_SETTINGS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p1["passMark"], 88);
    }

    #[tokio::test]
    async fn malformed_entries_are_counted_not_fatal() {
        let dir = TempDir::new().unwrap();
        let store = SqliteContentStore::in_memory().await.unwrap();
        let path = write_blob(
            &dir,
            serde_json::json!({
                "good": {"passMark": 75},
                "bad": {"navigationMode": "sideways"}
            }),
        )
        .await;

        let report = migrate_legacy_settings(&path, &store).await.unwrap();
        assert_eq!(report.migrated, 1);
        assert_eq!(report.failed, 1);
    }

    #[tokio::test]
    async fn migrated_values_are_clamped() {
        let dir = TempDir::new().unwrap();
        let store = SqliteContentStore::in_memory().await.unwrap();
        let path = write_blob(&dir, serde_json::json!({"p1": {"passMark": 250}})).await;

        migrate_legacy_settings(&path, &store).await.unwrap();
        let p1 = store
            .get_content(&ProjectId::from("p1"), COURSE_SETTINGS_KEY)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(p1["passMark"], 100);
    }

    #[tokio::test]
    async fn missing_blob_is_an_error() {
        let store = SqliteContentStore::in_memory().await.unwrap();
        let err = migrate_legacy_settings(Path::new("/nonexistent/blob.json"), &store)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("legacy settings blob"));
    }
}
