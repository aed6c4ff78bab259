// SPDX-License-Identifier: MIT
//! Project documents on disk.
//!
//! Documents are JSON files named `{name}_{id}.courseproj` under the
//! configured projects directory. Saves are atomic: the document is written
//! to a temp file, synced, then renamed over the target, so a crash mid-save
//! never leaves a truncated document.

use super::{ProjectDocument, ProjectId};
use anyhow::{Context as _, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::warn;

pub const PROJECT_EXTENSION: &str = "courseproj";

#[derive(Clone)]
pub struct ProjectFileStore {
    projects_dir: PathBuf,
}

impl ProjectFileStore {
    pub fn new(projects_dir: impl Into<PathBuf>) -> Self {
        Self {
            projects_dir: projects_dir.into(),
        }
    }

    pub fn projects_dir(&self) -> &Path {
        &self.projects_dir
    }

    /// Canonical path for a document: `{projects_dir}/{name}_{id}.courseproj`.
    pub fn document_path(&self, doc: &ProjectDocument) -> PathBuf {
        let name = sanitize_name(&doc.project.name);
        self.projects_dir
            .join(format!("{}_{}.{}", name, doc.project.id, PROJECT_EXTENSION))
    }

    /// Write a document to its canonical path, stamping `last_modified`.
    pub async fn save(&self, doc: &ProjectDocument) -> Result<PathBuf> {
        let mut doc = doc.clone();
        doc.project.last_modified = Utc::now();

        let path = self.document_path(&doc);
        let json = serde_json::to_string_pretty(&doc).context("serialize project document")?;

        tokio::fs::create_dir_all(&self.projects_dir)
            .await
            .context("create projects directory")?;

        // Temp file + rename keeps the previous document intact on failure
        let temp_path = path.with_extension(format!("{PROJECT_EXTENSION}.tmp"));
        {
            let mut file = tokio::fs::File::create(&temp_path)
                .await
                .context("create temp document")?;
            file.write_all(json.as_bytes())
                .await
                .context("write temp document")?;
            file.sync_all().await.context("sync temp document")?;
        }
        if let Err(e) = tokio::fs::rename(&temp_path, &path).await {
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e).context("rename temp document into place");
        }

        Ok(path)
    }

    pub async fn load(&self, path: &Path) -> Result<ProjectDocument> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("read project document {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("parse project document {}", path.display()))
    }

    /// Locate a document by project id (`*_{id}.courseproj`).
    pub async fn find_document_path(&self, id: &ProjectId) -> Option<PathBuf> {
        let suffix = format!("_{}.{}", id, PROJECT_EXTENSION);
        let mut entries = tokio::fs::read_dir(&self.projects_dir).await.ok()?;
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if let Some(file_name) = path.file_name().and_then(|n| n.to_str()) {
                if file_name.ends_with(&suffix) {
                    return Some(path);
                }
            }
        }
        None
    }

    pub async fn load_by_id(&self, id: &ProjectId) -> Result<Option<ProjectDocument>> {
        match self.find_document_path(id).await {
            Some(path) => Ok(Some(self.load(&path).await?)),
            None => Ok(None),
        }
    }

    /// All document paths, newest first.
    pub async fn list(&self) -> Result<Vec<PathBuf>> {
        let mut documents = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.projects_dir).await {
            Ok(entries) => entries,
            // Directory not created yet — no projects
            Err(_) => return Ok(Vec::new()),
        };
        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) == Some(PROJECT_EXTENSION) {
                let modified = entry
                    .metadata()
                    .await
                    .ok()
                    .and_then(|m| m.modified().ok());
                documents.push((path, modified));
            }
        }
        documents.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(documents.into_iter().map(|(p, _)| p).collect())
    }

    /// Delete a document, its backups, and the project's asset folder.
    pub async fn delete(&self, path: &Path) -> Result<()> {
        anyhow::ensure!(
            path.exists(),
            "project document not found: {}",
            path.display()
        );

        // Grab the id first so the asset folder can be removed too
        let project_id = match self.load(path).await {
            Ok(doc) => Some(doc.project.id),
            Err(e) => {
                warn!(path = %path.display(), err = %e, "deleting unreadable project document");
                None
            }
        };

        tokio::fs::remove_file(path)
            .await
            .context("delete project document")?;

        // Backup snapshots sit beside the document as `{doc}.backup-{stamp}`
        // (plus the legacy bare `.backup`)
        if let (Some(dir), Some(doc_name)) = (path.parent(), path.file_name().and_then(|n| n.to_str())) {
            let prefix = format!("{doc_name}.backup");
            if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
                while let Ok(Some(entry)) = entries.next_entry().await {
                    let name = entry.file_name();
                    if name.to_string_lossy().starts_with(&prefix) {
                        tokio::fs::remove_file(entry.path())
                            .await
                            .context("delete project backup")?;
                    }
                }
            }
        }

        if let Some(id) = project_id {
            let asset_folder = self.projects_dir.join(id.as_str());
            if asset_folder.is_dir() {
                tokio::fs::remove_dir_all(&asset_folder)
                    .await
                    .context("delete project asset folder")?;
            }
        }

        Ok(())
    }
}

fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c => c,
        })
        .collect();
    if cleaned.trim().is_empty() {
        "Untitled".to_string()
    } else {
        cleaned.trim().to_string()
    }
}
