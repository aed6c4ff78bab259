//! File-backed content access — the secondary store path.
//!
//! Reads and writes content records through the project document on disk
//! instead of the SQLite autosave table. Used when a primary write fails and
//! by recovery flows that need the document the author can see and copy.

use super::ContentStore;
use crate::error::StoreError;
use crate::project::files::ProjectFileStore;
use crate::project::{ProjectDocument, ProjectId, ProjectMetadata};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

#[derive(Clone)]
pub struct FileContentStore {
    files: ProjectFileStore,
}

impl FileContentStore {
    pub fn new(files: ProjectFileStore) -> Self {
        Self { files }
    }
}

#[async_trait]
impl ContentStore for FileContentStore {
    async fn get_content(
        &self,
        project_id: &ProjectId,
        key: &str,
    ) -> Result<Option<Value>, StoreError> {
        let doc = self
            .files
            .load_by_id(project_id)
            .await
            .map_err(|e| StoreError::read(key, e))?;
        Ok(doc.and_then(|d| d.content.get(key).cloned()))
    }

    async fn save_content(
        &self,
        project_id: &ProjectId,
        key: &str,
        value: &Value,
    ) -> Result<(), StoreError> {
        let mut doc = self
            .files
            .load_by_id(project_id)
            .await
            .map_err(|e| StoreError::write(key, e))?
            .unwrap_or_else(|| untitled_document(project_id));

        doc.content.insert(key.to_string(), value.clone());
        self.files
            .save(&doc)
            .await
            .map_err(|e| StoreError::write(key, e))?;
        Ok(())
    }
}

/// Document shell for content saved before the project was ever named.
fn untitled_document(project_id: &ProjectId) -> ProjectDocument {
    let now = Utc::now();
    ProjectDocument {
        project: ProjectMetadata {
            id: project_id.clone(),
            name: "Untitled".to_string(),
            created: now,
            last_modified: now,
        },
        content: Default::default(),
        current_step: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> FileContentStore {
        FileContentStore::new(ProjectFileStore::new(dir.path()))
    }

    #[tokio::test]
    async fn get_on_missing_document_is_none() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let got = s
            .get_content(&ProjectId::from("p1"), "courseSettings")
            .await
            .unwrap();
        assert!(got.is_none());
    }

    #[tokio::test]
    async fn save_creates_untitled_document() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let pid = ProjectId::from("p1");
        s.save_content(&pid, "courseSettings", &json!({"passMark": 90}))
            .await
            .unwrap();

        let got = s.get_content(&pid, "courseSettings").await.unwrap().unwrap();
        assert_eq!(got["passMark"], 90);

        // Lands in the conventional Untitled_{id} document
        let files = ProjectFileStore::new(dir.path());
        let path = files.find_document_path(&pid).await.unwrap();
        assert!(path
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("Untitled_"));
    }

    #[tokio::test]
    async fn save_preserves_other_content_keys() {
        let dir = TempDir::new().unwrap();
        let s = store(&dir);
        let pid = ProjectId::from("p1");
        s.save_content(&pid, "courseSettings", &json!({"passMark": 90}))
            .await
            .unwrap();
        s.save_content(&pid, "media", &json!({"images": []}))
            .await
            .unwrap();

        let settings = s.get_content(&pid, "courseSettings").await.unwrap().unwrap();
        assert_eq!(settings["passMark"], 90);
        let media = s.get_content(&pid, "media").await.unwrap().unwrap();
        assert!(media["images"].as_array().unwrap().is_empty());
    }
}
