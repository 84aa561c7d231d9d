//! Project persistence over a storage provider.

use std::sync::Arc;

use tracing::{debug, info};

use wasmpress_common::{Error, ObjectKey, ProjectId, Result};
use wasmpress_storage::StorageProvider;

use crate::model::Project;
use crate::settings::{SettingsStore, LAST_PROJECT_KEY};

const PROJECTS_PREFIX: &str = "projects/";

/// Saves and loads project documents through a storage provider.
///
/// Documents live under `projects/<id>.json`. When a settings store is
/// attached, the most recently saved or opened project id is recorded
/// under `last_project`.
pub struct ProjectStore {
    provider: Arc<dyn StorageProvider>,
    settings: Option<Arc<SettingsStore>>,
}

impl ProjectStore {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self {
            provider,
            settings: None,
        }
    }

    /// Attach a settings store for last-project bookkeeping.
    pub fn with_settings(mut self, settings: Arc<SettingsStore>) -> Self {
        self.settings = Some(settings);
        self
    }

    fn key_for(id: &ProjectId) -> Result<ObjectKey> {
        ObjectKey::parse(&format!("{}{}.json", PROJECTS_PREFIX, id.as_str()))
    }

    /// Serialize and upload a project, bumping its modification time.
    pub async fn save(&self, project: &mut Project) -> Result<()> {
        project.touch();
        let data = serde_json::to_vec_pretty(project)
            .map_err(|e| Error::Serialization(e.to_string()))?;
        let key = Self::key_for(&project.id)?;
        let receipt = self.provider.upload(&key, data).await?;
        info!(project = %project.id, size = receipt.size, "project saved");
        self.remember_last(&project.id).await?;
        Ok(())
    }

    /// Download and deserialize a project.
    ///
    /// # Errors
    /// - [`Error::NotFound`] when no document exists for the id
    /// - [`Error::Serialization`] for a malformed document
    /// - [`Error::InvalidInput`] for a document written by a newer schema
    pub async fn load(&self, id: &ProjectId) -> Result<Project> {
        let key = Self::key_for(id)?;
        let data = self.provider.download(&key).await?;
        let project: Project = serde_json::from_slice(&data)
            .map_err(|e| Error::Serialization(format!("project '{}': {}", id, e)))?;
        if !project.schema_version.is_compatible() {
            return Err(Error::InvalidInput(format!(
                "project '{}' uses schema version {}.{}, which is newer than this build supports",
                id, project.schema_version.major, project.schema_version.minor
            )));
        }
        self.remember_last(id).await?;
        Ok(project)
    }

    /// Delete a project document. Returns whether anything was removed.
    pub async fn delete(&self, id: &ProjectId) -> Result<bool> {
        let key = Self::key_for(id)?;
        let deleted = self.provider.delete(&key).await?;
        if deleted {
            debug!(project = %id, "project deleted");
            if let Some(settings) = &self.settings {
                if settings.get_as::<String>(LAST_PROJECT_KEY)?.as_deref()
                    == Some(id.as_str())
                {
                    settings.remove(LAST_PROJECT_KEY).await?;
                }
            }
        }
        Ok(deleted)
    }

    /// List the ids of all stored projects, sorted.
    pub async fn list_projects(&self) -> Result<Vec<String>> {
        let objects = self.provider.list(PROJECTS_PREFIX).await?;
        let mut ids: Vec<String> = objects
            .iter()
            .filter_map(|meta| {
                meta.key
                    .as_str()
                    .strip_prefix(PROJECTS_PREFIX)
                    .and_then(|name| name.strip_suffix(".json"))
                    .map(str::to_string)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }

    /// Id of the most recently saved or opened project, if recorded.
    pub fn last_project(&self) -> Result<Option<String>> {
        match &self.settings {
            Some(settings) => settings.get_as(LAST_PROJECT_KEY),
            None => Ok(None),
        }
    }

    async fn remember_last(&self, id: &ProjectId) -> Result<()> {
        if let Some(settings) = &self.settings {
            settings
                .set(LAST_PROJECT_KEY, serde_json::Value::String(id.to_string()))
                .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ComponentNode;
    use wasmpress_storage::MemoryProvider;

    async fn connected_memory() -> Arc<dyn StorageProvider> {
        let provider = Arc::new(MemoryProvider::new());
        provider
            .connect(serde_json::json!({ "database": "test" }))
            .await
            .unwrap();
        provider
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let store = ProjectStore::new(connected_memory().await);
        let id = ProjectId::new("landing").unwrap();
        let mut project = Project::new(id.clone(), "Landing");
        project
            .components
            .push(ComponentNode::new("container").with_child(ComponentNode::new("heading")));

        store.save(&mut project).await.unwrap();
        let loaded = store.load(&id).await.unwrap();
        assert_eq!(loaded.name, "Landing");
        assert_eq!(loaded.components, project.components);
    }

    #[tokio::test]
    async fn test_load_missing_project() {
        let store = ProjectStore::new(connected_memory().await);
        let id = ProjectId::new("ghost").unwrap();
        assert!(matches!(store.load(&id).await, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_newer_schema_is_rejected() {
        let provider = connected_memory().await;
        let doc = serde_json::json!({
            "schema_version": {"major": 2, "minor": 0},
            "id": "future",
            "name": "Future",
            "created_at": "2026-01-01T00:00:00Z",
            "modified_at": "2026-01-01T00:00:00Z"
        });
        let key = ObjectKey::parse("projects/future.json").unwrap();
        provider
            .upload(&key, serde_json::to_vec(&doc).unwrap())
            .await
            .unwrap();

        let store = ProjectStore::new(provider);
        let id = ProjectId::new("future").unwrap();
        assert!(matches!(
            store.load(&id).await,
            Err(Error::InvalidInput(_))
        ));
    }

    #[tokio::test]
    async fn test_list_and_delete() {
        let store = ProjectStore::new(connected_memory().await);
        for name in ["alpha", "beta"] {
            let mut project = Project::new(ProjectId::new(name).unwrap(), name);
            store.save(&mut project).await.unwrap();
        }

        assert_eq!(store.list_projects().await.unwrap(), vec!["alpha", "beta"]);

        let alpha = ProjectId::new("alpha").unwrap();
        assert!(store.delete(&alpha).await.unwrap());
        assert!(!store.delete(&alpha).await.unwrap());
        assert_eq!(store.list_projects().await.unwrap(), vec!["beta"]);
    }

    #[tokio::test]
    async fn test_last_project_bookkeeping() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Arc::new(
            SettingsStore::open(dir.path().join("settings.json"))
                .await
                .unwrap(),
        );
        let store =
            ProjectStore::new(connected_memory().await).with_settings(Arc::clone(&settings));

        assert_eq!(store.last_project().unwrap(), None);

        let id = ProjectId::new("site").unwrap();
        let mut project = Project::new(id.clone(), "Site");
        store.save(&mut project).await.unwrap();
        assert_eq!(store.last_project().unwrap().as_deref(), Some("site"));

        assert!(store.delete(&id).await.unwrap());
        assert_eq!(store.last_project().unwrap(), None);
    }

    #[tokio::test]
    async fn test_save_bumps_modified_at() {
        let store = ProjectStore::new(connected_memory().await);
        let id = ProjectId::new("p").unwrap();
        let mut project = Project::new(id.clone(), "P");
        let before = project.modified_at;
        store.save(&mut project).await.unwrap();
        assert!(project.modified_at >= before);
    }
}
