use crate::StorageError;
use page_editor::{ArtifactStore, CollabError, DocumentLocation, SaveOutcome, SaveRequest};
use std::fs;
use std::path::{Component, Path, PathBuf};

/// Artifacts laid out as `<root>/<owner>/<container>/<name>`. An artifact's
/// id is its path relative to the root, with `/` separators.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps an id onto the filesystem. Absolute paths and `..` are rejected.
    pub fn artifact_path(&self, id: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(id);
        let only_normal = relative.components().all(|part| matches!(part, Component::Normal(_)));
        if id.is_empty() || !only_normal {
            return Err(StorageError::InvalidKey(id.to_owned()));
        }

        Ok(self.root.join(relative))
    }

    pub fn artifact_id(owner_id: &str, container_id: &str, name: &str) -> String {
        format!("{owner_id}/{container_id}/{name}")
    }

    /// Stores raw bytes as a new artifact and returns its id.
    pub fn import(
        &self,
        owner_id: &str,
        container_id: &str,
        name: &str,
        bytes: &[u8],
    ) -> Result<String, StorageError> {
        let id = Self::artifact_id(owner_id, container_id, name);
        write_atomic(&self.artifact_path(&id)?, bytes)?;
        Ok(id)
    }

    /// Writes the artifact and returns the id and path it was stored under.
    fn save(&self, request: &SaveRequest) -> Result<(String, PathBuf), StorageError> {
        let artifact = &request.artifact;
        let bytes = artifact
            .decoded_content()
            .map_err(|err| StorageError::InvalidPayload(err.to_string()))?;

        let existing = match artifact.id.as_deref() {
            Some(id) => {
                let path = self.artifact_path(id)?;
                path.is_file().then(|| (id.to_owned(), path))
            }
            None => None,
        };
        let (id, target) = match existing {
            Some(found) => found,
            None => {
                let id =
                    Self::artifact_id(&request.owner_id, &request.container_id, &artifact.name);
                let path = self.artifact_path(&id)?;
                (id, path)
            }
        };

        write_atomic(&target, &bytes)?;
        Ok((id, target))
    }
}

impl ArtifactStore for LocalArtifactStore {
    fn fetch_document_url(
        &self,
        document_id: &str,
        container_id: &str,
    ) -> Result<DocumentLocation, CollabError> {
        let path =
            self.artifact_path(document_id).map_err(|err| CollabError::Backend(err.to_string()))?;
        if !path.is_file() {
            return Err(CollabError::NotFound(document_id.to_owned()));
        }

        tracing::debug!(document_id, container_id, path = %path.display(), "resolved document");
        Ok(DocumentLocation::Path(path))
    }

    fn save_artifact(&self, request: &SaveRequest) -> SaveOutcome {
        match self.save(request) {
            Ok((id, path)) => {
                tracing::info!(
                    name = %request.artifact.name,
                    %id,
                    path = %path.display(),
                    "artifact written"
                );
                SaveOutcome::saved(id)
            }
            Err(err) => {
                tracing::warn!(name = %request.artifact.name, %err, "artifact write failed");
                SaveOutcome::failed(err.to_string())
            }
        }
    }
}

/// Writes to a sibling temp file, then renames over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let parent = path.parent().ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
    fs::create_dir_all(parent)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| StorageError::InvalidKey(path.display().to_string()))?;
    let temp = parent.join(format!(".{file_name}.partial"));

    fs::write(&temp, bytes)?;
    if let Err(err) = fs::rename(&temp, path) {
        let _ = fs::remove_file(&temp);
        return Err(err.into());
    }
    Ok(())
}
