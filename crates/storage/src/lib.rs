//! Local persistence: editor configuration and a directory-backed artifact
//! store.

mod artifacts;

pub use artifacts::LocalArtifactStore;

use directories::ProjectDirs;
use page_editor::{ConfigError, EditorConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const CONFIG_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("unable to resolve local data directory")]
    NoDataDirectory,
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("unsupported config schema version {0}")]
    UnsupportedVersion(u32),
    #[error("invalid artifact key {0:?}")]
    InvalidKey(String),
    #[error("invalid artifact payload: {0}")]
    InvalidPayload(String),
    #[error("invalid editor config: {0}")]
    InvalidConfig(#[from] ConfigError),
}

#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigEnvelope {
    version: u32,
    config: EditorConfig,
}

/// A config file holds either the versioned envelope or a bare config object.
#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
    Envelope(ConfigEnvelope),
    Bare(EditorConfig),
}

impl Storage {
    pub fn from_default_project() -> Result<Self, StorageError> {
        let dirs = ProjectDirs::from("dev", "PageAnnotator", "PageAnnotator")
            .ok_or(StorageError::NoDataDirectory)?;

        Ok(Self { root: dirs.data_local_dir().to_path_buf() })
    }

    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn load_config(&self) -> Result<EditorConfig, StorageError> {
        let path = self.config_path();
        if !path.exists() {
            return Ok(EditorConfig::default());
        }

        read_config_file(&path)
    }

    pub fn save_config(&self, config: &EditorConfig) -> Result<(), StorageError> {
        fs::create_dir_all(&self.root)?;

        let envelope = ConfigEnvelope { version: CONFIG_SCHEMA_VERSION, config: config.clone() };

        let bytes = serde_json::to_vec_pretty(&envelope)?;
        fs::write(self.config_path(), bytes)?;
        Ok(())
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("editor-config.json")
    }
}

/// Reads an editor configuration from an explicit file.
pub fn read_config_file(path: &Path) -> Result<EditorConfig, StorageError> {
    let bytes = fs::read(path)?;

    let config = match serde_json::from_slice(&bytes)? {
        ConfigFile::Envelope(envelope) if envelope.version > CONFIG_SCHEMA_VERSION => {
            return Err(StorageError::UnsupportedVersion(envelope.version));
        }
        ConfigFile::Envelope(envelope) => envelope.config,
        ConfigFile::Bare(config) => config,
    };

    config.validate()?;
    Ok(config)
}
