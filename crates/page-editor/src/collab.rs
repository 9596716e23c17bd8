//! Contracts with the hosting application: where a document's bytes come
//! from and where an exported artifact goes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use pdf_engine::OpenSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const PDF_ARTIFACT_TYPE: &str = "pdf";
const PDF_DATA_URL_PREFIX: &str = "data:application/pdf;base64,";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentLocation {
    Url(String),
    Path(PathBuf),
    Bytes(Vec<u8>),
}

impl From<DocumentLocation> for OpenSource {
    fn from(value: DocumentLocation) -> Self {
        match value {
            DocumentLocation::Url(url) => OpenSource::Url(url),
            DocumentLocation::Path(path) => OpenSource::Path(path),
            DocumentLocation::Bytes(bytes) => OpenSource::Bytes(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    /// `data:` URL carrying the encoded bytes.
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
    /// Identity of an existing artifact to overwrite.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Artifact {
    pub fn pdf(name: impl Into<String>, bytes: &[u8], id: Option<String>) -> Self {
        Self {
            name: name.into(),
            content: format!("{PDF_DATA_URL_PREFIX}{}", STANDARD.encode(bytes)),
            kind: PDF_ARTIFACT_TYPE.to_owned(),
            id,
        }
    }

    /// Decodes a base64 `data:` URL payload.
    pub fn decoded_content(&self) -> Result<Vec<u8>, CollabError> {
        let (header, payload) = self
            .content
            .split_once(',')
            .filter(|(header, _)| header.starts_with("data:") && header.ends_with(";base64"))
            .ok_or_else(|| CollabError::InvalidPayload("expected a base64 data URL".to_owned()))?;

        STANDARD
            .decode(payload.trim())
            .map_err(|err| CollabError::InvalidPayload(format!("{header}: {err}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    pub owner_id: String,
    pub container_id: String,
    pub artifact: Artifact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Identity the artifact was stored under, when the store reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl SaveOutcome {
    pub fn ok() -> Self {
        Self { success: true, error: None, id: None }
    }

    pub fn saved(id: impl Into<String>) -> Self {
        Self { success: true, error: None, id: Some(id.into()) }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self { success: false, error: Some(error.into()), id: None }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollabError {
    #[error("document {0} not found")]
    NotFound(String),
    #[error("invalid artifact payload: {0}")]
    InvalidPayload(String),
    #[error("{0}")]
    Backend(String),
}

pub trait ArtifactStore {
    /// Resolves a short-lived location for a stored document. May be called
    /// repeatedly; each call can return a fresh location.
    fn fetch_document_url(
        &self,
        document_id: &str,
        container_id: &str,
    ) -> Result<DocumentLocation, CollabError>;

    /// Creates the artifact, or overwrites it in place when `artifact.id`
    /// names an existing one.
    fn save_artifact(&self, request: &SaveRequest) -> SaveOutcome;
}
