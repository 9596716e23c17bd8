use crate::collab::CollabError;
use crate::config::ConfigError;
use pdf_engine::PdfEngineError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum EditorError {
    /// The source could not be fetched or parsed; no session exists.
    #[error("failed to load document: {0}")]
    Load(#[source] BoxError),
    /// A page could not be encoded; nothing was handed to the collaborator.
    #[error("failed to export document: {0}")]
    Export(#[source] PdfEngineError),
    /// The collaborator rejected the artifact; annotations are untouched.
    #[error("failed to save artifact: {0}")]
    Save(String),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: usize, page_count: usize },
    #[error("font error: {0}")]
    Font(String),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The collaborator could not resolve where the document lives.
    #[error("failed to locate document: {0}")]
    Locate(#[source] CollabError),
}

impl EditorError {
    pub fn load(err: impl Into<BoxError>) -> Self {
        Self::Load(err.into())
    }
}
