use crate::collab::{Artifact, SaveRequest};
use crate::document::Document;
use crate::error::EditorError;
use crate::session::SessionContext;
use std::time::{SystemTime, UNIX_EPOCH};

/// Flattens every page surface into one full-page image of a new PDF.
pub fn export_document(document: &Document) -> Result<Vec<u8>, EditorError> {
    let pixels = document.pages().iter().map(|page| page.surface.pixels());
    let bytes = pdf_engine::write_image_pages(pixels).map_err(EditorError::Export)?;

    tracing::info!(
        id = %document.id(),
        pages = document.page_count(),
        bytes = bytes.len(),
        "document exported"
    );
    Ok(bytes)
}

/// Last `/`-separated segment of the document id, or a timestamped fallback
/// when there is no usable segment.
pub fn artifact_name(document_id: &str, now_millis: u128) -> String {
    match document_id.rsplit('/').next() {
        Some(name) if !name.is_empty() => name.to_owned(),
        _ => format!("Edited_{now_millis}.pdf"),
    }
}

/// Packages exported bytes as an overwrite of the session's source document.
pub fn save_request(context: &SessionContext, bytes: &[u8], now_millis: u128) -> SaveRequest {
    let id = Some(context.document_id.clone()).filter(|id| !id.is_empty());

    SaveRequest {
        owner_id: context.owner_id.clone(),
        container_id: context.container_id.clone(),
        artifact: Artifact::pdf(artifact_name(&context.document_id, now_millis), bytes, id),
    }
}

pub fn unix_millis() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map_or(0, |elapsed| elapsed.as_millis())
}
