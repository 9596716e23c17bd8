use crate::error::EditorError;
use crate::surface::RasterSurface;
use pdf_engine::{OpenSource, PdfEngine, RenderRequest};

#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub index: usize,
    pub surface: RasterSurface,
}

impl Page {
    pub fn new(index: usize, surface: RasterSurface) -> Self {
        Self { index, surface }
    }

    pub fn width(&self) -> u32 {
        self.surface.width()
    }

    pub fn height(&self) -> u32 {
        self.surface.height()
    }
}

/// Ordered page surfaces of one loaded PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    id: String,
    pages: Vec<Page>,
}

impl Document {
    pub fn from_surfaces(id: impl Into<String>, surfaces: Vec<RasterSurface>) -> Self {
        let pages =
            surfaces.into_iter().enumerate().map(|(index, surface)| Page::new(index, surface));
        Self { id: id.into(), pages: pages.collect() }
    }

    /// Renders every page of `source` at `scale`, in order.
    pub fn load<E: PdfEngine>(
        engine: &mut E,
        source: OpenSource,
        id: impl Into<String>,
        scale: f32,
    ) -> Result<Self, EditorError> {
        let id = id.into();
        let handle = engine.open(source).map_err(EditorError::load)?;

        let rendered = Self::render_all(engine, handle, scale);
        if let Err(err) = engine.close(handle) {
            tracing::warn!(%err, "failed to close document handle");
        }

        let document = Self::from_surfaces(id, rendered?);
        tracing::info!(id = %document.id, pages = document.page_count(), scale, "document loaded");
        Ok(document)
    }

    fn render_all<E: PdfEngine>(
        engine: &E,
        handle: pdf_engine::DocumentHandle,
        scale: f32,
    ) -> Result<Vec<RasterSurface>, EditorError> {
        let page_count = engine.page_count(handle).map_err(EditorError::load)?;

        (0..page_count)
            .map(|page_index| {
                engine
                    .render_page(handle, RenderRequest { page_index, scale })
                    .map(RasterSurface::from_image)
                    .map_err(EditorError::load)
            })
            .collect()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    pub fn pages_mut(&mut self) -> &mut [Page] {
        &mut self.pages
    }

    pub fn page(&self, index: usize) -> Result<&Page, EditorError> {
        let page_count = self.pages.len();
        self.pages.get(index).ok_or(EditorError::PageOutOfRange { page: index, page_count })
    }

    pub fn page_mut(&mut self, index: usize) -> Result<&mut Page, EditorError> {
        let page_count = self.pages.len();
        self.pages.get_mut(index).ok_or(EditorError::PageOutOfRange { page: index, page_count })
    }
}
