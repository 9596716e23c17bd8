//! Page rasterization and image-page PDF writing.
//!
//! A [`PdfEngine`] opens a document once and renders any of its pages into an
//! opaque RGBA buffer at a caller-chosen scale. The [`writer`] module goes the
//! other way and assembles a new document whose pages are full-page images.

mod color;
mod fonts;
mod images;
mod objects;
mod raster;
pub mod writer;

use image::{ImageBuffer, Rgba};
use lopdf::content::Content;
use lopdf::{Document, ObjectId};
use objects::{inherited, MediaBox};
use std::collections::HashMap;
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

pub use fonts::FALLBACK_FONT;
pub use writer::write_image_pages;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// Largest canvas a render may allocate, in pixels (256 MiB of RGBA).
pub const MAX_PAGE_PIXELS: u64 = 1 << 26;

#[cfg(test)]
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentHandle(u64);

impl DocumentHandle {
    pub fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// Pixel dimensions of this page rendered at `scale`.
    ///
    /// Fractional pixels are dropped, the way a canvas truncates a float
    /// viewport size; every page is at least one pixel in each direction.
    pub fn to_pixels(self, scale: f32) -> (u32, u32) {
        let scale = if scale > 0.0 && scale.is_finite() { scale } else { 1.0 };
        let width = (self.width_pt * scale).floor().max(1.0) as u32;
        let height = (self.height_pt * scale).floor().max(1.0) as u32;
        (width, height)
    }

    /// Like [`PageSize::to_pixels`], but rejects a scale that is not a
    /// positive finite number and any canvas above [`MAX_PAGE_PIXELS`].
    pub fn checked_pixels(self, scale: f32) -> Result<(u32, u32), PdfEngineError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(PdfEngineError::InvalidScale(scale));
        }
        let width = (f64::from(self.width_pt) * f64::from(scale)).floor().max(1.0);
        let height = (f64::from(self.height_pt) * f64::from(scale)).floor().max(1.0);
        if width * height > MAX_PAGE_PIXELS as f64 {
            return Err(PdfEngineError::PageTooLarge {
                width: width.min(u64::MAX as f64) as u64,
                height: height.min(u64::MAX as f64) as u64,
                limit: MAX_PAGE_PIXELS,
            });
        }
        Ok((width as u32, height as u32))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderRequest {
    pub page_index: u32,
    pub scale: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self { page_index: 0, scale: 1.0 }
    }
}

#[derive(Debug, Clone)]
pub enum OpenSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Url(String),
}

impl From<PathBuf> for OpenSource {
    fn from(value: PathBuf) -> Self {
        Self::Path(value)
    }
}

impl From<&Path> for OpenSource {
    fn from(value: &Path) -> Self {
        Self::Path(value.to_path_buf())
    }
}

impl From<Vec<u8>> for OpenSource {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl OpenSource {
    /// Reads the source into memory. URLs are fetched on every call.
    pub fn read(self) -> Result<Vec<u8>, PdfEngineError> {
        match self {
            Self::Path(path) => Ok(fs::read(path)?),
            Self::Bytes(bytes) => Ok(bytes),
            Self::Url(url) => match url.strip_prefix("file://") {
                Some(path) => Ok(fs::read(path)?),
                None => fetch_url(&url),
            },
        }
    }
}

fn fetch_url(url: &str) -> Result<Vec<u8>, PdfEngineError> {
    tracing::debug!(url, "fetching document");

    let response = ureq::get(url)
        .call()
        .map_err(|err| PdfEngineError::Fetch { url: url.to_owned(), reason: err.to_string() })?;

    let mut bytes = Vec::new();
    response.into_reader().read_to_end(&mut bytes)?;
    Ok(bytes)
}

#[derive(Debug, thiserror::Error)]
pub enum PdfEngineError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("PDF parse error: {0}")]
    Parse(#[from] lopdf::Error),
    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },
    #[error("invalid handle {0}")]
    InvalidHandle(u64),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("document has no pages")]
    NoPages,
    #[error("page {index} has an empty image")]
    EmptyPage { index: usize },
    #[error("failed to write PDF: {0}")]
    Write(String),
    #[error("backend error: {0}")]
    Backend(String),
    #[error("render scale {0} must be a positive finite number")]
    InvalidScale(f32),
    #[error("page would be {width}x{height} pixels, over the {limit} pixel limit")]
    PageTooLarge { width: u64, height: u64, limit: u64 },
    #[error("page {page} cannot be rendered by the built-in engine: {reason}")]
    Unsupported { page: u32, reason: String },
}

pub trait PdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError>;
    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError>;
    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError>;
    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError>;
    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError>;
}

#[derive(Debug, Clone)]
struct DocumentRecord {
    bytes: Vec<u8>,
    document: Document,
    pages: Vec<ObjectId>,
    media_boxes: Vec<MediaBox>,
}

/// Pure-Rust engine backed by `lopdf`, `tiny-skia` and `fontdue`.
///
/// Page content is interpreted and rasterized in-process. A page that only
/// paints one image over its whole MediaBox (the layout produced by
/// [`write_image_pages`]) is decoded directly so its pixels come back
/// unchanged. Content the rasterizer cannot draw is reported as
/// [`PdfEngineError::Unsupported`].
#[derive(Debug, Default)]
pub struct LopdfEngine {
    next_handle: u64,
    docs: HashMap<DocumentHandle, DocumentRecord>,
}

impl LopdfEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse(bytes: Vec<u8>) -> Result<DocumentRecord, PdfEngineError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(PdfEngineError::EncryptedUnsupported);
        }

        let document = Document::load_mem(&bytes)?;
        let pages: Vec<ObjectId> = document.get_pages().into_values().collect();
        if pages.is_empty() {
            return Err(PdfEngineError::NoPages);
        }

        let media_boxes = pages
            .iter()
            .map(|page_id| MediaBox::of_page(&document, *page_id).unwrap_or(MediaBox::FALLBACK))
            .collect();

        Ok(DocumentRecord { bytes, document, pages, media_boxes })
    }

    fn record(&self, handle: DocumentHandle) -> Result<&DocumentRecord, PdfEngineError> {
        self.docs.get(&handle).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

impl DocumentRecord {
    fn media_box(&self, page_index: u32) -> Result<MediaBox, PdfEngineError> {
        self.media_boxes.get(page_index as usize).copied().ok_or(PdfEngineError::PageOutOfRange {
            page: page_index,
            page_count: self.media_boxes.len() as u32,
        })
    }
}

impl PdfEngine for LopdfEngine {
    fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
        let record = Self::parse(source.read()?)?;

        self.next_handle += 1;
        let handle = DocumentHandle(self.next_handle);
        tracing::debug!(
            handle = handle.raw(),
            pages = record.pages.len(),
            bytes = record.bytes.len(),
            "opened document"
        );
        self.docs.insert(handle, record);

        Ok(handle)
    }

    fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
        Ok(self.record(handle)?.media_boxes.len() as u32)
    }

    fn page_size(
        &self,
        handle: DocumentHandle,
        page_index: u32,
    ) -> Result<PageSize, PdfEngineError> {
        Ok(self.record(handle)?.media_box(page_index)?.size())
    }

    fn render_page(
        &self,
        handle: DocumentHandle,
        request: RenderRequest,
    ) -> Result<RgbaImage, PdfEngineError> {
        let record = self.record(handle)?;
        let media = record.media_box(request.page_index)?;
        let (width, height) = media.size().checked_pixels(request.scale)?;
        let page_id = record.pages[request.page_index as usize];

        match full_page_image(&record.document, page_id, media)? {
            Some(image) if image.dimensions() == (width, height) => Ok(image),
            Some(image) => Ok(image::imageops::resize(
                &image,
                width,
                height,
                image::imageops::FilterType::Triangle,
            )),
            None => {
                let page = request.page_index;
                tracing::trace!(page, width, height, "rasterizing page content");
                raster::render_page(&record.document, page_id, page, media, width, height)
            }
        }
    }

    fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
        self.docs.remove(&handle).map(|_| ()).ok_or(PdfEngineError::InvalidHandle(handle.raw()))
    }
}

/// Decodes the image a page paints when its content is exactly one `Do` of an
/// image XObject stretched over the MediaBox, optionally wrapped in `q`/`Q`.
fn full_page_image(
    doc: &Document,
    page_id: ObjectId,
    media: MediaBox,
) -> Result<Option<RgbaImage>, PdfEngineError> {
    let content = match doc.get_page_content(page_id) {
        Ok(bytes) => Content::decode(&bytes)?,
        Err(_) => return Ok(None),
    };

    let expected = [media.width, 0.0, 0.0, media.height, media.left, media.bottom];
    let mut placed = false;
    let mut painted = None;
    for operation in &content.operations {
        match operation.operator.as_str() {
            "q" | "Q" => {}
            "cm" if !placed => {
                let values: Vec<f32> =
                    operation.operands.iter().filter_map(objects::number).collect();
                placed = values.len() == 6
                    && values.iter().zip(expected).all(|(value, want)| (value - want).abs() < 1e-3);
                if !placed {
                    return Ok(None);
                }
            }
            "Do" if placed && painted.is_none() => {
                painted = operation.operands.first().and_then(|name| name.as_name().ok());
            }
            _ => return Ok(None),
        }
    }
    let Some(name) = painted else {
        return Ok(None);
    };

    let resources = inherited(doc, page_id, b"Resources").and_then(|r| r.as_dict().ok());
    let is_image = |stream: &&lopdf::Stream| {
        matches!(stream.dict.get(b"Subtype").and_then(|s| s.as_name()), Ok(b"Image"))
    };
    let Some(stream) = objects::resource(doc, resources, b"XObject", name)
        .and_then(|xobject| xobject.as_stream().ok())
        .filter(is_image)
    else {
        return Ok(None);
    };

    let Some(mut image) = images::decode_image(doc, resources, stream, [0, 0, 0])? else {
        return Ok(None);
    };
    flatten_onto_white(&mut image);
    Ok(Some(image))
}

/// Composites every pixel over opaque white so the buffer has no transparency.
pub fn flatten_onto_white(image: &mut RgbaImage) {
    for pixel in image.pixels_mut() {
        let alpha = u32::from(pixel[3]);
        if alpha == 255 {
            continue;
        }
        for channel in 0..3 {
            let value = u32::from(pixel[channel]) * alpha + 255 * (255 - alpha);
            pixel[channel] = ((value + 127) / 255) as u8;
        }
        pixel[3] = 255;
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Full-fidelity renderer. Geometry and handles come from [`LopdfEngine`];
    /// pixels come from PDFium.
    pub struct PdfiumEngine {
        pdfium: Pdfium,
        inner: LopdfEngine,
    }

    impl PdfiumEngine {
        /// Binds PDFium from the executable's directory, the working directory
        /// or the system library path, in that order.
        pub fn from_system_library() -> Result<Self, PdfEngineError> {
            let exe_dir = std::env::current_exe()
                .ok()
                .and_then(|path| path.parent().map(|dir| dir.to_path_buf()));

            if let Some(dir) = exe_dir {
                if let Ok(bindings) =
                    Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(&dir))
                {
                    return Ok(Self { pdfium: Pdfium::new(bindings), inner: LopdfEngine::new() });
                }
            }

            let bindings =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|err| {
                        PdfEngineError::Backend(format!("failed to bind pdfium library: {err}"))
                    })?;

            Ok(Self { pdfium: Pdfium::new(bindings), inner: LopdfEngine::new() })
        }
    }

    impl PdfEngine for PdfiumEngine {
        fn open(&mut self, source: OpenSource) -> Result<DocumentHandle, PdfEngineError> {
            self.inner.open(source)
        }

        fn page_count(&self, handle: DocumentHandle) -> Result<u32, PdfEngineError> {
            self.inner.page_count(handle)
        }

        fn page_size(
            &self,
            handle: DocumentHandle,
            page_index: u32,
        ) -> Result<PageSize, PdfEngineError> {
            self.inner.page_size(handle, page_index)
        }

        fn render_page(
            &self,
            handle: DocumentHandle,
            request: RenderRequest,
        ) -> Result<RgbaImage, PdfEngineError> {
            let record = self.inner.record(handle)?;
            let (width, height) =
                record.media_box(request.page_index)?.size().checked_pixels(request.scale)?;
            let index = u16::try_from(request.page_index).map_err(|_| {
                PdfEngineError::PageOutOfRange {
                    page: request.page_index,
                    page_count: record.media_boxes.len() as u32,
                }
            })?;

            let backend = |err: PdfiumError| PdfEngineError::Backend(err.to_string());
            let document =
                self.pdfium.load_pdf_from_byte_slice(&record.bytes, None).map_err(backend)?;
            let page = document.pages().get(index).map_err(backend)?;

            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32);
            let bitmap = page.render_with_config(&config).map_err(backend)?;

            let mut image = RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes().to_vec())
                .ok_or_else(|| {
                    PdfEngineError::Backend(format!(
                        "pdfium returned a bitmap that is not {width}x{height}"
                    ))
                })?;
            flatten_onto_white(&mut image);

            Ok(image)
        }

        fn close(&mut self, handle: DocumentHandle) -> Result<(), PdfEngineError> {
            self.inner.close(handle)
        }
    }
}

pub fn default_engine() -> LopdfEngine {
    LopdfEngine::new()
}
