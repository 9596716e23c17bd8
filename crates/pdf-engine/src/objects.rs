//! Small lookups over `lopdf` objects shared by geometry, images and the
//! content rasterizer.

use crate::PageSize;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

/// Page boundary in default user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct MediaBox {
    pub left: f32,
    pub bottom: f32,
    pub width: f32,
    pub height: f32,
}

impl MediaBox {
    /// US Letter, used when a page carries no usable MediaBox.
    pub const FALLBACK: MediaBox = MediaBox { left: 0.0, bottom: 0.0, width: 612.0, height: 792.0 };

    pub fn size(self) -> PageSize {
        PageSize { width_pt: self.width, height_pt: self.height }
    }

    /// Reads a page's MediaBox, following the `Parent` chain for inherited
    /// boxes. Degenerate boxes are treated as missing.
    pub fn of_page(doc: &Document, page_id: ObjectId) -> Option<MediaBox> {
        let array = inherited(doc, page_id, b"MediaBox")?.as_array().ok()?;
        let [x0, y0, x1, y1] = array.as_slice() else {
            return None;
        };
        let (x0, y0, x1, y1) = (number(x0)?, number(y0)?, number(x1)?, number(y1)?);

        let width = (x1 - x0).abs();
        let height = (y1 - y0).abs();
        if !(width.is_finite() && height.is_finite()) || width <= 0.0 || height <= 0.0 {
            return None;
        }
        Some(MediaBox { left: x0.min(x1), bottom: y0.min(y1), width, height })
    }
}

/// Looks `key` up on the page, then on each ancestor `Pages` node.
pub(crate) fn inherited<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut dict = doc.get_dictionary(page_id).ok()?;

    for _ in 0..64 {
        if let Ok(object) = dict.get(key) {
            return resolve(doc, object);
        }
        let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
        dict = doc.get_dictionary(parent).ok()?;
    }
    None
}

pub(crate) fn resolve<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => doc.get_object(*id).ok(),
        other => Some(other),
    }
}

pub(crate) fn resolve_dict<'a>(doc: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    resolve(doc, object)?.as_dict().ok()
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    object.as_float().ok().filter(|value| value.is_finite())
}

/// Stream payload with its filters removed.
pub(crate) fn stream_bytes(stream: &Stream) -> Result<Vec<u8>, lopdf::Error> {
    if stream.dict.has(b"Filter") {
        stream.decompressed_content()
    } else {
        Ok(stream.content.clone())
    }
}

/// Resource entry `category/name` from the current resource dictionary.
pub(crate) fn resource<'a>(
    doc: &'a Document,
    resources: Option<&'a Dictionary>,
    category: &[u8],
    name: &[u8],
) -> Option<&'a Object> {
    let entries = resolve_dict(doc, resources?.get(category).ok()?)?;
    resolve(doc, entries.get(name).ok()?)
}
