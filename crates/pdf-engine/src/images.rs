use crate::color::ColorSpace;
use crate::objects::{number, resolve, stream_bytes};
use crate::{PdfEngineError, RgbaImage};
use image::{GrayImage, ImageFormat, Luma, Rgba};
use lopdf::{Dictionary, Document, Object, Stream};

/// Decodes an image XObject into straight-alpha RGBA.
///
/// `stencil` is the fill color used by `/ImageMask` images. Returns
/// `Ok(None)` for encodings that cannot be decoded here (JPX, JBIG2, CCITT).
pub(crate) fn decode_image(
    doc: &Document,
    resources: Option<&Dictionary>,
    stream: &Stream,
    stencil: [u8; 3],
) -> Result<Option<RgbaImage>, PdfEngineError> {
    let dict = &stream.dict;
    let dimension = |key: &[u8]| {
        dict.get(key).ok().and_then(number).map(|value| value as i64).filter(|value| *value > 0)
    };
    let (Some(width), Some(height)) = (dimension(b"Width"), dimension(b"Height")) else {
        return Ok(None);
    };
    let (Ok(width), Ok(height)) = (u32::try_from(width), u32::try_from(height)) else {
        return Ok(None);
    };
    if u64::from(width) * u64::from(height) > crate::MAX_PAGE_PIXELS {
        return Err(PdfEngineError::PageTooLarge {
            width: u64::from(width),
            height: u64::from(height),
            limit: crate::MAX_PAGE_PIXELS,
        });
    }

    let filter = last_filter(dict);
    let mut image = match filter.as_deref() {
        Some(b"DCTDecode") => {
            let decoded = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|err| PdfEngineError::Backend(format!("JPEG image: {err}")))?;
            decoded.to_rgba8()
        }
        Some(b"JPXDecode" | b"JBIG2Decode" | b"CCITTFaxDecode") => return Ok(None),
        _ => {
            let samples = stream_bytes(stream)?;
            match decode_samples(doc, resources, dict, &samples, width, height, stencil) {
                Some(image) => image,
                None => return Ok(None),
            }
        }
    };

    if let Some(alpha) = soft_mask(doc, resources, dict, width, height)? {
        for (pixel, mask) in image.pixels_mut().zip(alpha.pixels()) {
            pixel[3] = ((u32::from(pixel[3]) * u32::from(mask[0]) + 127) / 255) as u8;
        }
    }

    Ok(Some(image))
}

fn last_filter(dict: &Dictionary) -> Option<Vec<u8>> {
    match dict.get(b"Filter").ok()? {
        Object::Name(name) => Some(name.clone()),
        Object::Array(filters) => filters.last()?.as_name().ok().map(<[u8]>::to_vec),
        _ => None,
    }
}

fn decode_samples(
    doc: &Document,
    resources: Option<&Dictionary>,
    dict: &Dictionary,
    samples: &[u8],
    width: u32,
    height: u32,
    stencil: [u8; 3],
) -> Option<RgbaImage> {
    let is_mask = matches!(dict.get(b"ImageMask").and_then(Object::as_bool), Ok(true));
    if is_mask {
        let paint_on = u16::from(decode_inverted(dict));
        let rows = unpack(samples, width, height, 1, 1)?;
        let [r, g, b] = stencil;
        return Some(RgbaImage::from_fn(width, height, |x, y| {
            let sample = rows[(y * width + x) as usize];
            Rgba([r, g, b, if sample == paint_on { 255 } else { 0 }])
        }));
    }

    let bits = dict.get(b"BitsPerComponent").ok().and_then(number).unwrap_or(8.0) as u32;
    let space = match dict.get(b"ColorSpace") {
        Ok(space) => ColorSpace::resolve(doc, resources, space),
        Err(_) => ColorSpace::Gray,
    };
    let channels = space.components();
    if channels == 0 || !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return None;
    }

    let values = unpack(samples, width, height, channels, bits)?;
    let max = ((1u32 << bits) - 1) as f32;
    let indexed = matches!(space, ColorSpace::Indexed { .. });
    let mut components = vec![0.0f32; channels];

    Some(RgbaImage::from_fn(width, height, |x, y| {
        let offset = (y * width + x) as usize * channels;
        for (channel, component) in components.iter_mut().enumerate() {
            let raw = f32::from(values[offset + channel]);
            *component = if indexed { raw } else { raw / max };
        }
        let [r, g, b] = space.to_rgb(&components).unwrap_or([0.0, 0.0, 0.0]);
        Rgba([to_u8(r), to_u8(g), to_u8(b), 255])
    }))
}

fn decode_inverted(dict: &Dictionary) -> bool {
    dict.get(b"Decode")
        .and_then(Object::as_array)
        .ok()
        .and_then(|decode| decode.first())
        .and_then(number)
        .is_some_and(|first| first >= 1.0)
}

/// Splits packed samples into one value per component. Rows start on byte
/// boundaries; 16-bit samples keep their high byte.
fn unpack(samples: &[u8], width: u32, height: u32, channels: usize, bits: u32) -> Option<Vec<u16>> {
    let per_row = width as usize * channels;
    let row_bytes = (per_row * bits as usize).div_ceil(8);
    if samples.len() < row_bytes * height as usize {
        tracing::warn!(width, height, len = samples.len(), "image has short sample data");
        return None;
    }

    let mut values = Vec::with_capacity(per_row * height as usize);
    for row in samples.chunks(row_bytes).take(height as usize) {
        match bits {
            8 => values.extend(row.iter().map(|byte| u16::from(*byte))),
            16 => values.extend(row.chunks(2).map(|pair| u16::from(pair[0]))),
            _ => {
                let mask = (1u16 << bits) - 1;
                for index in 0..per_row {
                    let bit = index * bits as usize;
                    let byte = u16::from(row[bit / 8]);
                    let shift = 8 - bits as usize - bit % 8;
                    values.push((byte >> shift) & mask);
                }
            }
        }
    }
    Some(values)
}

fn soft_mask(
    doc: &Document,
    resources: Option<&Dictionary>,
    dict: &Dictionary,
    width: u32,
    height: u32,
) -> Result<Option<GrayImage>, PdfEngineError> {
    let Some(mask) = dict
        .get(b"SMask")
        .ok()
        .and_then(|mask| resolve(doc, mask))
        .and_then(|mask| mask.as_stream().ok())
    else {
        return Ok(None);
    };

    let Some(decoded) = decode_image(doc, resources, mask, [0, 0, 0])? else {
        return Ok(None);
    };
    let gray = GrayImage::from_fn(decoded.width(), decoded.height(), |x, y| {
        Luma([decoded.get_pixel(x, y)[0]])
    });

    if gray.dimensions() == (width, height) {
        return Ok(Some(gray));
    }
    Ok(Some(image::imageops::resize(&gray, width, height, image::imageops::FilterType::Triangle)))
}

fn to_u8(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
