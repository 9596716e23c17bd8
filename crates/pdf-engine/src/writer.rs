use crate::{PdfEngineError, RgbaImage};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;

const IMAGE_NAME: &[u8] = b"Im0";

/// Builds a PDF with one page per image, in order.
///
/// Each page's MediaBox is `[0 0 width height]` where width and height are
/// the image's pixel dimensions, and the page paints the image over the whole
/// box. Pixels are stored as 8-bit DeviceRGB with Flate compression; alpha is
/// composited over white first.
pub fn write_image_pages<'a, I>(pages: I) -> Result<Vec<u8>, PdfEngineError>
where
    I: IntoIterator<Item = &'a RgbaImage>,
{
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::new();

    for (index, image) in pages.into_iter().enumerate() {
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(PdfEngineError::EmptyPage { index });
        }
        let (width, height) = (i64::from(width), i64::from(height));

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "FlateDecode",
            },
            deflate(&rgb_samples(image))?,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0_i64.into(),
                        0_i64.into(),
                        height.into(),
                        0_i64.into(),
                        0_i64.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0_i64.into(), 0_i64.into(), width.into(), height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        kids.push(page_id.into());
    }

    if kids.is_empty() {
        return Err(PdfEngineError::NoPages);
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut output = Vec::new();
    doc.save_to(&mut output).map_err(|err| PdfEngineError::Write(err.to_string()))?;

    tracing::debug!(pages = count, bytes = output.len(), "wrote image-page document");
    Ok(output)
}

fn rgb_samples(image: &RgbaImage) -> Vec<u8> {
    let mut samples = Vec::with_capacity(image.width() as usize * image.height() as usize * 3);
    for pixel in image.pixels() {
        let alpha = u32::from(pixel[3]);
        for channel in 0..3 {
            let value = u32::from(pixel[channel]) * alpha + 255 * (255 - alpha);
            samples.push(((value + 127) / 255) as u8);
        }
    }
    samples
}

fn deflate(bytes: &[u8]) -> Result<Vec<u8>, PdfEngineError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;
    use pretty_assertions::assert_eq;

    #[test]
    fn writes_one_page_per_image_with_pixel_media_box() {
        let first = RgbaImage::from_pixel(120, 80, Rgba([255, 255, 255, 255]));
        let second = RgbaImage::from_pixel(33, 44, Rgba([0, 0, 0, 255]));

        let bytes = write_image_pages([&first, &second]).expect("write should succeed");
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).expect("output should parse");
        let pages: Vec<_> = doc.get_pages().into_values().collect();
        assert_eq!(pages.len(), 2);

        let media_box = |index: usize| -> Vec<f32> {
            doc.get_dictionary(pages[index])
                .expect("page dict")
                .get(b"MediaBox")
                .expect("media box")
                .as_array()
                .expect("array")
                .iter()
                .map(|value| value.as_float().expect("number"))
                .collect()
        };
        assert_eq!(media_box(0), vec![0.0, 0.0, 120.0, 80.0]);
        assert_eq!(media_box(1), vec![0.0, 0.0, 33.0, 44.0]);
    }

    #[test]
    fn empty_input_is_rejected() {
        let err = write_image_pages(std::iter::empty()).expect_err("no pages");
        assert!(matches!(err, PdfEngineError::NoPages));
    }

    #[test]
    fn zero_sized_image_is_rejected() {
        let good = RgbaImage::from_pixel(2, 2, Rgba([255, 255, 255, 255]));
        let empty = RgbaImage::new(0, 0);

        let err = write_image_pages([&good, &empty]).expect_err("empty page");
        assert!(matches!(err, PdfEngineError::EmptyPage { index: 1 }));
    }

    #[test]
    fn transparent_pixels_become_white_samples() {
        let image = RgbaImage::from_pixel(1, 1, Rgba([10, 20, 30, 0]));
        assert_eq!(rgb_samples(&image), vec![255, 255, 255]);
    }
}
