use crate::color::Color;
use image::Rgba;
use pdf_engine::RgbaImage;
use serde::{Deserialize, Serialize};
use tiny_skia::{LineCap, Paint, PathBuilder, PixmapMut, Stroke, Transform};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Immutable full copy of a surface's pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameSnapshot(RgbaImage);

impl FrameSnapshot {
    pub fn pixels(&self) -> &RgbaImage {
        &self.0
    }
}

/// Opaque RGBA pixel buffer for one page.
///
/// Mutations are limited to stroking a segment, blending glyph coverage and
/// replacing the whole buffer from a snapshot. Every pixel keeps alpha 255.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterSurface {
    pixels: RgbaImage,
}

impl RasterSurface {
    pub fn blank(width: u32, height: u32) -> Self {
        Self { pixels: RgbaImage::from_pixel(width.max(1), height.max(1), Rgba([255; 4])) }
    }

    pub fn from_image(mut image: RgbaImage) -> Self {
        if image.width() == 0 || image.height() == 0 {
            return Self::blank(image.width(), image.height());
        }
        pdf_engine::flatten_onto_white(&mut image);
        Self { pixels: image }
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        FrameSnapshot(self.pixels.clone())
    }

    /// Replaces the buffer with `snapshot` and returns the replaced frame.
    pub fn restore(&mut self, snapshot: FrameSnapshot) -> FrameSnapshot {
        debug_assert_eq!(snapshot.0.dimensions(), self.pixels.dimensions());
        FrameSnapshot(std::mem::replace(&mut self.pixels, snapshot.0))
    }

    /// Strokes an anti-aliased, round-capped line from `from` to `to`.
    pub fn draw_segment(&mut self, from: Point, to: Point, color: Color, width: f32) {
        let (w, h) = self.pixels.dimensions();
        let Some(mut pixmap) = PixmapMut::from_bytes(&mut self.pixels, w, h) else {
            return;
        };

        let mut builder = PathBuilder::new();
        builder.move_to(from.x, from.y);
        builder.line_to(to.x, to.y);
        let Some(path) = builder.finish() else {
            return;
        };

        let mut paint = Paint::default();
        paint.set_color_rgba8(color.r, color.g, color.b, color.a);
        paint.anti_alias = true;

        let stroke = Stroke { width, line_cap: LineCap::Round, ..Stroke::default() };
        pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
    }

    /// Blends `color` over one pixel with the given 0..=255 coverage.
    /// Coordinates outside the surface are ignored.
    pub fn blend(&mut self, x: i64, y: i64, coverage: u8, color: Color) {
        let (Ok(x), Ok(y)) = (u32::try_from(x), u32::try_from(y)) else {
            return;
        };
        if x >= self.width() || y >= self.height() || coverage == 0 {
            return;
        }

        let alpha = u32::from(coverage) * u32::from(color.a) / 255;
        let pixel = self.pixels.get_pixel_mut(x, y);
        for (channel, source) in [color.r, color.g, color.b].into_iter().enumerate() {
            let value = u32::from(source) * alpha + u32::from(pixel[channel]) * (255 - alpha);
            pixel[channel] = ((value + 127) / 255) as u8;
        }
        pixel[3] = 255;
    }
}
