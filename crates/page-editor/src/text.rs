use crate::color::Color;
use crate::config::EditorConfig;
use crate::error::EditorError;
use crate::surface::{Point, RasterSurface};
use fontdue::{Font, FontSettings};
use std::fs;

/// Rasterizes committed text straight into page pixels.
pub struct TextRenderer {
    font: Font,
    font_size: f32,
    first_baseline_offset: f32,
    line_height: f32,
}

impl std::fmt::Debug for TextRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextRenderer")
            .field("font_size", &self.font_size)
            .field("first_baseline_offset", &self.first_baseline_offset)
            .field("line_height", &self.line_height)
            .finish_non_exhaustive()
    }
}

impl TextRenderer {
    pub fn from_config(config: &EditorConfig) -> Result<Self, EditorError> {
        let font = match &config.font_path {
            Some(path) => {
                let bytes = fs::read(path).map_err(|err| {
                    EditorError::Font(format!("failed to read {}: {err}", path.display()))
                })?;
                parse_font(bytes)?
            }
            None => parse_font(pdf_engine::FALLBACK_FONT)?,
        };

        Ok(Self {
            font,
            font_size: config.font_size,
            first_baseline_offset: config.first_baseline_offset,
            line_height: config.line_height,
        })
    }

    /// Baseline of line `line_index` for text anchored at `anchor`.
    pub fn baseline(&self, anchor: Point, line_index: usize) -> f32 {
        anchor.y + self.first_baseline_offset + line_index as f32 * self.line_height
    }

    /// Draws each `\n`-separated line left-aligned at `anchor.x`.
    pub fn draw(&self, surface: &mut RasterSurface, anchor: Point, text: &str, color: Color) {
        for (line_index, line) in text.split('\n').enumerate() {
            let baseline = self.baseline(anchor, line_index).round() as i64;
            let mut pen_x = anchor.x;
            let mut previous = None;

            for ch in line.chars() {
                if let Some(kern) =
                    previous.and_then(|prev| self.font.horizontal_kern(prev, ch, self.font_size))
                {
                    pen_x += kern;
                }

                let (metrics, coverage) = self.font.rasterize(ch, self.font_size);
                let left = pen_x.round() as i64 + i64::from(metrics.xmin);
                let top = baseline - (i64::from(metrics.ymin) + metrics.height as i64);

                for (row, row_coverage) in coverage.chunks(metrics.width.max(1)).enumerate() {
                    for (column, value) in row_coverage.iter().enumerate() {
                        surface.blend(left + column as i64, top + row as i64, *value, color);
                    }
                }

                pen_x += metrics.advance_width;
                previous = Some(ch);
            }
        }
    }
}

fn parse_font<Data>(bytes: Data) -> Result<Font, EditorError>
where
    Data: std::ops::Deref<Target = [u8]>,
{
    Font::from_bytes(bytes, FontSettings::default())
        .map_err(|err| EditorError::Font(err.to_owned()))
}
