use crate::color::Color;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::PathBuf;

pub const RENDER_SCALE_RANGE: RangeInclusive<f32> = 0.05..=16.0;
pub const STROKE_WIDTH_RANGE: RangeInclusive<f32> = 0.1..=200.0;
pub const FONT_SIZE_RANGE: RangeInclusive<f32> = 1.0..=500.0;
pub const LINE_HEIGHT_RANGE: RangeInclusive<f32> = 1.0..=1000.0;
pub const BASELINE_OFFSET_RANGE: RangeInclusive<f32> = -1000.0..=1000.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} must be between {min} and {max}, got {value}")]
    OutOfRange { field: &'static str, value: f32, min: f32, max: f32 },
}

/// Tunables for a session. Every field has a default, so a partial JSON
/// object is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Pixels per PDF point when pages are rasterized.
    pub render_scale: f32,
    pub stroke_width: f32,
    pub font_size: f32,
    /// Distance from the text anchor to the first baseline.
    pub first_baseline_offset: f32,
    pub line_height: f32,
    /// Per-page cap on each of the undo and redo stacks. `None` is unbounded.
    pub history_limit: Option<usize>,
    pub draw_color: Color,
    pub text_color: Color,
    /// TTF/OTF file used instead of the bundled sans-serif face.
    pub font_path: Option<PathBuf>,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            render_scale: 1.5,
            stroke_width: 2.0,
            font_size: 18.0,
            first_baseline_offset: 18.0,
            line_height: 22.0,
            history_limit: None,
            draw_color: Color::BLACK,
            text_color: Color::BLACK,
            font_path: None,
        }
    }
}

impl EditorConfig {
    /// Rejects values that would make rendering or drawing misbehave, such
    /// as a zero or runaway render scale.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check("render_scale", self.render_scale, RENDER_SCALE_RANGE)?;
        check("stroke_width", self.stroke_width, STROKE_WIDTH_RANGE)?;
        check("font_size", self.font_size, FONT_SIZE_RANGE)?;
        check("line_height", self.line_height, LINE_HEIGHT_RANGE)?;
        check("first_baseline_offset", self.first_baseline_offset, BASELINE_OFFSET_RANGE)
    }
}

fn check(field: &'static str, value: f32, range: RangeInclusive<f32>) -> Result<(), ConfigError> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(ConfigError::OutOfRange { field, value, min: *range.start(), max: *range.end() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn partial_json_fills_defaults() {
        let config: EditorConfig =
            serde_json::from_str(r##"{"stroke_width": 4.0, "text_color": "#ff0000"}"##)
                .expect("config should parse");

        assert_eq!(
            config,
            EditorConfig {
                stroke_width: 4.0,
                text_color: Color::rgb(255, 0, 0),
                ..EditorConfig::default()
            }
        );
    }

    #[test]
    fn defaults_are_valid() {
        assert_eq!(EditorConfig::default().validate(), Ok(()));
    }

    #[test]
    fn runaway_and_non_finite_values_are_rejected() {
        let huge_scale = EditorConfig { render_scale: 1000.0, ..EditorConfig::default() };
        assert!(matches!(
            huge_scale.validate(),
            Err(ConfigError::OutOfRange { field: "render_scale", .. })
        ));

        let zero_stroke = EditorConfig { stroke_width: 0.0, ..EditorConfig::default() };
        assert!(matches!(
            zero_stroke.validate(),
            Err(ConfigError::OutOfRange { field: "stroke_width", .. })
        ));

        let nan_font = EditorConfig { font_size: f32::NAN, ..EditorConfig::default() };
        assert!(matches!(
            nan_font.validate(),
            Err(ConfigError::OutOfRange { field: "font_size", .. })
        ));
    }
}
