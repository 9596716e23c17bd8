use crate::color::Color;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tool {
    #[default]
    Draw,
    Text,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolState {
    pub active: Tool,
    pub draw_color: Color,
    pub text_color: Color,
}

impl ToolState {
    pub fn new(draw_color: Color, text_color: Color) -> Self {
        Self { active: Tool::Draw, draw_color, text_color }
    }

    /// Color applied by the next committed action of the active tool.
    pub fn active_color(&self) -> Color {
        match self.active {
            Tool::Draw => self.draw_color,
            Tool::Text => self.text_color,
        }
    }
}

impl Default for ToolState {
    fn default() -> Self {
        Self::new(Color::BLACK, Color::BLACK)
    }
}
