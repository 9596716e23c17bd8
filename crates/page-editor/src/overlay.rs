use crate::surface::Point;

/// The single open text input, anchored to one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTextEntry {
    pub page_index: usize,
    pub anchor: Point,
    text: String,
}

impl PendingTextEntry {
    pub fn new(page_index: usize, anchor: Point) -> Self {
        Self { page_index, anchor, text: String::new() }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn push_str(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn newline(&mut self) {
        self.text.push('\n');
    }

    pub fn backspace(&mut self) {
        self.text.pop();
    }

    /// Empty or whitespace-only entries are dropped instead of committed.
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextResolution {
    Committed { page_index: usize },
    Discarded,
}
