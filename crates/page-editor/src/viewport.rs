use std::ops::RangeInclusive;

pub const PAGE_SPACING_PX: f32 = 16.0;
pub const DEFAULT_VIEWPORT_HEIGHT_PX: f32 = 800.0;

/// Vertical scroll state over pages stacked top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    page_heights_px: Vec<f32>,
    page_spacing_px: f32,
    viewport_height_px: f32,
    scroll_offset_px: f32,
}

impl Viewport {
    pub fn new(page_heights_px: Vec<f32>, viewport_height_px: f32) -> Self {
        Self {
            page_heights_px,
            page_spacing_px: PAGE_SPACING_PX,
            viewport_height_px,
            scroll_offset_px: 0.0,
        }
    }

    pub fn scroll_offset(&self) -> f32 {
        self.scroll_offset_px
    }

    pub fn scroll_to(&mut self, offset_px: f32) {
        let max = (self.content_height() - self.viewport_height_px).max(0.0);
        self.scroll_offset_px = offset_px.clamp(0.0, max);
    }

    pub fn scroll_to_top(&mut self) {
        self.scroll_offset_px = 0.0;
    }

    pub fn scroll_to_page(&mut self, page_index: usize) {
        self.scroll_to(self.page_start_offset(page_index));
    }

    pub fn content_height(&self) -> f32 {
        let pages: f32 = self.page_heights_px.iter().sum();
        let gaps = self.page_heights_px.len().saturating_sub(1) as f32 * self.page_spacing_px;
        pages + gaps
    }

    /// Page under the vertical center of the viewport.
    pub fn current_page(&self) -> usize {
        self.page_at_offset(self.scroll_offset_px + self.viewport_height_px / 2.0)
    }

    pub fn visible_pages(&self) -> RangeInclusive<usize> {
        let start = self.page_at_offset(self.scroll_offset_px);
        let end = self.page_at_offset(self.scroll_offset_px + self.viewport_height_px);
        start..=end
    }

    pub fn page_start_offset(&self, page_index: usize) -> f32 {
        self.page_heights_px
            .iter()
            .take(page_index)
            .map(|height| height + self.page_spacing_px)
            .sum()
    }

    fn page_at_offset(&self, offset: f32) -> usize {
        let mut cursor = 0.0;

        for (index, page_height) in self.page_heights_px.iter().enumerate() {
            let page_end = cursor + page_height;
            if offset.max(0.0) <= page_end {
                return index;
            }
            cursor = page_end + self.page_spacing_px;
        }

        self.page_heights_px.len().saturating_sub(1)
    }
}
