use crate::document::Page;
use crate::surface::{FrameSnapshot, RasterSurface};
use std::collections::VecDeque;

#[derive(Debug, Default)]
struct HistoryStack {
    undo: VecDeque<FrameSnapshot>,
    redo: VecDeque<FrameSnapshot>,
}

/// Undo and redo stacks of full-frame snapshots, one pair per page.
#[derive(Debug)]
pub struct HistoryStore {
    stacks: Vec<HistoryStack>,
    limit: Option<usize>,
}

impl HistoryStore {
    pub fn new(page_count: usize, limit: Option<usize>) -> Self {
        Self { stacks: (0..page_count).map(|_| HistoryStack::default()).collect(), limit }
    }

    /// Saves the pre-mutation state of `page_index` and forgets its redo
    /// branch. Must run before the mutation it guards.
    pub fn record_checkpoint(&mut self, page_index: usize, surface: &RasterSurface) {
        let limit = self.limit;
        let Some(stack) = self.stacks.get_mut(page_index) else {
            return;
        };

        push_bounded(&mut stack.undo, surface.snapshot(), limit);
        stack.redo.clear();
        tracing::debug!(page = page_index, depth = stack.undo.len(), "checkpoint recorded");
    }

    /// Steps every page with undo history back one frame. Returns how many
    /// pages changed.
    pub fn undo(&mut self, pages: &mut [Page]) -> usize {
        let limit = self.limit;
        let mut restored = 0;

        for (stack, page) in self.stacks.iter_mut().zip(pages.iter_mut()) {
            let Some(snapshot) = stack.undo.pop_back() else {
                continue;
            };
            let current = page.surface.restore(snapshot);
            push_bounded(&mut stack.redo, current, limit);
            restored += 1;
        }

        restored
    }

    /// Mirror of [`HistoryStore::undo`].
    pub fn redo(&mut self, pages: &mut [Page]) -> usize {
        let limit = self.limit;
        let mut restored = 0;

        for (stack, page) in self.stacks.iter_mut().zip(pages.iter_mut()) {
            let Some(snapshot) = stack.redo.pop_back() else {
                continue;
            };
            let current = page.surface.restore(snapshot);
            push_bounded(&mut stack.undo, current, limit);
            restored += 1;
        }

        restored
    }

    pub fn undo_depth(&self, page_index: usize) -> usize {
        self.stacks.get(page_index).map_or(0, |stack| stack.undo.len())
    }

    pub fn redo_depth(&self, page_index: usize) -> usize {
        self.stacks.get(page_index).map_or(0, |stack| stack.redo.len())
    }
}

fn push_bounded(
    stack: &mut VecDeque<FrameSnapshot>,
    snapshot: FrameSnapshot,
    limit: Option<usize>,
) {
    stack.push_back(snapshot);
    if let Some(limit) = limit {
        while stack.len() > limit {
            stack.pop_front();
        }
    }
}
