use crate::collab::{ArtifactStore, CollabError, DocumentLocation};
use crate::color::Color;
use crate::config::EditorConfig;
use crate::document::Document;
use crate::error::EditorError;
use crate::export;
use crate::history::HistoryStore;
use crate::overlay::{PendingTextEntry, TextResolution};
use crate::surface::Point;
use crate::text::TextRenderer;
use crate::tools::{Tool, ToolState};
use crate::viewport::{Viewport, DEFAULT_VIEWPORT_HEIGHT_PX};
use pdf_engine::{OpenSource, PdfEngine};

/// Identity the editor is embedded with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionContext {
    pub document_id: String,
    pub container_id: String,
    pub owner_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ActiveStroke {
    page_index: usize,
    last: Point,
}

/// One open document with its tools, history and pending text.
#[derive(Debug)]
pub struct EditorSession {
    context: SessionContext,
    config: EditorConfig,
    document: Document,
    history: HistoryStore,
    tools: ToolState,
    stroke: Option<ActiveStroke>,
    pending_text: Option<PendingTextEntry>,
    text_renderer: TextRenderer,
    viewport: Viewport,
    /// Identity of the artifact written by the last successful save.
    last_saved_id: Option<String>,
}

impl EditorSession {
    pub fn new(
        context: SessionContext,
        document: Document,
        config: EditorConfig,
    ) -> Result<Self, EditorError> {
        config.validate()?;
        let text_renderer = TextRenderer::from_config(&config)?;
        let history = HistoryStore::new(document.page_count(), config.history_limit);
        let heights = document.pages().iter().map(|page| page.height() as f32).collect();
        let mut viewport = Viewport::new(heights, DEFAULT_VIEWPORT_HEIGHT_PX);
        viewport.scroll_to_top();

        Ok(Self {
            context,
            tools: ToolState::new(config.draw_color, config.text_color),
            config,
            document,
            history,
            stroke: None,
            pending_text: None,
            text_renderer,
            viewport,
            last_saved_id: None,
        })
    }

    /// Rasterizes `source` at the configured scale and opens a session on it.
    pub fn open<E: PdfEngine>(
        engine: &mut E,
        source: OpenSource,
        context: SessionContext,
        config: EditorConfig,
    ) -> Result<Self, EditorError> {
        config.validate()?;
        let document = Document::load(engine, source, &context.document_id, config.render_scale)?;
        Self::new(context, document, config)
    }

    /// Resolves the document through the collaborator, then opens it.
    pub fn open_from_store<E: PdfEngine, S: ArtifactStore + ?Sized>(
        engine: &mut E,
        store: &S,
        context: SessionContext,
        config: EditorConfig,
    ) -> Result<Self, EditorError> {
        let location = store
            .fetch_document_url(&context.document_id, &context.container_id)
            .map_err(EditorError::load)?;
        Self::open(engine, location.into(), context, config)
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    pub fn pending_text(&self) -> Option<&PendingTextEntry> {
        self.pending_text.as_ref()
    }

    pub fn is_drawing(&self) -> bool {
        self.stroke.is_some()
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn viewport_mut(&mut self) -> &mut Viewport {
        &mut self.viewport
    }

    /// Switches tools. Pending text is resolved first; entering Text drops
    /// any in-progress stroke.
    pub fn select_tool(&mut self, tool: Tool) {
        self.resolve_pending_text();
        if tool == Tool::Text {
            self.stroke = None;
        }
        self.tools.active = tool;
        tracing::debug!(?tool, "tool selected");
    }

    pub fn set_draw_color(&mut self, color: Color) {
        self.tools.draw_color = color;
    }

    pub fn set_text_color(&mut self, color: Color) {
        self.tools.text_color = color;
    }

    pub fn pointer_down(&mut self, page_index: usize, point: Point) -> Result<(), EditorError> {
        let page = self.document.page(page_index)?;

        match self.tools.active {
            Tool::Draw => {
                self.history.record_checkpoint(page_index, &page.surface);
                self.stroke = Some(ActiveStroke { page_index, last: point });
            }
            Tool::Text => {
                self.resolve_pending_text();
                self.pending_text = Some(PendingTextEntry::new(page_index, point));
                tracing::debug!(page = page_index, x = point.x, y = point.y, "text entry opened");
            }
        }

        Ok(())
    }

    pub fn pointer_move(&mut self, page_index: usize, point: Point) -> Result<(), EditorError> {
        self.document.page(page_index)?;

        let Some(stroke) = self.stroke.as_mut().filter(|stroke| stroke.page_index == page_index)
        else {
            return Ok(());
        };

        let from = std::mem::replace(&mut stroke.last, point);
        let page = self.document.page_mut(page_index)?;
        page.surface.draw_segment(from, point, self.tools.draw_color, self.config.stroke_width);

        Ok(())
    }

    pub fn pointer_up(&mut self) {
        self.stroke = None;
    }

    pub fn pointer_leave(&mut self, page_index: usize) -> Result<(), EditorError> {
        self.document.page(page_index)?;
        if self.stroke.is_some_and(|stroke| stroke.page_index == page_index) {
            self.stroke = None;
        }
        Ok(())
    }

    pub fn type_text(&mut self, text: &str) {
        if let Some(entry) = self.pending_text.as_mut() {
            entry.push_str(text);
        }
    }

    /// Enter commits the pending entry; Shift+Enter starts a new line.
    pub fn enter(&mut self, shift: bool) {
        if shift {
            if let Some(entry) = self.pending_text.as_mut() {
                entry.newline();
            }
        } else {
            self.resolve_pending_text();
        }
    }

    pub fn backspace(&mut self) {
        if let Some(entry) = self.pending_text.as_mut() {
            entry.backspace();
        }
    }

    /// Discards the pending entry without touching any page.
    pub fn escape(&mut self) {
        if self.pending_text.take().is_some() {
            tracing::debug!("text entry discarded");
        }
    }

    /// Focus loss commits like Enter.
    pub fn blur(&mut self) {
        self.resolve_pending_text();
    }

    /// Commits a non-blank pending entry onto its page, or drops a blank one.
    pub fn resolve_pending_text(&mut self) -> Option<TextResolution> {
        let entry = self.pending_text.take()?;
        if entry.is_blank() {
            return Some(TextResolution::Discarded);
        }

        let Ok(page) = self.document.page_mut(entry.page_index) else {
            return Some(TextResolution::Discarded);
        };
        self.history.record_checkpoint(entry.page_index, &page.surface);
        let color = self.tools.text_color;
        self.text_renderer.draw(&mut page.surface, entry.anchor, entry.text(), color);

        tracing::debug!(page = entry.page_index, chars = entry.text().len(), "text committed");
        Some(TextResolution::Committed { page_index: entry.page_index })
    }

    /// Global undo. Any open text input is discarded first.
    pub fn undo(&mut self) -> usize {
        self.pending_text = None;
        let restored = self.history.undo(self.document.pages_mut());
        tracing::debug!(restored, "undo");
        restored
    }

    pub fn redo(&mut self) -> usize {
        self.pending_text = None;
        let restored = self.history.redo(self.document.pages_mut());
        tracing::debug!(restored, "redo");
        restored
    }

    /// Flattens every page into new PDF bytes, committing pending text first.
    pub fn export(&mut self) -> Result<Vec<u8>, EditorError> {
        self.blur();
        export::export_document(&self.document)
    }

    /// Exports and hands the result to `store` as an overwrite of the source
    /// document. Returns the artifact name. On failure the session is left as
    /// it was so the save can be retried.
    pub fn save<S: ArtifactStore + ?Sized>(&mut self, store: &S) -> Result<String, EditorError> {
        let bytes = self.export()?;
        let request = export::save_request(&self.context, &bytes, export::unix_millis());

        let outcome = store.save_artifact(&request);
        if !outcome.success {
            let reason =
                outcome.error.unwrap_or_else(|| "collaborator reported failure".to_owned());
            tracing::warn!(name = %request.artifact.name, %reason, "save rejected");
            return Err(EditorError::Save(reason));
        }

        let id = outcome.id.or(request.artifact.id);
        tracing::info!(
            name = %request.artifact.name,
            id = id.as_deref().unwrap_or_default(),
            owner = %request.owner_id,
            container = %request.container_id,
            "artifact saved"
        );
        self.last_saved_id = id;
        Ok(request.artifact.name)
    }

    /// Identity of the artifact written by the last successful save.
    pub fn last_saved_id(&self) -> Option<&str> {
        self.last_saved_id.as_deref()
    }

    /// Asks `store` where the saved artifact can be downloaded from. Before
    /// any save this resolves the source document instead.
    pub fn artifact_location<S: ArtifactStore + ?Sized>(
        &self,
        store: &S,
    ) -> Result<DocumentLocation, EditorError> {
        let id = self
            .last_saved_id
            .as_deref()
            .or(Some(self.context.document_id.as_str()).filter(|id| !id.is_empty()))
            .ok_or_else(|| {
                EditorError::Locate(CollabError::NotFound("no saved artifact".to_owned()))
            })?;

        let location = store
            .fetch_document_url(id, &self.context.container_id)
            .map_err(EditorError::Locate)?;
        tracing::debug!(id, container = %self.context.container_id, "artifact located");
        Ok(location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::RasterSurface;

    fn session(pages: usize) -> EditorSession {
        let surfaces = (0..pages).map(|_| RasterSurface::blank(120, 90)).collect();
        EditorSession::new(
            SessionContext::default(),
            Document::from_surfaces("doc", surfaces),
            EditorConfig::default(),
        )
        .expect("session should open")
    }

    #[test]
    fn draw_stroke_records_one_checkpoint() {
        let mut session = session(1);
        session.pointer_down(0, Point::new(10.0, 10.0)).expect("down");
        for step in 1..=5 {
            session.pointer_move(0, Point::new(10.0 + step as f32 * 5.0, 10.0)).expect("move");
        }
        session.pointer_up();

        assert_eq!(session.history().undo_depth(0), 1);
        assert!(!session.is_drawing());
    }

    #[test]
    fn moves_without_active_stroke_do_nothing() {
        let mut session = session(2);
        let before = session.document().clone();

        session.pointer_move(0, Point::new(5.0, 5.0)).expect("move");
        session.pointer_down(1, Point::new(5.0, 5.0)).expect("down");
        session.pointer_move(0, Point::new(50.0, 50.0)).expect("move on other page");

        assert_eq!(session.document().pages()[0], before.pages()[0]);
    }

    #[test]
    fn pointer_leave_ends_stroke_on_that_page_only() {
        let mut session = session(2);
        session.pointer_down(0, Point::new(5.0, 5.0)).expect("down");
        session.pointer_leave(1).expect("leave other page");
        assert!(session.is_drawing());
        session.pointer_leave(0).expect("leave");
        assert!(!session.is_drawing());
    }

    #[test]
    fn out_of_range_page_is_rejected_without_side_effects() {
        let mut session = session(1);
        let err = session.pointer_down(3, Point::new(1.0, 1.0)).expect_err("page 3 missing");

        assert!(matches!(err, EditorError::PageOutOfRange { page: 3, page_count: 1 }));
        assert_eq!(session.history().undo_depth(0), 0);
        assert!(!session.is_drawing());
    }

    #[test]
    fn selecting_text_abandons_stroke() {
        let mut session = session(1);
        session.pointer_down(0, Point::new(5.0, 5.0)).expect("down");
        session.select_tool(Tool::Text);
        assert!(!session.is_drawing());
        assert_eq!(session.tools().active, Tool::Text);
    }

    #[test]
    fn colors_are_independent() {
        let mut session = session(1);
        session.set_draw_color(Color::rgb(255, 0, 0));
        session.set_text_color(Color::rgb(0, 0, 255));
        session.set_draw_color(Color::rgb(0, 255, 0));

        assert_eq!(session.tools().text_color, Color::rgb(0, 0, 255));
        assert_eq!(session.tools().draw_color, Color::rgb(0, 255, 0));
        assert_eq!(session.tools().active_color(), Color::rgb(0, 255, 0));
    }

    #[test]
    fn new_text_click_commits_previous_entry() {
        let mut session = session(1);
        session.select_tool(Tool::Text);
        session.pointer_down(0, Point::new(5.0, 5.0)).expect("down");
        session.type_text("A");
        session.pointer_down(0, Point::new(40.0, 40.0)).expect("second down");

        assert_eq!(session.history().undo_depth(0), 1);
        let entry = session.pending_text().expect("new entry open");
        assert_eq!(entry.anchor, Point::new(40.0, 40.0));
        assert_eq!(entry.text(), "");
    }

    #[test]
    fn escape_discards_and_shift_enter_inserts_newline() {
        let mut session = session(1);
        session.select_tool(Tool::Text);
        session.pointer_down(0, Point::new(5.0, 5.0)).expect("down");
        session.type_text("one");
        session.enter(true);
        session.type_text("two");
        assert_eq!(session.pending_text().map(PendingTextEntry::text), Some("one\ntwo"));

        let before = session.document().clone();
        session.escape();
        assert!(session.pending_text().is_none());
        assert_eq!(session.document(), &before);
        assert_eq!(session.history().undo_depth(0), 0);
    }

    #[test]
    fn undo_discards_pending_entry() {
        let mut session = session(1);
        session.select_tool(Tool::Text);
        session.pointer_down(0, Point::new(5.0, 5.0)).expect("down");
        session.type_text("lost");

        assert_eq!(session.undo(), 0);
        assert!(session.pending_text().is_none());
        assert_eq!(session.history().undo_depth(0), 0);
    }

    #[test]
    fn invalid_config_is_rejected_before_opening() {
        let config = EditorConfig { render_scale: 0.0, ..EditorConfig::default() };
        let err = EditorSession::new(
            SessionContext::default(),
            Document::from_surfaces("doc", vec![RasterSurface::blank(10, 10)]),
            config,
        )
        .expect_err("zero scale is invalid");

        assert!(matches!(err, EditorError::Config(_)));
    }

    #[test]
    fn viewport_starts_at_top_of_first_page() {
        let session = session(3);
        assert_eq!(session.viewport().scroll_offset(), 0.0);
        assert_eq!(session.viewport().current_page(), 0);
    }
}
