use image::Rgba;
use page_editor::{
    apply_event, parse_script, ArtifactStore, CollabError, Color, Document, DocumentLocation,
    EditorConfig, EditorError, EditorEvent, EditorSession, Point, RasterSurface, SaveOutcome,
    SaveRequest, SessionContext, Tool,
};
use pdf_engine::{LopdfEngine, OpenSource, PdfEngine, RenderRequest, RgbaImage};
use pretty_assertions::assert_eq;
use std::cell::RefCell;

const WHITE: [u8; 4] = [255, 255, 255, 255];

/// Two image pages with distinct content, 80x60 and 60x80 points.
fn two_page_pdf() -> Vec<u8> {
    let first = RgbaImage::from_fn(80, 60, |x, y| Rgba([(x * 3) as u8, (y * 4) as u8, 120, 255]));
    let second = RgbaImage::from_fn(60, 80, |x, _| Rgba([200, (x * 2) as u8, 40, 255]));
    pdf_engine::write_image_pages([&first, &second]).expect("fixture should encode")
}

/// One 100x100pt page drawn with vector operators only.
fn vector_pdf(content: &str) -> Vec<u8> {
    use lopdf::{dictionary, Object, Stream};

    let mut doc = lopdf::Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.as_bytes().to_vec()));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0_i64.into(), 0_i64.into(), 100_i64.into(), 100_i64.into()],
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1_i64,
        }),
    );
    let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("fixture should serialize");
    bytes
}

fn context() -> SessionContext {
    SessionContext {
        document_id: "instructor-7/lecture-2/slides.pdf".to_owned(),
        container_id: "lecture-2".to_owned(),
        owner_id: "instructor-7".to_owned(),
    }
}

fn open(bytes: Vec<u8>) -> EditorSession {
    let mut engine = LopdfEngine::new();
    EditorSession::open(&mut engine, OpenSource::Bytes(bytes), context(), EditorConfig::default())
        .expect("session should open")
}

fn blank_session(width: u32, height: u32) -> EditorSession {
    EditorSession::new(
        context(),
        Document::from_surfaces("blank", vec![RasterSurface::blank(width, height)]),
        EditorConfig::default(),
    )
    .expect("session should open")
}

fn render_all(bytes: Vec<u8>, scale: f32) -> Vec<RgbaImage> {
    let mut engine = LopdfEngine::new();
    let handle = engine.open(OpenSource::Bytes(bytes)).expect("open should succeed");
    let count = engine.page_count(handle).expect("count should succeed");

    (0..count)
        .map(|page_index| {
            engine
                .render_page(handle, RenderRequest { page_index, scale })
                .expect("render should succeed")
        })
        .collect()
}

fn non_white(image: &RgbaImage) -> Vec<(u32, u32)> {
    image
        .enumerate_pixels()
        .filter(|(_, _, pixel)| pixel.0 != WHITE)
        .map(|(x, y, _)| (x, y))
        .collect()
}

fn stroke(session: &mut EditorSession, page: usize, points: &[(f32, f32)]) {
    let (x, y) = points[0];
    session.pointer_down(page, Point::new(x, y)).expect("pointer down");
    for (x, y) in &points[1..] {
        session.pointer_move(page, Point::new(*x, *y)).expect("pointer move");
    }
    session.pointer_up();
}

#[test]
fn load_renders_every_page_at_configured_scale() {
    let session = open(two_page_pdf());
    let pages = session.document().pages();

    assert_eq!(pages.len(), 2);
    assert_eq!((pages[0].width(), pages[0].height()), (120, 90));
    assert_eq!((pages[1].width(), pages[1].height()), (90, 120));
    assert_eq!(session.viewport().scroll_offset(), 0.0);
}

#[test]
fn vector_pages_load_with_their_content() {
    let session = open(vector_pdf("0 0 0 rg 0 0 100 100 re f"));
    let page = &session.document().pages()[0];

    assert_eq!((page.width(), page.height()), (150, 150));
    let pixels = page.surface.pixels();
    assert_eq!(non_white(pixels).len(), 150 * 150);
    assert_eq!(pixels.get_pixel(75, 75).0, [0, 0, 0, 255]);
}

#[test]
fn undrawable_page_content_is_a_load_error() {
    let mut engine = LopdfEngine::new();
    let err = EditorSession::open(
        &mut engine,
        OpenSource::Bytes(vector_pdf("/Sh0 sh")),
        context(),
        EditorConfig::default(),
    )
    .expect_err("shading cannot be drawn");

    assert!(matches!(err, EditorError::Load(_)));
}

#[test]
fn runaway_render_scale_is_rejected_before_loading() {
    let mut engine = LopdfEngine::new();
    let config = EditorConfig { render_scale: 1000.0, ..EditorConfig::default() };
    let err = EditorSession::open(&mut engine, OpenSource::Bytes(two_page_pdf()), context(), config)
        .expect_err("scale is out of range");

    assert!(matches!(err, EditorError::Config(_)));
}

#[test]
fn unreachable_source_is_a_load_error() {
    let mut engine = LopdfEngine::new();
    let err = EditorSession::open(
        &mut engine,
        OpenSource::Path("/nonexistent/page-annotator/deck.pdf".into()),
        context(),
        EditorConfig::default(),
    )
    .expect_err("missing file should not load");

    assert!(matches!(err, EditorError::Load(_)));
}

#[test]
fn undone_stroke_exports_unedited_pages() {
    let original = two_page_pdf();
    let unedited = open(original.clone()).document().clone();

    let mut session = open(original);
    stroke(&mut session, 0, &[(10.0, 10.0), (60.0, 40.0), (100.0, 20.0)]);
    assert_ne!(session.document().pages()[0], unedited.pages()[0]);

    session.undo();
    let exported = session.export().expect("export should succeed");
    let pages = render_all(exported, 1.0);

    assert_eq!(pages.len(), 2);
    assert_eq!(&pages[0], unedited.pages()[0].surface.pixels());
    assert_eq!(&pages[1], unedited.pages()[1].surface.pixels());
}

#[test]
fn one_undo_removes_a_whole_stroke() {
    let mut session = blank_session(100, 100);
    let before = session.document().clone();

    let points: Vec<(f32, f32)> =
        (0..12).map(|i| (5.0 + i as f32 * 7.0, 20.0 + (i % 3) as f32 * 9.0)).collect();
    stroke(&mut session, 0, &points);
    assert!(!non_white(session.document().pages()[0].surface.pixels()).is_empty());

    assert_eq!(session.undo(), 1);
    assert_eq!(session.document(), &before);
}

#[test]
fn annotations_stay_on_their_page() {
    let mut session = open(two_page_pdf());
    let before = session.document().clone();

    stroke(&mut session, 1, &[(5.0, 5.0), (80.0, 100.0)]);
    session.select_tool(Tool::Text);
    session.pointer_down(1, Point::new(10.0, 10.0)).expect("text down");
    session.type_text("page two");
    session.enter(false);

    assert_eq!(session.document().pages()[0], before.pages()[0]);
    assert_ne!(session.document().pages()[1], before.pages()[1]);
    assert_eq!(session.history().undo_depth(0), 0);
    assert_eq!(session.history().undo_depth(1), 2);
}

#[test]
fn typed_text_lands_near_its_anchor() {
    let mut session = blank_session(200, 150);
    session.select_tool(Tool::Text);
    session.pointer_down(0, Point::new(50.0, 50.0)).expect("text down");
    session.type_text("Hi");
    session.enter(false);

    let painted = non_white(session.document().pages()[0].surface.pixels());
    assert!(!painted.is_empty());
    for (x, y) in &painted {
        assert!((48..=80).contains(x), "x={x} outside text box");
        assert!((50..=72).contains(y), "y={y} outside text box");
    }
    assert!(painted.iter().any(|(_, y)| (64..=68).contains(y)), "glyphs reach the baseline");
    assert!(session.pending_text().is_none());
}

#[test]
fn undo_and_redo_of_committed_text_are_exact() {
    let mut session = blank_session(160, 80);
    stroke(&mut session, 0, &[(5.0, 70.0), (150.0, 70.0)]);
    let before_text = session.document().clone();

    session.select_tool(Tool::Text);
    session.pointer_down(0, Point::new(20.0, 10.0)).expect("text down");
    session.type_text("Redo me");
    session.enter(false);
    let with_text = session.document().clone();
    assert_ne!(with_text, before_text);

    assert_eq!(session.undo(), 1);
    assert_eq!(session.document(), &before_text);

    assert_eq!(session.redo(), 1);
    assert_eq!(session.document(), &with_text);
}

#[test]
fn blank_text_never_mutates() {
    let mut session = blank_session(60, 60);
    let before = session.document().clone();

    session.select_tool(Tool::Text);
    session.pointer_down(0, Point::new(10.0, 10.0)).expect("text down");
    session.type_text("   ");
    session.enter(true);
    session.blur();

    assert_eq!(session.document(), &before);
    assert_eq!(session.history().undo_depth(0), 0);
}

#[test]
fn tool_switch_commits_pending_text_first() {
    let mut session = blank_session(120, 80);
    session.select_tool(Tool::Text);
    session.set_text_color(Color::rgb(0, 0, 255));
    session.pointer_down(0, Point::new(10.0, 10.0)).expect("text down");
    session.type_text("note");

    session.select_tool(Tool::Draw);

    assert!(session.pending_text().is_none());
    assert_eq!(session.tools().active, Tool::Draw);
    assert_eq!(session.history().undo_depth(0), 1);
    let painted = session.document().pages()[0].surface.pixels();
    assert!(painted.pixels().any(|pixel| pixel[2] > pixel[0] && pixel.0 != WHITE));
}

#[test]
fn export_keeps_page_count_and_pixel_media_boxes() {
    let mut session = open(two_page_pdf());
    stroke(&mut session, 0, &[(0.0, 0.0), (119.0, 89.0)]);

    let bytes = session.export().expect("export should succeed");
    let doc = lopdf::Document::load_mem(&bytes).expect("export should parse");
    let pages: Vec<_> = doc.get_pages().into_values().collect();
    assert_eq!(pages.len(), 2);

    let expected = [(120.0, 90.0), (90.0, 120.0)];
    for (page_id, (width, height)) in pages.iter().zip(expected) {
        let media_box: Vec<f32> = doc
            .get_dictionary(*page_id)
            .expect("page dict")
            .get(b"MediaBox")
            .expect("media box")
            .as_array()
            .expect("array")
            .iter()
            .map(|value| value.as_float().expect("number"))
            .collect();
        assert_eq!(media_box, vec![0.0, 0.0, width, height]);
    }

    let rendered = render_all(bytes, 1.0);
    assert_eq!(&rendered[0], session.document().pages()[0].surface.pixels());
}

#[test]
fn scripted_events_drive_the_session() {
    let mut session = blank_session(100, 100);
    let events = parse_script(
        r##"[
            {"type": "SetDrawColor", "color": "#ff0000"},
            {"type": "PointerDown", "page": 0, "x": 10, "y": 10},
            {"type": "PointerMove", "page": 0, "x": 90, "y": 90},
            {"type": "PointerLeave", "page": 0},
            {"type": "PointerMove", "page": 0, "x": 10, "y": 90}
        ]"##,
    )
    .expect("script should parse");

    page_editor::replay(&mut session, events).expect("replay should succeed");

    let pixels = session.document().pages()[0].surface.pixels();
    let on_line = pixels.get_pixel(50, 50);
    assert!(on_line[0] > 200 && on_line[1] < 60 && on_line[2] < 60, "red stroke, got {on_line:?}");
    assert_eq!(pixels.get_pixel(12, 88).0, WHITE);
}

#[test]
fn replay_reports_failing_event_position() {
    let mut session = blank_session(10, 10);
    let events = vec![EditorEvent::PointerUp, EditorEvent::PointerDown { page: 4, x: 0.0, y: 0.0 }];

    let (position, err) =
        page_editor::replay(&mut session, events).expect_err("page 4 does not exist");
    assert_eq!(position, 1);
    assert!(matches!(err, EditorError::PageOutOfRange { page: 4, .. }));
}

#[derive(Default)]
struct RecordingStore {
    reject_with: Option<String>,
    /// Identity reported back for saved artifacts.
    stored_as: Option<String>,
    saved: RefCell<Vec<SaveRequest>>,
}

const STORED_ID: &str = "lecture-2/annotated/slides.pdf";
const STORED_URL: &str = "https://files.example/lecture-2/annotated/slides.pdf";

impl ArtifactStore for RecordingStore {
    fn fetch_document_url(
        &self,
        document_id: &str,
        _container_id: &str,
    ) -> Result<DocumentLocation, CollabError> {
        match document_id {
            "instructor-7/lecture-2/slides.pdf" => Ok(DocumentLocation::Bytes(two_page_pdf())),
            STORED_ID => Ok(DocumentLocation::Url(STORED_URL.to_owned())),
            other => Err(CollabError::NotFound(other.to_owned())),
        }
    }

    fn save_artifact(&self, request: &SaveRequest) -> SaveOutcome {
        if let Some(reason) = &self.reject_with {
            return SaveOutcome::failed(reason.clone());
        }
        self.saved.borrow_mut().push(request.clone());
        match &self.stored_as {
            Some(id) => SaveOutcome::saved(id.clone()),
            None => SaveOutcome::ok(),
        }
    }
}

#[test]
fn save_overwrites_source_with_exported_pdf() {
    let store = RecordingStore::default();
    let mut engine = LopdfEngine::new();
    let mut session =
        EditorSession::open_from_store(&mut engine, &store, context(), EditorConfig::default())
            .expect("session should open");

    session.select_tool(Tool::Text);
    session.pointer_down(0, Point::new(5.0, 5.0)).expect("text down");
    session.type_text("committed on save");

    let name = session.save(&store).expect("save should succeed");
    assert_eq!(name, "slides.pdf");

    let saved = store.saved.borrow();
    assert_eq!(saved.len(), 1);
    let request = &saved[0];
    assert_eq!(request.owner_id, "instructor-7");
    assert_eq!(request.container_id, "lecture-2");
    assert_eq!(request.artifact.kind, "pdf");
    assert_eq!(request.artifact.id.as_deref(), Some("instructor-7/lecture-2/slides.pdf"));
    assert!(request.artifact.content.starts_with("data:application/pdf;base64,"));

    let bytes = request.artifact.decoded_content().expect("payload decodes");
    assert_eq!(render_all(bytes, 1.0).len(), 2);
    assert_eq!(session.history().undo_depth(0), 1);
}

#[test]
fn rejected_save_keeps_annotations() {
    let store =
        RecordingStore { reject_with: Some("quota exceeded".to_owned()), ..Default::default() };
    let mut session = open(two_page_pdf());
    stroke(&mut session, 0, &[(1.0, 1.0), (50.0, 50.0)]);
    let annotated = session.document().clone();

    let err = session.save(&store).expect_err("store rejects");
    assert!(matches!(err, EditorError::Save(ref reason) if reason == "quota exceeded"));
    assert_eq!(session.document(), &annotated);
    assert_eq!(session.history().undo_depth(0), 1);
}

#[test]
fn unknown_document_fails_to_open_from_store() {
    let store = RecordingStore::default();
    let mut engine = LopdfEngine::new();
    let context = SessionContext { document_id: "missing.pdf".to_owned(), ..context() };

    let err = EditorSession::open_from_store(&mut engine, &store, context, EditorConfig::default())
        .expect_err("unknown id");
    assert!(matches!(err, EditorError::Load(_)));
}

#[test]
fn events_apply_one_at_a_time() {
    let mut session = blank_session(40, 40);
    apply_event(&mut session, EditorEvent::SelectTool { tool: Tool::Text }).expect("select");
    apply_event(&mut session, EditorEvent::PointerDown { page: 0, x: 2.0, y: 2.0 }).expect("down");
    apply_event(&mut session, EditorEvent::TypeText { text: "ab".to_owned() }).expect("type");
    apply_event(&mut session, EditorEvent::Backspace).expect("backspace");

    assert_eq!(session.pending_text().map(|entry| entry.text().to_owned()), Some("a".to_owned()));
    apply_event(&mut session, EditorEvent::Escape).expect("escape");
    assert!(session.pending_text().is_none());
}

#[test]
fn saved_artifact_location_comes_from_the_store() {
    let store = RecordingStore { stored_as: Some(STORED_ID.to_owned()), ..Default::default() };
    let mut session = open(two_page_pdf());
    assert!(matches!(session.artifact_location(&store), Ok(DocumentLocation::Bytes(_))));

    stroke(&mut session, 0, &[(1.0, 1.0), (50.0, 50.0)]);
    session.save(&store).expect("save should succeed");

    assert_eq!(session.last_saved_id(), Some(STORED_ID));
    assert_eq!(
        session.artifact_location(&store).expect("store knows the artifact"),
        DocumentLocation::Url(STORED_URL.to_owned())
    );
}

#[test]
fn saved_artifact_without_reported_id_resolves_to_the_overwritten_source() {
    let store = RecordingStore::default();
    let mut session = open(two_page_pdf());
    session.save(&store).expect("save should succeed");

    assert_eq!(session.last_saved_id(), Some("instructor-7/lecture-2/slides.pdf"));
    assert!(matches!(session.artifact_location(&store), Ok(DocumentLocation::Bytes(_))));
}

#[test]
fn artifact_location_reports_unknown_documents() {
    let store = RecordingStore::default();
    let session_for = |document_id: &str| {
        let context = SessionContext { document_id: document_id.to_owned(), ..context() };
        let pages = vec![RasterSurface::blank(10, 10)];
        EditorSession::new(context, Document::from_surfaces("doc", pages), EditorConfig::default())
            .expect("session should open")
    };

    let err = session_for("").artifact_location(&store).expect_err("nothing to locate");
    assert!(matches!(err, EditorError::Locate(CollabError::NotFound(_))));

    let err = session_for("gone.pdf").artifact_location(&store).expect_err("unknown to store");
    assert!(matches!(err, EditorError::Locate(CollabError::NotFound(ref id)) if id == "gone.pdf"));
}
