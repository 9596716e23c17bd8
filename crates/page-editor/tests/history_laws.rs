use page_editor::{
    Document, EditorConfig, EditorSession, Point, RasterSurface, SessionContext, Tool,
};
use proptest::prelude::*;

#[derive(Debug, Clone)]
struct Stroke {
    page: usize,
    points: Vec<(f32, f32)>,
}

/// One undoable edit: a freehand stroke or a committed text entry.
#[derive(Debug, Clone)]
enum Action {
    Stroke(Stroke),
    Text { page: usize, x: f32, y: f32, text: String },
}

fn stroke_strategy() -> impl Strategy<Value = Stroke> {
    (0..2usize, prop::collection::vec((0.0f32..48.0, 0.0f32..36.0), 2..6))
        .prop_map(|(page, points)| Stroke { page, points })
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        stroke_strategy().prop_map(Action::Stroke),
        (0..2usize, 0.0f32..40.0, 0.0f32..20.0, "[a-zA-Z]{1,6}")
            .prop_map(|(page, x, y, text)| Action::Text { page, x, y, text }),
    ]
}

fn session(history_limit: Option<usize>) -> EditorSession {
    let surfaces = vec![RasterSurface::blank(48, 36), RasterSurface::blank(48, 36)];
    EditorSession::new(
        SessionContext::default(),
        Document::from_surfaces("prop", surfaces),
        EditorConfig { history_limit, ..EditorConfig::default() },
    )
    .expect("session should open")
}

fn apply(session: &mut EditorSession, stroke: &Stroke) {
    session.select_tool(Tool::Draw);
    let (x, y) = stroke.points[0];
    session.pointer_down(stroke.page, Point::new(x, y)).expect("pointer down");
    for (x, y) in &stroke.points[1..] {
        session.pointer_move(stroke.page, Point::new(*x, *y)).expect("pointer move");
    }
    session.pointer_up();
}

fn perform(session: &mut EditorSession, action: &Action) {
    match action {
        Action::Stroke(stroke) => apply(session, stroke),
        Action::Text { page, x, y, text } => {
            session.select_tool(Tool::Text);
            session.pointer_down(*page, Point::new(*x, *y)).expect("text down");
            session.type_text(text);
            session.enter(false);
        }
    }
}

proptest! {
    #[test]
    fn undo_then_redo_is_identity(
        actions in prop::collection::vec(action_strategy(), 1..6),
        steps in 1usize..6,
    ) {
        let mut session = session(None);
        for action in &actions {
            perform(&mut session, action);
        }
        let edited = session.document().clone();

        for _ in 0..steps {
            session.undo();
        }
        for _ in 0..steps {
            session.redo();
        }

        prop_assert_eq!(session.document(), &edited);
    }

    #[test]
    fn undoing_everything_restores_blank_pages(
        actions in prop::collection::vec(action_strategy(), 1..6),
    ) {
        let mut session = session(None);
        let blank = session.document().clone();
        for action in &actions {
            perform(&mut session, action);
        }

        for _ in 0..actions.len() {
            session.undo();
        }

        prop_assert_eq!(session.document(), &blank);
        prop_assert_eq!(session.undo(), 0);
    }

    #[test]
    fn undoing_a_text_commit_restores_the_exact_pixels(
        before in prop::collection::vec(action_strategy(), 0..4),
        page in 0..2usize,
        text in "[a-zA-Z]{1,6}",
    ) {
        let mut session = session(None);
        for action in &before {
            perform(&mut session, action);
        }
        let untouched = session.document().clone();

        perform(&mut session, &Action::Text { page, x: 4.0, y: 4.0, text });
        let written = session.document().clone();
        prop_assert_ne!(&written, &untouched);

        session.undo();
        prop_assert_eq!(&session.document().pages()[page], &untouched.pages()[page]);
        session.redo();
        prop_assert_eq!(session.document(), &written);
    }

    #[test]
    fn history_limit_bounds_depth(
        strokes in prop::collection::vec(stroke_strategy(), 1..8),
        limit in 1usize..4,
    ) {
        let mut session = session(Some(limit));
        for stroke in &strokes {
            apply(&mut session, stroke);
        }

        for page in 0..2 {
            prop_assert!(session.history().undo_depth(page) <= limit);
        }
    }
}
