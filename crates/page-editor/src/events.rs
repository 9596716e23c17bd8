use crate::color::Color;
use crate::error::EditorError;
use crate::session::EditorSession;
use crate::surface::Point;
use crate::tools::Tool;
use serde::{Deserialize, Serialize};

/// Input to an [`EditorSession`], as delivered by a view or a script.
///
/// Page indices are zero-based; coordinates are page pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EditorEvent {
    SelectTool { tool: Tool },
    SetDrawColor { color: Color },
    SetTextColor { color: Color },
    PointerDown { page: usize, x: f32, y: f32 },
    PointerMove { page: usize, x: f32, y: f32 },
    PointerUp,
    PointerLeave { page: usize },
    TypeText { text: String },
    Enter {
        #[serde(default)]
        shift: bool,
    },
    Backspace,
    Escape,
    Blur,
    Undo,
    Redo,
}

pub fn apply_event(session: &mut EditorSession, event: EditorEvent) -> Result<(), EditorError> {
    match event {
        EditorEvent::SelectTool { tool } => session.select_tool(tool),
        EditorEvent::SetDrawColor { color } => session.set_draw_color(color),
        EditorEvent::SetTextColor { color } => session.set_text_color(color),
        EditorEvent::PointerDown { page, x, y } => session.pointer_down(page, Point::new(x, y))?,
        EditorEvent::PointerMove { page, x, y } => session.pointer_move(page, Point::new(x, y))?,
        EditorEvent::PointerUp => session.pointer_up(),
        EditorEvent::PointerLeave { page } => session.pointer_leave(page)?,
        EditorEvent::TypeText { text } => session.type_text(&text),
        EditorEvent::Enter { shift } => session.enter(shift),
        EditorEvent::Backspace => session.backspace(),
        EditorEvent::Escape => session.escape(),
        EditorEvent::Blur => session.blur(),
        EditorEvent::Undo => {
            session.undo();
        }
        EditorEvent::Redo => {
            session.redo();
        }
    }

    Ok(())
}

/// Applies events in order, stopping at the first rejected one. The error
/// carries the zero-based position of the failing event.
pub fn replay<I>(session: &mut EditorSession, events: I) -> Result<(), (usize, EditorError)>
where
    I: IntoIterator<Item = EditorEvent>,
{
    for (position, event) in events.into_iter().enumerate() {
        apply_event(session, event).map_err(|err| (position, err))?;
    }
    Ok(())
}

pub fn parse_script(json: &str) -> Result<Vec<EditorEvent>, serde_json::Error> {
    serde_json::from_str(json)
}
