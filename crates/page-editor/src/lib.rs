//! Raster annotation of PDF pages.
//!
//! An [`EditorSession`] owns one document rendered into per-page surfaces.
//! Strokes and committed text are baked into pixels immediately, every page
//! keeps its own snapshot history, and [`export_document`] flattens the
//! result into a new image-only PDF.

pub mod collab;
pub mod color;
pub mod config;
pub mod document;
pub mod error;
pub mod events;
pub mod export;
pub mod history;
pub mod overlay;
pub mod session;
pub mod surface;
pub mod text;
pub mod tools;
pub mod viewport;

pub use collab::{Artifact, ArtifactStore, CollabError, DocumentLocation, SaveOutcome, SaveRequest};
pub use color::Color;
pub use config::{ConfigError, EditorConfig};
pub use document::{Document, Page};
pub use error::EditorError;
pub use events::{apply_event, parse_script, replay, EditorEvent};
pub use export::{artifact_name, export_document};
pub use history::HistoryStore;
pub use overlay::{PendingTextEntry, TextResolution};
pub use session::{EditorSession, SessionContext};
pub use surface::{FrameSnapshot, Point, RasterSurface};
pub use text::TextRenderer;
pub use tools::{Tool, ToolState};
pub use viewport::Viewport;
