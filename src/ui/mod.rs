pub mod app;
pub mod interaction;
pub mod timeline_view;

pub use app::EditorApp;
pub use interaction::{Controller, Selection, ViewTransform};
pub use timeline_view::TimelineView;
