//! Core types for the editor.
//!
//! The timeline model: frame-based time, tracks and their id/position
//! index, placed segments, and the transactional mutation surface.

pub mod segment;
pub mod store;
pub mod time;
pub mod timeline;
pub mod track;

pub use segment::{AudioSegment, Placed, Placement, SegmentId, VideoSegment};
pub use store::{topmost_active, SegmentStore};
pub use time::Frame;
pub use timeline::{AddedSegments, AddedTracks, NewTracks, PlacementError, Timeline};
pub use track::{TrackId, TrackIndex, TrackKind};
