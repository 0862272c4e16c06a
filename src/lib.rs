//! splice, a timeline-centric desktop video editor.
//!
//! The editing core (tracks, segments, transactional timeline edits and
//! the playback clock) lives in [`core`]; [`playback`] schedules decode
//! against the clock; decoding itself is isolated behind
//! [`media::source::MediaSource`]; [`ui`] hosts the egui shell and the
//! pointer gesture controller.

pub mod audio;
pub mod core;
pub mod media;
pub mod playback;
pub mod ui;
