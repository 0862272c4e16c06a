//! Frame-based time helpers.
//!
//! All placement and duration math runs in timeline-frame units: `u64`
//! frame counts at the timeline's target rate. Seconds and milliseconds
//! appear only at the edges (wall clock, audio buffering).

/// A position or length on the timeline, in frames at the timeline rate.
pub type Frame = u64;

/// Target frame rate a fresh timeline starts with.
pub const DEFAULT_FPS: f64 = 60.0;

/// Convert a frame count to seconds at the given rate.
#[inline]
pub fn frames_to_seconds(frames: Frame, fps: f64) -> f64 {
    frames as f64 / fps
}

/// Convert seconds to a frame count at the given rate (floored).
#[inline]
pub fn seconds_to_frames(seconds: f64, fps: f64) -> Frame {
    (seconds * fps).max(0.0).floor() as Frame
}

/// Convert a frame count to milliseconds at the given rate.
#[inline]
pub fn frames_to_millis(frames: Frame, fps: f64) -> f64 {
    frames as f64 * 1000.0 / fps
}

/// Project a length in source-native frames onto the timeline rate.
///
/// A 240-frame source at 24 fps becomes 600 frames on a 60 fps timeline.
#[inline]
pub fn project_len(source_frames: u64, source_fps: f64, timeline_fps: f64) -> Frame {
    if source_fps <= 0.0 {
        return 0;
    }
    (source_frames as f64 * timeline_fps / source_fps).round() as Frame
}

/// Project a timeline-frame offset into source-native frames (floored).
#[inline]
pub fn project_to_source(timeline_frames: Frame, source_fps: f64, timeline_fps: f64) -> u64 {
    if timeline_fps <= 0.0 {
        return 0;
    }
    (timeline_frames as f64 * source_fps / timeline_fps).floor() as u64
}

/// Format a frame count as `HH:MM:SS:FF` at the given rate.
pub fn format_timecode(frames: Frame, fps: f64) -> String {
    let fps_whole = fps.round().max(1.0) as u64;
    let total_seconds = frames / fps_whole;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    let frame = frames % fps_whole;
    format!("{:02}:{:02}:{:02}:{:02}", hours, minutes, seconds, frame)
}
