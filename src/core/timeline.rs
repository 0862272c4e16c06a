//! The timeline: track indices, segment stores, transactional edits and
//! the playback clock.
//!
//! Every mutation is applied speculatively, collision-checked, and rolled
//! back completely on any violation. Callers never observe a partial
//! edit. Collision and guard failures on the drag path are reported as
//! plain `bool`s; they happen on every pointer-drag frame and must stay
//! cheap and silent.

use std::time::Instant;

use thiserror::Error;
use tracing::warn;

use crate::core::segment::{AudioSegment, Placed, Placement, SegmentId, VideoSegment};
use crate::core::store::SegmentStore;
use crate::core::time::{self, Frame, DEFAULT_FPS};
use crate::core::track::{TrackId, TrackIndex, TrackKind};
use crate::media::source::{FrameImage, SourceHandle};

/// Why a placement was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PlacementError {
    #[error("no such track")]
    UnknownTrack,
    #[error("asset has no playable streams")]
    NoStreams,
    #[error("asset kind does not match the target track")]
    KindMismatch,
    #[error("no {0:?} track at position {1}")]
    NoPairedTrack(TrackKind, usize),
    #[error("placement collides with an existing segment")]
    Collision,
}

/// Which kinds of track to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NewTracks {
    Video,
    Audio,
    Both,
}

/// Segment ids created by a successful asset drop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddedSegments {
    pub video: Option<SegmentId>,
    pub audio: Option<SegmentId>,
}

/// Track ids created by [`Timeline::add_track`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddedTracks {
    pub video: Option<TrackId>,
    pub audio: Option<TrackId>,
}

/// Wall-clock-anchored playback clock.
///
/// While playing, the current frame is derived on every query from the
/// elapsed wall time since the anchor; pausing freezes the derived value
/// and resuming re-anchors from it. Nothing ever accumulates tick by
/// tick, so pause/resume cycling cannot drift.
#[derive(Debug, Clone)]
pub struct PlaybackClock {
    fps: f64,
    frozen: Frame,
    /// Instant at which `frozen` was the current frame; `Some` = playing.
    anchor: Option<Instant>,
}

impl PlaybackClock {
    fn new(fps: f64) -> Self {
        Self {
            fps,
            frozen: 0,
            anchor: None,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.anchor.is_some()
    }

    pub fn toggle(&mut self) {
        self.toggle_at(Instant::now());
    }

    pub fn pause(&mut self) {
        if self.is_playing() {
            self.toggle();
        }
    }

    pub fn current_frame(&self) -> Frame {
        self.frame_at(Instant::now())
    }

    pub fn seek(&mut self, frame: Frame) {
        self.seek_at(frame, Instant::now());
    }

    fn toggle_at(&mut self, now: Instant) {
        if self.anchor.is_some() {
            self.frozen = self.frame_at(now);
            self.anchor = None;
        } else {
            self.anchor = Some(now);
        }
    }

    fn frame_at(&self, now: Instant) -> Frame {
        match self.anchor {
            Some(anchor) => {
                let elapsed = now.saturating_duration_since(anchor);
                self.frozen + (elapsed.as_secs_f64() * self.fps).floor() as Frame
            }
            None => self.frozen,
        }
    }

    fn seek_at(&mut self, frame: Frame, now: Instant) {
        self.frozen = frame;
        if self.anchor.is_some() {
            self.anchor = Some(now);
        }
    }
}

/// The arrangement and its clock.
pub struct Timeline {
    fps: f64,
    video_tracks: TrackIndex,
    audio_tracks: TrackIndex,
    video: SegmentStore<VideoSegment>,
    audio: SegmentStore<AudioSegment>,
    next_segment_id: u64,
    clock: PlaybackClock,
}

impl Default for Timeline {
    fn default() -> Self {
        Self::new(DEFAULT_FPS)
    }
}

impl Timeline {
    /// A fresh timeline: two video and two audio tracks, cursor at zero.
    pub fn new(fps: f64) -> Self {
        let mut video_tracks = TrackIndex::new();
        let mut audio_tracks = TrackIndex::new();
        for _ in 0..2 {
            video_tracks.insert(None, false);
            audio_tracks.insert(None, false);
        }
        Self {
            fps,
            video_tracks,
            audio_tracks,
            video: SegmentStore::new(),
            audio: SegmentStore::new(),
            next_segment_id: 0,
            clock: PlaybackClock::new(fps),
        }
    }

    pub fn fps(&self) -> f64 {
        self.fps
    }

    pub fn video_tracks(&self) -> &TrackIndex {
        &self.video_tracks
    }

    pub fn audio_tracks(&self) -> &TrackIndex {
        &self.audio_tracks
    }

    pub fn tracks(&self, kind: TrackKind) -> &TrackIndex {
        match kind {
            TrackKind::Video => &self.video_tracks,
            TrackKind::Audio => &self.audio_tracks,
        }
    }

    pub fn video_segments(&self) -> &SegmentStore<VideoSegment> {
        &self.video
    }

    pub fn audio_segments(&self) -> &SegmentStore<AudioSegment> {
        &self.audio
    }

    /// End of the last segment on any track.
    pub fn duration(&self) -> Frame {
        let video_end = self.video.iter().map(|s| s.placement.end()).max();
        let audio_end = self.audio.iter().map(|s| s.placement.end()).max();
        video_end.unwrap_or(0).max(audio_end.unwrap_or(0))
    }

    fn alloc_segment_id(&mut self) -> SegmentId {
        let id = SegmentId(self.next_segment_id);
        self.next_segment_id += 1;
        id
    }

    /// Place the segments of an imported asset at `at_frame` on the
    /// track `target` (of kind `target_kind`).
    ///
    /// An asset carrying both video and audio lands at one stacking
    /// position that must exist in both indices; nothing is inserted
    /// unless every produced segment fits without collision.
    pub fn add_asset(
        &mut self,
        source: &SourceHandle,
        at_frame: Frame,
        target_kind: TrackKind,
        target: TrackId,
    ) -> Result<AddedSegments, PlacementError> {
        let info = source.borrow().info().clone();
        if !info.has_video && !info.has_audio {
            return Err(PlacementError::NoStreams);
        }
        let position = self
            .tracks(target_kind)
            .position_of(target)
            .ok_or(PlacementError::UnknownTrack)?;
        match target_kind {
            TrackKind::Video if !info.has_video => return Err(PlacementError::KindMismatch),
            TrackKind::Audio if !info.has_audio => return Err(PlacementError::KindMismatch),
            _ => {}
        }

        let video_track = match (info.has_video, target_kind) {
            (false, _) => None,
            (true, TrackKind::Video) => Some(target),
            (true, TrackKind::Audio) => Some(
                self.video_tracks
                    .id_at(position)
                    .ok_or(PlacementError::NoPairedTrack(TrackKind::Video, position))?,
            ),
        };
        let audio_track = match (info.has_audio, target_kind) {
            (false, _) => None,
            (true, TrackKind::Audio) => Some(target),
            (true, TrackKind::Video) => Some(
                self.audio_tracks
                    .id_at(position)
                    .ok_or(PlacementError::NoPairedTrack(TrackKind::Audio, position))?,
            ),
        };

        let video_placement = video_track.map(|track| Placement {
            source_start: 0,
            source_duration: info.video_frames,
            position: at_frame,
            length: time::project_len(info.video_frames, info.video_fps, self.fps).max(1),
            track,
        });
        let audio_frames = source.borrow().duration_in_frames(self.fps);
        let audio_placement = audio_track.map(|track| Placement {
            source_start: 0,
            source_duration: audio_frames,
            position: at_frame,
            length: audio_frames.max(1),
            track,
        });

        // Either both land or neither does.
        let unplaced = SegmentId(u64::MAX);
        let collides = video_placement
            .as_ref()
            .is_some_and(|p| self.video.collides(p, unplaced))
            || audio_placement
                .as_ref()
                .is_some_and(|p| self.audio.collides(p, unplaced));
        if collides {
            return Err(PlacementError::Collision);
        }

        let mut added = AddedSegments::default();
        if let Some(placement) = video_placement {
            let id = self.alloc_segment_id();
            let (first_thumb, last_thumb) = capture_thumbs(source, info.video_frames);
            self.video.insert(VideoSegment {
                id,
                source: source.clone(),
                placement,
                native_fps: info.video_fps,
                first_thumb,
                last_thumb,
            });
            added.video = Some(id);
        }
        if let Some(placement) = audio_placement {
            let id = self.alloc_segment_id();
            self.audio.insert(AudioSegment {
                id,
                source: source.clone(),
                placement,
            });
            added.audio = Some(id);
        }
        Ok(added)
    }

    /// Shift every listed segment by `delta` timeline frames.
    ///
    /// All-or-nothing: if any member would underflow frame zero or
    /// collide with a track-mate, the whole batch is rolled back and
    /// `false` returned.
    pub fn move_segments(&mut self, video: &[SegmentId], audio: &[SegmentId], delta: i64) -> bool {
        if delta == 0 {
            return true;
        }
        let mut moved_video = Vec::new();
        let mut moved_audio = Vec::new();
        let shift = |p: &Placement| {
            p.position
                .checked_add_signed(delta)
                .map(|position| Placement { position, ..*p })
        };
        let ok = apply_edit(&mut self.video, video, &mut moved_video, &shift)
            && apply_edit(&mut self.audio, audio, &mut moved_audio, &shift)
            && !any_collision(&self.video, &moved_video)
            && !any_collision(&self.audio, &moved_audio);
        if !ok {
            restore(&mut self.video, &moved_video);
            restore(&mut self.audio, &moved_audio);
        }
        ok
    }

    /// Re-map every listed segment to the track `delta` positions away
    /// in its kind's index. Same all-or-nothing semantics as
    /// [`Timeline::move_segments`].
    pub fn change_tracks(&mut self, video: &[SegmentId], audio: &[SegmentId], delta: i64) -> bool {
        if delta == 0 {
            return true;
        }
        let mut moved_video = Vec::new();
        let mut moved_audio = Vec::new();
        let video_tracks = &self.video_tracks;
        let audio_tracks = &self.audio_tracks;
        let ok = apply_edit(&mut self.video, video, &mut moved_video, &|p| {
            remap_track(video_tracks, p, delta)
        }) && apply_edit(&mut self.audio, audio, &mut moved_audio, &|p| {
            remap_track(audio_tracks, p, delta)
        }) && !any_collision(&self.video, &moved_video)
            && !any_collision(&self.audio, &moved_audio);
        if !ok {
            restore(&mut self.video, &moved_video);
            restore(&mut self.audio, &moved_audio);
        }
        ok
    }

    /// Unconditional removal; ids not present are ignored.
    pub fn delete_segments(&mut self, video: &[SegmentId], audio: &[SegmentId]) {
        for &id in video {
            self.video.remove(id);
        }
        for &id in audio {
            self.audio.remove(id);
        }
    }

    /// Trim or extend a segment's left edge by `delta` timeline frames
    /// (positive trims in). Source offset, position and length move
    /// jointly; the step is clamped to the trimmable range and rejected
    /// on collision.
    pub fn trim_left(&mut self, kind: TrackKind, id: SegmentId, delta: i64) -> bool {
        match kind {
            TrackKind::Video => {
                let Some(seg) = self.video.get(id) else {
                    return false;
                };
                let new = trim_left_placement(&seg.placement, delta, seg.native_fps, self.fps);
                apply_trim(&mut self.video, id, new)
            }
            TrackKind::Audio => {
                let Some(seg) = self.audio.get(id) else {
                    return false;
                };
                let new = trim_left_placement(&seg.placement, delta, self.fps, self.fps);
                apply_trim(&mut self.audio, id, new)
            }
        }
    }

    /// Extend or trim a segment's right edge by `delta` timeline frames.
    /// The length clamps at the untrimmed source length (projected to
    /// the timeline rate) instead of failing; collisions reject the step.
    pub fn trim_right(&mut self, kind: TrackKind, id: SegmentId, delta: i64) -> bool {
        match kind {
            TrackKind::Video => {
                let Some(seg) = self.video.get(id) else {
                    return false;
                };
                let new = trim_right_placement(&seg.placement, delta, seg.native_fps, self.fps);
                apply_trim(&mut self.video, id, new)
            }
            TrackKind::Audio => {
                let Some(seg) = self.audio.get(id) else {
                    return false;
                };
                let new = trim_right_placement(&seg.placement, delta, self.fps, self.fps);
                apply_trim(&mut self.audio, id, new)
            }
        }
    }

    /// Pre-flight overlap check for resize callers.
    pub fn is_colliding(&self, kind: TrackKind, id: SegmentId) -> bool {
        match kind {
            TrackKind::Video => self.video.is_colliding(id),
            TrackKind::Audio => self.audio.is_colliding(id),
        }
    }

    /// Create tracks of the requested kind(s) next to `relative`.
    pub fn add_track(
        &mut self,
        kind: NewTracks,
        relative: Option<(TrackKind, TrackId)>,
        above: bool,
    ) -> AddedTracks {
        let rel_for = |k: TrackKind| {
            relative
                .filter(|(rel_kind, _)| *rel_kind == k)
                .map(|(_, id)| id)
        };
        let mut added = AddedTracks::default();
        if matches!(kind, NewTracks::Video | NewTracks::Both) {
            added.video = Some(self.video_tracks.insert(rel_for(TrackKind::Video), above));
        }
        if matches!(kind, NewTracks::Audio | NewTracks::Both) {
            added.audio = Some(self.audio_tracks.insert(rel_for(TrackKind::Audio), above));
        }
        added
    }

    /// Delete a track and every segment on it. Refused for the last
    /// track of a kind.
    pub fn delete_track(&mut self, kind: TrackKind, id: TrackId) -> bool {
        if self.tracks(kind).len() <= 1 || !self.tracks(kind).contains(id) {
            return false;
        }
        match kind {
            TrackKind::Video => {
                self.video.remove_where(|s| s.placement.track == id);
                self.video_tracks.remove(id)
            }
            TrackKind::Audio => {
                self.audio.remove_where(|s| s.placement.track == id);
                self.audio_tracks.remove(id)
            }
        }
    }

    // Playback clock.

    pub fn is_playing(&self) -> bool {
        self.clock.is_playing()
    }

    pub fn toggle_playing(&mut self) {
        self.clock.toggle();
    }

    pub fn pause(&mut self) {
        self.clock.pause();
    }

    pub fn current_frame(&self) -> Frame {
        self.clock.current_frame()
    }

    pub fn seek(&mut self, frame: Frame) {
        self.clock.seek(frame);
    }

    /// Step the cursor by a signed number of frames (arrow keys).
    pub fn step(&mut self, delta: i64) {
        let current = self.current_frame();
        let target = current.saturating_add_signed(delta);
        self.seek(target);
    }
}

fn capture_thumbs(
    source: &SourceHandle,
    video_frames: u64,
) -> (Option<FrameImage>, Option<FrameImage>) {
    let mut src = source.borrow_mut();
    let first = match src.frame_at(0) {
        Ok(image) => Some(image),
        Err(err) => {
            warn!(%err, "first-frame thumbnail decode failed");
            None
        }
    };
    let last = match src.frame_at(video_frames.saturating_sub(1)) {
        Ok(image) => Some(image),
        Err(err) => {
            warn!(%err, "last-frame thumbnail decode failed");
            None
        }
    };
    (first, last)
}

/// Apply `edit` to every listed segment, recording prior placements.
/// Returns false (leaving `saved` usable for rollback) when an edit is
/// impossible. Ids not present in the store are skipped.
fn apply_edit<S: Placed>(
    store: &mut SegmentStore<S>,
    ids: &[SegmentId],
    saved: &mut Vec<(SegmentId, Placement)>,
    edit: &impl Fn(&Placement) -> Option<Placement>,
) -> bool {
    for &id in ids {
        let Some(seg) = store.get_mut(id) else {
            continue;
        };
        let old = *seg.placement();
        match edit(&old) {
            Some(new) => {
                *seg.placement_mut() = new;
                saved.push((id, old));
            }
            None => return false,
        }
    }
    true
}

fn restore<S: Placed>(store: &mut SegmentStore<S>, saved: &[(SegmentId, Placement)]) {
    for (id, old) in saved {
        if let Some(seg) = store.get_mut(*id) {
            *seg.placement_mut() = *old;
        }
    }
}

fn any_collision<S: Placed>(store: &SegmentStore<S>, moved: &[(SegmentId, Placement)]) -> bool {
    moved.iter().any(|(id, _)| store.is_colliding(*id))
}

fn remap_track(index: &TrackIndex, p: &Placement, delta: i64) -> Option<Placement> {
    let position = index.position_of(p.track)? as i64 + delta;
    if position < 0 {
        return None;
    }
    let track = index.id_at(position as usize)?;
    Some(Placement { track, ..*p })
}

/// Left-edge trim math. `delta` is clamped so the segment keeps at least
/// one frame, never starts before timeline zero, and never reaches
/// before the source's first frame.
fn trim_left_placement(p: &Placement, delta: i64, source_fps: f64, timeline_fps: f64) -> Placement {
    let trimmed_off = time::project_len(p.source_start, source_fps, timeline_fps) as i64;
    let max_extend = trimmed_off.min(p.position as i64);
    let clamped = delta.clamp(-max_extend, p.length as i64 - 1);
    let source_delta = (clamped as f64 * source_fps / timeline_fps).round() as i64;
    Placement {
        source_start: (p.source_start as i64 + source_delta).max(0) as u64,
        position: (p.position as i64 + clamped) as Frame,
        length: (p.length as i64 - clamped) as Frame,
        ..*p
    }
}

/// Right-edge trim math. Length clamps to `[1, untrimmed remainder]`.
fn trim_right_placement(p: &Placement, delta: i64, source_fps: f64, timeline_fps: f64) -> Placement {
    let available = p.source_duration.saturating_sub(p.source_start);
    let max_len = time::project_len(available, source_fps, timeline_fps).max(1);
    Placement {
        length: (p.length as i64 + delta).clamp(1, max_len as i64) as Frame,
        ..*p
    }
}

fn apply_trim<S: Placed>(store: &mut SegmentStore<S>, id: SegmentId, new: Placement) -> bool {
    let Some(seg) = store.get_mut(id) else {
        return false;
    };
    let old = *seg.placement();
    if new == old {
        return true;
    }
    *seg.placement_mut() = new;
    if store.is_colliding(id) {
        if let Some(seg) = store.get_mut(id) {
            *seg.placement_mut() = old;
        }
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::source::stub::StubSource;
    use std::time::Duration;

    fn video_only(frames: u64, fps: f64) -> SourceHandle {
        StubSource::handle(true, false, frames, fps, frames as f64 / fps)
    }

    fn audio_only(seconds: f64) -> SourceHandle {
        StubSource::handle(false, true, 0, 0.0, seconds)
    }

    fn av(frames: u64, fps: f64) -> SourceHandle {
        StubSource::handle(true, true, frames, fps, frames as f64 / fps)
    }

    fn video_track(tl: &Timeline, position: usize) -> TrackId {
        tl.video_tracks().id_at(position).unwrap()
    }

    fn audio_track(tl: &Timeline, position: usize) -> TrackId {
        tl.audio_tracks().id_at(position).unwrap()
    }

    #[test]
    fn test_new_timeline() {
        let tl = Timeline::new(60.0);
        assert_eq!(tl.video_tracks().len(), 2);
        assert_eq!(tl.audio_tracks().len(), 2);
        assert!(!tl.is_playing());
        assert_eq!(tl.current_frame(), 0);
        assert_eq!(tl.duration(), 0);
    }

    #[test]
    fn test_kind_mismatch_rejected() {
        let mut tl = Timeline::new(60.0);
        let source = video_only(60, 60.0);
        let target = audio_track(&tl, 0);

        let result = tl.add_asset(&source, 0, TrackKind::Audio, target);
        assert_eq!(result, Err(PlacementError::KindMismatch));
        assert!(tl.video_segments().is_empty());
        assert!(tl.audio_segments().is_empty());
    }

    #[test]
    fn test_rate_projected_length() {
        let mut tl = Timeline::new(60.0);
        let source = video_only(240, 24.0);
        let added = tl
            .add_asset(&source, 0, TrackKind::Video, video_track(&tl, 0))
            .unwrap();

        let seg = tl.video_segments().get(added.video.unwrap()).unwrap();
        assert_eq!(seg.placement.length, 600);
    }

    #[test]
    fn test_adjacent_allowed_overlap_rejected() {
        let mut tl = Timeline::new(60.0);
        let track = video_track(&tl, 0);
        let source = video_only(100, 60.0);

        assert!(tl.add_asset(&source, 0, TrackKind::Video, track).is_ok());
        assert!(tl.add_asset(&source, 100, TrackKind::Video, track).is_ok());
        assert_eq!(
            tl.add_asset(&source, 50, TrackKind::Video, track),
            Err(PlacementError::Collision)
        );
        assert_eq!(tl.video_segments().len(), 2);
    }

    #[test]
    fn test_av_asset_lands_as_pair() {
        let mut tl = Timeline::new(60.0);
        let source = av(120, 60.0);
        let added = tl
            .add_asset(&source, 10, TrackKind::Video, video_track(&tl, 1))
            .unwrap();

        let video = tl.video_segments().get(added.video.unwrap()).unwrap();
        let audio = tl.audio_segments().get(added.audio.unwrap()).unwrap();
        assert_eq!(video.placement.position, 10);
        assert_eq!(audio.placement.position, 10);
        assert_eq!(tl.audio_tracks().position_of(audio.placement.track), Some(1));
    }

    #[test]
    fn test_av_asset_needs_paired_position() {
        let mut tl = Timeline::new(60.0);
        // A third video track has no audio counterpart at position 2.
        let top = tl
            .add_track(NewTracks::Video, None, true)
            .video
            .unwrap();
        let source = av(120, 60.0);

        let result = tl.add_asset(&source, 0, TrackKind::Video, top);
        assert_eq!(result, Err(PlacementError::NoPairedTrack(TrackKind::Audio, 2)));
        assert!(tl.video_segments().is_empty());
        assert!(tl.audio_segments().is_empty());
    }

    #[test]
    fn test_av_collision_inserts_nothing() {
        let mut tl = Timeline::new(60.0);
        let track = audio_track(&tl, 0);
        let blocker = audio_only(2.0);
        tl.add_asset(&blocker, 0, TrackKind::Audio, track).unwrap();

        // The audio half collides, so the video half must not land either.
        let source = av(120, 60.0);
        let result = tl.add_asset(&source, 30, TrackKind::Video, video_track(&tl, 0));
        assert_eq!(result, Err(PlacementError::Collision));
        assert!(tl.video_segments().is_empty());
        assert_eq!(tl.audio_segments().len(), 1);
    }

    #[test]
    fn test_batch_move_all_or_nothing() {
        let mut tl = Timeline::new(60.0);
        let track = video_track(&tl, 0);
        let source = video_only(100, 60.0);

        let a = tl
            .add_asset(&source, 0, TrackKind::Video, track)
            .unwrap()
            .video
            .unwrap();
        let b = tl
            .add_asset(&source, 200, TrackKind::Video, track)
            .unwrap()
            .video
            .unwrap();
        let blocker = tl
            .add_asset(&source, 400, TrackKind::Video, track)
            .unwrap()
            .video
            .unwrap();

        // Moving {a, b} by +150 slides b into the blocker.
        assert!(!tl.move_segments(&[a, b], &[], 150));
        assert_eq!(tl.video_segments().get(a).unwrap().placement.position, 0);
        assert_eq!(tl.video_segments().get(b).unwrap().placement.position, 200);
        assert_eq!(
            tl.video_segments().get(blocker).unwrap().placement.position,
            400
        );

        // A legal batch move commits every member.
        assert!(tl.move_segments(&[a, b], &[], 50));
        assert_eq!(tl.video_segments().get(a).unwrap().placement.position, 50);
        assert_eq!(tl.video_segments().get(b).unwrap().placement.position, 250);
    }

    #[test]
    fn test_move_before_zero_rejected() {
        let mut tl = Timeline::new(60.0);
        let track = video_track(&tl, 0);
        let source = video_only(100, 60.0);
        let a = tl
            .add_asset(&source, 10, TrackKind::Video, track)
            .unwrap()
            .video
            .unwrap();

        assert!(!tl.move_segments(&[a], &[], -20));
        assert_eq!(tl.video_segments().get(a).unwrap().placement.position, 10);
    }

    #[test]
    fn test_change_tracks() {
        let mut tl = Timeline::new(60.0);
        let bottom = video_track(&tl, 0);
        let source = video_only(100, 60.0);
        let a = tl
            .add_asset(&source, 0, TrackKind::Video, bottom)
            .unwrap()
            .video
            .unwrap();

        assert!(tl.change_tracks(&[a], &[], 1));
        let moved = tl.video_segments().get(a).unwrap();
        assert_eq!(tl.video_tracks().position_of(moved.placement.track), Some(1));

        // Off the top of the stack: rejected, nothing changes.
        assert!(!tl.change_tracks(&[a], &[], 1));
        let held = tl.video_segments().get(a).unwrap();
        assert_eq!(tl.video_tracks().position_of(held.placement.track), Some(1));
    }

    #[test]
    fn test_change_tracks_collision_rolls_back() {
        let mut tl = Timeline::new(60.0);
        let bottom = video_track(&tl, 0);
        let top = video_track(&tl, 1);
        let source = video_only(100, 60.0);

        let a = tl
            .add_asset(&source, 0, TrackKind::Video, bottom)
            .unwrap()
            .video
            .unwrap();
        tl.add_asset(&source, 50, TrackKind::Video, top).unwrap();

        assert!(!tl.change_tracks(&[a], &[], 1));
        let held = tl.video_segments().get(a).unwrap();
        assert_eq!(held.placement.track, bottom);
    }

    #[test]
    fn test_trim_right_clamps_to_source() {
        let mut tl = Timeline::new(60.0);
        let track = video_track(&tl, 0);
        let source = video_only(100, 60.0);
        let a = tl
            .add_asset(&source, 0, TrackKind::Video, track)
            .unwrap()
            .video
            .unwrap();

        // Far past the untrimmed source length: clamped, not rejected.
        assert!(tl.trim_right(TrackKind::Video, a, 500));
        assert_eq!(tl.video_segments().get(a).unwrap().placement.length, 100);

        assert!(tl.trim_right(TrackKind::Video, a, -40));
        assert_eq!(tl.video_segments().get(a).unwrap().placement.length, 60);
    }

    #[test]
    fn test_trim_left_adjusts_jointly() {
        let mut tl = Timeline::new(60.0);
        let track = video_track(&tl, 0);
        let source = video_only(100, 60.0);
        let a = tl
            .add_asset(&source, 10, TrackKind::Video, track)
            .unwrap()
            .video
            .unwrap();

        assert!(tl.trim_left(TrackKind::Video, a, 25));
        let p = tl.video_segments().get(a).unwrap().placement;
        assert_eq!(p.position, 35);
        assert_eq!(p.length, 75);
        assert_eq!(p.source_start, 25);

        // Extending restores trimmed material but no further than the
        // source's first frame.
        assert!(tl.trim_left(TrackKind::Video, a, -100));
        let p = tl.video_segments().get(a).unwrap().placement;
        assert_eq!(p.source_start, 0);
        assert_eq!(p.position, 10);
        assert_eq!(p.length, 100);
    }

    #[test]
    fn test_trim_collision_snaps_back() {
        let mut tl = Timeline::new(60.0);
        let track = video_track(&tl, 0);
        let source = video_only(100, 60.0);

        let a = tl
            .add_asset(&source, 0, TrackKind::Video, track)
            .unwrap()
            .video
            .unwrap();
        tl.trim_right(TrackKind::Video, a, -50);
        tl.add_asset(&source, 50, TrackKind::Video, track).unwrap();

        // Growing back into the neighbour is rejected wholesale.
        assert!(!tl.trim_right(TrackKind::Video, a, 10));
        assert_eq!(tl.video_segments().get(a).unwrap().placement.length, 50);
    }

    #[test]
    fn test_preflight_collision_check() {
        let mut tl = Timeline::new(60.0);
        let track = video_track(&tl, 0);
        let source = video_only(100, 60.0);
        let a = tl
            .add_asset(&source, 0, TrackKind::Video, track)
            .unwrap()
            .video
            .unwrap();
        tl.add_asset(&source, 100, TrackKind::Video, track).unwrap();

        assert!(!tl.is_colliding(TrackKind::Video, a));
        assert!(!tl.is_colliding(TrackKind::Audio, a));
    }

    #[test]
    fn test_delete_track_cascades() {
        let mut tl = Timeline::new(60.0);
        let track = video_track(&tl, 0);
        let source = video_only(100, 60.0);
        tl.add_asset(&source, 0, TrackKind::Video, track).unwrap();
        tl.add_asset(&source, 200, TrackKind::Video, track).unwrap();

        assert!(tl.delete_track(TrackKind::Video, track));
        assert_eq!(tl.video_tracks().len(), 1);
        assert!(tl.video_segments().is_empty());
    }

    #[test]
    fn test_last_track_survives() {
        let mut tl = Timeline::new(60.0);
        let first = audio_track(&tl, 0);
        let second = audio_track(&tl, 1);
        assert!(tl.delete_track(TrackKind::Audio, first));
        assert!(!tl.delete_track(TrackKind::Audio, second));
        assert_eq!(tl.audio_tracks().len(), 1);
    }

    #[test]
    fn test_clock_advances_while_playing() {
        let mut clock = PlaybackClock::new(60.0);
        let start = Instant::now();
        clock.toggle_at(start);
        assert_eq!(clock.frame_at(start + Duration::from_secs(1)), 60);
        assert_eq!(clock.frame_at(start + Duration::from_millis(2500)), 150);
    }

    #[test]
    fn test_clock_drift_free_across_toggles() {
        let mut clock = PlaybackClock::new(60.0);
        let mut now = Instant::now();
        clock.seek_at(1234, now);

        // Many pause/resume cycles with arbitrary paused gaps but zero
        // elapsed play time.
        for gap_ms in [1u64, 7, 900, 13, 40_000] {
            clock.toggle_at(now); // play
            clock.toggle_at(now); // pause immediately
            now += Duration::from_millis(gap_ms);
        }
        assert_eq!(clock.frame_at(now), 1234);
    }

    #[test]
    fn test_clock_seek_while_playing() {
        let mut clock = PlaybackClock::new(60.0);
        let start = Instant::now();
        clock.toggle_at(start);
        clock.seek_at(600, start + Duration::from_secs(5));
        // Resumes from the seek target, not from session start.
        assert_eq!(clock.frame_at(start + Duration::from_secs(6)), 660);

        clock.toggle_at(start + Duration::from_secs(6));
        assert_eq!(clock.frame_at(start + Duration::from_secs(60)), 660);
    }

    #[test]
    fn test_step_saturates_at_zero() {
        let mut tl = Timeline::new(60.0);
        tl.step(-5);
        assert_eq!(tl.current_frame(), 0);
        tl.step(3);
        assert_eq!(tl.current_frame(), 3);
    }
}
