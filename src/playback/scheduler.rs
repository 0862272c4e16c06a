//! Per-tick playback scheduling.
//!
//! Each UI tick reads the timeline clock once, resolves the active
//! segments, and pulls decoded data inline: decode latency extends the
//! tick, there is no background buffering. Video frames that fall behind
//! the clock are dropped; frames decoded ahead of schedule are held in a
//! pending slot until their due frame arrives. Decode and seek failures
//! are logged and skipped; the next tick retries from current state.

use tracing::warn;

use crate::audio::output::AudioOutput;
use crate::core::segment::SegmentId;
use crate::core::store::topmost_active;
use crate::core::time::{self, Frame};
use crate::core::timeline::Timeline;
use crate::media::source::FrameImage;

/// How many timeline frames a decoded picture may lag before it is
/// discarded in favour of the next one.
const DROP_BEHIND: i64 = 2;

/// Audio queued ahead of the device clock, in milliseconds.
const TARGET_QUEUE_MS: f64 = 200.0;

/// Upper bound on decode steps per tick while catching up.
const MAX_DECODE_STEPS: u32 = 64;

#[derive(Default)]
struct VideoState {
    segment: Option<SegmentId>,
    /// Native index of the next frame the decoder will produce.
    next_src: Option<u64>,
    /// Absolute due frame of the image currently shown.
    shown_due: Option<Frame>,
    /// Frame decoded ahead of schedule: (absolute due frame, image).
    pending: Option<(Frame, FrameImage)>,
    current: Option<FrameImage>,
    version: u64,
}

impl VideoState {
    fn present(&mut self, due: Frame, image: FrameImage) {
        self.current = Some(image);
        self.shown_due = Some(due);
        self.version = self.version.wrapping_add(1);
    }

    fn clear(&mut self) {
        if self.current.is_some() {
            self.current = None;
            self.version = self.version.wrapping_add(1);
        }
        self.segment = None;
        self.next_src = None;
        self.shown_due = None;
        self.pending = None;
    }
}

#[derive(Default)]
struct AudioState {
    segment: Option<SegmentId>,
    /// Clock value at the previous tick, for jump detection.
    last_t: Option<Frame>,
    was_playing: bool,
}

/// Drives decoding against the timeline clock, once per render tick.
#[derive(Default)]
pub struct Scheduler {
    video: VideoState,
    audio: AudioState,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// The image the preview should show; `None` means black.
    pub fn current_image(&self) -> Option<&FrameImage> {
        self.video.current.as_ref()
    }

    /// Bumped whenever the preview image changes.
    pub fn image_version(&self) -> u64 {
        self.video.version
    }

    pub fn tick(&mut self, timeline: &Timeline, output: &mut AudioOutput) {
        let t = timeline.current_frame();
        self.tick_video(timeline, t);
        self.tick_audio(timeline, output, t);
    }

    fn tick_video(&mut self, timeline: &Timeline, t: Frame) {
        let Some(seg) = topmost_active(timeline.video_segments(), timeline.video_tracks(), t)
        else {
            self.video.clear();
            return;
        };

        let fps = timeline.fps();
        let rel = t - seg.placement.position;
        let expected_src =
            seg.placement.source_start + time::project_to_source(rel, seg.native_fps, fps);
        let switched = self.video.segment != Some(seg.id);

        if !switched {
            // The shown frame still covers the clock and the next one is
            // not due yet: nothing to decode, nothing to seek.
            if let (Some(shown), Some((due, _))) = (self.video.shown_due, &self.video.pending) {
                if shown <= t && t < *due {
                    return;
                }
            }
        }

        // Seek instead of stepping when the segment changed or the clock
        // jumped: backwards past the decoded position, or further ahead
        // than step-decoding can reasonably catch up within a tick.
        let step_limit = (seg.native_fps / 2.0).ceil() as u64;
        let needs_seek = switched
            || match self.video.next_src {
                Some(next) => {
                    expected_src < next.saturating_sub(1) || expected_src > next + step_limit
                }
                None => true,
            };
        if needs_seek {
            if let Err(err) = seg.source.borrow_mut().seek_video(expected_src) {
                warn!(%err, "video seek failed");
                return;
            }
            self.video.segment = Some(seg.id);
            self.video.next_src = None;
            self.video.shown_due = None;
            self.video.pending = None;
        }

        // A frame held back earlier may have come due.
        if let Some((due, image)) = self.video.pending.take() {
            if due > t {
                self.video.pending = Some((due, image));
            } else if t as i64 - due as i64 <= DROP_BEHIND {
                self.video.present(due, image);
            }
            // A pending frame further behind than the drop window is
            // discarded and replaced by the decode loop below.
        }
        if self.video.shown_due.is_some_and(|shown| shown >= t) {
            return;
        }

        for _ in 0..MAX_DECODE_STEPS {
            let decoded = seg.source.borrow_mut().decode_next_video();
            match decoded {
                Ok(Some(frame)) => {
                    self.video.next_src = Some(frame.native_index + 1);
                    let rel_src = frame.native_index.saturating_sub(seg.placement.source_start);
                    let due =
                        seg.placement.position + time::project_len(rel_src, seg.native_fps, fps);
                    if t as i64 - due as i64 > DROP_BEHIND {
                        // Too far behind the clock: skip it and catch up.
                        continue;
                    }
                    if due > t && self.video.shown_due.is_some_and(|shown| shown <= t) {
                        // Ahead of schedule: hold it until its due frame.
                        self.video.pending = Some((due, frame.image));
                    } else {
                        self.video.present(due, frame.image);
                    }
                    return;
                }
                Ok(None) => return, // eof: hold the last image
                Err(err) => {
                    warn!(%err, "video decode failed");
                    return;
                }
            }
        }
    }

    fn tick_audio(&mut self, timeline: &Timeline, output: &mut AudioOutput, t: Frame) {
        if !timeline.is_playing() {
            if self.audio.was_playing {
                if let Err(err) = output.pause() {
                    warn!(%err, "audio pause failed");
                }
                output.flush();
                self.audio.segment = None;
                self.audio.last_t = None;
                self.audio.was_playing = false;
            }
            return;
        }
        self.audio.was_playing = true;

        // A cursor jump makes the already-queued samples wrong; treat it
        // like a segment switch so the path below reseeks and flushes.
        let jump_limit = (timeline.fps() / 4.0).ceil() as Frame;
        let jumped = self
            .audio
            .last_t
            .is_some_and(|last| t < last || t > last + jump_limit);
        if jumped {
            self.audio.segment = None;
        }
        self.audio.last_t = Some(t);

        // First match wins; audio tracks carry no compositing priority
        // and nothing is mixed.
        let Some(seg) = timeline.audio_segments().first_active(t) else {
            if let Err(err) = output.pause() {
                warn!(%err, "audio pause failed");
            }
            self.audio.segment = None;
            return;
        };

        if self.audio.segment != Some(seg.id) {
            let offset = seg.placement.source_start + (t - seg.placement.position);
            let seconds = time::frames_to_seconds(offset, timeline.fps());
            if let Err(err) = seg.source.borrow_mut().seek_audio(seconds) {
                warn!(%err, "audio seek failed");
                return;
            }
            output.flush();
            self.audio.segment = Some(seg.id);
        }

        if let Err(err) = output.resume() {
            warn!(%err, "audio resume failed");
            return;
        }

        while output.queued_millis() < TARGET_QUEUE_MS {
            let decoded = seg.source.borrow_mut().decode_next_audio();
            match decoded {
                Ok(Some(samples)) => output.queue(samples),
                Ok(None) => break,
                Err(err) => {
                    warn!(%err, "audio decode failed");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::track::TrackKind;
    use crate::media::source::{DecodedFrame, MediaError, MediaInfo, MediaSource, SourceHandle};
    use std::path::PathBuf;

    /// Synthetic video source: frames are generated on demand and the
    /// frame index is smuggled out through the image width. Seeks land a
    /// few frames early, like a keyframe seek would.
    struct ScriptedVideo {
        info: MediaInfo,
        next: u64,
        seek_slip: u64,
        decoded: u64,
    }

    impl ScriptedVideo {
        fn handle(frames: u64, fps: f64, seek_slip: u64) -> SourceHandle {
            SourceHandle::new(Self {
                info: MediaInfo {
                    path: PathBuf::from("scripted.mp4"),
                    has_video: true,
                    has_audio: false,
                    video_frames: frames,
                    video_fps: fps,
                    duration_secs: frames as f64 / fps,
                },
                next: 0,
                seek_slip,
                decoded: 0,
            })
        }
    }

    impl MediaSource for ScriptedVideo {
        fn info(&self) -> &MediaInfo {
            &self.info
        }

        fn frame_at(&mut self, native_frame: u64) -> Result<FrameImage, MediaError> {
            Ok(image_for(native_frame))
        }

        fn seek_video(&mut self, native_frame: u64) -> Result<(), MediaError> {
            self.next = native_frame.saturating_sub(self.seek_slip);
            Ok(())
        }

        fn seek_audio(&mut self, _seconds: f64) -> Result<(), MediaError> {
            Err(MediaError::NoAudioStream)
        }

        fn decode_next_video(&mut self) -> Result<Option<DecodedFrame>, MediaError> {
            if self.next >= self.info.video_frames {
                return Ok(None);
            }
            let index = self.next;
            self.next += 1;
            self.decoded += 1;
            Ok(Some(DecodedFrame {
                image: image_for(index),
                native_index: index,
            }))
        }

        fn decode_next_audio(&mut self) -> Result<Option<Vec<f32>>, MediaError> {
            Err(MediaError::NoAudioStream)
        }
    }

    fn image_for(index: u64) -> FrameImage {
        FrameImage {
            data: vec![0; 4],
            width: index as u32,
            height: 1,
        }
    }

    fn timeline_with(source: &SourceHandle) -> Timeline {
        let mut tl = Timeline::new(30.0);
        let track = tl.video_tracks().id_at(0).unwrap();
        tl.add_asset(source, 0, TrackKind::Video, track).unwrap();
        tl
    }

    #[test]
    fn test_presents_frame_at_cursor() {
        let source = ScriptedVideo::handle(300, 30.0, 0);
        let mut timeline = timeline_with(&source);
        timeline.seek(5);

        let mut sched = Scheduler::new();
        sched.tick_video(&timeline, timeline.current_frame());
        assert_eq!(sched.current_image().map(|i| i.width), Some(5));
    }

    #[test]
    fn test_blank_when_nothing_active() {
        let source = ScriptedVideo::handle(300, 30.0, 0);
        let mut timeline = timeline_with(&source);
        let mut sched = Scheduler::new();

        timeline.seek(5);
        sched.tick_video(&timeline, timeline.current_frame());
        assert!(sched.current_image().is_some());

        // Past the end of the only segment.
        timeline.seek(5000);
        sched.tick_video(&timeline, timeline.current_frame());
        assert!(sched.current_image().is_none());
    }

    #[test]
    fn test_catches_up_after_keyframe_seek() {
        // Seeks slip 4 frames back; frames more than DROP_BEHIND behind
        // the clock must be discarded, not shown.
        let source = ScriptedVideo::handle(300, 30.0, 4);
        let mut timeline = timeline_with(&source);
        timeline.seek(100);

        let mut sched = Scheduler::new();
        sched.tick_video(&timeline, timeline.current_frame());
        let shown = sched.current_image().map(|i| i.width).unwrap();
        assert!(shown as i64 >= 100 - DROP_BEHIND);
    }

    #[test]
    fn test_ahead_frame_is_held_not_shown() {
        let source = ScriptedVideo::handle(300, 30.0, 0);
        let mut timeline = timeline_with(&source);
        timeline.seek(10);

        let mut sched = Scheduler::new();
        sched.tick_video(&timeline, timeline.current_frame());
        assert_eq!(sched.current_image().map(|i| i.width), Some(10));
        let version = sched.image_version();

        // Cursor has not advanced: the next decoded frame (11) stays
        // pending and the shown image does not change.
        sched.tick_video(&timeline, timeline.current_frame());
        sched.tick_video(&timeline, timeline.current_frame());
        assert_eq!(sched.current_image().map(|i| i.width), Some(10));
        assert_eq!(sched.image_version(), version);

        // Once the cursor reaches it, the held frame is presented.
        timeline.seek(11);
        sched.tick_video(&timeline, timeline.current_frame());
        assert_eq!(sched.current_image().map(|i| i.width), Some(11));
    }

    #[test]
    fn test_backwards_jump_reseeks() {
        let source = ScriptedVideo::handle(300, 30.0, 0);
        let mut timeline = timeline_with(&source);

        let mut sched = Scheduler::new();
        timeline.seek(50);
        sched.tick_video(&timeline, timeline.current_frame());
        timeline.seek(10);
        sched.tick_video(&timeline, timeline.current_frame());
        assert_eq!(sched.current_image().map(|i| i.width), Some(10));
    }
}
