//! Pointer gesture interpretation: selection, drag-to-move, trimming.
//!
//! The controller is fed raw pointer/key events in screen coordinates
//! plus an explicit [`ViewTransform`]; it owns no widget state and holds
//! segments only by stable id. Collision failures during a drag are
//! silent; the segments simply stick at their last legal position.

use egui::Pos2;

use crate::core::segment::SegmentId;
use crate::core::time::Frame;
use crate::core::timeline::Timeline;
use crate::core::track::TrackKind;

/// Pointer travel (px) before a press becomes a drag instead of a click.
pub const DRAG_THRESHOLD_PX: f32 = 4.0;

/// Half-width (px) of the grab zone around a segment edge.
pub const RESIZE_EDGE_PX: f32 = 6.0;

/// A visual lane of the timeline area. The ruler sits on top, video rows
/// stack beneath it (top row = highest position), audio rows below that
/// in ascending position order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row {
    Ruler,
    /// Video track at this stacking position.
    Video(usize),
    /// Audio track at this stacking position.
    Audio(usize),
}

/// Maps between screen space and timeline space. Built fresh each frame
/// from the widget rect and zoom/scroll state.
#[derive(Debug, Clone, Copy)]
pub struct ViewTransform {
    pub origin: Pos2,
    pub pixels_per_frame: f32,
    pub scroll_x: f32,
    pub ruler_height: f32,
    pub track_height: f32,
    pub video_rows: usize,
    pub audio_rows: usize,
}

impl ViewTransform {
    pub fn frame_at_x(&self, x: f32) -> Frame {
        let frames = (x - self.origin.x + self.scroll_x) / self.pixels_per_frame;
        frames.floor().max(0.0) as Frame
    }

    pub fn x_of_frame(&self, frame: Frame) -> f32 {
        self.origin.x + frame as f32 * self.pixels_per_frame - self.scroll_x
    }

    pub fn row_at_y(&self, y: f32) -> Option<Row> {
        let rel = y - self.origin.y;
        if rel < 0.0 {
            return None;
        }
        if rel < self.ruler_height {
            return Some(Row::Ruler);
        }
        let row = ((rel - self.ruler_height) / self.track_height) as usize;
        if row < self.video_rows {
            return Some(Row::Video(self.video_rows - 1 - row));
        }
        let row = row - self.video_rows;
        if row < self.audio_rows {
            return Some(Row::Audio(row));
        }
        None
    }

    /// Top edge of a row, for drawing.
    pub fn row_top(&self, row: Row) -> f32 {
        match row {
            Row::Ruler => self.origin.y,
            Row::Video(position) => {
                let from_top = self.video_rows - 1 - position;
                self.origin.y + self.ruler_height + from_top as f32 * self.track_height
            }
            Row::Audio(position) => {
                self.origin.y
                    + self.ruler_height
                    + (self.video_rows + position) as f32 * self.track_height
            }
        }
    }
}

/// A selected or hit segment, tagged with its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentRef {
    Video(SegmentId),
    Audio(SegmentId),
}

impl SegmentRef {
    pub fn kind(&self) -> TrackKind {
        match self {
            SegmentRef::Video(_) => TrackKind::Video,
            SegmentRef::Audio(_) => TrackKind::Audio,
        }
    }

    pub fn id(&self) -> SegmentId {
        match self {
            SegmentRef::Video(id) | SegmentRef::Audio(id) => *id,
        }
    }
}

/// Which segment edge a resize gesture grabs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Left,
    Right,
}

/// What lies under a pointer position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hit {
    Segment(SegmentRef),
    Edge(SegmentRef, Edge),
    Ruler(Frame),
    Empty(Frame),
    Outside,
}

/// Selected segment ids, per kind.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection {
    pub video: Vec<SegmentId>,
    pub audio: Vec<SegmentId>,
}

impl Selection {
    pub fn clear(&mut self) {
        self.video.clear();
        self.audio.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.video.is_empty() && self.audio.is_empty()
    }

    pub fn contains(&self, segment: SegmentRef) -> bool {
        match segment {
            SegmentRef::Video(id) => self.video.contains(&id),
            SegmentRef::Audio(id) => self.audio.contains(&id),
        }
    }

    pub fn select_only(&mut self, segment: SegmentRef) {
        self.clear();
        self.add(segment);
    }

    pub fn add(&mut self, segment: SegmentRef) {
        if !self.contains(segment) {
            match segment {
                SegmentRef::Video(id) => self.video.push(id),
                SegmentRef::Audio(id) => self.audio.push(id),
            }
        }
    }

    pub fn toggle(&mut self, segment: SegmentRef) {
        if self.contains(segment) {
            match segment {
                SegmentRef::Video(id) => self.video.retain(|s| *s != id),
                SegmentRef::Audio(id) => self.audio.retain(|s| *s != id),
            }
        } else {
            self.add(segment);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Gesture {
    Idle,
    Holding {
        hit: SegmentRef,
        press: Pos2,
        anchor_frame: Frame,
        anchor_row: Row,
        shift_added: bool,
    },
    Dragging {
        anchor_frame: Frame,
        anchor_row: Row,
    },
    PreparingResize {
        hit: SegmentRef,
        edge: Edge,
        press: Pos2,
        anchor_frame: Frame,
    },
    Resizing {
        hit: SegmentRef,
        edge: Edge,
        anchor_frame: Frame,
    },
}

/// Interprets pointer input into timeline mutations.
#[derive(Debug)]
pub struct Controller {
    gesture: Gesture,
    selection: Selection,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    pub fn new() -> Self {
        Self {
            gesture: Gesture::Idle,
            selection: Selection::default(),
        }
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Whether a move or resize gesture is live (for cursor feedback).
    pub fn is_dragging(&self) -> bool {
        matches!(self.gesture, Gesture::Dragging { .. } | Gesture::Resizing { .. })
    }

    /// Locate what the pointer is over.
    pub fn hit_test(timeline: &Timeline, view: &ViewTransform, pos: Pos2) -> Hit {
        let frame = view.frame_at_x(pos.x);
        match view.row_at_y(pos.y) {
            None => Hit::Outside,
            Some(Row::Ruler) => Hit::Ruler(frame),
            Some(Row::Video(position)) => {
                let Some(track) = timeline.video_tracks().id_at(position) else {
                    return Hit::Outside;
                };
                for seg in timeline.video_segments().iter() {
                    if seg.placement.track != track {
                        continue;
                    }
                    if let Some(hit) =
                        segment_hit(view, pos.x, &seg.placement, SegmentRef::Video(seg.id))
                    {
                        return hit;
                    }
                }
                Hit::Empty(frame)
            }
            Some(Row::Audio(position)) => {
                let Some(track) = timeline.audio_tracks().id_at(position) else {
                    return Hit::Outside;
                };
                for seg in timeline.audio_segments().iter() {
                    if seg.placement.track != track {
                        continue;
                    }
                    if let Some(hit) =
                        segment_hit(view, pos.x, &seg.placement, SegmentRef::Audio(seg.id))
                    {
                        return hit;
                    }
                }
                Hit::Empty(frame)
            }
        }
    }

    pub fn pointer_down(
        &mut self,
        timeline: &mut Timeline,
        view: &ViewTransform,
        pos: Pos2,
        shift: bool,
    ) {
        let anchor_frame = view.frame_at_x(pos.x);
        match Self::hit_test(timeline, view, pos) {
            Hit::Edge(hit, edge) => {
                if !shift && !self.selection.contains(hit) {
                    self.selection.select_only(hit);
                }
                self.gesture = Gesture::PreparingResize {
                    hit,
                    edge,
                    press: pos,
                    anchor_frame,
                };
            }
            Hit::Segment(hit) => {
                let mut shift_added = false;
                if shift {
                    if !self.selection.contains(hit) {
                        self.selection.add(hit);
                        shift_added = true;
                    }
                } else if !self.selection.contains(hit) {
                    self.selection.select_only(hit);
                }
                let anchor_row = view.row_at_y(pos.y).unwrap_or(Row::Ruler);
                self.gesture = Gesture::Holding {
                    hit,
                    press: pos,
                    anchor_frame,
                    anchor_row,
                    shift_added,
                };
            }
            Hit::Ruler(frame) | Hit::Empty(frame) => {
                self.selection.clear();
                timeline.pause();
                timeline.seek(frame);
                self.gesture = Gesture::Idle;
            }
            Hit::Outside => {}
        }
    }

    pub fn pointer_move(&mut self, timeline: &mut Timeline, view: &ViewTransform, pos: Pos2) {
        match self.gesture {
            Gesture::Holding {
                press,
                anchor_frame,
                anchor_row,
                ..
            } => {
                if press.distance(pos) > DRAG_THRESHOLD_PX {
                    self.gesture = Gesture::Dragging {
                        anchor_frame,
                        anchor_row,
                    };
                    self.drag_to(timeline, view, pos);
                }
            }
            Gesture::Dragging { .. } => self.drag_to(timeline, view, pos),
            Gesture::PreparingResize {
                hit,
                edge,
                press,
                anchor_frame,
            } => {
                if press.distance(pos) > DRAG_THRESHOLD_PX {
                    self.gesture = Gesture::Resizing {
                        hit,
                        edge,
                        anchor_frame,
                    };
                    self.resize_to(timeline, view, pos);
                }
            }
            Gesture::Resizing { .. } => self.resize_to(timeline, view, pos),
            Gesture::Idle => {}
        }
    }

    pub fn pointer_up(&mut self, _timeline: &mut Timeline, shift: bool) {
        if let Gesture::Holding {
            hit, shift_added, ..
        } = self.gesture
        {
            // A press that never became a drag is a click. Plain clicks
            // applied their selection on the way down; a shift-click on
            // an already-selected segment toggles it off here.
            if shift && !shift_added {
                self.selection.toggle(hit);
            }
        }
        self.gesture = Gesture::Idle;
    }

    pub fn delete_selected(&mut self, timeline: &mut Timeline) {
        timeline.delete_segments(&self.selection.video, &self.selection.audio);
        self.selection.clear();
    }

    fn drag_to(&mut self, timeline: &mut Timeline, view: &ViewTransform, pos: Pos2) {
        let Gesture::Dragging {
            mut anchor_frame,
            mut anchor_row,
        } = self.gesture
        else {
            return;
        };

        // Horizontal: signed frame delta from the last committed anchor.
        let pointer_frame = view.frame_at_x(pos.x);
        let delta = pointer_frame as i64 - anchor_frame as i64;
        if delta != 0
            && timeline.move_segments(&self.selection.video, &self.selection.audio, delta)
        {
            anchor_frame = pointer_frame;
        }

        // Vertical: track-position delta, pre-validated so a doomed
        // mutation is never attempted.
        if let Some(row) = view.row_at_y(pos.y) {
            let delta = row_delta(anchor_row, row);
            if delta != 0
                && self.track_delta_fits(timeline, delta)
                && timeline.change_tracks(&self.selection.video, &self.selection.audio, delta)
            {
                anchor_row = row;
            }
        }

        self.gesture = Gesture::Dragging {
            anchor_frame,
            anchor_row,
        };
    }

    fn resize_to(&mut self, timeline: &mut Timeline, view: &ViewTransform, pos: Pos2) {
        let Gesture::Resizing {
            hit,
            edge,
            mut anchor_frame,
        } = self.gesture
        else {
            return;
        };

        let pointer_frame = view.frame_at_x(pos.x);
        let delta = pointer_frame as i64 - anchor_frame as i64;
        if delta != 0 {
            let applied = match edge {
                Edge::Left => timeline.trim_left(hit.kind(), hit.id(), delta),
                Edge::Right => timeline.trim_right(hit.kind(), hit.id(), delta),
            };
            if applied {
                anchor_frame = pointer_frame;
            }
        }

        self.gesture = Gesture::Resizing {
            hit,
            edge,
            anchor_frame,
        };
    }

    /// Whether shifting the selection by `delta` track positions keeps
    /// every member inside its kind's index.
    fn track_delta_fits(&self, timeline: &Timeline, delta: i64) -> bool {
        let fits = |positions: &mut dyn Iterator<Item = usize>, count: usize| {
            positions.all(|p| {
                let target = p as i64 + delta;
                target >= 0 && (target as usize) < count
            })
        };
        let video_count = timeline.video_tracks().len();
        let mut video_positions = self.selection.video.iter().filter_map(|id| {
            let seg = timeline.video_segments().get(*id)?;
            timeline.video_tracks().position_of(seg.placement.track)
        });
        if !fits(&mut video_positions, video_count) {
            return false;
        }
        let audio_count = timeline.audio_tracks().len();
        let mut audio_positions = self.selection.audio.iter().filter_map(|id| {
            let seg = timeline.audio_segments().get(*id)?;
            timeline.audio_tracks().position_of(seg.placement.track)
        });
        fits(&mut audio_positions, audio_count)
    }
}

fn segment_hit(
    view: &ViewTransform,
    x: f32,
    placement: &crate::core::segment::Placement,
    segment: SegmentRef,
) -> Option<Hit> {
    let left = view.x_of_frame(placement.position);
    let right = view.x_of_frame(placement.end());
    if (x - left).abs() <= RESIZE_EDGE_PX {
        return Some(Hit::Edge(segment, Edge::Left));
    }
    if (x - right).abs() <= RESIZE_EDGE_PX {
        return Some(Hit::Edge(segment, Edge::Right));
    }
    if x > left && x < right {
        return Some(Hit::Segment(segment));
    }
    None
}

fn row_delta(from: Row, to: Row) -> i64 {
    match (from, to) {
        (Row::Video(a), Row::Video(b)) | (Row::Audio(a), Row::Audio(b)) => b as i64 - a as i64,
        _ => 0,
    }
}
