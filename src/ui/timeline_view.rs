//! Timeline widget: paints tracks, segments and the cursor, and feeds
//! pointer input to the gesture controller.

use std::collections::HashMap;

use egui::{
    pos2, vec2, Align2, Color32, FontId, Rect, Sense, Stroke, TextureHandle, TextureOptions, Ui,
};

use crate::core::segment::SegmentId;
use crate::core::time::{format_timecode, Frame};
use crate::core::timeline::Timeline;
use crate::media::source::FrameImage;
use crate::ui::interaction::{Controller, Row, SegmentRef, ViewTransform};

const RULER_HEIGHT: f32 = 22.0;
const TRACK_HEIGHT: f32 = 48.0;
const MIN_PIXELS_PER_FRAME: f32 = 0.02;
const MAX_PIXELS_PER_FRAME: f32 = 24.0;

const VIDEO_FILL: Color32 = Color32::from_rgb(0x3a, 0x5f, 0x8a);
const AUDIO_FILL: Color32 = Color32::from_rgb(0x3f, 0x7a, 0x52);
const SELECTED_STROKE: Color32 = Color32::from_rgb(0xf2, 0xc9, 0x4c);
const CURSOR_COLOR: Color32 = Color32::from_rgb(0xe0, 0x4a, 0x4a);

/// Zoom/scroll state and the painting of the timeline area.
pub struct TimelineView {
    pixels_per_frame: f32,
    scroll_x: f32,
    thumbs: HashMap<SegmentId, TextureHandle>,
    last_transform: Option<ViewTransform>,
}

impl Default for TimelineView {
    fn default() -> Self {
        Self::new()
    }
}

impl TimelineView {
    pub fn new() -> Self {
        Self {
            pixels_per_frame: 2.0,
            scroll_x: 0.0,
            thumbs: HashMap::new(),
            last_transform: None,
        }
    }

    /// The transform used the last time the widget was laid out, for
    /// callers resolving drop positions outside the widget pass.
    pub fn last_transform(&self) -> Option<&ViewTransform> {
        self.last_transform.as_ref()
    }

    fn transform(&self, rect: Rect, timeline: &Timeline) -> ViewTransform {
        ViewTransform {
            origin: rect.min,
            pixels_per_frame: self.pixels_per_frame,
            scroll_x: self.scroll_x,
            ruler_height: RULER_HEIGHT,
            track_height: TRACK_HEIGHT,
            video_rows: timeline.video_tracks().len(),
            audio_rows: timeline.audio_tracks().len(),
        }
    }

    pub fn ui(&mut self, ui: &mut Ui, timeline: &mut Timeline, controller: &mut Controller) {
        let height = RULER_HEIGHT
            + (timeline.video_tracks().len() + timeline.audio_tracks().len()) as f32
                * TRACK_HEIGHT;
        let (rect, response) =
            ui.allocate_exact_size(vec2(ui.available_width(), height), Sense::click_and_drag());
        let view = self.transform(rect, timeline);
        self.last_transform = Some(view);

        // Wheel: Ctrl zooms the time axis around the pointer, plain
        // scroll pans horizontally, Shift stays reserved for vertical.
        if response.hovered() {
            let (scroll, modifiers, hover) = ui.input(|i| {
                (i.raw_scroll_delta, i.modifiers, i.pointer.hover_pos())
            });
            let scroll_amount = scroll.x + scroll.y;
            if scroll_amount != 0.0 {
                if modifiers.ctrl || modifiers.command {
                    let pivot_x = hover.map_or(rect.min.x, |p| p.x);
                    let pivot_frame =
                        (pivot_x - rect.min.x + self.scroll_x) / self.pixels_per_frame;
                    let factor = (scroll_amount * 0.002).exp();
                    self.pixels_per_frame = (self.pixels_per_frame * factor)
                        .clamp(MIN_PIXELS_PER_FRAME, MAX_PIXELS_PER_FRAME);
                    self.scroll_x =
                        (pivot_frame * self.pixels_per_frame - (pivot_x - rect.min.x)).max(0.0);
                } else if !modifiers.shift {
                    self.scroll_x = (self.scroll_x - scroll_amount).max(0.0);
                }
            }
        }

        let shift = ui.input(|i| i.modifiers.shift);
        let (pressed, down, released, pointer) = ui.input(|i| {
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_down(),
                i.pointer.primary_released(),
                i.pointer.interact_pos(),
            )
        });
        if let Some(pos) = pointer {
            if pressed && rect.contains(pos) {
                controller.pointer_down(timeline, &view, pos, shift);
            } else if down {
                controller.pointer_move(timeline, &view, pos);
            }
        }
        if released {
            controller.pointer_up(timeline, shift);
        }

        self.paint(ui, rect, &view, timeline, controller);
    }

    fn paint(
        &mut self,
        ui: &mut Ui,
        rect: Rect,
        view: &ViewTransform,
        timeline: &Timeline,
        controller: &Controller,
    ) {
        let painter = ui.painter_at(rect);
        painter.rect_filled(rect, 0.0, Color32::from_gray(0x16));

        // Track row backgrounds, video stack above audio.
        for position in 0..view.video_rows {
            let top = view.row_top(Row::Video(position));
            let row = Rect::from_min_size(pos2(rect.min.x, top), vec2(rect.width(), TRACK_HEIGHT));
            painter.rect_filled(row.shrink2(vec2(0.0, 1.0)), 0.0, Color32::from_gray(0x1e));
        }
        for position in 0..view.audio_rows {
            let top = view.row_top(Row::Audio(position));
            let row = Rect::from_min_size(pos2(rect.min.x, top), vec2(rect.width(), TRACK_HEIGHT));
            painter.rect_filled(row.shrink2(vec2(0.0, 1.0)), 0.0, Color32::from_gray(0x1a));
        }

        // Ruler with a tick each second.
        let ruler = Rect::from_min_size(rect.min, vec2(rect.width(), RULER_HEIGHT));
        painter.rect_filled(ruler, 0.0, Color32::from_gray(0x24));
        let fps = timeline.fps().round().max(1.0) as u64;
        let first_visible = view.frame_at_x(rect.min.x);
        let mut tick = first_visible - first_visible % fps;
        loop {
            let x = view.x_of_frame(tick);
            if x > rect.max.x {
                break;
            }
            painter.line_segment(
                [pos2(x, ruler.max.y - 6.0), pos2(x, ruler.max.y)],
                Stroke::new(1.0, Color32::from_gray(0x60)),
            );
            painter.text(
                pos2(x + 3.0, ruler.min.y + 2.0),
                Align2::LEFT_TOP,
                format_timecode(tick, timeline.fps()),
                FontId::monospace(9.0),
                Color32::from_gray(0x90),
            );
            tick += fps;
        }

        // Segments.
        let ctx = ui.ctx().clone();
        let mut live = Vec::new();
        for seg in timeline.video_segments().iter() {
            let Some(position) = timeline.video_tracks().position_of(seg.placement.track) else {
                continue;
            };
            live.push(seg.id);
            let selected = controller.selection().contains(SegmentRef::Video(seg.id));
            let body = self.segment_rect(view, Row::Video(position), seg.placement.position, seg.placement.end());
            paint_segment(&painter, body, VIDEO_FILL, selected);
            if let Some(thumb) = &seg.first_thumb {
                let tex = self
                    .thumbs
                    .entry(seg.id)
                    .or_insert_with(|| upload_thumb(&ctx, seg.id, thumb));
                let side = body.height() - 4.0;
                let thumb_rect = Rect::from_min_size(
                    pos2(body.min.x + 2.0, body.min.y + 2.0),
                    vec2(side, side),
                );
                if body.width() > side + 4.0 {
                    painter.image(
                        tex.id(),
                        thumb_rect,
                        Rect::from_min_max(pos2(0.0, 0.0), pos2(1.0, 1.0)),
                        Color32::WHITE,
                    );
                }
            }
        }
        for seg in timeline.audio_segments().iter() {
            let Some(position) = timeline.audio_tracks().position_of(seg.placement.track) else {
                continue;
            };
            let selected = controller.selection().contains(SegmentRef::Audio(seg.id));
            let body = self.segment_rect(view, Row::Audio(position), seg.placement.position, seg.placement.end());
            paint_segment(&painter, body, AUDIO_FILL, selected);
        }
        self.thumbs.retain(|id, _| live.contains(id));

        // Cursor.
        let cursor_x = view.x_of_frame(timeline.current_frame());
        if cursor_x >= rect.min.x && cursor_x <= rect.max.x {
            painter.line_segment(
                [pos2(cursor_x, rect.min.y), pos2(cursor_x, rect.max.y)],
                Stroke::new(1.5, CURSOR_COLOR),
            );
        }
    }

    fn segment_rect(&self, view: &ViewTransform, row: Row, start: Frame, end: Frame) -> Rect {
        let top = view.row_top(row);
        Rect::from_min_max(
            pos2(view.x_of_frame(start), top + 2.0),
            pos2(view.x_of_frame(end), top + TRACK_HEIGHT - 2.0),
        )
    }
}

fn paint_segment(painter: &egui::Painter, body: Rect, fill: Color32, selected: bool) {
    painter.rect_filled(body, 3.0, fill);
    let stroke = if selected {
        Stroke::new(2.0, SELECTED_STROKE)
    } else {
        Stroke::new(1.0, Color32::from_gray(0x10))
    };
    painter.rect_stroke(body, 3.0, stroke);
}

fn upload_thumb(ctx: &egui::Context, id: SegmentId, image: &FrameImage) -> TextureHandle {
    let color = egui::ColorImage::from_rgba_unmultiplied(
        [image.width as usize, image.height as usize],
        &image.data,
    );
    ctx.load_texture(format!("thumb-{}", id.0), color, TextureOptions::LINEAR)
}
