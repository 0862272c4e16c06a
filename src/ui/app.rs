//! Main application UI: panel layout, asset import, keyboard handling,
//! and the per-frame scheduler tick.
//!
//! The app owns the timeline, the scheduler and the gesture controller
//! and hands explicit references between them; nothing is discovered at
//! runtime and nothing global is consulted.

use std::path::{Path, PathBuf};

use eframe::egui::{
    CentralPanel, Color32, Context, Image, Key, SidePanel, TextureHandle, TextureOptions,
    TopBottomPanel,
};
use eframe::{App, CreationContext};
use tracing::{info, warn};

use crate::audio::output::AudioOutput;
use crate::core::time::{format_timecode, Frame};
use crate::core::timeline::{NewTracks, Timeline};
use crate::core::track::{TrackId, TrackKind};
use crate::media::ffmpeg::FfmpegSource;
use crate::media::source::SourceHandle;
use crate::playback::scheduler::Scheduler;
use crate::ui::interaction::{Controller, Row};
use crate::ui::timeline_view::TimelineView;

/// An imported media file listed in the pool.
struct Asset {
    name: String,
    handle: SourceHandle,
}

/// Main editor application.
pub struct EditorApp {
    timeline: Timeline,
    controller: Controller,
    scheduler: Scheduler,
    view: TimelineView,
    audio_out: AudioOutput,
    assets: Vec<Asset>,
    preview: Option<TextureHandle>,
    preview_version: u64,
}

impl EditorApp {
    pub fn new(_cc: &CreationContext<'_>, audio_out: AudioOutput) -> Self {
        Self {
            timeline: Timeline::default(),
            controller: Controller::new(),
            scheduler: Scheduler::new(),
            view: TimelineView::new(),
            audio_out,
            assets: Vec::new(),
            preview: None,
            preview_version: u64::MAX,
        }
    }

    /// Open a file and add it to the pool; returns its handle.
    fn import(&mut self, path: &Path) -> Option<SourceHandle> {
        match FfmpegSource::open(path, self.audio_out.spec()) {
            Ok(handle) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                info!(path = %path.display(), "imported asset");
                self.assets.push(Asset {
                    name,
                    handle: handle.clone(),
                });
                Some(handle)
            }
            Err(err) => {
                warn!(%err, path = %path.display(), "import failed");
                None
            }
        }
    }

    /// Place an asset on the first track matching its kind, at `frame`.
    fn place_at_default(&mut self, handle: &SourceHandle, frame: Frame) {
        let has_video = handle.borrow().info().has_video;
        let target = if has_video {
            self.timeline
                .video_tracks()
                .id_at(0)
                .map(|id| (TrackKind::Video, id))
        } else {
            self.timeline
                .audio_tracks()
                .id_at(0)
                .map(|id| (TrackKind::Audio, id))
        };
        if let Some((kind, track)) = target {
            self.place(handle, frame, kind, track);
        }
    }

    fn place(&mut self, handle: &SourceHandle, frame: Frame, kind: TrackKind, track: TrackId) {
        // Rejected drops (kind mismatch, collision) are simply not
        // visualized; rejection is an expected outcome, not an error.
        let _ = self.timeline.add_asset(handle, frame, kind, track);
    }

    fn handle_dropped_files(&mut self, ctx: &Context) {
        let dropped: Vec<PathBuf> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|f| f.path.clone())
                .collect()
        });
        if dropped.is_empty() {
            return;
        }
        let hover = ctx.input(|i| i.pointer.hover_pos());
        // A drop over a track row places there; anywhere else imports
        // into the pool and places at the cursor on a default track.
        let target = hover.zip(self.view.last_transform().copied()).and_then(
            |(pos, view)| match view.row_at_y(pos.y) {
                Some(Row::Video(p)) => {
                    let track = self.timeline.video_tracks().id_at(p)?;
                    Some((TrackKind::Video, track, view.frame_at_x(pos.x)))
                }
                Some(Row::Audio(p)) => {
                    let track = self.timeline.audio_tracks().id_at(p)?;
                    Some((TrackKind::Audio, track, view.frame_at_x(pos.x)))
                }
                _ => None,
            },
        );
        for path in dropped {
            let Some(handle) = self.import(&path) else {
                continue;
            };
            match target {
                Some((kind, track, frame)) => self.place(&handle, frame, kind, track),
                None => {
                    let frame = self.timeline.current_frame();
                    self.place_at_default(&handle, frame);
                }
            }
        }
    }

    fn handle_keys(&mut self, ctx: &Context) {
        let (space, delete, left, right) = ctx.input(|i| {
            (
                i.key_pressed(Key::Space),
                i.key_pressed(Key::Delete),
                i.key_pressed(Key::ArrowLeft),
                i.key_pressed(Key::ArrowRight),
            )
        });
        if space {
            self.timeline.toggle_playing();
        }
        if delete {
            self.controller.delete_selected(&mut self.timeline);
        }
        if left {
            self.timeline.step(-1);
        }
        if right {
            self.timeline.step(1);
        }
    }

    fn update_preview(&mut self, ctx: &Context) {
        if self.scheduler.image_version() == self.preview_version {
            return;
        }
        self.preview_version = self.scheduler.image_version();
        self.preview = self.scheduler.current_image().map(|image| {
            let color = eframe::egui::ColorImage::from_rgba_unmultiplied(
                [image.width as usize, image.height as usize],
                &image.data,
            );
            ctx.load_texture("preview", color, TextureOptions::LINEAR)
        });
    }
}

impl App for EditorApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        self.handle_keys(ctx);
        self.handle_dropped_files(ctx);

        TopBottomPanel::top("menu_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                let label = if self.timeline.is_playing() {
                    "Pause"
                } else {
                    "Play"
                };
                if ui.button(label).clicked() {
                    self.timeline.toggle_playing();
                }
                ui.monospace(format_timecode(
                    self.timeline.current_frame(),
                    self.timeline.fps(),
                ));
                ui.separator();
                if ui.button("+ Video Track").clicked() {
                    self.timeline.add_track(NewTracks::Video, None, true);
                }
                if ui.button("+ Audio Track").clicked() {
                    self.timeline.add_track(NewTracks::Audio, None, true);
                }
                if ui.button("- Video Track").clicked() {
                    let top = self.timeline.video_tracks().len().saturating_sub(1);
                    if let Some(id) = self.timeline.video_tracks().id_at(top) {
                        self.timeline.delete_track(TrackKind::Video, id);
                    }
                }
                if ui.button("- Audio Track").clicked() {
                    let top = self.timeline.audio_tracks().len().saturating_sub(1);
                    if let Some(id) = self.timeline.audio_tracks().id_at(top) {
                        self.timeline.delete_track(TrackKind::Audio, id);
                    }
                }
            });
        });

        SidePanel::left("media_pool")
            .resizable(true)
            .default_width(200.0)
            .show(ctx, |ui| {
                ui.heading("Media Pool");
                ui.label("Drop files to import");
                ui.separator();
                let mut clicked = None;
                for asset in &self.assets {
                    if ui.button(&asset.name).clicked() {
                        clicked = Some(asset.handle.clone());
                    }
                }
                if let Some(handle) = clicked {
                    let frame = self.timeline.current_frame();
                    self.place_at_default(&handle, frame);
                }
            });

        CentralPanel::default().show(ctx, |ui| {
            TopBottomPanel::bottom("timeline")
                .resizable(true)
                .default_height(260.0)
                .show_inside(ui, |ui| {
                    eframe::egui::ScrollArea::vertical().show(ui, |ui| {
                        self.view.ui(ui, &mut self.timeline, &mut self.controller);
                    });
                });

            // Program viewer fills whatever the timeline panel left.
            let avail = ui.available_size();
            match &self.preview {
                Some(texture) => {
                    let size = texture.size_vec2();
                    ui.centered_and_justified(|ui| {
                        ui.add(Image::new((texture.id(), size)).max_size(avail));
                    });
                }
                None => {
                    let (rect, _) =
                        ui.allocate_exact_size(avail, eframe::egui::Sense::hover());
                    ui.painter().rect_filled(rect, 0.0, Color32::BLACK);
                }
            }
        });

        self.scheduler.tick(&self.timeline, &mut self.audio_out);
        self.update_preview(ctx);

        if self.timeline.is_playing() {
            ctx.request_repaint();
        }
    }
}
