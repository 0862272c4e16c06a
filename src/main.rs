//! Application entry point.
//!
//! Bootstraps logging, opens the audio device, and hands the editor app
//! to eframe. Window and audio device creation are the only fatal
//! failures; everything later degrades per tick instead of aborting.

use eframe::egui;
use tracing_subscriber::EnvFilter;

use splice::audio::AudioOutput;
use splice::ui::EditorApp;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let audio_out = AudioOutput::new()?;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Splice")
            .with_inner_size([1280.0, 720.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Splice",
        native_options,
        Box::new(move |cc| Box::new(EditorApp::new(cc, audio_out))),
    )?;
    Ok(())
}
