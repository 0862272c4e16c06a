//! The decoding capability the editor core consumes.
//!
//! The core never touches demuxers or codecs directly; it sees an opened
//! asset only through [`MediaSource`], shared between the asset list and
//! every segment cut from it via [`SourceHandle`].

use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::path::PathBuf;
use std::rc::Rc;

use thiserror::Error;

/// Error type for media operations.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("ffmpeg: {0}")]
    Backend(String),
    #[error("file not found: {0}")]
    FileNotFound(PathBuf),
    #[error("no decodable stream in {0}")]
    NoStreams(PathBuf),
    #[error("no video stream")]
    NoVideoStream,
    #[error("no audio stream")]
    NoAudioStream,
    #[error("seek failed: {0}")]
    Seek(String),
}

/// One decoded RGBA8 image.
#[derive(Clone)]
pub struct FrameImage {
    pub data: Vec<u8>, // Raw pixel data (RGBA8)
    pub width: u32,
    pub height: u32,
}

impl fmt::Debug for FrameImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

/// A decoded video frame tagged with its source-native frame index.
#[derive(Debug)]
pub struct DecodedFrame {
    pub image: FrameImage,
    pub native_index: u64,
}

/// Fixed output format decoded audio is resampled to (the device format,
/// chosen once at open time).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioSpec {
    pub sample_rate: u32,
    pub channels: u16,
}

/// What an opened asset contains.
#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub has_video: bool,
    pub has_audio: bool,
    /// Native video frame count (0 for audio-only assets).
    pub video_frames: u64,
    /// Native video frame rate (0.0 for audio-only assets).
    pub video_fps: f64,
    /// Whole-asset duration in seconds (longest stream).
    pub duration_secs: f64,
}

/// An opened media asset: stream info, random-access frames, and forward
/// step-decoding with explicit seek points.
///
/// Seeks flush decoder-internal buffers; skipping that would bleed stale
/// frames across a seek boundary.
pub trait MediaSource {
    fn info(&self) -> &MediaInfo;

    /// Total length in frames when played at `target_fps`.
    fn duration_in_frames(&self, target_fps: f64) -> u64 {
        (self.info().duration_secs * target_fps).round() as u64
    }

    /// Random-access decode of a single frame (thumbnails, scrubbing).
    fn frame_at(&mut self, native_frame: u64) -> Result<FrameImage, MediaError>;

    /// Position the video decoder at (or just before) a native frame.
    fn seek_video(&mut self, native_frame: u64) -> Result<(), MediaError>;

    /// Position the audio decoder at an offset in seconds.
    fn seek_audio(&mut self, seconds: f64) -> Result<(), MediaError>;

    /// Decode the next video frame; `None` at end of stream.
    fn decode_next_video(&mut self) -> Result<Option<DecodedFrame>, MediaError>;

    /// Decode the next audio chunk as interleaved f32 in the output
    /// [`AudioSpec`]; `None` at end of stream.
    fn decode_next_audio(&mut self) -> Result<Option<Vec<f32>>, MediaError>;
}

/// Shared handle to an opened asset. Many segments may reference the
/// same import; the decoder state lives for as long as any of them (or
/// the asset list) does.
#[derive(Clone)]
pub struct SourceHandle(Rc<RefCell<dyn MediaSource>>);

impl SourceHandle {
    pub fn new(source: impl MediaSource + 'static) -> Self {
        Self(Rc::new(RefCell::new(source)))
    }

    pub fn borrow(&self) -> Ref<'_, dyn MediaSource> {
        self.0.borrow()
    }

    pub fn borrow_mut(&self) -> RefMut<'_, dyn MediaSource> {
        self.0.borrow_mut()
    }
}

impl fmt::Debug for SourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SourceHandle({})", self.borrow().info().path.display())
    }
}

#[cfg(test)]
pub(crate) mod stub {
    use super::*;

    /// In-memory stand-in for an opened asset.
    pub struct StubSource {
        info: MediaInfo,
    }

    impl StubSource {
        pub fn handle(
            has_video: bool,
            has_audio: bool,
            video_frames: u64,
            video_fps: f64,
            duration_secs: f64,
        ) -> SourceHandle {
            SourceHandle::new(Self {
                info: MediaInfo {
                    path: PathBuf::from("stub.mp4"),
                    has_video,
                    has_audio,
                    video_frames,
                    video_fps,
                    duration_secs,
                },
            })
        }
    }

    impl MediaSource for StubSource {
        fn info(&self) -> &MediaInfo {
            &self.info
        }

        fn frame_at(&mut self, _native_frame: u64) -> Result<FrameImage, MediaError> {
            Ok(FrameImage {
                data: vec![0x20; 4],
                width: 1,
                height: 1,
            })
        }

        fn seek_video(&mut self, _native_frame: u64) -> Result<(), MediaError> {
            Ok(())
        }

        fn seek_audio(&mut self, _seconds: f64) -> Result<(), MediaError> {
            Ok(())
        }

        fn decode_next_video(&mut self) -> Result<Option<DecodedFrame>, MediaError> {
            Ok(None)
        }

        fn decode_next_audio(&mut self) -> Result<Option<Vec<f32>>, MediaError> {
            Ok(None)
        }
    }
}
