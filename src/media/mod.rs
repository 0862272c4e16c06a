pub mod ffmpeg;
pub mod source;

pub use ffmpeg::FfmpegSource;
pub use source::{AudioSpec, DecodedFrame, FrameImage, MediaError, MediaInfo, MediaSource, SourceHandle};
