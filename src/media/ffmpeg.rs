//! FFmpeg-backed media sources.
//!
//! All FFmpeg interaction is isolated in this module. Video decodes to
//! RGBA8, audio to interleaved PCM f32 resampled to the output device
//! format chosen at open time.

use std::path::Path;

use ffmpeg_next as ffmpeg;

use ffmpeg::format::context::Input;
use ffmpeg::format::{input, Pixel, Sample};
use ffmpeg::media::Type;
use ffmpeg::software::resampling;
use ffmpeg::software::scaling;
use ffmpeg::util::frame;
use ffmpeg::ChannelLayout;

use crate::media::source::{
    AudioSpec, DecodedFrame, FrameImage, MediaError, MediaInfo, MediaSource, SourceHandle,
};

/// Decode attempts bounded per random-access frame lookup.
const MAX_SCAN_FRAMES: u32 = 256;

struct VideoStream {
    index: usize,
    decoder: ffmpeg::decoder::Video,
    scaler: scaling::Context,
    time_base: ffmpeg::Rational,
    fps: f64,
}

struct AudioStream {
    index: usize,
    decoder: ffmpeg::decoder::Audio,
    resampler: resampling::Context,
    channels: u16,
}

/// An opened media file backed by FFmpeg demux/decode state.
pub struct FfmpegSource {
    ictx: Input,
    info: MediaInfo,
    video: Option<VideoStream>,
    audio: Option<AudioStream>,
}

impl FfmpegSource {
    /// Open a file and prepare decoders for its best video and audio
    /// streams. Audio output is fixed to `spec` for the life of the
    /// source.
    pub fn open(path: &Path, spec: AudioSpec) -> Result<SourceHandle, MediaError> {
        let source = Self::open_inner(path, spec)?;
        Ok(SourceHandle::new(source))
    }

    fn open_inner(path: &Path, spec: AudioSpec) -> Result<Self, MediaError> {
        if !path.exists() {
            return Err(MediaError::FileNotFound(path.to_path_buf()));
        }
        ffmpeg::init().map_err(|e| MediaError::Backend(e.to_string()))?;

        let ictx = input(&path).map_err(|e| MediaError::Backend(e.to_string()))?;
        let container_secs = if ictx.duration() > 0 {
            ictx.duration() as f64 / f64::from(ffmpeg::ffi::AV_TIME_BASE)
        } else {
            0.0
        };

        let video = match ictx.streams().best(Type::Video) {
            Some(stream) => {
                let index = stream.index();
                let time_base = stream.time_base();
                let rate = stream.avg_frame_rate();
                let fps = if rate.denominator() != 0 {
                    f64::from(rate)
                } else {
                    30.0
                };
                let stream_frames = stream.frames().max(0) as u64;

                let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                    .map_err(|e| MediaError::Backend(e.to_string()))?;
                let decoder = context
                    .decoder()
                    .video()
                    .map_err(|e| MediaError::Backend(e.to_string()))?;
                let scaler = scaling::Context::get(
                    decoder.format(),
                    decoder.width(),
                    decoder.height(),
                    Pixel::RGBA,
                    decoder.width(),
                    decoder.height(),
                    scaling::Flags::BILINEAR,
                )
                .map_err(|e| MediaError::Backend(e.to_string()))?;

                Some((
                    VideoStream {
                        index,
                        decoder,
                        scaler,
                        time_base,
                        fps,
                    },
                    stream_frames,
                ))
            }
            None => None,
        };

        let audio = match ictx.streams().best(Type::Audio) {
            Some(stream) => {
                let index = stream.index();
                let context = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
                    .map_err(|e| MediaError::Backend(e.to_string()))?;
                let mut decoder = context
                    .decoder()
                    .audio()
                    .map_err(|e| MediaError::Backend(e.to_string()))?;
                if decoder.channel_layout() == ChannelLayout::empty() {
                    decoder.set_channel_layout(ChannelLayout::default(decoder.channels() as i32));
                }
                let resampler = resampling::Context::get(
                    decoder.format(),
                    decoder.channel_layout(),
                    decoder.rate(),
                    Sample::F32(ffmpeg::format::sample::Type::Packed),
                    ChannelLayout::default(spec.channels as i32),
                    spec.sample_rate,
                )
                .map_err(|e| MediaError::Backend(e.to_string()))?;

                Some(AudioStream {
                    index,
                    decoder,
                    resampler,
                    channels: spec.channels,
                })
            }
            None => None,
        };

        if video.is_none() && audio.is_none() {
            return Err(MediaError::NoStreams(path.to_path_buf()));
        }

        let (video, stream_frames) = match video {
            Some((v, frames)) => (Some(v), frames),
            None => (None, 0),
        };
        let video_fps = video.as_ref().map(|v| v.fps).unwrap_or(0.0);
        let video_frames = if stream_frames > 0 {
            stream_frames
        } else {
            (container_secs * video_fps).round() as u64
        };

        let info = MediaInfo {
            path: path.to_path_buf(),
            has_video: video.is_some(),
            has_audio: audio.is_some(),
            video_frames,
            video_fps,
            duration_secs: container_secs,
        };

        Ok(Self {
            ictx,
            info,
            video,
            audio,
        })
    }

    /// Seek the container to `seconds` and flush both decoders.
    fn seek_seconds(&mut self, seconds: f64) -> Result<(), MediaError> {
        let position = (seconds * f64::from(ffmpeg::ffi::AV_TIME_BASE)) as i64;
        self.ictx
            .seek(position, ..position)
            .map_err(|e| MediaError::Seek(e.to_string()))?;
        // Stale codec state must not bleed across the seek boundary.
        if let Some(video) = &mut self.video {
            video.decoder.flush();
        }
        if let Some(audio) = &mut self.audio {
            audio.decoder.flush();
        }
        Ok(())
    }
}

impl MediaSource for FfmpegSource {
    fn info(&self) -> &MediaInfo {
        &self.info
    }

    fn frame_at(&mut self, native_frame: u64) -> Result<FrameImage, MediaError> {
        self.seek_video(native_frame)?;
        let mut last = None;
        for _ in 0..MAX_SCAN_FRAMES {
            match self.decode_next_video()? {
                Some(frame) => {
                    let reached = frame.native_index >= native_frame;
                    last = Some(frame.image);
                    if reached {
                        break;
                    }
                }
                None => break,
            }
        }
        last.ok_or(MediaError::NoVideoStream)
    }

    fn seek_video(&mut self, native_frame: u64) -> Result<(), MediaError> {
        let fps = match &self.video {
            Some(v) => v.fps,
            None => return Err(MediaError::NoVideoStream),
        };
        self.seek_seconds(native_frame as f64 / fps.max(1.0))
    }

    fn seek_audio(&mut self, seconds: f64) -> Result<(), MediaError> {
        if self.audio.is_none() {
            return Err(MediaError::NoAudioStream);
        }
        self.seek_seconds(seconds)
    }

    fn decode_next_video(&mut self) -> Result<Option<DecodedFrame>, MediaError> {
        let video = self.video.as_mut().ok_or(MediaError::NoVideoStream)?;
        let mut decoded = frame::Video::empty();
        loop {
            if video.decoder.receive_frame(&mut decoded).is_ok() {
                let image = scale_to_rgba(&mut video.scaler, &decoded)
                    .map_err(|e| MediaError::Backend(e.to_string()))?;
                let native_index = pts_to_index(&decoded, video.time_base, video.fps);
                return Ok(Some(DecodedFrame {
                    image,
                    native_index,
                }));
            }
            match next_packet(&mut self.ictx, video.index) {
                Some(packet) => {
                    video
                        .decoder
                        .send_packet(&packet)
                        .map_err(|e| MediaError::Backend(e.to_string()))?;
                }
                None => {
                    // Drain whatever the decoder still holds, then eof.
                    let _ = video.decoder.send_eof();
                    if video.decoder.receive_frame(&mut decoded).is_ok() {
                        let image = scale_to_rgba(&mut video.scaler, &decoded)
                            .map_err(|e| MediaError::Backend(e.to_string()))?;
                        let native_index = pts_to_index(&decoded, video.time_base, video.fps);
                        return Ok(Some(DecodedFrame {
                            image,
                            native_index,
                        }));
                    }
                    return Ok(None);
                }
            }
        }
    }

    fn decode_next_audio(&mut self) -> Result<Option<Vec<f32>>, MediaError> {
        let audio = self.audio.as_mut().ok_or(MediaError::NoAudioStream)?;
        let mut decoded = frame::Audio::empty();
        loop {
            if audio.decoder.receive_frame(&mut decoded).is_ok() {
                let mut resampled = frame::Audio::empty();
                audio
                    .resampler
                    .run(&decoded, &mut resampled)
                    .map_err(|e| MediaError::Backend(e.to_string()))?;
                return Ok(Some(interleaved_f32(&resampled, audio.channels)));
            }
            match next_packet(&mut self.ictx, audio.index) {
                Some(packet) => {
                    audio
                        .decoder
                        .send_packet(&packet)
                        .map_err(|e| MediaError::Backend(e.to_string()))?;
                }
                None => {
                    let _ = audio.decoder.send_eof();
                    if audio.decoder.receive_frame(&mut decoded).is_ok() {
                        let mut resampled = frame::Audio::empty();
                        audio
                            .resampler
                            .run(&decoded, &mut resampled)
                            .map_err(|e| MediaError::Backend(e.to_string()))?;
                        return Ok(Some(interleaved_f32(&resampled, audio.channels)));
                    }
                    return Ok(None);
                }
            }
        }
    }
}

/// Next demuxed packet belonging to `stream_index`; `None` at eof.
fn next_packet(ictx: &mut Input, stream_index: usize) -> Option<ffmpeg::Packet> {
    loop {
        match ictx.packets().next() {
            Some((stream, packet)) if stream.index() == stream_index => return Some(packet),
            Some(_) => continue,
            None => return None,
        }
    }
}

/// Convert a decoded frame to a tightly packed RGBA8 image.
fn scale_to_rgba(
    scaler: &mut scaling::Context,
    decoded: &frame::Video,
) -> Result<FrameImage, ffmpeg::Error> {
    let mut rgba = frame::Video::empty();
    scaler.run(decoded, &mut rgba)?;

    let width = rgba.width();
    let height = rgba.height();
    let stride = rgba.stride(0);
    let row_bytes = width as usize * 4;
    let plane = rgba.data(0);

    let mut data = Vec::with_capacity(row_bytes * height as usize);
    for row in 0..height as usize {
        let start = row * stride;
        data.extend_from_slice(&plane[start..start + row_bytes]);
    }
    Ok(FrameImage {
        data,
        width,
        height,
    })
}

/// Map a frame's pts (in its stream time base) to a native frame index.
fn pts_to_index(decoded: &frame::Video, time_base: ffmpeg::Rational, fps: f64) -> u64 {
    let pts = decoded.pts().unwrap_or(0).max(0);
    let seconds = pts as f64 * f64::from(time_base);
    (seconds * fps).round() as u64
}

/// Pull interleaved f32 samples out of a packed resampler output frame.
fn interleaved_f32(resampled: &frame::Audio, channels: u16) -> Vec<f32> {
    let total = resampled.samples() * channels as usize;
    let bytes = &resampled.data(0)[..total * 4];
    let mut out = Vec::with_capacity(total);
    for chunk in bytes.chunks_exact(4) {
        out.push(f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
    }
    out
}
