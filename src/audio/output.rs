//! cpal audio output fed from the playback scheduler.
//!
//! Decoded chunks travel through a crossbeam channel into the stream
//! callback. Every chunk carries the epoch it was queued under;
//! [`AudioOutput::flush`] bumps the epoch so chunks queued before a
//! segment switch are discarded at the callback instead of playing as
//! stale audio.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam::channel::{self, Receiver, Sender};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::media::source::AudioSpec;

/// Error type for audio output.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),
    #[error("build stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),
    #[error("play stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("pause stream: {0}")]
    Pause(#[from] cpal::PauseStreamError),
}

struct Chunk {
    epoch: u64,
    samples: Vec<f32>,
}

/// The default output device wrapped as a sample sink.
pub struct AudioOutput {
    stream: cpal::Stream,
    spec: AudioSpec,
    tx: Sender<Chunk>,
    epoch: Arc<AtomicU64>,
    queued: Arc<AtomicU64>,
    paused: bool,
}

impl AudioOutput {
    pub fn new() -> Result<Self, AudioError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or(AudioError::NoDevice)?;
        let config = device.default_output_config()?;
        let spec = AudioSpec {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        };
        let stream_config = cpal::StreamConfig::from(config);

        let (tx, rx) = channel::bounded::<Chunk>(256);
        let epoch = Arc::new(AtomicU64::new(0));
        let queued = Arc::new(AtomicU64::new(0));

        let stream = device.build_output_stream(
            &stream_config,
            callback(rx, Arc::clone(&epoch), Arc::clone(&queued)),
            |err| tracing::warn!(%err, "audio stream error"),
            None,
        )?;
        stream.pause()?;

        Ok(Self {
            stream,
            spec,
            tx,
            epoch,
            queued,
            paused: true,
        })
    }

    pub fn spec(&self) -> AudioSpec {
        self.spec
    }

    /// Queue interleaved samples behind whatever is already buffered.
    pub fn queue(&self, samples: Vec<f32>) {
        let count = samples.len() as u64;
        self.queued.fetch_add(count, Ordering::Relaxed);
        let chunk = Chunk {
            epoch: self.epoch.load(Ordering::Relaxed),
            samples,
        };
        if self.tx.try_send(chunk).is_err() {
            // Sink is saturated; the scheduler will retry next tick.
            let _ = self
                .queued
                .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |q| {
                    Some(q.saturating_sub(count))
                });
        }
    }

    /// Milliseconds of audio currently queued ahead of the device.
    pub fn queued_millis(&self) -> f64 {
        let samples = self.queued.load(Ordering::Relaxed) as f64;
        let per_second = (self.spec.sample_rate as u64 * self.spec.channels as u64) as f64;
        samples / per_second * 1000.0
    }

    /// Drop everything queued but not yet played.
    pub fn flush(&self) {
        self.epoch.fetch_add(1, Ordering::Relaxed);
        self.queued.store(0, Ordering::Relaxed);
    }

    pub fn pause(&mut self) -> Result<(), AudioError> {
        if !self.paused {
            self.stream.pause()?;
            self.paused = true;
        }
        Ok(())
    }

    pub fn resume(&mut self) -> Result<(), AudioError> {
        if self.paused {
            self.stream.play()?;
            self.paused = false;
        }
        Ok(())
    }
}

fn callback(
    rx: Receiver<Chunk>,
    epoch: Arc<AtomicU64>,
    queued: Arc<AtomicU64>,
) -> impl FnMut(&mut [f32], &cpal::OutputCallbackInfo) {
    let mut pending: VecDeque<f32> = VecDeque::new();
    let mut pending_epoch = 0u64;
    move |data: &mut [f32], _info| {
        let current = epoch.load(Ordering::Relaxed);
        if pending_epoch != current {
            pending.clear();
            pending_epoch = current;
        }
        while pending.len() < data.len() {
            match rx.try_recv() {
                Ok(chunk) => {
                    if chunk.epoch == current {
                        let _ = queued.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |q| {
                            Some(q.saturating_sub(chunk.samples.len() as u64))
                        });
                        pending.extend(chunk.samples);
                    }
                }
                Err(_) => break,
            }
        }
        for slot in data.iter_mut() {
            *slot = pending.pop_front().unwrap_or(0.0);
        }
    }
}
