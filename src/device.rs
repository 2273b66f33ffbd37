//! CPAL device discovery and output streams.
//!
//! A [`CpalDevice`] plays whatever the session renders: hand it the consumer
//! from [`Session::take_output`](crate::Session::take_output) and keep the
//! returned [`OutputStream`] alive.
//!
//! ```no_run
//! use handpatch::{Config, CpalDevice, Session};
//!
//! let device = CpalDevice::default_output().unwrap();
//! let config = Config::default()
//!     .with_sample_rate(device.sample_rate())
//!     .with_channels(device.channels() as usize);
//! let mut session = Session::new(config);
//! let _stream = device.play(session.take_output().unwrap()).unwrap();
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SupportedStreamConfig};
use rtrb::Consumer;
use tracing::{debug, warn};

use crate::error::DeviceError;

/// A discovered audio output device.
pub struct CpalDevice {
    device: cpal::Device,
    config: SupportedStreamConfig,
    name: String,
}

impl CpalDevice {
    /// The system's default output device, if any.
    pub fn default_output() -> Option<Self> {
        let host = cpal::default_host();
        Self::from_device(host.default_output_device()?)
    }

    /// Every output device that reports a default config.
    pub fn list_outputs() -> Vec<Self> {
        let host = cpal::default_host();
        host.output_devices()
            .map(|devices| devices.filter_map(Self::from_device).collect())
            .unwrap_or_default()
    }

    fn from_device(device: cpal::Device) -> Option<Self> {
        let config = device.default_output_config().ok()?;
        let name = device.name().unwrap_or_else(|_| "Unknown".into());
        Some(Self { device, config, name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate().0
    }

    pub fn channels(&self) -> u16 {
        self.config.channels()
    }

    /// Start a stream that drains interleaved samples from `consumer`.
    ///
    /// The consumer must carry the device's channel count. Missing samples
    /// play as silence and raise the underrun flag.
    pub fn play(&self, consumer: Consumer<f32>) -> Result<OutputStream, DeviceError> {
        let stats = Arc::new(StreamStats::default());
        let stream = build_stream(&self.device, &self.config, consumer, stats.clone())?;
        stream.play()?;
        debug!(device = %self.name, rate = self.sample_rate(), channels = self.channels(), "output stream started");
        Ok(OutputStream { stream, stats })
    }
}

#[derive(Default)]
struct StreamStats {
    samples_consumed: AtomicUsize,
    missed_samples: AtomicUsize,
    had_underrun: AtomicBool,
}

/// A running output stream. Audio stops when it is dropped.
pub struct OutputStream {
    stream: cpal::Stream,
    stats: Arc<StreamStats>,
}

impl OutputStream {
    /// Rendered samples the device has played so far.
    pub fn samples_consumed(&self) -> usize {
        self.stats.samples_consumed.load(Ordering::Relaxed)
    }

    /// Samples played as silence because nothing was rendered in time.
    pub fn missed_samples(&self) -> usize {
        self.stats.missed_samples.load(Ordering::Relaxed)
    }

    /// Check and clear the underrun flag.
    pub fn check_underrun(&self) -> bool {
        self.stats.had_underrun.swap(false, Ordering::Relaxed)
    }

    pub fn pause(&self) -> Result<(), DeviceError> {
        Ok(self.stream.pause()?)
    }

    pub fn resume(&self) -> Result<(), DeviceError> {
        Ok(self.stream.play()?)
    }
}

fn fill<T>(data: &mut [T], consumer: &mut Consumer<f32>, stats: &StreamStats, convert: impl Fn(f32) -> T) {
    let available = consumer.slots().min(data.len());
    let (ready, missing) = data.split_at_mut(available);
    for (out, s) in ready.iter_mut().zip(core::iter::from_fn(|| consumer.pop().ok())) {
        *out = convert(s);
    }
    missing.iter_mut().for_each(|out| *out = convert(0.0));

    if !missing.is_empty() {
        stats.missed_samples.fetch_add(missing.len(), Ordering::Relaxed);
        stats.had_underrun.store(true, Ordering::Relaxed);
    }
    stats.samples_consumed.fetch_add(available, Ordering::Relaxed);
}

fn build_stream(
    device: &cpal::Device,
    config: &SupportedStreamConfig,
    mut consumer: Consumer<f32>,
    stats: Arc<StreamStats>,
) -> Result<cpal::Stream, DeviceError> {
    let stream_config = config.config();
    let on_error = |err: cpal::StreamError| warn!(?err, "output stream error");

    let stream = match config.sample_format() {
        SampleFormat::F32 => device.build_output_stream(
            &stream_config,
            move |data: &mut [f32], _| fill(data, &mut consumer, &stats, |s| s),
            on_error,
            None,
        )?,
        SampleFormat::I16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [i16], _| fill(data, &mut consumer, &stats, |s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16),
            on_error,
            None,
        )?,
        SampleFormat::U16 => device.build_output_stream(
            &stream_config,
            move |data: &mut [u16], _| {
                fill(data, &mut consumer, &stats, |s| ((s.clamp(-1.0, 1.0) + 1.0) * 0.5 * u16::MAX as f32) as u16)
            },
            on_error,
            None,
        )?,
        other => return Err(DeviceError::UnsupportedFormat(other)),
    };
    Ok(stream)
}
