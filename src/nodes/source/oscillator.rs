//! Periodic waveform oscillator

use dasp_graph::{Buffer, Input};
use serde::{Deserialize, Serialize};

use crate::node::{AudioNode, ProcessContext};

/// Oscillator waveform shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    /// One sample of the waveform at `phase` in `[0, 1)`.
    #[inline]
    fn sample(self, phase: f32) -> f32 {
        match self {
            Waveform::Sine => (phase * core::f32::consts::TAU).sin(),
            Waveform::Square => if phase < 0.5 { 1.0 } else { -1.0 },
            Waveform::Sawtooth => 2.0 * phase - 1.0,
            Waveform::Triangle => 1.0 - 4.0 * (phase - 0.5).abs(),
        }
    }
}

/// Messages to control an Oscillator
#[derive(Clone, Copy, Debug)]
pub enum OscillatorMessage {
    SetFrequency(f32),
    SetWaveform(Waveform),
}

/// Lifecycle of an oscillator.
///
/// An oscillator can be started once and stopped once. A stopped oscillator
/// never plays again; the owner has to allocate a fresh one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Playback {
    Idle,
    Playing,
    Stopped,
}

/// A mono oscillator source
pub struct Oscillator {
    waveform: Waveform,
    frequency: f32,
    phase: f32,
    amplitude: f32,
    playback: Playback,
}

impl Oscillator {
    pub fn new(waveform: Waveform, frequency: f32) -> Self {
        Self {
            waveform,
            frequency: frequency.max(0.0),
            phase: 0.0,
            amplitude: 0.25, // -12dB, safe default
            playback: Playback::Idle,
        }
    }

    pub fn with_amplitude(mut self, amplitude: f32) -> Self {
        self.amplitude = amplitude.clamp(0.0, 1.0);
        self
    }

    /// Begin playing. Returns `false` if the oscillator was already started or stopped.
    pub fn start(&mut self) -> bool {
        if self.playback == Playback::Idle {
            self.playback = Playback::Playing;
            true
        } else {
            false
        }
    }

    /// Stop playing for good. Returns `false` if the oscillator was not playing.
    pub fn stop(&mut self) -> bool {
        if self.playback == Playback::Playing {
            self.playback = Playback::Stopped;
            true
        } else {
            false
        }
    }

    #[inline]
    pub fn playback(&self) -> Playback {
        self.playback
    }

    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    #[inline]
    pub fn waveform(&self) -> Waveform {
        self.waveform
    }
}

impl AudioNode for Oscillator {
    type Message = OscillatorMessage;

    fn apply(&mut self, msg: OscillatorMessage) {
        match msg {
            OscillatorMessage::SetFrequency(f) => self.frequency = f.max(0.0),
            OscillatorMessage::SetWaveform(w) => self.waveform = w,
        }
    }

    fn process(&mut self, ctx: &ProcessContext, _inputs: &[Input], outputs: &mut [Buffer]) {
        let Some((first, rest)) = outputs.split_first_mut() else {
            return;
        };

        if self.playback != Playback::Playing {
            first.iter_mut().for_each(|s| *s = 0.0);
        } else {
            let phase_inc = self.frequency / ctx.sample_rate as f32;
            let amplitude = self.amplitude;

            for sample in first.iter_mut() {
                *sample = self.waveform.sample(self.phase) * amplitude;
                self.phase += phase_inc;
                self.phase -= self.phase.floor();
            }
        }

        // Copy to remaining output channels (if any)
        for buffer in rest.iter_mut() {
            buffer.copy_from_slice(first);
        }
    }
}
