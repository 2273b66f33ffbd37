//! Second-order IIR filter

use dasp_graph::{Buffer, Input};
use serde::{Deserialize, Serialize};

use crate::node::{AudioNode, ProcessContext};
use crate::nodes::mix_inputs;

/// Filter response shapes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterType {
    #[default]
    Lowpass,
    Highpass,
    Bandpass,
    Lowshelf,
    Highshelf,
    Peaking,
    Notch,
    Allpass,
}

/// Messages to control a Biquad
#[derive(Clone, Copy, Debug)]
pub enum BiquadMessage {
    SetType(FilterType),
    /// Cutoff or center frequency in Hz
    SetFrequency(f32),
    SetQ(f32),
    /// Gain in dB, used by the shelf and peaking shapes
    SetGain(f32),
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    const PASS: Self = Self { b0: 1.0, b1: 0.0, b2: 0.0, a1: 0.0, a2: 0.0 };

    /// RBJ audio-EQ cookbook coefficients.
    ///
    /// Lowpass and highpass take Q in dB, the other shapes take a linear Q.
    fn design(kind: FilterType, frequency: f32, q: f32, gain_db: f32, sample_rate: u32) -> Self {
        let nyquist = sample_rate as f32 * 0.5;
        if !(frequency > 0.0) || sample_rate == 0 {
            return Self::PASS;
        }
        let f = frequency.min(nyquist * 0.999);

        let w0 = core::f32::consts::TAU * f / sample_rate as f32;
        let (sin, cos) = w0.sin_cos();
        let a = 10f32.powf(gain_db / 40.0);
        let linear_q = q.max(1e-4);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterType::Lowpass => {
                let alpha = sin / (2.0 * 10f32.powf(q / 20.0));
                ((1.0 - cos) / 2.0, 1.0 - cos, (1.0 - cos) / 2.0, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
            }
            FilterType::Highpass => {
                let alpha = sin / (2.0 * 10f32.powf(q / 20.0));
                ((1.0 + cos) / 2.0, -(1.0 + cos), (1.0 + cos) / 2.0, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
            }
            FilterType::Bandpass => {
                let alpha = sin / (2.0 * linear_q);
                (alpha, 0.0, -alpha, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
            }
            FilterType::Notch => {
                let alpha = sin / (2.0 * linear_q);
                (1.0, -2.0 * cos, 1.0, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
            }
            FilterType::Allpass => {
                let alpha = sin / (2.0 * linear_q);
                (1.0 - alpha, -2.0 * cos, 1.0 + alpha, 1.0 + alpha, -2.0 * cos, 1.0 - alpha)
            }
            FilterType::Peaking => {
                let alpha = sin / (2.0 * linear_q);
                (1.0 + alpha * a, -2.0 * cos, 1.0 - alpha * a, 1.0 + alpha / a, -2.0 * cos, 1.0 - alpha / a)
            }
            FilterType::Lowshelf => {
                // shelf slope fixed at 1
                let k = 2.0 * a.sqrt() * (sin / 2.0 * core::f32::consts::SQRT_2);
                (
                    a * ((a + 1.0) - (a - 1.0) * cos + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
                    a * ((a + 1.0) - (a - 1.0) * cos - k),
                    (a + 1.0) + (a - 1.0) * cos + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos),
                    (a + 1.0) + (a - 1.0) * cos - k,
                )
            }
            FilterType::Highshelf => {
                let k = 2.0 * a.sqrt() * (sin / 2.0 * core::f32::consts::SQRT_2);
                (
                    a * ((a + 1.0) + (a - 1.0) * cos + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
                    a * ((a + 1.0) + (a - 1.0) * cos - k),
                    (a + 1.0) - (a - 1.0) * cos + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos),
                    (a + 1.0) - (a - 1.0) * cos - k,
                )
            }
        };

        Self { b0: b0 / a0, b1: b1 / a0, b2: b2 / a0, a1: a1 / a0, a2: a2 / a0 }
    }
}

/// A mono biquad filter (direct form I)
pub struct Biquad {
    kind: FilterType,
    frequency: f32,
    q: f32,
    gain: f32,
    coeffs: Coefficients,
    /// Sample rate the coefficients were designed for
    designed_for: u32,
    dirty: bool,
    x: [f32; 2],
    y: [f32; 2],
    mix: Buffer,
}

impl Biquad {
    pub fn new(kind: FilterType, frequency: f32, q: f32, gain: f32) -> Self {
        Self {
            kind,
            frequency,
            q,
            gain,
            coeffs: Coefficients::PASS,
            designed_for: 0,
            dirty: true,
            x: [0.0; 2],
            y: [0.0; 2],
            mix: Buffer::default(),
        }
    }

    #[inline]
    pub fn kind(&self) -> FilterType {
        self.kind
    }

    /// The applied cutoff in Hz, as last set.
    #[inline]
    pub fn frequency(&self) -> f32 {
        self.frequency
    }

    #[inline]
    pub fn q(&self) -> f32 {
        self.q
    }

    #[inline]
    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl AudioNode for Biquad {
    type Message = BiquadMessage;

    fn apply(&mut self, msg: BiquadMessage) {
        match msg {
            BiquadMessage::SetType(k) => self.kind = k,
            BiquadMessage::SetFrequency(f) => self.frequency = f,
            BiquadMessage::SetQ(q) => self.q = q,
            BiquadMessage::SetGain(g) => self.gain = g,
        }
        self.dirty = true;
    }

    fn process(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]) {
        if self.dirty || self.designed_for != ctx.sample_rate {
            self.coeffs = Coefficients::design(self.kind, self.frequency, self.q, self.gain, ctx.sample_rate);
            self.designed_for = ctx.sample_rate;
            self.dirty = false;
        }

        let Some((first, rest)) = outputs.split_first_mut() else {
            return;
        };

        mix_inputs(inputs, &mut self.mix);

        let Coefficients { b0, b1, b2, a1, a2 } = self.coeffs;
        let [mut x1, mut x2] = self.x;
        let [mut y1, mut y2] = self.y;

        for (out, &x0) in first.iter_mut().zip(self.mix.iter()) {
            let y0 = b0 * x0 + b1 * x1 + b2 * x2 - a1 * y1 - a2 * y2;
            x2 = x1;
            x1 = x0;
            y2 = y1;
            y1 = y0;
            *out = y0;
        }

        self.x = [x1, x2];
        self.y = [y1, y2];

        for buffer in rest.iter_mut() {
            buffer.copy_from_slice(first);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Magnitude response at `f` for the given coefficients.
    fn magnitude(c: Coefficients, f: f32, sample_rate: u32) -> f32 {
        let w = core::f32::consts::TAU * f / sample_rate as f32;
        let (s1, c1) = w.sin_cos();
        let (s2, c2) = (2.0 * w).sin_cos();
        let num_re = c.b0 + c.b1 * c1 + c.b2 * c2;
        let num_im = -(c.b1 * s1 + c.b2 * s2);
        let den_re = 1.0 + c.a1 * c1 + c.a2 * c2;
        let den_im = -(c.a1 * s1 + c.a2 * s2);
        ((num_re * num_re + num_im * num_im) / (den_re * den_re + den_im * den_im)).sqrt()
    }

    #[test]
    fn lowpass_passes_lows_and_cuts_highs() {
        let c = Coefficients::design(FilterType::Lowpass, 1_000.0, 0.0, 0.0, 48_000);
        assert!((magnitude(c, 50.0, 48_000) - 1.0).abs() < 0.01);
        assert!(magnitude(c, 15_000.0, 48_000) < 0.01);
    }

    #[test]
    fn highpass_cuts_lows() {
        let c = Coefficients::design(FilterType::Highpass, 2_000.0, 0.0, 0.0, 48_000);
        assert!(magnitude(c, 50.0, 48_000) < 0.01);
    }

    #[test]
    fn zero_linear_q_stays_finite() {
        let c = Coefficients::design(FilterType::Bandpass, 1_000.0, 0.0, 0.0, 48_000);
        assert!(c.b0.is_finite() && c.a1.is_finite() && c.a2.is_finite());
    }

    #[test]
    fn cutoff_above_nyquist_is_clamped_for_design_only() {
        let mut filter = Biquad::new(FilterType::Lowpass, 30_000.0, 0.0, 0.0);
        let ctx = ProcessContext { sample_rate: 44_100, buffer_size: 64 };
        let mut out = [Buffer::default()];
        filter.process(&ctx, &[], &mut out);
        assert_eq!(filter.frequency(), 30_000.0);
        assert!(out[0].iter().all(|s| s.is_finite()));
    }
}
