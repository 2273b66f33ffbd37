//! Level stage with a one-pole ramp toward the requested level

use dasp_graph::{Buffer, Input};

use crate::node::{AudioNode, ProcessContext};
use crate::nodes::mix_inputs;

#[derive(Clone, Copy, Debug)]
pub enum GainMessage {
    /// Linear level, 1.0 is unity
    SetGain(f32),
}

/// Sums its inputs and scales them by a ramped level.
pub struct Gain {
    target: f32,
    current: f32,
    /// Per-sample pole; 0 jumps straight to the target
    pole: f32,
    mix: Buffer,
}

impl Gain {
    /// A stage that jumps to new levels immediately.
    pub fn new(level: f32) -> Self {
        Self {
            target: level,
            current: level,
            pole: 0.0,
            mix: Buffer::default(),
        }
    }

    /// Ramp toward new levels, covering ~63% of a step in `ms`.
    pub fn with_ramp_ms(mut self, ms: f32, sample_rate: u32) -> Self {
        let samples = ms * 0.001 * sample_rate as f32;
        self.pole = if samples > 0.0 { (-samples.recip()).exp() } else { 0.0 };
        self
    }

    /// The requested level.
    #[inline]
    pub fn gain(&self) -> f32 {
        self.target
    }

    /// The level the last sample was scaled by.
    #[inline]
    pub fn current(&self) -> f32 {
        self.current
    }
}

impl AudioNode for Gain {
    type Message = GainMessage;

    fn apply(&mut self, msg: GainMessage) {
        let GainMessage::SetGain(level) = msg;
        self.target = level;
    }

    fn process(&mut self, _ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]) {
        let Some((first, rest)) = outputs.split_first_mut() else {
            return;
        };
        mix_inputs(inputs, &mut self.mix);

        let (target, pole) = (self.target, self.pole);
        let mut level = self.current;
        for (out, x) in first.iter_mut().zip(self.mix.iter()) {
            level = target + pole * (level - target);
            *out = x * level;
        }
        self.current = level;

        for buffer in rest {
            buffer.copy_from_slice(first);
        }
    }
}
