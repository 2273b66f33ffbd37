//! Built-in physical primitives.
//!
//! Primitives are organized into three categories:
//!
//! ## Sources ([`source`])
//!
//! Generate audio with no audio inputs:
//! - [`Oscillator`] - Periodic waveform generator that can be started once and stopped once
//!
//! ## Effects ([`effect`])
//!
//! Process audio (inputs → outputs):
//! - [`Biquad`] - Second-order IIR filter with the usual eight response shapes
//! - [`Gain`] - Level stage that ramps between levels
//!
//! ## Sinks ([`sink`])
//!
//! Consume audio with no audio outputs:
//! - [`Destination`] - Terminal of every context, writes to a ring buffer
//!
//! # Message Types
//!
//! - [`OscillatorMessage`] - Control [`Oscillator`] frequency and waveform
//! - [`BiquadMessage`] - Control [`Biquad`] kind, cutoff, Q and gain
//! - [`GainMessage`] - Control the [`Gain`] target level
//!
//! Every primitive sums all of its inputs, the way a Web Audio style graph mixes
//! fan-in connections.

pub mod source;
pub mod effect;
pub mod sink;

use dasp_graph::{Buffer, Input, Node};

use crate::node::{AudioNode, ProcessContext};

pub use source::{Oscillator, OscillatorMessage, Playback, Waveform};
pub use effect::{Biquad, BiquadMessage, FilterType, Gain, GainMessage};
pub use sink::Destination;

/// Sum every channel of every input into `out`.
pub(crate) fn mix_inputs(inputs: &[Input], out: &mut Buffer) {
    out.iter_mut().for_each(|s| *s = 0.0);
    for input in inputs {
        for in_buf in input.buffers() {
            for (o, i) in out.iter_mut().zip(in_buf.iter()) {
                *o += *i;
            }
        }
    }
}

/// A primitive together with the queue its handle sends messages into.
pub struct Wired<N: AudioNode> {
    pub(crate) node: N,
    pub(crate) receiver: rtrb::Consumer<N::Message>,
}

impl<N: AudioNode> Wired<N> {
    /// Apply every queued message, in send order.
    pub(crate) fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.receiver.pop() {
            self.node.apply(msg);
            applied += 1;
        }
        applied
    }

    /// The primitive itself.
    pub fn node(&self) -> &N {
        &self.node
    }
}

/// Every primitive kind a context can allocate.
pub enum Primitive {
    Oscillator(Wired<Oscillator>),
    Biquad(Wired<Biquad>),
    Gain(Wired<Gain>),
    Destination(Destination),
}

impl Primitive {
    pub(crate) fn drain(&mut self) -> usize {
        match self {
            Primitive::Oscillator(w) => w.drain(),
            Primitive::Biquad(w) => w.drain(),
            Primitive::Gain(w) => w.drain(),
            Primitive::Destination(_) => 0,
        }
    }

    pub fn as_oscillator(&self) -> Option<&Oscillator> {
        match self {
            Primitive::Oscillator(w) => Some(w.node()),
            _ => None,
        }
    }

    pub fn as_biquad(&self) -> Option<&Biquad> {
        match self {
            Primitive::Biquad(w) => Some(w.node()),
            _ => None,
        }
    }

    pub fn as_gain(&self) -> Option<&Gain> {
        match self {
            Primitive::Gain(w) => Some(w.node()),
            _ => None,
        }
    }

    pub(crate) fn as_oscillator_mut(&mut self) -> Option<&mut Oscillator> {
        match self {
            Primitive::Oscillator(w) => Some(&mut w.node),
            _ => None,
        }
    }

    pub fn is_destination(&self) -> bool {
        matches!(self, Primitive::Destination(_))
    }
}

/// A primitive bound to the process context of the graph that owns it.
pub(crate) struct Slot {
    pub(crate) primitive: Primitive,
    pub(crate) ctx: ProcessContext,
}

impl Node for Slot {
    fn process(&mut self, inputs: &[Input], output: &mut [Buffer]) {
        let ctx = &self.ctx;
        match &mut self.primitive {
            Primitive::Oscillator(w) => w.node.process(ctx, inputs, output),
            Primitive::Biquad(w) => w.node.process(ctx, inputs, output),
            Primitive::Gain(w) => w.node.process(ctx, inputs, output),
            Primitive::Destination(d) => d.process(ctx, inputs, output),
        }
    }
}
