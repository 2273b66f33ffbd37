//! Terminal destination of a context

use dasp_graph::{Buffer, Input};
use rtrb::Producer;

use crate::node::ProcessContext;
use crate::nodes::mix_inputs;

/// The sink every context renders into.
///
/// Sums all inputs and pushes the result, interleaved to `channels`, into an rtrb
/// ring buffer. The consumer side is handed to whatever plays the audio (a cpal
/// stream, a test, a file writer).
pub struct Destination {
    producer: Producer<f32>,
    channels: usize,
    mix: Buffer,
    dropped_blocks: u64,
}

impl Destination {
    /// Create a destination that writes interleaved samples to the given producer
    pub fn new(producer: Producer<f32>, channels: usize) -> Self {
        Self {
            producer,
            channels: channels.max(1),
            mix: Buffer::default(),
            dropped_blocks: 0,
        }
    }

    /// Returns how many sample slots are available
    #[inline]
    pub fn available(&self) -> usize {
        self.producer.slots()
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Blocks skipped because the ring buffer was full
    #[inline]
    pub fn dropped_blocks(&self) -> u64 {
        self.dropped_blocks
    }

    pub(crate) fn process(&mut self, _ctx: &ProcessContext, inputs: &[Input], _outputs: &mut [Buffer]) {
        mix_inputs(inputs, &mut self.mix);

        let samples_needed = self.mix.len() * self.channels;

        // Skip rather than partially write
        if self.producer.slots() < samples_needed {
            self.dropped_blocks += 1;
            #[cfg(feature = "warn_on_empty")]
            tracing::warn!(dropped = self.dropped_blocks, "destination ring buffer full, dropping block");
            return;
        }

        for &sample in self.mix.iter() {
            for _ in 0..self.channels {
                let _ = self.producer.push(sample);
            }
        }
    }
}
