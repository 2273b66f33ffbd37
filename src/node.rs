//! Core primitive trait and context types.

use dasp_graph::{Buffer, Input};

/// Information available during audio processing.
///
/// Passed to every [`AudioNode::process`] call. Contains the context's sample rate
/// and the buffer size (always 64 samples, the `dasp_graph` block length).
#[derive(Clone, Copy, Debug)]
pub struct ProcessContext {
    /// Sample rate of the context in Hz (e.g., 44100, 48000)
    pub sample_rate: u32,
    /// Number of samples per buffer
    pub buffer_size: usize,
}

/// The core trait for physical audio primitives.
///
/// A primitive is allocated from an [`AudioContext`](crate::AudioContext) and lives
/// inside its processing graph. Primitives can be:
/// - **Sources**: generate audio (0 inputs) - oscillators
/// - **Effects**: process audio (inputs → outputs) - filters, gains
/// - **Sinks**: consume audio (no outputs) - the context destination
///
/// # Message-Based Parameters
///
/// Instead of shared mutable state, primitives receive parameter updates via
/// messages. Messages queued through a [`PrimitiveHandle`](crate::PrimitiveHandle)
/// are handed to [`apply`](Self::apply) at the start of the next rendered block,
/// which is the context's current time.
///
/// ```
/// use handpatch::{AudioNode, ProcessContext};
/// use dasp_graph::{Buffer, Input};
///
/// enum DcMessage {
///     SetLevel(f32),
/// }
///
/// struct Dc {
///     level: f32,
/// }
///
/// impl AudioNode for Dc {
///     type Message = DcMessage;
///
///     fn apply(&mut self, msg: DcMessage) {
///         match msg {
///             DcMessage::SetLevel(l) => self.level = l,
///         }
///     }
///
///     fn process(&mut self, _ctx: &ProcessContext, _inputs: &[Input], outputs: &mut [Buffer]) {
///         for buffer in outputs.iter_mut() {
///             buffer.iter_mut().for_each(|s| *s = self.level);
///         }
///     }
/// }
/// ```
pub trait AudioNode: Send + 'static {
    /// Message type for parameter updates.
    ///
    /// Use a custom enum for primitives with parameters, or `()` for those without.
    type Message: Send + 'static;

    /// Apply one queued parameter message.
    fn apply(&mut self, msg: Self::Message);

    /// Process one block of audio.
    ///
    /// - `ctx` - Sample rate and buffer size information
    /// - `inputs` - Audio inputs from connected primitives
    /// - `outputs` - Audio output buffers to fill
    fn process(&mut self, ctx: &ProcessContext, inputs: &[Input], outputs: &mut [Buffer]);
}
