//! Processing context - owns the physical graph, its clock and its destination

use dasp_graph::{NodeData, Processor};
use petgraph::algo::has_path_connecting;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use rtrb::{Consumer, Producer, RingBuffer};
use tracing::{debug, trace};

use crate::config::AudioConfig;
use crate::node::{AudioNode, ProcessContext};
use crate::nodes::{
    Biquad, BiquadMessage, Destination, FilterType, Gain, GainMessage, Oscillator, OscillatorMessage,
    Playback, Primitive, Slot, Waveform, Wired,
};

/// Identity of one processing context. Every replacement gets a larger id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct ContextId(pub(crate) u32);

/// Reference to a primitive inside a specific context.
///
/// A reference is only meaningful for the context that allocated it. Once that
/// context is replaced, every reference into it is dead.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PrimitiveRef {
    pub(crate) context: ContextId,
    pub(crate) index: NodeIndex,
}

impl PrimitiveRef {
    pub fn context(&self) -> ContextId {
        self.context
    }
}

/// A handle for sending messages to a primitive.
///
/// Messages are buffered in a lock-free ring buffer and applied at the start of
/// the next rendered block. If the buffer is full, [`PrimitiveHandle::send`]
/// returns `Err(msg)` with the message that couldn't be sent.
pub struct PrimitiveHandle<M: Send + 'static> {
    pub(crate) target: PrimitiveRef,
    pub(crate) sender: Producer<M>,
}

impl<M: Send + 'static> PrimitiveHandle<M> {
    /// Queue a message for the primitive.
    pub fn send(&mut self, msg: M) -> Result<(), M> {
        self.sender.push(msg).map_err(|rtrb::PushError::Full(m)| m)
    }

    pub fn target(&self) -> PrimitiveRef {
        self.target
    }
}

/// Clock state of a context.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ContextState {
    Running,
    Suspended,
}

type InnerGraph = StableGraph<NodeData<Slot>, ()>;

/// Message queue length of every primitive handle
const QUEUE_SIZE: usize = 64;

/// Frames per rendered block (the dasp_graph buffer length)
pub const BLOCK_LEN: usize = 64;

/// A renderable audio graph at a fixed sample rate.
///
/// Primitives are allocated into the context and wired with [`connect`](Self::connect).
/// [`render`](Self::render) processes one 64-frame block into the destination, which
/// pushes interleaved samples into the ring buffer returned by
/// [`take_output`](Self::take_output).
pub struct AudioContext {
    id: ContextId,
    graph: InnerGraph,
    processor: Processor<InnerGraph>,
    ctx: ProcessContext,
    destination: NodeIndex,
    output: Option<Consumer<f32>>,
    channels: usize,
    frames: u64,
    state: ContextState,
}

impl AudioContext {
    pub fn new(id: ContextId, config: &AudioConfig) -> Self {
        let channels = config.channels.max(1);
        let buffer_samples = ((config.sample_rate as f32 * config.output_buffer_ms / 1000.0) as usize) * channels;
        let buffer_size = buffer_samples.next_power_of_two().max(8192);
        let (producer, consumer) = RingBuffer::<f32>::new(buffer_size);

        let ctx = ProcessContext {
            sample_rate: config.sample_rate,
            buffer_size: BLOCK_LEN,
        };

        let mut graph = InnerGraph::with_capacity(64, 64);
        let destination = graph.add_node(NodeData::new1(Slot {
            primitive: Primitive::Destination(Destination::new(producer, channels)),
            ctx,
        }));

        Self {
            id,
            graph,
            processor: Processor::with_capacity(64),
            ctx,
            destination,
            output: Some(consumer),
            channels,
            frames: 0,
            state: ContextState::Running,
        }
    }

    pub fn id(&self) -> ContextId {
        self.id
    }

    pub fn sample_rate(&self) -> u32 {
        self.ctx.sample_rate
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    /// Frames rendered so far.
    pub fn current_frame(&self) -> u64 {
        self.frames
    }

    /// Seconds rendered so far.
    pub fn current_time(&self) -> f64 {
        self.frames as f64 / self.ctx.sample_rate as f64
    }

    /// The terminal every audible chain ends in.
    pub fn destination(&self) -> PrimitiveRef {
        self.make_ref(self.destination)
    }

    /// Take the consumer end of the output ring buffer. Only the first call returns it.
    pub fn take_output(&mut self) -> Option<Consumer<f32>> {
        self.output.take()
    }

    pub fn create_oscillator(&mut self, waveform: Waveform, frequency: f32) -> PrimitiveHandle<OscillatorMessage> {
        self.add(Oscillator::new(waveform, frequency), Primitive::Oscillator)
    }

    pub fn create_biquad(&mut self, kind: FilterType, frequency: f32, q: f32, gain: f32) -> PrimitiveHandle<BiquadMessage> {
        self.add(Biquad::new(kind, frequency, q, gain), Primitive::Biquad)
    }

    pub fn create_gain(&mut self, gain: f32) -> PrimitiveHandle<GainMessage> {
        let gain = Gain::new(gain).with_ramp_ms(5.0, self.ctx.sample_rate);
        self.add(gain, Primitive::Gain)
    }

    fn add<N: AudioNode>(&mut self, node: N, wrap: fn(Wired<N>) -> Primitive) -> PrimitiveHandle<N::Message> {
        let (sender, receiver) = RingBuffer::new(QUEUE_SIZE);
        let slot = Slot {
            primitive: wrap(Wired { node, receiver }),
            ctx: self.ctx,
        };
        let index = self.graph.add_node(NodeData::new1(slot));
        trace!(context = self.id.0, index = index.index(), "allocated primitive");

        PrimitiveHandle {
            target: self.make_ref(index),
            sender,
        }
    }

    fn make_ref(&self, index: NodeIndex) -> PrimitiveRef {
        PrimitiveRef { context: self.id, index }
    }

    /// Whether `r` points at a live primitive of this context.
    pub fn owns(&self, r: PrimitiveRef) -> bool {
        r.context == self.id && self.graph.node_weight(r.index).is_some()
    }

    /// Route the output of `from` into `to`. Connecting twice is a no-op.
    ///
    /// Routes that would close a feedback loop are refused.
    pub fn connect(&mut self, from: PrimitiveRef, to: PrimitiveRef) -> bool {
        if !self.owns(from) || !self.owns(to) {
            return false;
        }
        if self.graph.find_edge(from.index, to.index).is_none() {
            if has_path_connecting(&self.graph, to.index, from.index, None) {
                debug!(context = self.id.0, from = from.index.index(), to = to.index.index(), "refusing feedback route");
                return false;
            }
            self.graph.add_edge(from.index, to.index, ());
            trace!(context = self.id.0, from = from.index.index(), to = to.index.index(), "wired");
        }
        true
    }

    /// Remove the route from `from` into `to`, if any.
    pub fn disconnect(&mut self, from: PrimitiveRef, to: PrimitiveRef) -> bool {
        if !self.owns(from) || !self.owns(to) {
            return false;
        }
        match self.graph.find_edge(from.index, to.index) {
            Some(edge) => {
                self.graph.remove_edge(edge);
                trace!(context = self.id.0, from = from.index.index(), to = to.index.index(), "unwired");
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self, from: PrimitiveRef, to: PrimitiveRef) -> bool {
        self.owns(from) && self.owns(to) && self.graph.find_edge(from.index, to.index).is_some()
    }

    /// Drop a primitive and every route touching it. The destination cannot be released.
    pub fn release(&mut self, r: PrimitiveRef) -> bool {
        if !self.owns(r) || r.index == self.destination {
            return false;
        }
        self.graph.remove_node(r.index).is_some()
    }

    /// Start an oscillator at the current time.
    pub fn start(&mut self, r: PrimitiveRef) -> bool {
        self.oscillator_mut(r).map(Oscillator::start).unwrap_or(false)
    }

    /// Stop an oscillator at the current time. It can never be started again.
    pub fn stop(&mut self, r: PrimitiveRef) -> bool {
        self.oscillator_mut(r).map(Oscillator::stop).unwrap_or(false)
    }

    fn oscillator_mut(&mut self, r: PrimitiveRef) -> Option<&mut Oscillator> {
        if !self.owns(r) {
            return None;
        }
        self.graph
            .node_weight_mut(r.index)
            .and_then(|data| data.node.primitive.as_oscillator_mut())
    }

    pub fn primitive(&self, r: PrimitiveRef) -> Option<&Primitive> {
        if r.context != self.id {
            return None;
        }
        self.graph.node_weight(r.index).map(|data| &data.node.primitive)
    }

    /// Number of live primitives, the destination included.
    pub fn primitive_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of oscillators currently playing.
    pub fn playing_oscillators(&self) -> usize {
        self.graph
            .node_indices()
            .filter_map(|i| self.graph.node_weight(i))
            .filter_map(|data| data.node.primitive.as_oscillator())
            .filter(|osc| osc.playback() == Playback::Playing)
            .count()
    }

    /// Blocks the destination skipped because nobody drained the output.
    pub fn dropped_blocks(&self) -> u64 {
        match self.graph.node_weight(self.destination).map(|data| &data.node.primitive) {
            Some(Primitive::Destination(d)) => d.dropped_blocks(),
            _ => 0,
        }
    }

    pub fn suspend(&mut self) {
        self.state = ContextState::Suspended;
    }

    pub fn resume(&mut self) {
        self.state = ContextState::Running;
    }

    /// Apply every queued parameter message without rendering.
    pub fn flush(&mut self) -> usize {
        let indices: Vec<NodeIndex> = self.graph.node_indices().collect();
        let mut applied = 0;
        for index in indices {
            if let Some(data) = self.graph.node_weight_mut(index) {
                applied += data.node.primitive.drain();
            }
        }
        applied
    }

    /// Process one block of audio into the destination.
    ///
    /// Queued messages are applied first, even while suspended. Returns `false`
    /// when suspended; the clock only advances for rendered blocks.
    pub fn render(&mut self) -> bool {
        self.flush();
        if self.state == ContextState::Suspended {
            return false;
        }
        self.processor.process(&mut self.graph, self.destination);
        self.frames += self.ctx.buffer_size as u64;
        true
    }
}
