//! Owner of the shared processing context
//!
//! The transport is the only place that creates or replaces an [`AudioContext`].
//! Lifecycle requests are queued as [`TransportEvent`]s for the session to
//! deliver; primitive operations are routed to whichever context owns the
//! reference, which matters while a replaced context is being retired.

use rtrb::Consumer;
use tracing::{debug, trace, warn};

use crate::config::AudioConfig;
use crate::context::{AudioContext, ContextId, ContextState, PrimitiveRef};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum TransportEvent {
    Play,
    Pause { paused: bool },
    Stop,
    ContextReplaced { previous: ContextId, current: ContextId },
}

pub struct Transport {
    config: AudioConfig,
    current: AudioContext,
    retiring: Option<AudioContext>,
    next_id: u32,
    paused: bool,
    retired_leftovers: usize,
    events: Vec<TransportEvent>,
}

impl Transport {
    pub fn new(config: AudioConfig) -> Self {
        let current = AudioContext::new(ContextId(0), &config);
        Self {
            config,
            current,
            retiring: None,
            next_id: 1,
            paused: false,
            retired_leftovers: 0,
            events: Vec::new(),
        }
    }

    pub fn play(&mut self) {
        self.events.push(TransportEvent::Play);
    }

    /// Toggle between running and suspended.
    pub fn pause(&mut self) {
        if self.paused {
            self.current.resume();
        } else {
            self.current.suspend();
        }
        self.paused = !self.paused;
        debug!(paused = self.paused, "transport pause toggled");
        self.events.push(TransportEvent::Pause { paused: self.paused });
    }

    pub fn stop(&mut self) {
        self.events.push(TransportEvent::Stop);
    }

    /// Swap in a fresh context with the same layout and paused state.
    ///
    /// The old context stays reachable as the retiring context until
    /// [`finish_replace`](Self::finish_replace), so adapters can tear their
    /// primitives down in it.
    pub fn replace_context(&mut self) -> ContextId {
        // A replacement still in flight is finished first.
        self.finish_replace();

        let id = ContextId(self.next_id);
        self.next_id += 1;

        let mut next = AudioContext::new(id, &self.config);
        if self.paused {
            next.suspend();
        }
        let previous = std::mem::replace(&mut self.current, next);
        let previous_id = previous.id();
        self.retiring = Some(previous);

        debug!(previous = previous_id.0, current = id.0, "replacing processing context");
        self.events.push(TransportEvent::ContextReplaced {
            previous: previous_id,
            current: id,
        });
        id
    }

    /// Drop the retiring context. Returns how many primitives besides its
    /// destination were still alive in it.
    pub fn finish_replace(&mut self) -> Option<usize> {
        let retired = self.retiring.take()?;
        let leftovers = retired.primitive_count().saturating_sub(1);
        if leftovers > 0 {
            warn!(context = retired.id().0, leftovers, "retired context still held primitives");
        }
        self.retired_leftovers = leftovers;
        Some(leftovers)
    }

    /// Primitives the most recently retired context still held when it was dropped.
    pub fn retired_leftovers(&self) -> usize {
        self.retired_leftovers
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn state(&self) -> ContextState {
        self.current.state()
    }

    pub fn context(&self) -> &AudioContext {
        &self.current
    }

    /// The current context, for allocating primitives.
    pub fn context_mut(&mut self) -> &mut AudioContext {
        &mut self.current
    }

    pub fn retiring(&self) -> Option<&AudioContext> {
        self.retiring.as_ref()
    }

    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    fn owner_of(&mut self, r: PrimitiveRef) -> Option<&mut AudioContext> {
        if self.current.owns(r) {
            return Some(&mut self.current);
        }
        self.retiring.as_mut().filter(|ctx| ctx.owns(r))
    }

    /// Wire two primitives. References into different contexts are skipped.
    pub fn connect(&mut self, from: PrimitiveRef, to: PrimitiveRef) -> bool {
        if from.context() != to.context() {
            trace!(from = from.context().0, to = to.context().0, "skipping cross-context wire");
            return false;
        }
        self.owner_of(from).map(|ctx| ctx.connect(from, to)).unwrap_or(false)
    }

    pub fn disconnect(&mut self, from: PrimitiveRef, to: PrimitiveRef) -> bool {
        if from.context() != to.context() {
            return false;
        }
        self.owner_of(from).map(|ctx| ctx.disconnect(from, to)).unwrap_or(false)
    }

    pub fn is_connected(&self, from: PrimitiveRef, to: PrimitiveRef) -> bool {
        self.current.is_connected(from, to) || self.retiring.as_ref().is_some_and(|ctx| ctx.is_connected(from, to))
    }

    pub fn release(&mut self, r: PrimitiveRef) -> bool {
        self.owner_of(r).map(|ctx| ctx.release(r)).unwrap_or(false)
    }

    pub fn start_primitive(&mut self, r: PrimitiveRef) -> bool {
        self.owner_of(r).map(|ctx| ctx.start(r)).unwrap_or(false)
    }

    pub fn stop_primitive(&mut self, r: PrimitiveRef) -> bool {
        self.owner_of(r).map(|ctx| ctx.stop(r)).unwrap_or(false)
    }

    /// Apply every queued message in the context that owns `r`.
    pub fn flush(&mut self, r: PrimitiveRef) -> usize {
        self.owner_of(r).map(AudioContext::flush).unwrap_or(0)
    }

    /// Render one block of the current context.
    pub fn render(&mut self) -> bool {
        self.current.render()
    }

    /// Consumer end of the current context's output. Each context hands it out once.
    pub fn take_output(&mut self) -> Option<Consumer<f32>> {
        self.current.take_output()
    }

    pub fn take_events(&mut self) -> Vec<TransportEvent> {
        std::mem::take(&mut self.events)
    }
}
