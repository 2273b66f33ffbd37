//! Backend adapters: one stateful audio voice per logical node.
//!
//! An [`Adapter`] owns the physical primitives of its node and two peer lists
//! that mirror the node's audio connections. The [`Adapters`] arena creates and
//! destroys adapters, keeps peer lists symmetric and wires primitives through
//! the [`Transport`].
//!
//! Peer lists may hold the same peer more than once (two connections between
//! the same pair of nodes). The physical wire is made for the first entry and
//! removed with the last one.
//!
//! Every rebuild follows the same order:
//!
//! ```text
//! unsubscribe -> soft disconnect -> teardown -> setup -> soft connect -> subscribe
//! ```
//!
//! A soft disconnect unwires every peer but keeps the peer lists, so the soft
//! connect after setup can restore the exact topology on the new primitives.

mod filter;
mod oscillator;
mod sink;

pub use filter::{filter_frequency, FilterVoice};
pub use oscillator::{note_to_frequency, oscillator_frequency, OscillatorVoice};
pub use sink::SinkVoice;

use hashbrown::{HashMap, HashSet};
use itertools::Itertools;
use tracing::{debug, trace};

use crate::context::{PrimitiveHandle, PrimitiveRef};
use crate::event::{Hub, Subscription, Topic};
use crate::patch::{Connection, GraphModel, Node, NodeId, NodeKind, Param, Params, Payload};
use crate::transport::Transport;

/// The kind-specific half of an adapter.
pub enum Voice {
    Oscillator(OscillatorVoice),
    Filter(FilterVoice),
    Sink(SinkVoice),
}

impl Voice {
    fn for_kind(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Oscillator => Voice::Oscillator(OscillatorVoice::default()),
            NodeKind::Filter => Voice::Filter(FilterVoice::default()),
            NodeKind::Sink => Voice::Sink(SinkVoice::default()),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Voice::Oscillator(_) => NodeKind::Oscillator,
            Voice::Filter(_) => NodeKind::Filter,
            Voice::Sink(_) => NodeKind::Sink,
        }
    }

    /// Allocate primitives in the current context from the node's parameters.
    fn setup(&mut self, params: &Params, transport: &mut Transport) {
        match (self, params) {
            (Voice::Oscillator(v), Params::Oscillator(p)) => v.setup(p, transport),
            (Voice::Filter(v), Params::Filter(p)) => v.setup(p, transport),
            (Voice::Sink(v), Params::Sink(p)) => v.setup(p, transport),
            (voice, params) => debug!(voice = ?voice.kind(), params = ?params.kind(), "parameter kind mismatch"),
        }
    }

    fn teardown(&mut self, transport: &mut Transport) {
        match self {
            Voice::Oscillator(v) => v.teardown(transport),
            Voice::Filter(v) => v.teardown(transport),
            Voice::Sink(v) => v.teardown(transport),
        }
    }

    /// Where upstream peers wire into.
    pub fn input_point(&self) -> Option<PrimitiveRef> {
        match self {
            Voice::Oscillator(_) => None,
            Voice::Filter(v) => v.primitive(),
            Voice::Sink(v) => v.input(),
        }
    }

    /// What downstream peers are wired from.
    pub fn output_point(&self) -> Option<PrimitiveRef> {
        match self {
            Voice::Oscillator(v) => v.output(),
            Voice::Filter(v) => v.primitive(),
            Voice::Sink(_) => None,
        }
    }

    fn topics(&self, node: NodeId) -> Vec<Topic> {
        let mut topics = vec![Topic::ContextReplaced, Topic::Parameter(node)];
        if let Voice::Oscillator(_) = self {
            topics.extend([Topic::Play, Topic::Stop]);
        }
        topics
    }

    fn apply(&mut self, param: Param, params: &Params, transport: &mut Transport) {
        match (self, params) {
            (Voice::Oscillator(v), Params::Oscillator(p)) => v.apply(param, p, transport),
            (Voice::Filter(v), Params::Filter(p)) => v.apply(param, p, transport),
            (Voice::Sink(v), Params::Sink(p)) => v.apply(param, p, transport),
            _ => {}
        }
    }
}

/// Physical counterpart of one logical node.
pub struct Adapter {
    node: NodeId,
    voice: Voice,
    inputs: Vec<NodeId>,
    outputs: Vec<NodeId>,
    subscriptions: Vec<Subscription>,
}

impl Adapter {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn kind(&self) -> NodeKind {
        self.voice.kind()
    }

    pub fn voice(&self) -> &Voice {
        &self.voice
    }

    /// Upstream peers, one entry per wired connection.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Downstream peers, one entry per wired connection.
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn input_point(&self) -> Option<PrimitiveRef> {
        self.voice.input_point()
    }

    pub fn output_point(&self) -> Option<PrimitiveRef> {
        self.voice.output_point()
    }

    /// Whether this is an oscillator that has been started.
    pub fn is_started(&self) -> bool {
        matches!(&self.voice, Voice::Oscillator(v) if v.is_started())
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    fn subscribe(&mut self, hub: &mut Hub) {
        for topic in self.voice.topics(self.node) {
            self.subscriptions.push(hub.subscribe(topic, self.node));
        }
    }

    fn unsubscribe(&mut self, hub: &mut Hub) {
        for token in self.subscriptions.drain(..) {
            hub.unsubscribe(token);
        }
    }
}

/// Queue `msg` for a primitive. A full queue is flushed into its primitive
/// first, so the newest value always lands.
fn deliver<M: Send + 'static>(handle: &mut PrimitiveHandle<M>, msg: M, transport: &mut Transport) -> bool {
    let Err(msg) = handle.send(msg) else {
        return true;
    };
    let flushed = transport.flush(handle.target());
    trace!(flushed, "message queue full, flushed before resend");
    handle.send(msg).is_ok()
}

fn remove_one(list: &mut Vec<NodeId>, id: NodeId) -> bool {
    match list.iter().position(|n| *n == id) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}

/// Every live adapter, plus the ledger of connections already applied to them.
#[derive(Default)]
pub struct Adapters {
    adapters: HashMap<NodeId, Adapter>,
    wired: HashSet<Connection>,
}

impl Adapters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: NodeId) -> Option<&Adapter> {
        self.adapters.get(&id)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.adapters.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.adapters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.adapters.is_empty()
    }

    /// Connections currently mirrored in peer lists.
    pub fn is_linked(&self, c: &Connection) -> bool {
        self.wired.contains(c)
    }

    /// Build the adapter for a new node: setup, then subscribe.
    pub fn create(&mut self, node: &Node, transport: &mut Transport, hub: &mut Hub) -> bool {
        if self.adapters.contains_key(&node.id()) {
            return false;
        }
        let mut adapter = Adapter {
            node: node.id(),
            voice: Voice::for_kind(node.kind()),
            inputs: Vec::new(),
            outputs: Vec::new(),
            subscriptions: Vec::new(),
        };
        adapter.voice.setup(node.params(), transport);
        adapter.subscribe(hub);
        debug!(node = %node.id(), kind = ?node.kind(), "adapter created");
        self.adapters.insert(node.id(), adapter);
        true
    }

    /// Unsubscribe, unwire every peer on both sides, then tear down.
    pub fn destroy(&mut self, id: NodeId, transport: &mut Transport, hub: &mut Hub) -> bool {
        let Some(adapter) = self.adapters.get_mut(&id) else {
            return false;
        };
        adapter.unsubscribe(hub);
        let inputs = adapter.inputs.clone();
        let outputs = adapter.outputs.clone();

        for peer in inputs {
            self.disconnect(peer, id, transport);
        }
        for peer in outputs {
            self.disconnect(id, peer, transport);
        }
        self.wired.retain(|c| !c.touches(id));

        if let Some(mut adapter) = self.adapters.remove(&id) {
            adapter.voice.teardown(transport);
        }
        debug!(node = %id, "adapter destroyed");
        true
    }

    /// Mirror a new logical connection. Repeats of a linked connection, links to
    /// nodes without an adapter and non-audio connections are ignored.
    pub fn link(&mut self, c: Connection, graph: &GraphModel, transport: &mut Transport) -> bool {
        if self.wired.contains(&c) || !self.contains(c.from.node) || !self.contains(c.to.node) {
            return false;
        }
        let audio = [c.from, c.to]
            .iter()
            .all(|s| graph.socket(*s).map(|s| s.payload()) == Some(Payload::Audio));
        if !audio {
            trace!(from = %c.from.node, to = %c.to.node, "logical-only connection");
            return false;
        }
        self.wired.insert(c);
        self.connect(c.from.node, c.to.node, transport)
    }

    /// Undo [`link`](Self::link). Connections that were never linked are ignored.
    pub fn unlink(&mut self, c: Connection, transport: &mut Transport) -> bool {
        if !self.wired.remove(&c) {
            return false;
        }
        self.disconnect(c.from.node, c.to.node, transport)
    }

    /// Append `to` to `from`'s outputs and `from` to `to`'s inputs, wiring the
    /// pair if this is its first entry.
    pub fn connect(&mut self, from: NodeId, to: NodeId, transport: &mut Transport) -> bool {
        if !self.contains(from) || !self.contains(to) {
            return false;
        }
        let first = self.adapters.get(&from).is_some_and(|a| !a.outputs.contains(&to));
        if let Some(a) = self.adapters.get_mut(&from) {
            a.outputs.push(to);
        }
        if let Some(a) = self.adapters.get_mut(&to) {
            a.inputs.push(from);
        }
        if first {
            self.wire(from, to, transport);
        }
        true
    }

    /// Exact inverse of [`connect`](Self::connect).
    pub fn disconnect(&mut self, from: NodeId, to: NodeId, transport: &mut Transport) -> bool {
        let removed = self.adapters.get_mut(&from).is_some_and(|a| remove_one(&mut a.outputs, to));
        if let Some(a) = self.adapters.get_mut(&to) {
            remove_one(&mut a.inputs, from);
        }
        if !removed {
            return false;
        }
        let last = self.adapters.get(&from).is_some_and(|a| !a.outputs.contains(&to));
        if last && self.unwire(from, to, transport) {
            self.retry_refused(transport);
        }
        true
    }

    /// Wire every listed peer pair that has no physical route yet. A route the
    /// context refused as feedback can become legal once another is removed.
    fn retry_refused(&self, transport: &mut Transport) {
        let pairs: Vec<(NodeId, NodeId)> = self
            .adapters
            .values()
            .flat_map(|a| a.outputs.iter().unique().map(move |&to| (a.node, to)))
            .sorted()
            .collect();
        for (from, to) in pairs {
            if !self.is_wired(from, to, transport) && self.wire(from, to, transport) {
                debug!(from = %from, to = %to, "restored previously refused route");
            }
        }
    }

    /// Whether the physical route for the peer pair exists.
    pub fn is_wired(&self, from: NodeId, to: NodeId, transport: &Transport) -> bool {
        let out = self.adapters.get(&from).and_then(Adapter::output_point);
        let inp = self.adapters.get(&to).and_then(Adapter::input_point);
        match (out, inp) {
            (Some(out), Some(inp)) => transport.is_connected(out, inp),
            _ => false,
        }
    }

    fn wire(&self, from: NodeId, to: NodeId, transport: &mut Transport) -> bool {
        let out = self.adapters.get(&from).and_then(Adapter::output_point);
        let inp = self.adapters.get(&to).and_then(Adapter::input_point);
        match (out, inp) {
            (Some(out), Some(inp)) => transport.connect(out, inp),
            _ => false,
        }
    }

    fn unwire(&self, from: NodeId, to: NodeId, transport: &mut Transport) -> bool {
        let out = self.adapters.get(&from).and_then(Adapter::output_point);
        let inp = self.adapters.get(&to).and_then(Adapter::input_point);
        match (out, inp) {
            (Some(out), Some(inp)) => transport.disconnect(out, inp),
            _ => false,
        }
    }

    /// Unwire every peer of `id`, keeping the peer lists.
    pub fn soft_disconnect(&self, id: NodeId, transport: &mut Transport) {
        let Some(adapter) = self.adapters.get(&id) else {
            return;
        };
        for &peer in adapter.outputs.iter().unique() {
            self.unwire(id, peer, transport);
        }
        for &peer in adapter.inputs.iter().unique() {
            self.unwire(peer, id, transport);
        }
    }

    /// Re-wire every listed peer of `id`.
    pub fn soft_connect(&self, id: NodeId, transport: &mut Transport) {
        let Some(adapter) = self.adapters.get(&id) else {
            return;
        };
        for &peer in adapter.outputs.iter().unique() {
            self.wire(id, peer, transport);
        }
        for &peer in adapter.inputs.iter().unique() {
            self.wire(peer, id, transport);
        }
    }

    /// Replace the adapter's primitives with fresh ones in the current context.
    pub fn rebuild(&mut self, id: NodeId, params: &Params, transport: &mut Transport, hub: &mut Hub) -> bool {
        let Some(adapter) = self.adapters.get_mut(&id) else {
            return false;
        };
        adapter.unsubscribe(hub);
        self.soft_disconnect(id, transport);
        self.reset(id, params, transport);
        self.soft_connect(id, transport);
        if let Some(adapter) = self.adapters.get_mut(&id) {
            adapter.subscribe(hub);
        }
        debug!(node = %id, "adapter rebuilt");
        true
    }

    fn reset(&mut self, id: NodeId, params: &Params, transport: &mut Transport) {
        if let Some(adapter) = self.adapters.get_mut(&id) {
            adapter.voice.teardown(transport);
            adapter.voice.setup(params, transport);
        }
    }

    /// Start an oscillator adapter. A second play is a no-op.
    pub fn on_play(&mut self, id: NodeId, transport: &mut Transport) -> bool {
        match self.adapters.get_mut(&id).map(|a| &mut a.voice) {
            Some(Voice::Oscillator(v)) => v.play(transport),
            _ => false,
        }
    }

    /// Stop a started oscillator and replace it with a fresh, idle one wired to
    /// the same peers.
    pub fn on_stop(&mut self, id: NodeId, params: &Params, transport: &mut Transport) -> bool {
        let stopped = match self.adapters.get_mut(&id).map(|a| &mut a.voice) {
            Some(Voice::Oscillator(v)) => v.stop(transport),
            _ => false,
        };
        if !stopped {
            return false;
        }
        self.soft_disconnect(id, transport);
        self.reset(id, params, transport);
        self.soft_connect(id, transport);
        trace!(node = %id, "oscillator restarted after stop");
        true
    }

    /// Push a parameter change to the adapter's primitive.
    pub fn on_parameter(&mut self, id: NodeId, param: Param, params: &Params, transport: &mut Transport) {
        if let Some(adapter) = self.adapters.get_mut(&id) {
            adapter.voice.apply(param, params, transport);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AudioConfig;
    use crate::nodes::{Playback, Primitive};
    use crate::patch::{Direction, SocketId};

    struct Rig {
        graph: GraphModel,
        transport: Transport,
        hub: Hub,
        adapters: Adapters,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                graph: GraphModel::new(),
                transport: Transport::new(AudioConfig::default()),
                hub: Hub::new(),
                adapters: Adapters::new(),
            }
        }

        fn add(&mut self, kind: NodeKind) -> NodeId {
            let id = self.graph.add_node(kind);
            let node = self.graph.node(id).unwrap();
            self.adapters.create(node, &mut self.transport, &mut self.hub);
            id
        }

        fn link(&mut self, from: SocketId, to: SocketId) -> Connection {
            let c = Connection { from, to };
            self.graph.add_connection(c);
            self.adapters.link(c, &self.graph, &mut self.transport);
            c
        }

        fn out(&self, id: NodeId) -> SocketId {
            self.graph.node(id).unwrap().outputs().next().unwrap().id()
        }

        fn inp(&self, id: NodeId) -> SocketId {
            self.graph.node(id).unwrap().inputs().next().unwrap().id()
        }

        fn wired(&self, from: NodeId, to: NodeId) -> bool {
            let out = self.adapters.get(from).and_then(Adapter::output_point).unwrap();
            let inp = self.adapters.get(to).and_then(Adapter::input_point).unwrap();
            self.transport.is_connected(out, inp)
        }

        fn params(&self, id: NodeId) -> Params {
            *self.graph.node(id).unwrap().params()
        }
    }

    #[test]
    fn play_twice_starts_once() {
        let mut rig = Rig::new();
        let osc = rig.add(NodeKind::Oscillator);

        assert!(rig.adapters.on_play(osc, &mut rig.transport));
        assert!(!rig.adapters.on_play(osc, &mut rig.transport));
        assert_eq!(rig.transport.context().playing_oscillators(), 1);
        assert!(rig.adapters.get(osc).unwrap().is_started());
    }

    #[test]
    fn link_wires_and_repeats_are_ignored() {
        let mut rig = Rig::new();
        let osc = rig.add(NodeKind::Oscillator);
        let sink = rig.add(NodeKind::Sink);
        let c = rig.link(rig.out(osc), rig.inp(sink));

        assert!(rig.wired(osc, sink));
        assert!(!rig.adapters.link(c, &rig.graph, &mut rig.transport));
        assert_eq!(rig.adapters.get(osc).unwrap().outputs(), [sink]);

        assert!(rig.adapters.unlink(c, &mut rig.transport));
        assert!(!rig.adapters.unlink(c, &mut rig.transport));
        assert!(!rig.wired(osc, sink));
        assert!(rig.adapters.get(sink).unwrap().inputs().is_empty());
    }

    #[test]
    fn wire_survives_until_the_last_parallel_connection() {
        let mut rig = Rig::new();
        let osc = rig.add(NodeKind::Oscillator);
        let sink = rig.add(NodeKind::Sink);
        let extra = rig.graph.add_socket(sink, Payload::Audio, Direction::In).unwrap();

        let a = rig.link(rig.out(osc), rig.inp(sink));
        let b = rig.link(rig.out(osc), extra);
        assert_eq!(rig.adapters.get(osc).unwrap().outputs(), [sink, sink]);

        rig.adapters.unlink(a, &mut rig.transport);
        assert!(rig.wired(osc, sink));
        rig.adapters.unlink(b, &mut rig.transport);
        assert!(!rig.wired(osc, sink));
    }

    #[test]
    fn non_audio_connections_stay_logical() {
        let mut rig = Rig::new();
        let osc = rig.add(NodeKind::Oscillator);
        let filter = rig.add(NodeKind::Filter);
        let from = rig.graph.add_socket(osc, Payload::Note, Direction::Out).unwrap();
        let to = rig.graph.add_socket(filter, Payload::Note, Direction::In).unwrap();

        let c = rig.link(from, to);
        assert!(!rig.adapters.is_linked(&c));
        assert!(rig.adapters.get(osc).unwrap().outputs().is_empty());
    }

    #[test]
    fn rebuild_preserves_topology() {
        let mut rig = Rig::new();
        let osc = rig.add(NodeKind::Oscillator);
        let filter = rig.add(NodeKind::Filter);
        let sink = rig.add(NodeKind::Sink);
        rig.link(rig.out(osc), rig.inp(filter));
        rig.link(rig.out(filter), rig.inp(sink));

        rig.transport.replace_context();
        for id in rig.hub.subscribers(Topic::ContextReplaced) {
            let params = rig.params(id);
            rig.adapters.rebuild(id, &params, &mut rig.transport, &mut rig.hub);
        }
        assert_eq!(rig.transport.finish_replace(), Some(0));

        let current = rig.transport.context().id();
        for id in [osc, filter, sink] {
            let a = rig.adapters.get(id).unwrap();
            for point in [a.input_point(), a.output_point()].into_iter().flatten() {
                assert_eq!(point.context(), current);
            }
        }
        assert!(rig.wired(osc, filter));
        assert!(rig.wired(filter, sink));
        assert_eq!(rig.adapters.get(filter).unwrap().inputs(), [osc]);
        assert_eq!(rig.adapters.get(filter).unwrap().outputs(), [sink]);
    }

    #[test]
    fn stop_replaces_the_oscillator_in_place() {
        let mut rig = Rig::new();
        let osc = rig.add(NodeKind::Oscillator);
        let sink = rig.add(NodeKind::Sink);
        rig.link(rig.out(osc), rig.inp(sink));

        let params = rig.params(osc);
        assert!(!rig.adapters.on_stop(osc, &params, &mut rig.transport));
        rig.adapters.on_play(osc, &mut rig.transport);
        assert!(rig.adapters.on_stop(osc, &params, &mut rig.transport));

        let a = rig.adapters.get(osc).unwrap();
        assert!(!a.is_started());
        let fresh = rig.transport.context().primitive(a.output_point().unwrap());
        assert_eq!(fresh.and_then(Primitive::as_oscillator).map(|o| o.playback()), Some(Playback::Idle));
        assert!(rig.wired(osc, sink));
        assert_eq!(rig.transport.context().primitive_count(), 3);
    }

    #[test]
    fn feedback_route_is_wired_once_the_loop_is_broken() {
        let mut rig = Rig::new();
        let a = rig.add(NodeKind::Filter);
        let b = rig.add(NodeKind::Filter);
        let forward = rig.link(rig.out(a), rig.inp(b));
        rig.link(rig.out(b), rig.inp(a));

        assert!(rig.wired(a, b));
        assert!(!rig.wired(b, a));
        assert!(!rig.adapters.is_wired(b, a, &rig.transport));

        rig.adapters.unlink(forward, &mut rig.transport);
        assert!(!rig.wired(a, b));
        assert!(rig.wired(b, a));
        assert_eq!(rig.adapters.get(b).unwrap().outputs(), [a]);
    }

    #[test]
    fn full_message_queue_still_delivers_the_latest_value() {
        let mut rig = Rig::new();
        let osc = rig.add(NodeKind::Oscillator);

        for coarse in 1..=70 {
            rig.graph.set_parameter(osc, Param::Coarse, coarse as f32).unwrap();
            let params = rig.params(osc);
            rig.adapters.on_parameter(osc, Param::Coarse, &params, &mut rig.transport);
        }
        rig.transport.render();

        let point = rig.adapters.get(osc).and_then(Adapter::output_point).unwrap();
        let freq = rig.transport.context().primitive(point).and_then(Primitive::as_oscillator).unwrap().frequency();
        assert!((freq - note_to_frequency(139.0)).abs() < 0.5, "{freq}");
    }

    #[test]
    fn destroy_unwires_peers_and_releases_subscriptions() {
        let mut rig = Rig::new();
        let osc = rig.add(NodeKind::Oscillator);
        let filter = rig.add(NodeKind::Filter);
        let sink = rig.add(NodeKind::Sink);
        rig.link(rig.out(osc), rig.inp(filter));
        rig.link(rig.out(filter), rig.inp(sink));
        assert_eq!(rig.hub.count_for(filter), 2);

        assert!(rig.adapters.destroy(filter, &mut rig.transport, &mut rig.hub));
        assert!(!rig.adapters.destroy(filter, &mut rig.transport, &mut rig.hub));

        assert_eq!(rig.hub.count_for(filter), 0);
        assert!(rig.adapters.get(osc).unwrap().outputs().is_empty());
        assert!(rig.adapters.get(sink).unwrap().inputs().is_empty());
        // destination, oscillator, sink gain
        assert_eq!(rig.transport.context().primitive_count(), 3);
    }
}
