use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use handpatch::control::{encode_frame, ConnectivityEvent, ControlEvent, LinkState, Point};
use handpatch::nodes::{Playback, Primitive, Waveform};
use handpatch::patch::GraphEvent;
use handpatch::{
    Axis, Config, Connection, ContextState, ControlTarget, FrameError, Hand, HandAxis, NodeId, NodeKind, Param,
    ParamError, ParamValue, Params, Pose, Session, SessionEvent, SocketId, TransportEvent,
};
use rtrb::Consumer;

const LEFT_X: HandAxis = HandAxis::new(Hand::Left, Axis::X);

fn out_socket(s: &Session, id: NodeId) -> SocketId {
    s.graph().node(id).unwrap().outputs().next().unwrap().id()
}

fn in_socket(s: &Session, id: NodeId) -> SocketId {
    s.graph().node(id).unwrap().inputs().next().unwrap().id()
}

fn connect(s: &mut Session, from: NodeId, to: NodeId) -> Connection {
    let (a, b) = (out_socket(s, from), in_socket(s, to));
    s.request_connection(a, b).expect("compatible sockets")
}

/// oscillator -> filter -> sink
fn chain(s: &mut Session) -> (NodeId, NodeId, NodeId) {
    let osc = s.add_node(NodeKind::Oscillator);
    let filter = s.add_node(NodeKind::Filter);
    let sink = s.add_node(NodeKind::Sink);
    connect(s, osc, filter);
    connect(s, filter, sink);
    (osc, filter, sink)
}

fn record(s: &mut Session) -> Rc<RefCell<Vec<SessionEvent>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    let sink = log.clone();
    s.subscribe(move |e| sink.borrow_mut().push(*e));
    log
}

fn graph_events(log: &Rc<RefCell<Vec<SessionEvent>>>) -> Vec<GraphEvent> {
    log.borrow()
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Graph(g) => Some(*g),
            _ => None,
        })
        .collect()
}

fn is_wired(s: &Session, from: NodeId, to: NodeId) -> bool {
    let out = s.adapter(from).and_then(|a| a.output_point()).unwrap();
    let inp = s.adapter(to).and_then(|a| a.input_point()).unwrap();
    s.transport().is_connected(out, inp)
}

fn drain(output: &mut Consumer<f32>) -> Vec<f32> {
    core::iter::from_fn(|| output.pop().ok()).collect()
}

fn oscillator_of(s: &Session, id: NodeId) -> (f32, Playback) {
    let point = s.adapter(id).and_then(|a| a.output_point()).unwrap();
    let osc = s.transport().context().primitive(point).and_then(Primitive::as_oscillator).unwrap();
    (osc.frequency(), osc.playback())
}

#[test]
fn every_node_gets_exactly_one_adapter() {
    let mut s = Session::default();
    let ids = s.add_nodes([
        Params::from(NodeKind::Oscillator),
        Params::from(NodeKind::Filter),
        Params::from(NodeKind::Sink),
    ]);

    assert_eq!(s.adapters().len(), 3);
    for id in &ids {
        assert_eq!(s.adapter(*id).map(|a| a.kind()), s.graph().node(*id).map(|n| n.kind()));
    }

    s.remove_node(ids[1]);
    assert_eq!(s.adapters().len(), 2);
    assert!(s.adapter(ids[1]).is_none());
}

#[test]
fn play_twice_starts_one_oscillator() {
    let mut s = Session::default();
    let (osc, _, _) = chain(&mut s);

    s.play();
    s.play();

    assert_eq!(s.transport().context().playing_oscillators(), 1);
    assert_eq!(oscillator_of(&s, osc).1, Playback::Playing);
}

#[test]
fn removing_a_node_cascades_its_connections() {
    let mut s = Session::default();
    let (osc, filter, sink) = chain(&mut s);
    let other = s.add_node(NodeKind::Oscillator);
    connect(&mut s, other, filter);
    let log = record(&mut s);

    s.remove_node(filter);

    assert!(s.graph().connections().iter().all(|c| !c.touches(filter)));
    let removed = graph_events(&log)
        .iter()
        .filter(|e| matches!(e, GraphEvent::ConnectionRemoved(_)))
        .count();
    assert_eq!(removed, 3);
    assert!(s.adapter(osc).unwrap().outputs().is_empty());
    assert!(s.adapter(other).unwrap().outputs().is_empty());
    assert!(s.adapter(sink).unwrap().inputs().is_empty());
}

#[test]
fn removing_the_source_of_a_single_connection_orders_events() {
    let mut s = Session::default();
    let osc = s.add_node(NodeKind::Oscillator);
    let sink = s.add_node(NodeKind::Sink);
    let c = connect(&mut s, osc, sink);
    let log = record(&mut s);

    s.remove_node(osc);

    assert_eq!(
        graph_events(&log),
        [
            GraphEvent::ConnectionRemoved(c),
            GraphEvent::ConnectionsChanged,
            GraphEvent::NodeRemoved(osc),
            GraphEvent::NodesChanged,
        ]
    );
}

#[test]
fn connection_requests_are_symmetric() {
    let mut s = Session::default();
    let osc = s.add_node(NodeKind::Oscillator);
    let sink = s.add_node(NodeKind::Sink);
    let (out, inp) = (out_socket(&s, osc), in_socket(&s, sink));

    let forward = s.request_connection(out, inp).unwrap();
    let backward = s.request_connection(inp, out).unwrap();
    assert_eq!(forward, backward);
    assert_eq!(forward.from, out);
    assert_eq!(s.graph().connections().len(), 1);
    assert_eq!(s.adapter(osc).unwrap().outputs(), [sink]);
}

#[test]
fn rejected_requests_have_no_side_effects() {
    let mut s = Session::default();
    let a = s.add_node(NodeKind::Oscillator);
    let b = s.add_node(NodeKind::Oscillator);
    let log = record(&mut s);

    assert_eq!(s.request_connection(out_socket(&s, a), out_socket(&s, b)), None);
    let missing = SocketId { node: b, slot: 9 };
    assert_eq!(s.request_connection(out_socket(&s, a), missing), None);
    assert!(log.borrow().is_empty());
}

#[test]
fn context_replacement_preserves_topology() {
    let mut s = Session::default();
    let (osc, filter, sink) = chain(&mut s);
    let peers = |s: &Session, id| {
        let a = s.adapter(id).unwrap();
        (a.inputs().to_vec(), a.outputs().to_vec())
    };
    let before: Vec<_> = [osc, filter, sink].iter().map(|id| peers(&s, *id)).collect();

    let old = s.transport().context().id();
    let new = s.replace_context();

    assert_ne!(old, new);
    let after: Vec<_> = [osc, filter, sink].iter().map(|id| peers(&s, *id)).collect();
    assert_eq!(before, after);
    for id in [osc, filter, sink] {
        let a = s.adapter(id).unwrap();
        for point in [a.input_point(), a.output_point()].into_iter().flatten() {
            assert_eq!(point.context(), new);
        }
    }
    assert!(is_wired(&s, osc, filter));
    assert!(is_wired(&s, filter, sink));
}

#[test]
fn retired_context_is_left_empty() {
    let mut s = Session::default();
    chain(&mut s);
    s.play();

    s.replace_context();

    assert!(s.transport().retiring().is_none());
    assert_eq!(s.transport().retired_leftovers(), 0);
    // destination + oscillator + biquad + sink gain
    assert_eq!(s.transport().context().primitive_count(), 4);
}

#[test]
fn replacement_keeps_paused_state_and_needs_a_new_play() {
    let mut s = Session::default();
    let (osc, _, _) = chain(&mut s);
    s.play();
    s.pause();

    s.replace_context();

    assert_eq!(s.transport().state(), ContextState::Suspended);
    assert!(!s.adapter(osc).unwrap().is_started());
    assert_eq!(oscillator_of(&s, osc).1, Playback::Idle);
}

#[test]
fn stop_replaces_the_oscillator_and_keeps_its_wiring() {
    let mut s = Session::default();
    let (osc, filter, _) = chain(&mut s);
    s.play();

    s.stop();

    assert!(!s.adapter(osc).unwrap().is_started());
    assert_eq!(oscillator_of(&s, osc).1, Playback::Idle);
    assert!(is_wired(&s, osc, filter));
    assert_eq!(s.transport().context().primitive_count(), 4);

    s.play();
    assert_eq!(oscillator_of(&s, osc).1, Playback::Playing);
}

#[test]
fn oscillator_frequency_follows_coarse_and_fine() {
    let mut s = Session::default();
    let osc = s.add_node(NodeKind::Oscillator);

    s.set_parameter(osc, Param::Coarse, 3.0_f32).unwrap();
    s.set_parameter(osc, Param::Fine, 0.5_f32).unwrap();
    s.set_parameter(osc, Param::Waveform, Waveform::Triangle).unwrap();
    s.render();

    let (freq, _) = oscillator_of(&s, osc);
    assert!((freq - 538.58).abs() < 0.01, "{freq}");
}

#[test]
fn filter_frequency_is_an_exponent() {
    let mut s = Session::default();
    let filter = s.add_node(NodeKind::Filter);
    let biquad = |s: &Session| {
        let point = s.adapter(filter).and_then(|a| a.input_point()).unwrap();
        s.transport().context().primitive(point).and_then(Primitive::as_biquad).map(|b| b.frequency()).unwrap()
    };

    assert!((biquad(&s) - 2f32.powf(14.3)).abs() < 0.5);

    s.set_parameter(filter, Param::Frequency, 10.0_f32).unwrap();
    s.render();
    assert!((biquad(&s) - 1024.0).abs() < 1e-3);
}

#[test]
fn parameter_errors() {
    let mut s = Session::default();
    let sink = s.add_node(NodeKind::Sink);

    assert!(matches!(
        s.set_parameter(sink, Param::Q, 1.0_f32),
        Err(ParamError::UnknownParam { kind: NodeKind::Sink, .. })
    ));
    assert!(matches!(
        s.set_parameter(sink, Param::Gain, Waveform::Sine),
        Err(ParamError::TypeMismatch { .. })
    ));
    s.remove_node(sink);
    assert_eq!(s.set_parameter(sink, Param::Gain, 0.5_f32), Ok(()));
}

#[test]
fn hand_frame_drives_a_bound_parameter() {
    let mut s = Session::default();
    let osc = s.add_node(NodeKind::Oscillator);
    s.bind(LEFT_X, ControlTarget::new(osc, Param::Coarse).with_range(0.0, 100.0).with_step(10.0))
        .unwrap();

    let pose = Pose {
        left: Some(Point { x: 0.5, y: 0.2 }),
        right: None,
    };
    s.handle_frame(&encode_frame(&pose)).unwrap();

    let coarse = s.graph().node(osc).unwrap().params().get(Param::Coarse);
    assert_eq!(coarse, Some(ParamValue::Number(50.0)));
    assert_eq!(s.last_pose(), Some(pose));
}

#[test]
fn absent_hand_leaves_the_control_alone() {
    let mut s = Session::default();
    let sink = s.add_node(NodeKind::Sink);
    s.bind(HandAxis::new(Hand::Right, Axis::Y), ControlTarget::new(sink, Param::Gain)).unwrap();
    let log = record(&mut s);

    s.apply_pose(&Pose {
        left: Some(Point { x: 0.9, y: 0.9 }),
        right: None,
    });

    assert!(log.borrow().is_empty());
}

#[test]
fn rebinding_an_axis_notifies_the_old_target() {
    let mut s = Session::default();
    let osc = s.add_node(NodeKind::Oscillator);
    let filter = s.add_node(NodeKind::Filter);
    let c1 = ControlTarget::new(osc, Param::Fine);
    let c2 = ControlTarget::new(filter, Param::Q);
    s.bind(LEFT_X, c1).unwrap();
    let log = record(&mut s);

    s.bind(LEFT_X, c2).unwrap();

    assert_eq!(s.router().bindings().len(), 1);
    assert_eq!(s.router().binding(LEFT_X), Some(&c2));
    let released: Vec<_> = log
        .borrow()
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Control(ControlEvent::TargetReleased(b)) => Some(b.target),
            _ => None,
        })
        .collect();
    assert_eq!(released, [c1]);
}

#[test]
fn binding_rejects_non_numeric_targets() {
    let mut s = Session::default();
    let osc = s.add_node(NodeKind::Oscillator);
    let sink = s.add_node(NodeKind::Sink);

    assert_eq!(
        s.bind(LEFT_X, ControlTarget::new(osc, Param::Waveform)),
        Err(ParamError::NotNumeric { param: Param::Waveform })
    );
    assert!(matches!(
        s.bind(LEFT_X, ControlTarget::new(sink, Param::Coarse)),
        Err(ParamError::UnknownParam { .. })
    ));
    s.remove_node(sink);
    assert_eq!(
        s.bind(LEFT_X, ControlTarget::new(sink, Param::Gain)),
        Err(ParamError::UnknownNode(sink))
    );
}

#[test]
fn removing_a_node_drops_its_bindings_and_subscriptions() {
    let mut s = Session::default();
    let (osc, filter, _) = chain(&mut s);
    s.bind(LEFT_X, ControlTarget::new(filter, Param::Q)).unwrap();

    s.remove_node(filter);
    assert!(s.router().bindings().is_empty());
    assert_eq!(s.hub().count_for(filter), 0);
    assert!(s.hub().count_for(osc) > 0);

    s.clear();
    assert!(s.hub().is_empty());
    assert!(s.adapters().is_empty());
    assert_eq!(s.graph().node_count(), 0);
}

#[test]
fn malformed_frames_are_rejected() {
    let mut s = Session::default();
    assert_eq!(
        s.handle_frame(&[0x1; 12]),
        Err(FrameError::Length { expected: 17, actual: 12 })
    );
    assert_eq!(s.last_pose(), None);
}

#[test]
fn playing_chain_is_audible_until_paused() {
    let mut s = Session::new(Config::default().with_channels(2));
    let mut output = s.take_output().unwrap();
    chain(&mut s);

    s.render();
    assert!(drain(&mut output).iter().all(|x| *x == 0.0));

    s.play();
    for _ in 0..4 {
        assert!(s.render());
    }
    let loud = drain(&mut output);
    assert_eq!(loud.len(), 4 * 64 * 2);
    assert!(loud.iter().any(|x| x.abs() > 1e-3));

    s.pause();
    assert!(!s.render());
    assert!(drain(&mut output).is_empty());

    s.pause();
    assert!(s.render());
    assert_eq!(drain(&mut output).len(), 64 * 2);
}

#[test]
fn listeners_see_transport_events() {
    let mut s = Session::default();
    let log = record(&mut s);
    s.play();
    s.pause();
    s.stop();
    s.replace_context();

    let transport: Vec<_> = log
        .borrow()
        .iter()
        .filter_map(|e| match e {
            SessionEvent::Transport(t) => Some(*t),
            _ => None,
        })
        .collect();
    assert_eq!(transport.len(), 4);
    assert_eq!(transport[0], TransportEvent::Play);
    assert_eq!(transport[1], TransportEvent::Pause { paused: true });
    assert_eq!(transport[2], TransportEvent::Stop);
    assert!(matches!(transport[3], TransportEvent::ContextReplaced { .. }));
}

#[test]
fn lost_pose_link_retries_after_a_fixed_delay() {
    let mut s = Session::new(Config::default().with_reconnect_delay(Duration::from_millis(250)));

    let delays: Vec<_> = (0..3).map(|_| s.connectivity(ConnectivityEvent::Disconnected)).collect();
    assert_eq!(delays, [Some(Duration::from_millis(250)); 3]);
    assert_eq!(s.link().attempts(), 3);

    assert_eq!(s.connectivity(ConnectivityEvent::Connected), None);
    assert_eq!(s.link().state(), LinkState::Connected);
    assert_eq!(s.link().attempts(), 0);
}

#[test]
fn parameter_flood_between_renders_lands_the_last_value() {
    let mut s = Session::default();
    let osc = s.add_node(NodeKind::Oscillator);

    for coarse in 1..=70 {
        s.set_parameter(osc, Param::Coarse, coarse as f32).unwrap();
    }
    s.render();

    let (freq, _) = oscillator_of(&s, osc);
    assert!((freq - 440.0 * 2f32.powf(70.0 / 12.0)).abs() < 0.5, "{freq}");
}

#[test]
fn breaking_a_loop_wires_the_surviving_direction() {
    let mut s = Session::default();
    let a = s.add_node(NodeKind::Filter);
    let b = s.add_node(NodeKind::Filter);
    let forward = connect(&mut s, a, b);
    connect(&mut s, b, a);
    assert!(!is_wired(&s, b, a));

    s.remove_connection(forward);

    assert_eq!(s.adapter(b).unwrap().outputs(), [a]);
    assert!(is_wired(&s, b, a));
    assert!(!is_wired(&s, a, b));
}

#[test]
fn rebuilds_restore_node_parameters() {
    let mut s = Session::default();
    let (osc, filter, sink) = chain(&mut s);
    s.set_parameter(osc, Param::Coarse, 5.0_f32).unwrap();
    s.set_parameter(osc, Param::Fine, 0.25_f32).unwrap();
    s.set_parameter(osc, Param::Waveform, Waveform::Square).unwrap();
    s.set_parameter(filter, Param::Frequency, 10.0_f32).unwrap();
    s.set_parameter(filter, Param::Q, 2.0_f32).unwrap();
    s.set_parameter(sink, Param::Gain, 0.25_f32).unwrap();
    let tokens: Vec<_> = [osc, filter, sink].iter().map(|id| s.hub().count_for(*id)).collect();

    let check = |s: &Session| {
        let ctx = s.transport().context();
        let o = ctx
            .primitive(s.adapter(osc).and_then(|a| a.output_point()).unwrap())
            .and_then(Primitive::as_oscillator)
            .unwrap();
        assert!((o.frequency() - 440.0 * 2f32.powf(5.25 / 12.0)).abs() < 0.01, "{}", o.frequency());
        assert_eq!(o.waveform(), Waveform::Square);

        let f = ctx
            .primitive(s.adapter(filter).and_then(|a| a.input_point()).unwrap())
            .and_then(Primitive::as_biquad)
            .unwrap();
        assert!((f.frequency() - 1024.0).abs() < 1e-3);
        assert_eq!(f.q(), 2.0);

        let g = ctx
            .primitive(s.adapter(sink).and_then(|a| a.input_point()).unwrap())
            .and_then(Primitive::as_gain)
            .unwrap();
        assert_eq!(g.gain(), 0.25);

        let now: Vec<_> = [osc, filter, sink].iter().map(|id| s.hub().count_for(*id)).collect();
        assert_eq!(now, tokens);
    };

    s.replace_context();
    check(&s);

    s.play();
    s.stop();
    check(&s);
    assert!(is_wired(&s, osc, filter));
}
