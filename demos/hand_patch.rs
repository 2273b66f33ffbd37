//! Oscillator -> filter -> speakers, with a synthetic pair of hands sweeping
//! the pitch and the cutoff.
//!
//! Run with: cargo run --example hand_patch --features cpal_sink

use std::thread::sleep;
use std::time::{Duration, Instant};

use handpatch::control::{encode_frame, Point};
use handpatch::{
    Axis, Config, ControlTarget, CpalDevice, Hand, HandAxis, NodeId, NodeKind, Param, Pose, Session, BLOCK_LEN,
};

fn connect(session: &mut Session, from: NodeId, to: NodeId) -> Option<()> {
    let out = session.graph().node(from)?.outputs().next()?.id();
    let inp = session.graph().node(to)?.inputs().next()?.id();
    session.request_connection(out, inp).map(|_| ())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let device = CpalDevice::default_output().ok_or("No audio device")?;
    let config = Config::default()
        .with_sample_rate(device.sample_rate())
        .with_channels(device.channels() as usize);
    let mut session = Session::new(config);
    let stream = device.play(session.take_output().ok_or("output already taken")?)?;

    let osc = session.add_node(NodeKind::Oscillator);
    let filter = session.add_node(NodeKind::Filter);
    let sink = session.add_node(NodeKind::Sink);
    connect(&mut session, osc, filter).ok_or("osc -> filter")?;
    connect(&mut session, filter, sink).ok_or("filter -> sink")?;

    session.set_parameter(filter, Param::Q, 6.0_f32)?;
    session.bind(
        HandAxis::new(Hand::Left, Axis::Y),
        ControlTarget::new(osc, Param::Coarse).with_range(-24.0, 24.0).with_step(1.0),
    )?;
    session.bind(
        HandAxis::new(Hand::Right, Axis::X),
        ControlTarget::new(filter, Param::Frequency).with_range(7.0, 13.0),
    )?;
    session.play();

    println!("Playing on {}... Ctrl+C to stop", device.name());

    let start = Instant::now();
    let rate = device.sample_rate() as f64;
    let mut blocks = 0u64;
    let mut frames = 0u64;

    loop {
        let t = start.elapsed().as_secs_f32();

        // ~30 pose frames per second, the right hand drops out now and then
        if (t * 30.0) as u64 > frames {
            frames += 1;
            let pose = Pose {
                left: Some(Point { x: 0.5, y: 0.5 + 0.5 * (t * 0.7).sin() }),
                right: ((t as u64) % 5 != 4).then(|| Point { x: 0.5 + 0.5 * (t * 0.23).sin(), y: 0.5 }),
            };
            session.handle_frame(&encode_frame(&pose))?;
        }

        let target = (start.elapsed().as_secs_f64() * rate / BLOCK_LEN as f64) as u64 + 6;
        while blocks < target {
            session.render();
            blocks += 1;
        }
        if stream.check_underrun() {
            eprintln!("underrun");
        }
        sleep(Duration::from_micros(500));
    }
}
