use tracing::warn;

use crate::context::{PrimitiveHandle, PrimitiveRef};
use crate::nodes::GainMessage;
use crate::patch::{Param, SinkParams};
use crate::transport::Transport;

use super::deliver;

/// Input-only voice: a gain stage feeding the context destination.
#[derive(Default)]
pub struct SinkVoice {
    handle: Option<PrimitiveHandle<GainMessage>>,
    destination: Option<PrimitiveRef>,
}

impl SinkVoice {
    pub(crate) fn setup(&mut self, params: &SinkParams, transport: &mut Transport) {
        let ctx = transport.context_mut();
        let handle = ctx.create_gain(params.gain);
        let destination = ctx.destination();
        ctx.connect(handle.target(), destination);
        self.handle = Some(handle);
        self.destination = Some(destination);
    }

    pub(crate) fn teardown(&mut self, transport: &mut Transport) {
        if let Some(handle) = self.handle.take() {
            if let Some(destination) = self.destination.take() {
                transport.disconnect(handle.target(), destination);
            }
            transport.release(handle.target());
        }
    }

    pub fn input(&self) -> Option<PrimitiveRef> {
        self.handle.as_ref().map(PrimitiveHandle::target)
    }

    pub(crate) fn apply(&mut self, param: Param, params: &SinkParams, transport: &mut Transport) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        if param != Param::Gain {
            return;
        }
        if !deliver(handle, GainMessage::SetGain(params.gain), transport) {
            warn!("sink update could not be queued");
        }
    }
}
