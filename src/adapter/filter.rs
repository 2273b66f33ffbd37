use tracing::warn;

use crate::context::{PrimitiveHandle, PrimitiveRef};
use crate::nodes::BiquadMessage;
use crate::patch::{FilterParams, Param};
use crate::transport::Transport;

use super::deliver;

/// Cutoff in Hz for a base-2 frequency exponent.
pub fn filter_frequency(exponent: f32) -> f32 {
    2f32.powf(exponent)
}

/// A biquad that is both the input and the output of its node.
#[derive(Default)]
pub struct FilterVoice {
    handle: Option<PrimitiveHandle<BiquadMessage>>,
}

impl FilterVoice {
    pub(crate) fn setup(&mut self, params: &FilterParams, transport: &mut Transport) {
        self.handle = Some(transport.context_mut().create_biquad(
            params.kind,
            filter_frequency(params.frequency),
            params.q,
            params.gain,
        ));
    }

    pub(crate) fn teardown(&mut self, transport: &mut Transport) {
        if let Some(handle) = self.handle.take() {
            transport.release(handle.target());
        }
    }

    pub fn primitive(&self) -> Option<PrimitiveRef> {
        self.handle.as_ref().map(PrimitiveHandle::target)
    }

    pub(crate) fn apply(&mut self, param: Param, params: &FilterParams, transport: &mut Transport) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        let msg = match param {
            Param::FilterType => BiquadMessage::SetType(params.kind),
            Param::Frequency => BiquadMessage::SetFrequency(filter_frequency(params.frequency)),
            Param::Q => BiquadMessage::SetQ(params.q),
            Param::Gain => BiquadMessage::SetGain(params.gain),
            _ => return,
        };
        if !deliver(handle, msg, transport) {
            warn!(?param, "filter update could not be queued");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_exponent_is_near_the_top_of_the_band() {
        let hz = filter_frequency(FilterParams::default().frequency);
        assert!((hz - 20_171.0).abs() < 1.0, "{hz}");
    }
}
