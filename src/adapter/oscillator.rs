use tracing::warn;

use crate::context::{PrimitiveHandle, PrimitiveRef};
use crate::nodes::OscillatorMessage;
use crate::patch::{OscillatorParams, Param};
use crate::transport::Transport;

use super::deliver;

/// Frequency in Hz of a (possibly fractional) MIDI note number.
///
/// ```
/// assert_eq!(handpatch::adapter::note_to_frequency(69.0), 440.0);
/// ```
pub fn note_to_frequency(note: f32) -> f32 {
    440.0 * 2f32.powf((note - 69.0) / 12.0)
}

/// Frequency an oscillator node plays: A4 shifted by its coarse and fine offsets.
pub fn oscillator_frequency(params: &OscillatorParams) -> f32 {
    note_to_frequency(69.0 + params.coarse + params.fine)
}

/// Output-only voice around a one-shot oscillator.
#[derive(Default)]
pub struct OscillatorVoice {
    handle: Option<PrimitiveHandle<OscillatorMessage>>,
    started: bool,
}

impl OscillatorVoice {
    pub(crate) fn setup(&mut self, params: &OscillatorParams, transport: &mut Transport) {
        let handle = transport
            .context_mut()
            .create_oscillator(params.waveform, oscillator_frequency(params));
        self.handle = Some(handle);
        self.started = false;
    }

    pub(crate) fn teardown(&mut self, transport: &mut Transport) {
        if let Some(handle) = self.handle.take() {
            if self.started {
                transport.stop_primitive(handle.target());
            }
            transport.release(handle.target());
        }
        self.started = false;
    }

    pub fn output(&self) -> Option<PrimitiveRef> {
        self.handle.as_ref().map(PrimitiveHandle::target)
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Start the oscillator unless it already runs.
    pub(crate) fn play(&mut self, transport: &mut Transport) -> bool {
        match &self.handle {
            Some(handle) if !self.started => {
                transport.start_primitive(handle.target());
                self.started = true;
                true
            }
            _ => false,
        }
    }

    /// Stop a started oscillator. Returns whether there was anything to stop.
    pub(crate) fn stop(&mut self, transport: &mut Transport) -> bool {
        match &self.handle {
            Some(handle) if self.started => {
                transport.stop_primitive(handle.target());
                true
            }
            _ => false,
        }
    }

    pub(crate) fn apply(&mut self, param: Param, params: &OscillatorParams, transport: &mut Transport) {
        let Some(handle) = self.handle.as_mut() else {
            return;
        };
        let msg = match param {
            Param::Waveform => OscillatorMessage::SetWaveform(params.waveform),
            Param::Coarse | Param::Fine => OscillatorMessage::SetFrequency(oscillator_frequency(params)),
            _ => return,
        };
        if !deliver(handle, msg, transport) {
            warn!(?param, "oscillator update could not be queued");
        }
    }
}
