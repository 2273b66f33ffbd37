use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ParamError;
use crate::nodes::{FilterType, Waveform};
use crate::patch::{Direction, Payload, Socket, SocketId};

/// Identity of a logical node. Never reused within one graph.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct NodeId(pub(crate) u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeKind {
    Oscillator,
    Filter,
    Sink,
}

/// A named parameter of some node kind.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Param {
    Waveform,
    /// Semitone offset from A4
    Coarse,
    /// Fractional semitone offset
    Fine,
    FilterType,
    /// Cutoff as a base-2 exponent
    Frequency,
    Q,
    Gain,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ParamValue {
    Number(f32),
    Waveform(Waveform),
    FilterType(FilterType),
}

impl From<f32> for ParamValue {
    fn from(v: f32) -> Self {
        ParamValue::Number(v)
    }
}

impl From<Waveform> for ParamValue {
    fn from(v: Waveform) -> Self {
        ParamValue::Waveform(v)
    }
}

impl From<FilterType> for ParamValue {
    fn from(v: FilterType) -> Self {
        ParamValue::FilterType(v)
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OscillatorParams {
    pub waveform: Waveform,
    pub coarse: f32,
    pub fine: f32,
}

impl Default for OscillatorParams {
    fn default() -> Self {
        Self {
            waveform: Waveform::Sine,
            coarse: 0.0,
            fine: 0.0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterParams {
    pub kind: FilterType,
    pub frequency: f32,
    pub q: f32,
    pub gain: f32,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            kind: FilterType::Lowpass,
            frequency: 14.3,
            q: 0.0,
            gain: 1.0,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkParams {
    pub gain: f32,
}

impl Default for SinkParams {
    fn default() -> Self {
        Self { gain: 1.0 }
    }
}

/// Parameters of a node; the variant is the node's kind.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Params {
    Oscillator(OscillatorParams),
    Filter(FilterParams),
    Sink(SinkParams),
}

impl Params {
    /// Default parameters for `kind`.
    pub fn default_for(kind: NodeKind) -> Self {
        match kind {
            NodeKind::Oscillator => Params::Oscillator(OscillatorParams::default()),
            NodeKind::Filter => Params::Filter(FilterParams::default()),
            NodeKind::Sink => Params::Sink(SinkParams::default()),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Params::Oscillator(_) => NodeKind::Oscillator,
            Params::Filter(_) => NodeKind::Filter,
            Params::Sink(_) => NodeKind::Sink,
        }
    }

    pub fn get(&self, param: Param) -> Option<ParamValue> {
        let value = match (self, param) {
            (Params::Oscillator(p), Param::Waveform) => ParamValue::Waveform(p.waveform),
            (Params::Oscillator(p), Param::Coarse) => ParamValue::Number(p.coarse),
            (Params::Oscillator(p), Param::Fine) => ParamValue::Number(p.fine),
            (Params::Filter(p), Param::FilterType) => ParamValue::FilterType(p.kind),
            (Params::Filter(p), Param::Frequency) => ParamValue::Number(p.frequency),
            (Params::Filter(p), Param::Q) => ParamValue::Number(p.q),
            (Params::Filter(p), Param::Gain) => ParamValue::Number(p.gain),
            (Params::Sink(p), Param::Gain) => ParamValue::Number(p.gain),
            _ => return None,
        };
        Some(value)
    }

    /// Whether `param` exists on this kind and takes a number.
    pub fn is_numeric(&self, param: Param) -> bool {
        matches!(self.get(param), Some(ParamValue::Number(_)))
    }

    /// Store `value` into `param`, checking that both fit this kind.
    pub fn set(&mut self, param: Param, value: ParamValue) -> Result<(), ParamError> {
        if self.get(param).is_none() {
            return Err(ParamError::UnknownParam { kind: self.kind(), param });
        }
        match (self, param, value) {
            (Params::Oscillator(p), Param::Waveform, ParamValue::Waveform(v)) => p.waveform = v,
            (Params::Oscillator(p), Param::Coarse, ParamValue::Number(v)) => p.coarse = v,
            (Params::Oscillator(p), Param::Fine, ParamValue::Number(v)) => p.fine = v,
            (Params::Filter(p), Param::FilterType, ParamValue::FilterType(v)) => p.kind = v,
            (Params::Filter(p), Param::Frequency, ParamValue::Number(v)) => p.frequency = v,
            (Params::Filter(p), Param::Q, ParamValue::Number(v)) => p.q = v,
            (Params::Filter(p), Param::Gain, ParamValue::Number(v)) => p.gain = v,
            (Params::Sink(p), Param::Gain, ParamValue::Number(v)) => p.gain = v,
            _ => return Err(ParamError::TypeMismatch { param }),
        }
        Ok(())
    }
}

impl From<OscillatorParams> for Params {
    fn from(p: OscillatorParams) -> Self {
        Params::Oscillator(p)
    }
}

impl From<FilterParams> for Params {
    fn from(p: FilterParams) -> Self {
        Params::Filter(p)
    }
}

impl From<SinkParams> for Params {
    fn from(p: SinkParams) -> Self {
        Params::Sink(p)
    }
}

impl From<NodeKind> for Params {
    fn from(kind: NodeKind) -> Self {
        Params::default_for(kind)
    }
}

/// A logical node: parameters plus typed sockets.
#[derive(Clone, Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) params: Params,
    pub(crate) sockets: Vec<Socket>,
}

impl Node {
    pub(crate) fn new(id: NodeId, params: Params) -> Self {
        let mut node = Self {
            id,
            params,
            sockets: Vec::new(),
        };
        match params.kind() {
            NodeKind::Oscillator => {
                node.push_socket(Payload::Audio, Direction::Out);
            }
            NodeKind::Filter => {
                node.push_socket(Payload::Audio, Direction::In);
                node.push_socket(Payload::Audio, Direction::Out);
            }
            NodeKind::Sink => {
                node.push_socket(Payload::Audio, Direction::In);
            }
        }
        node
    }

    pub(crate) fn push_socket(&mut self, payload: Payload, direction: Direction) -> SocketId {
        let id = SocketId {
            node: self.id,
            slot: self.sockets.len() as u16,
        };
        self.sockets.push(Socket::new(id, payload, direction));
        id
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> NodeKind {
        self.params.kind()
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn sockets(&self) -> &[Socket] {
        &self.sockets
    }

    pub fn socket(&self, slot: u16) -> Option<&Socket> {
        self.sockets.get(slot as usize)
    }

    pub(crate) fn socket_mut(&mut self, slot: u16) -> Option<&mut Socket> {
        self.sockets.get_mut(slot as usize)
    }

    /// Sockets that accept incoming connections (`In` and `Both`).
    pub fn inputs(&self) -> impl Iterator<Item = &Socket> {
        self.sockets.iter().filter(|s| s.direction() != Direction::Out)
    }

    /// Sockets that originate connections (`Out` and `Both`).
    pub fn outputs(&self) -> impl Iterator<Item = &Socket> {
        self.sockets.iter().filter(|s| s.direction() != Direction::In)
    }
}
