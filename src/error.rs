//! Error types.

use crate::patch::{NodeId, NodeKind, Param};

/// Rejected parameter writes and control bindings.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("no node {0}")]
    UnknownNode(NodeId),

    #[error("{kind:?} nodes have no {param:?} parameter")]
    UnknownParam { kind: NodeKind, param: Param },

    #[error("value of the wrong type for {param:?}")]
    TypeMismatch { param: Param },

    #[error("{param:?} is not numeric and cannot be hand-controlled")]
    NotNumeric { param: Param },
}

/// A pose frame that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("pose frame is {actual} bytes, expected {expected}")]
    Length { expected: usize, actual: usize },
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to write config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Failures opening an output device.
#[cfg(feature = "cpal_sink")]
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("no output device available")]
    NoDevice,

    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),

    #[error(transparent)]
    Build(#[from] cpal::BuildStreamError),

    #[error(transparent)]
    Play(#[from] cpal::PlayStreamError),

    #[error(transparent)]
    Pause(#[from] cpal::PauseStreamError),
}
