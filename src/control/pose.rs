use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::config::PoseConfig;
use crate::error::FrameError;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Hand {
    Left,
    Right,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    X,
    Y,
}

/// One controllable input: an axis of a hand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct HandAxis {
    pub hand: Hand,
    pub axis: Axis,
}

impl HandAxis {
    pub const fn new(hand: Hand, axis: Axis) -> Self {
        Self { hand, axis }
    }
}

/// Normalized hand position.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn axis(&self, axis: Axis) -> f32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }
}

/// One pose sample. A hand that was not detected is `None`.
#[derive(Clone, Copy, PartialEq, Debug, Default)]
pub struct Pose {
    pub left: Option<Point>,
    pub right: Option<Point>,
}

impl Pose {
    pub fn hand(&self, hand: Hand) -> Option<Point> {
        match hand {
            Hand::Left => self.left,
            Hand::Right => self.right,
        }
    }

    /// The value of one hand axis, if that hand is present.
    pub fn value(&self, axis: HandAxis) -> Option<f32> {
        self.hand(axis.hand).map(|p| p.axis(axis.axis))
    }
}

/// Decoder for binary pose frames.
///
/// A frame is a presence mask byte followed by four little-endian `f32`s:
/// left x, left y, right x, right y. Positions are fixed whether or not the
/// hand is present.
pub struct PoseDecoder {
    frame_len: usize,
    left_mask: u8,
    right_mask: u8,
    last: Option<Pose>,
}

impl PoseDecoder {
    pub fn new(config: &PoseConfig) -> Self {
        Self {
            frame_len: config.frame_len,
            left_mask: config.left_mask,
            right_mask: config.right_mask,
            last: None,
        }
    }

    pub fn decode(&mut self, frame: &[u8]) -> Result<Pose, FrameError> {
        if frame.len() != self.frame_len || frame.len() < 17 {
            return Err(FrameError::Length {
                expected: self.frame_len,
                actual: frame.len(),
            });
        }

        let mask = frame[0];
        let f = |at: usize| f32::from_le_bytes([frame[at], frame[at + 1], frame[at + 2], frame[at + 3]]);
        // a hand is present only when every bit of its mask is set
        let left = (mask & self.left_mask == self.left_mask).then(|| Point { x: f(1), y: f(5) });
        let right = (mask & self.right_mask == self.right_mask).then(|| Point { x: f(9), y: f(13) });

        let pose = Pose { left, right };
        trace!(?pose, "decoded pose frame");
        self.last = Some(pose);
        Ok(pose)
    }

    /// The most recently decoded pose.
    pub fn last_pose(&self) -> Option<Pose> {
        self.last
    }
}

/// Encode a pose the way [`PoseDecoder`] expects it, with the default masks.
pub fn encode_frame(pose: &Pose) -> [u8; 17] {
    let mut frame = [0u8; 17];
    let mut put = |at: usize, v: f32| frame[at..at + 4].copy_from_slice(&v.to_le_bytes());
    let left = pose.left.unwrap_or_default();
    let right = pose.right.unwrap_or_default();
    put(1, left.x);
    put(5, left.y);
    put(9, right.x);
    put(13, right.y);
    frame[0] = pose.left.map_or(0, |_| 0x1) | pose.right.map_or(0, |_| 0x2);
    frame
}
