use tracing::{debug, trace};

use crate::control::{HandAxis, Pose};
use crate::patch::{NodeId, Param};

/// A numeric node parameter driven by a hand axis.
///
/// A missing `min` is 0 and a missing `max` is `max(min, 1)`.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ControlTarget {
    pub node: NodeId,
    pub param: Param,
    pub min: Option<f32>,
    pub max: Option<f32>,
    pub step: Option<f32>,
}

impl ControlTarget {
    pub fn new(node: NodeId, param: Param) -> Self {
        Self {
            node,
            param,
            min: None,
            max: None,
            step: None,
        }
    }

    pub fn with_range(mut self, min: f32, max: f32) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    pub fn with_step(mut self, step: f32) -> Self {
        self.step = Some(step);
        self
    }

    /// Whether both name the same control, regardless of range.
    pub fn same_control(&self, other: &ControlTarget) -> bool {
        self.node == other.node && self.param == other.param
    }

    /// Map a normalized axis value into the target's range.
    pub fn interpolate(&self, value: f32) -> f32 {
        let min = self.min.unwrap_or(0.0);
        let max = self.max.unwrap_or(min.max(1.0));
        let scaled = (max - min) * value + min;
        match self.step {
            Some(step) if step > 0.0 => step * (scaled / step).floor(),
            _ => scaled,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Binding {
    pub axis: HandAxis,
    pub target: ControlTarget,
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub enum ControlEvent {
    Bound(Binding),
    Unbound(HandAxis),
    /// The control lost its hand axis
    TargetReleased(Binding),
}

/// A value the router wants written into a node parameter.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct ControlPush {
    pub node: NodeId,
    pub param: Param,
    pub value: f32,
}

/// Hand-axis bindings. At most one per axis and one per control.
#[derive(Default)]
pub struct Router {
    bindings: Vec<Binding>,
    events: Vec<ControlEvent>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `axis` to `target`, evicting whatever either was bound to.
    pub fn bind(&mut self, axis: HandAxis, target: ControlTarget) {
        self.unbind(axis);
        if let Some(existing) = self.bindings.iter().find(|b| b.target.same_control(&target)).map(|b| b.axis) {
            self.unbind(existing);
        }

        let binding = Binding { axis, target };
        debug!(?axis, node = %target.node, param = ?target.param, "hand axis bound");
        self.bindings.push(binding);
        self.events.push(ControlEvent::Bound(binding));
    }

    /// Remove the binding of `axis`. Returns its target.
    pub fn unbind(&mut self, axis: HandAxis) -> Option<ControlTarget> {
        let pos = self.bindings.iter().position(|b| b.axis == axis)?;
        let binding = self.bindings.remove(pos);
        debug!(?axis, node = %binding.target.node, "hand axis unbound");
        self.events.push(ControlEvent::TargetReleased(binding));
        self.events.push(ControlEvent::Unbound(axis));
        Some(binding.target)
    }

    /// Drop every binding that targets `node`.
    pub fn unbind_node(&mut self, node: NodeId) -> usize {
        let axes: Vec<HandAxis> = self
            .bindings
            .iter()
            .filter(|b| b.target.node == node)
            .map(|b| b.axis)
            .collect();
        for axis in &axes {
            self.unbind(*axis);
        }
        axes.len()
    }

    pub fn binding(&self, axis: HandAxis) -> Option<&ControlTarget> {
        self.bindings.iter().find(|b| b.axis == axis).map(|b| &b.target)
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Values to push for one pose sample. Bindings whose hand is absent yield nothing.
    pub fn sample(&self, pose: &Pose) -> Vec<ControlPush> {
        self.bindings
            .iter()
            .filter_map(|b| {
                let raw = pose.value(b.axis)?;
                let value = b.target.interpolate(raw);
                trace!(axis = ?b.axis, raw, value, "hand axis sample");
                Some(ControlPush {
                    node: b.target.node,
                    param: b.target.param,
                    value,
                })
            })
            .collect()
    }

    pub fn take_events(&mut self) -> Vec<ControlEvent> {
        std::mem::take(&mut self.events)
    }
}
