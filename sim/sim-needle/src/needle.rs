//! The rigid straight needle.

use hashbrown::HashMap;
use nalgebra::{Point3, Vector3};
use sim_types::{BodyId, RigidBody};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{NeedleError, Result};
use crate::state::{inward_force, CollisionState};

/// One end of the needle shaft.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NeedleEnd {
    /// Sharp end, enters the tissue first.
    Tip,
    /// Handle end.
    Tail,
}

/// World-space needle segment at one instant.
///
/// The line parameter `t` runs from the tip (`t = 0`) to the tail (`t = 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NeedleLine {
    /// Tip position.
    pub tip: Point3<f64>,
    /// Tail position.
    pub tail: Point3<f64>,
}

impl NeedleLine {
    /// Create a line from its endpoints.
    #[must_use]
    pub const fn new(tip: Point3<f64>, tail: Point3<f64>) -> Self {
        Self { tip, tail }
    }

    /// Point at parameter `t`.
    #[must_use]
    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.tip + (self.tail - self.tip) * t
    }

    /// Position of one end.
    #[must_use]
    pub fn end(&self, end: NeedleEnd) -> Point3<f64> {
        match end {
            NeedleEnd::Tip => self.tip,
            NeedleEnd::Tail => self.tail,
        }
    }

    /// Unit tip-to-tail direction, `None` if the endpoints coincide.
    #[must_use]
    pub fn axis(&self) -> Option<Vector3<f64>> {
        (self.tail - self.tip).try_normalize(1e-10)
    }

    /// Segment length.
    #[must_use]
    pub fn length(&self) -> f64 {
        (self.tail - self.tip).norm()
    }

    /// The same line moved by `offset`.
    #[must_use]
    pub fn translated(&self, offset: &Vector3<f64>) -> Self {
        Self {
            tip: self.tip + offset,
            tail: self.tail + offset,
        }
    }
}

/// A straight rigid needle with one collision state per tissue object.
///
/// The endpoints are stored in the body frame and resolved through the
/// current pose, so they always follow the rigid body.
#[derive(Debug, Clone)]
pub struct StraightNeedle {
    /// The needle's rigid body.
    pub body: RigidBody,
    local_tip: Point3<f64>,
    local_tail: Point3<f64>,
    states: HashMap<BodyId, CollisionState>,
}

impl StraightNeedle {
    /// Create a needle from body-frame tip and tail positions.
    ///
    /// # Errors
    ///
    /// Returns [`NeedleError::DegenerateNeedle`] if tip and tail coincide,
    /// or an error if the body's mass properties are invalid.
    pub fn new(body: RigidBody, local_tip: Point3<f64>, local_tail: Point3<f64>) -> Result<Self> {
        if (local_tail - local_tip).norm() < 1e-10 {
            return Err(NeedleError::DegenerateNeedle);
        }
        body.mass.validate()?;
        Ok(Self {
            body,
            local_tip,
            local_tail,
            states: HashMap::new(),
        })
    }

    /// Body identifier.
    #[must_use]
    pub fn id(&self) -> BodyId {
        self.body.id
    }

    /// World position of one end.
    #[must_use]
    pub fn endpoint(&self, end: NeedleEnd) -> Point3<f64> {
        let local = match end {
            NeedleEnd::Tip => &self.local_tip,
            NeedleEnd::Tail => &self.local_tail,
        };
        self.body.state.pose.transform_point(local)
    }

    /// World tip position.
    #[must_use]
    pub fn tip(&self) -> Point3<f64> {
        self.endpoint(NeedleEnd::Tip)
    }

    /// World tail position.
    #[must_use]
    pub fn tail(&self) -> Point3<f64> {
        self.endpoint(NeedleEnd::Tail)
    }

    /// Current world-space segment.
    #[must_use]
    pub fn line(&self) -> NeedleLine {
        NeedleLine::new(self.tip(), self.tail())
    }

    /// Unit tip-to-tail axis in world coordinates.
    #[must_use]
    pub fn axis(&self) -> Vector3<f64> {
        let local = (self.local_tail - self.local_tip).normalize();
        self.body.state.pose.transform_vector(&local)
    }

    /// `max(axis · force, 0)` of the body's accumulated external force.
    #[must_use]
    pub fn inward_force(&self) -> f64 {
        inward_force(&self.axis(), &self.body.force)
    }

    /// State against `tissue`, creating a `Removed` entry on first query.
    pub fn collision_state(&mut self, tissue: BodyId) -> CollisionState {
        *self.states.entry(tissue).or_default()
    }

    /// State against `tissue` without creating an entry.
    #[must_use]
    pub fn peek_state(&self, tissue: BodyId) -> CollisionState {
        self.states.get(&tissue).copied().unwrap_or_default()
    }

    /// Overwrite the state against `tissue`.
    pub fn set_collision_state(&mut self, tissue: BodyId, state: CollisionState) {
        self.states.insert(tissue, state);
    }

    /// Whether the needle is inserted into any tissue.
    #[must_use]
    pub fn is_inserted(&self) -> bool {
        self.states.values().any(|s| *s == CollisionState::Inserted)
    }

    /// Tissues the needle is currently inserted into.
    pub fn inserted_tissues(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.states
            .iter()
            .filter(|(_, s)| **s == CollisionState::Inserted)
            .map(|(id, _)| *id)
    }

    /// Number of tissues with a state entry.
    #[must_use]
    pub fn tracked_tissues(&self) -> usize {
        self.states.len()
    }
}
