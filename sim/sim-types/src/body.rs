//! Rigid body state types.
//!
//! A rigid body here is what collision handling sees of the needle: a pose,
//! a twist, mass properties for the constraint rows, and the external load
//! the rigid body solver accumulated over the previous step.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifier of a simulated object, rigid or deformable.
///
/// Identifiers are opaque arena indices. Holding a `BodyId` never keeps
/// the object alive, so a destroyed tissue simply stops matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BodyId(pub u64);

impl BodyId {
    /// Create a body ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Body({})", self.0)
    }
}

/// Position and orientation of a rigid body.
///
/// # Example
///
/// ```
/// use sim_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(0.0, 0.0, 0.5));
/// let tip = pose.transform_point(&Point3::new(0.0, 0.0, -0.5));
/// assert_eq!(tip, Point3::origin());
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Position in world coordinates.
    pub position: Point3<f64>,
    /// Orientation as a unit quaternion.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// Origin, no rotation.
    #[must_use]
    pub fn identity() -> Self {
        Self::from_position(Point3::origin())
    }

    /// Pose at `position` with identity rotation.
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Body-frame point to world.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.position + self.rotation * local.coords
    }

    /// Body-frame direction to world (rotation only).
    #[must_use]
    pub fn transform_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }
}

/// Linear and angular velocity of a rigid body, both in world coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity of the body origin (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
}

impl Default for Twist {
    fn default() -> Self {
        Self::zero()
    }
}

impl Twist {
    /// Twist from linear and angular parts.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// At rest.
    #[must_use]
    pub fn zero() -> Self {
        Self::new(Vector3::zeros(), Vector3::zeros())
    }

    /// Pure translation.
    #[must_use]
    pub fn linear(v: Vector3<f64>) -> Self {
        Self::new(v, Vector3::zeros())
    }
}

/// Pose and twist of a rigid body.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBodyState {
    /// Position and orientation.
    pub pose: Pose,
    /// Linear and angular velocity.
    pub twist: Twist,
}

impl RigidBodyState {
    /// State from pose and twist.
    #[must_use]
    pub const fn new(pose: Pose, twist: Twist) -> Self {
        Self { pose, twist }
    }

    /// State at rest at `pose`.
    #[must_use]
    pub fn at_rest(pose: Pose) -> Self {
        Self::new(pose, Twist::zero())
    }
}

/// Mass and body-frame inertia of a rigid body.
///
/// An infinite mass marks a kinematic body, such as a needle driven
/// directly by a haptic device: constraint rows then leave it unmoved.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass in kg.
    pub mass: f64,
    /// Inertia tensor about the body origin in body coordinates (kg·m²).
    pub inertia: Matrix3<f64>,
}

impl MassProperties {
    /// Mass properties from explicit values.
    #[must_use]
    pub const fn new(mass: f64, inertia: Matrix3<f64>) -> Self {
        Self { mass, inertia }
    }

    /// Isotropic inertia `I = k * Id`.
    #[must_use]
    pub fn isotropic(mass: f64, inertia: f64) -> Self {
        Self::new(mass, Matrix3::from_diagonal_element(inertia))
    }

    /// Uniform cylinder along the body z axis, the usual needle shaft model.
    ///
    /// - Ixx = Iyy = (1/12) * m * (3r² + h²)
    /// - Izz = (1/2) * m * r²
    #[must_use]
    pub fn cylinder(mass: f64, radius: f64, half_height: f64) -> Self {
        let r2 = radius * radius;
        let h2 = 4.0 * half_height * half_height;
        let ixx = mass * (3.0 * r2 + h2) / 12.0;
        let izz = 0.5 * mass * r2;
        Self::new(mass, Matrix3::from_diagonal(&Vector3::new(ixx, ixx, izz)))
    }

    /// Inverse mass, 0 for a kinematic body.
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.mass <= 0.0 || self.mass.is_infinite() {
            0.0
        } else {
            1.0 / self.mass
        }
    }

    /// Inverse inertia tensor, zero when singular or kinematic.
    #[must_use]
    pub fn inverse_inertia(&self) -> Matrix3<f64> {
        if self.mass.is_infinite() {
            return Matrix3::zeros();
        }
        self.inertia.try_inverse().unwrap_or_else(Matrix3::zeros)
    }

    /// Check the mass is positive (or infinite) and the inertia is
    /// positive semi-definite.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidMassProperties`](crate::SimError::InvalidMassProperties)
    /// naming the first failed check.
    pub fn validate(&self) -> crate::Result<()> {
        if self.mass.is_nan() || self.mass <= 0.0 {
            return Err(crate::SimError::invalid_mass(
                "mass must be positive, or infinite for a kinematic body",
            ));
        }
        if self.inertia.iter().any(|x| !x.is_finite()) {
            return Err(crate::SimError::invalid_mass("inertia must be finite"));
        }
        let eigenvalues = self.inertia.symmetric_eigenvalues();
        if eigenvalues.iter().any(|&e| e < -1e-10) {
            return Err(crate::SimError::invalid_mass(
                "inertia tensor must be positive semi-definite",
            ));
        }
        Ok(())
    }
}

/// A rigid body as seen by collision handling.
///
/// `force` and `torque` hold the external load accumulated by the rigid
/// body solver during the *previous* step, including resolved contact
/// resistance. Collision handlers read them to detect puncture; they are
/// never written here except by the solver (or by tests standing in for it).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBody {
    /// Identifier of this body.
    pub id: BodyId,
    /// Pose and velocity.
    pub state: RigidBodyState,
    /// Mass and inertia.
    pub mass: MassProperties,
    /// Accumulated external force (world frame, N).
    pub force: Vector3<f64>,
    /// Accumulated external torque (world frame, N·m).
    pub torque: Vector3<f64>,
}

impl RigidBody {
    /// Body at `state` with no accumulated load.
    #[must_use]
    pub fn new(id: BodyId, state: RigidBodyState, mass: MassProperties) -> Self {
        Self {
            id,
            state,
            mass,
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
        }
    }

    /// World position of the body origin.
    #[must_use]
    pub fn position(&self) -> Point3<f64> {
        self.state.pose.position
    }

    /// World orientation.
    #[must_use]
    pub fn orientation(&self) -> UnitQuaternion<f64> {
        self.state.pose.rotation
    }

    /// Velocity of a world-space point rigidly attached to the body:
    /// `v + ω × (p - x)`.
    #[must_use]
    pub fn velocity_at(&self, point: &Point3<f64>) -> Vector3<f64> {
        let twist = &self.state.twist;
        twist.linear + twist.angular.cross(&(point - self.state.pose.position))
    }

    /// Inverse inertia tensor rotated into world coordinates: `R I⁻¹ Rᵀ`.
    #[must_use]
    pub fn world_inverse_inertia(&self) -> Matrix3<f64> {
        let r = self.state.pose.rotation.to_rotation_matrix();
        r.matrix() * self.mass.inverse_inertia() * r.matrix().transpose()
    }

    /// Reset the accumulated load (start of a solver step).
    pub fn clear_forces(&mut self) {
        self.force = Vector3::zeros();
        self.torque = Vector3::zeros();
    }
}
