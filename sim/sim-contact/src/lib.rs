//! Rigid side of needle interaction: velocity-level constraint rows.
//!
//! This crate provides the constraint objects collision handling hands to
//! the rigid body solver for a needle (or any slender tool):
//!
//! - [`RbdContactConstraint`] - non-penetration with Baumgarte bias
//! - [`RbdFrictionConstraint`] - tangential friction bounded by a [`FrictionCone`]
//! - [`RbdLineLockConstraint`] / [`RbdAngularLockConstraint`] - axis locking at a puncture point
//!
//! All rows implement [`RbdConstraint`] and are collected per step in an
//! [`RbdConstraintQueue`].
//!
//! # Contact Model
//!
//! Each row constrains one scalar velocity `J · v` towards a bias velocity:
//!
//! ```text
//! J · v → vu,   vu = depth * β / dt
//! ```
//!
//! Where:
//! - `J` = 3×4 Jacobian block `[linear_a | angular_a | linear_b | angular_b]`
//! - `depth` = penetration depth (positive when overlapping)
//! - `β` = Baumgarte factor (fraction of error removed per step)
//!
//! The tangential friction impulse uses a friction cone:
//!
//! ```text
//! |λ_t| ≤ μ * λ_n
//! ```
//!
//! Where `μ` is the friction coefficient.
//!
//! # Example
//!
//! ```
//! use sim_contact::{ContactPoint, RbdConstraintQueue, RbdContactConstraint};
//! use sim_types::{BodyId, MassProperties, Pose, RigidBody, RigidBodyState, Twist};
//! use nalgebra::{Point3, Vector3};
//!
//! let mut needle = RigidBody::new(
//!     BodyId::new(0),
//!     RigidBodyState::new(Pose::identity(), Twist::linear(Vector3::new(0.0, 0.0, -1.0))),
//!     MassProperties::isotropic(1.0, 0.01),
//! );
//!
//! // Contact from narrow-phase conversion: push the needle up
//! let contact = ContactPoint::new(
//!     Point3::origin(),
//!     Vector3::z(),
//!     0.001,
//!     BodyId::new(0),
//!     BodyId::new(1),
//! )
//! .unwrap();
//!
//! let mut queue = RbdConstraintQueue::new();
//! queue.push(Box::new(RbdContactConstraint::new(&needle, contact, 0.05)));
//! queue.solve_velocities(&mut needle, 0.01, 4);
//!
//! assert!(needle.state.twist.linear.z >= 0.0); // No longer approaching
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//!
//! - Headless surgical simulation loops
//! - Haptic rendering threads
//! - Analysis tools
//! - Other physics engines

#![doc(html_root_url = "https://docs.rs/sim-contact/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn)]

mod constraint;
mod contact;
mod friction;
mod lock;
mod queue;

pub use constraint::{
    baumgarte_rate, single_body_jacobian, ImpulseRange, RbdConstraint, RbdConstraintKind,
    RbdContactConstraint, RbdFrictionConstraint,
};
pub use contact::ContactPoint;
pub use friction::FrictionCone;
pub use lock::{orthonormal_pair, RbdAngularLockConstraint, RbdLineLockConstraint};
pub use queue::{AppliedImpulse, RbdConstraintQueue};

// Re-export types needed for contact computation
pub use sim_types::{BodyId, Pose, RigidBody, RigidBodyState, Twist, Vector3};
