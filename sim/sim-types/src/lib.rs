//! Core types shared by the needle interaction crates.
//!
//! This crate provides the foundational rigid body types:
//!
//! - [`BodyId`] - Opaque handle for rigid and deformable objects
//! - [`RigidBodyState`] - Position, orientation, velocity of rigid bodies
//! - [`MassProperties`] - Mass and inertia
//! - [`RigidBody`] - A body plus its accumulated external load
//! - [`SimError`] - Timestep, configuration and mass errors
//!
//! # Design Philosophy
//!
//! These types are **pure data**. They carry no solver and no integration.
//! They're the common language between:
//!
//! - The rigid body constraint rows in `sim-contact`
//! - The position based tissue model in `sim-deformable`
//! - The needle state machine and embedding in `sim-needle`
//!
//! # Layer 0
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//!
//! - Headless simulation loops
//! - Hardware-in-the-loop haptics
//! - Analysis tools
//!
//! # Coordinate System
//!
//! - X: right
//! - Y: forward
//! - Z: up
//! - Right-handed
//!
//! # Example
//!
//! ```
//! use sim_types::{RigidBodyState, Pose, Twist};
//! use nalgebra::{Point3, Vector3};
//!
//! // Create a body at rest at the origin
//! let state = RigidBodyState::new(
//!     Pose::from_position(Point3::new(0.0, 0.0, 1.0)),
//!     Twist::zero(),
//! );
//!
//! assert_eq!(state.pose.position.z, 1.0);
//! assert!(state.twist.linear.norm() < 1e-10);
//! ```

#![doc(html_root_url = "https://docs.rs/sim-types/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,     // Many methods can't be const due to nalgebra
    clippy::suboptimal_flops,          // mul_add style changes aren't always clearer
    clippy::missing_errors_doc,        // Error docs added where non-obvious
)]

mod body;
mod error;

pub use body::{BodyId, MassProperties, Pose, RigidBody, RigidBodyState, Twist};
pub use error::SimError;

// Re-export math types for convenience
pub use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};

/// Result type for simulation operations.
pub type Result<T> = std::result::Result<T, SimError>;
