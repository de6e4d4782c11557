//! Tissue side of needle interaction: tetrahedral meshes and position based constraints.
//!
//! This crate provides the data the position based solver integrates and the
//! constraint objects collision handling hands to it:
//!
//! - **Meshes**: [`TetrahedralMesh`] (positions, velocities, inverse masses,
//!   tetrahedra) wrapped in a [`TissueObject`] with a scene [`BodyId`](sim_types::BodyId)
//! - **Constraints**: the [`PbdConstraint`] capability, structural
//!   [`EdgeLengthConstraint`]s and unilateral [`PbdContactConstraint`]s
//! - **Queue**: [`PbdConstraintQueue`], the per-step list the solver consumes
//!
//! # Physics Model
//!
//! Constraints are projected with XPBD (Extended Position-Based Dynamics):
//!
//! ```text
//! For each time step:
//!   1. Predict positions (external solver)
//!   2. For each solver iteration:
//!      a. Solve structural constraints
//!      b. Solve contact and embedding constraints
//!   3. Update velocities: v = (x - x_prev) / dt
//! ```
//!
//! Tetrahedron faces are enumerated in a fixed order:
//!
//! ```text
//!       3
//!      /|\
//!     / | \
//!    0──┼──2      faces: (0,1,2) (1,2,3) (0,2,3) (0,1,3)
//!     \ | /
//!      \|/
//!       1
//! ```
//!
//! # Quick Start
//!
//! ```
//! use sim_deformable::{PbdConstraintQueue, TetrahedralMesh, TissueObject};
//! use sim_types::BodyId;
//! use nalgebra::Point3;
//!
//! let mesh = TetrahedralMesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!         Point3::new(0.0, 0.0, 1.0),
//!     ],
//!     vec![[0, 1, 2, 3]],
//! )
//! .unwrap();
//! let mut tissue = TissueObject::new(BodyId::new(1), "block", mesh);
//!
//! let mut queue = PbdConstraintQueue::new();
//! for c in tissue.edge_constraints(1e-6) {
//!     queue.push(Box::new(c));
//! }
//! queue.project(&mut tissue.mesh, 1.0 / 60.0, 5);
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//!
//! - Headless surgical simulation loops
//! - Haptic rendering threads
//! - Analysis and optimization tools

#![doc(html_root_url = "https://docs.rs/sim-deformable/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
// Allow precision loss when converting indices to f64 - these are small values
#![allow(clippy::cast_precision_loss)]
// Test-related lints - these are style preferences
#![cfg_attr(test, allow(clippy::uninlined_format_args, clippy::float_cmp))]

pub mod constraints;
pub mod contact;
pub mod error;
pub mod geometry;
pub mod mesh;
pub mod queue;

// Re-export main types at crate root
pub use constraints::{ConstraintEval, ConstraintType, EdgeLengthConstraint, PbdConstraint};
pub use contact::{ContactGeometry, PbdContactConstraint};
pub use error::DeformableError;
pub use mesh::{BoundingSphere, TetrahedralMesh, TissueObject, TET_FACES};
pub use queue::PbdConstraintQueue;
