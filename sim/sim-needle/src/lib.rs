//! Needle-tissue contact, puncture and embedding.
//!
//! This crate turns collision detector output between a rigid straight
//! needle and a deformable tetrahedral tissue into constraints for both
//! solvers, and tracks the needle's state against each tissue:
//!
//! ```text
//!   REMOVED ──contact──▶ TOUCHING ──inward force > threshold──▶ INSERTED
//!      ▲                    │                                      │
//!      └────contact lost────┘                                      │
//!      └──────────────────no pierced face left─────────────────────┘
//! ```
//!
//! - **Touching**: surface contact rows for the needle
//!   ([`NeedleRbdHandler`]) and contact constraints for the tissue
//!   ([`NeedlePbdHandler`])
//! - **Inserted**: the [`NeedleEmbedder`] keeps one
//!   [`EmbeddingConstraint`] per pierced tetrahedron face, each queued into
//!   both solvers through its [`EmbeddingPbdConstraint`] and
//!   [`EmbeddingRbdConstraint`] views
//!
//! [`NeedleInteraction::step`] runs the whole pipeline for one needle and
//! one tissue; the state decision itself is the pure [`decide_transition`].
//!
//! # Embedding
//!
//! An embedding constraint anchors two material points at the moment the
//! shaft crosses a face: barycentric weights on the triangle and a line
//! parameter on the needle. Both follow their bodies, so rigid co-motion
//! of needle and tissue leaves the constraint satisfied.
//!
//! ```text
//! correction split:  tissue ← compliance      needle ← 1 - compliance
//! ```
//!
//! # Example
//!
//! ```
//! use sim_needle::{
//!     CollisionData, CollisionState, NeedleInteraction, NeedleInteractionConfig,
//!     StraightNeedle,
//! };
//! use sim_contact::RbdConstraintQueue;
//! use sim_deformable::{PbdConstraintQueue, TetrahedralMesh, TissueObject};
//! use sim_types::{BodyId, MassProperties, Pose, RigidBody, RigidBodyState};
//! use nalgebra::Point3;
//!
//! let mesh = TetrahedralMesh::new(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!         Point3::new(0.0, 0.0, -1.0),
//!     ],
//!     vec![[0, 1, 2, 3]],
//! )
//! .unwrap();
//! let tissue = TissueObject::new(BodyId::new(1), "liver", mesh);
//!
//! let body = RigidBody::new(
//!     BodyId::new(2),
//!     RigidBodyState::at_rest(Pose::from_position(Point3::new(0.2, 0.2, 0.5))),
//!     MassProperties::cylinder(0.01, 0.001, 0.5),
//! );
//! let mut needle = StraightNeedle::new(
//!     body,
//!     Point3::new(0.0, 0.0, -0.5),
//!     Point3::new(0.0, 0.0, 0.5),
//! )
//! .unwrap();
//!
//! let mut interaction = NeedleInteraction::new(NeedleInteractionConfig::default()).unwrap();
//! let mut pbd = PbdConstraintQueue::new();
//! let mut rbd = RbdConstraintQueue::new();
//!
//! // The detector reported nothing this step.
//! let data = CollisionData::new(tissue.id);
//! let report = interaction
//!     .step(&mut needle, &tissue, &data, &mut pbd, &mut rbd, 0.01)
//!     .unwrap();
//! assert_eq!(report.state, CollisionState::Removed);
//! ```
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in:
//!
//! - Headless surgical simulation loops
//! - Haptic rendering threads
//! - Training data generation

#![doc(html_root_url = "https://docs.rs/sim-needle/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(clippy::missing_const_for_fn, clippy::module_name_repetitions)]

pub mod collision_data;
pub mod config;
pub mod embedder;
pub mod embedding;
pub mod error;
pub mod geometry;
pub mod interaction;
pub mod needle;
pub mod pbd_handler;
pub mod rbd_handler;
pub mod state;
pub mod tri_cell;

pub use collision_data::{CollisionData, CollisionElement, NeedleCell, ResolvedContact, TissueCell};
pub use config::{InsertedBehavior, NeedleInteractionConfig};
pub use embedder::{EmbedderUpdate, NeedleEmbedder};
pub use embedding::{EmbeddingConstraint, EmbeddingPbdConstraint, EmbeddingRbdConstraint};
pub use error::{NeedleError, Result};
pub use interaction::{NeedleInteraction, StepReport};
pub use needle::{NeedleEnd, NeedleLine, StraightNeedle};
pub use pbd_handler::NeedlePbdHandler;
pub use rbd_handler::{NeedleRbdHandler, PunctureRecord};
pub use state::{decide_transition, inward_force, CollisionState, TransitionInput};
pub use tri_cell::TriCell;
