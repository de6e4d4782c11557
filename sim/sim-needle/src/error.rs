//! Error types for needle interaction.

use sim_deformable::DeformableError;
use sim_types::{BodyId, SimError};
use thiserror::Error;

/// Errors raised while assembling a needle interaction.
///
/// Per-step geometry never fails: degenerate cases are skipped. These
/// errors cover construction and mismatched inputs only.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NeedleError {
    /// The detector's two index lists have different lengths.
    #[error("collision index lists differ in length: {tissue} tissue cells, {needle} needle cells")]
    MismatchedElementLists {
        /// Number of tissue cell indices.
        tissue: usize,
        /// Number of needle cell indices.
        needle: usize,
    },

    /// Collision data was produced for a different tissue object.
    #[error("collision data for {data} passed with tissue {tissue}")]
    TissueMismatch {
        /// Tissue named by the collision data.
        data: BodyId,
        /// Tissue passed to the step.
        tissue: BodyId,
    },

    /// Tip and tail of the needle coincide.
    #[error("degenerate needle: tip and tail coincide")]
    DegenerateNeedle,

    /// Configuration or state error.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// Tissue mesh error.
    #[error(transparent)]
    Deformable(#[from] DeformableError),
}

/// Result type for needle interaction.
pub type Result<T> = std::result::Result<T, NeedleError>;
