//! Error types for tissue meshes.

use thiserror::Error;

/// Errors raised while building or editing a tissue mesh.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeformableError {
    /// A tetrahedron names a vertex the mesh does not have.
    #[error("tetrahedron {tet} references vertex {vertex} of {count}")]
    MissingVertex {
        /// Tetrahedron index.
        tet: usize,
        /// Offending vertex index.
        vertex: usize,
        /// Number of vertices in the mesh.
        count: usize,
    },

    /// A tetrahedron lists the same vertex twice.
    #[error("tetrahedron {tet} repeats vertex {vertex}")]
    RepeatedVertex {
        /// Tetrahedron index.
        tet: usize,
        /// Repeated vertex index.
        vertex: usize,
    },

    /// Per-vertex buffers disagree in length.
    #[error("{buffer} holds {len} entries for {count} vertices")]
    BufferLength {
        /// Name of the short or long buffer.
        buffer: &'static str,
        /// Its length.
        len: usize,
        /// Number of vertices.
        count: usize,
    },

    /// An inverse mass is negative or not finite.
    #[error("inverse mass of vertex {vertex} must be finite and non-negative")]
    InvalidInverseMass {
        /// Vertex index.
        vertex: usize,
    },

    /// A vertex index passed to an edit is out of range.
    #[error("vertex {vertex} out of range for {count} vertices")]
    VertexOutOfRange {
        /// Requested vertex.
        vertex: usize,
        /// Number of vertices.
        count: usize,
    },
}

/// Result type for tissue mesh operations.
pub type Result<T> = std::result::Result<T, DeformableError>;
