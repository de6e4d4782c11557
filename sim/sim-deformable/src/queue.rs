//! The per-step list of constraints handed to the position based solver.

use nalgebra::Point3;

use crate::constraints::{ConstraintType, PbdConstraint};
use crate::mesh::TetrahedralMesh;

/// Solver-owned constraint list for one tissue object.
///
/// Collision handling appends to the queue once per step; the solver
/// iterates it and clears it before the next step.
#[derive(Debug, Default)]
pub struct PbdConstraintQueue {
    constraints: Vec<Box<dyn PbdConstraint>>,
}

impl PbdConstraintQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a constraint.
    pub fn push(&mut self, constraint: Box<dyn PbdConstraint>) {
        self.constraints.push(constraint);
    }

    /// Append several constraints.
    pub fn extend<I>(&mut self, constraints: I)
    where
        I: IntoIterator<Item = Box<dyn PbdConstraint>>,
    {
        self.constraints.extend(constraints);
    }

    /// Number of queued constraints.
    #[must_use]
    pub fn len(&self) -> usize {
        self.constraints.len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.constraints.is_empty()
    }

    /// Number of queued constraints of one kind.
    #[must_use]
    pub fn count_of(&self, kind: ConstraintType) -> usize {
        self.constraints
            .iter()
            .filter(|c| c.constraint_type() == kind)
            .count()
    }

    /// Iterate over queued constraints.
    pub fn iter(&self) -> impl Iterator<Item = &dyn PbdConstraint> {
        self.constraints.iter().map(AsRef::as_ref)
    }

    /// Drop every queued constraint.
    pub fn clear(&mut self) {
        self.constraints.clear();
    }

    /// Gauss-Seidel projection of the queued constraints on `mesh`.
    ///
    /// Resets multipliers, runs `iterations` sweeps, and updates vertex
    /// velocities from the position change. Returns the largest constraint
    /// error seen in the final sweep.
    pub fn project(&mut self, mesh: &mut TetrahedralMesh, dt: f64, iterations: usize) -> f64 {
        let start: Vec<Point3<f64>> = mesh.positions.clone();
        for c in &mut self.constraints {
            c.reset();
        }

        let mut max_error = 0.0_f64;
        for _ in 0..iterations {
            max_error = 0.0;
            for c in &mut self.constraints {
                let err = c.solve(&mut mesh.positions, &mesh.inv_masses, dt);
                max_error = max_error.max(err);
            }
        }

        if dt > 0.0 {
            for ((v, p), p0) in mesh.velocities.iter_mut().zip(&mesh.positions).zip(&start) {
                *v += (p - p0) / dt;
            }
        }
        max_error
    }
}
