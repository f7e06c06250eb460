//! Core linear-algebra traits for krystab.

use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// Real scalar type accepted by the solvers (`f32`, `f64`).
pub trait Real: Float + FromPrimitive + Debug + Send + Sync + 'static {}

impl<T> Real for T where T: Float + FromPrimitive + Debug + Send + Sync + 'static {}

/// Matrix–vector product: y ← A x.
pub trait MatVec<V> {
    /// Compute y = A · x.
    fn matvec(&self, x: &V, y: &mut V);
}

/// Transposed matrix–vector product: y ← Aᵀ x.
pub trait MatTransVec<V> {
    /// Compute y = Aᵀ · x.
    fn mattransvec(&self, x: &V, y: &mut V);
}

/// Inner products & norms.
pub trait InnerProduct<V> {
    /// Associated scalar type.
    type Scalar: Copy + PartialOrd;
    /// Compute dot(x, y).
    fn dot(&self, x: &V, y: &V) -> Self::Scalar;
    /// Compute ‖x‖₂.
    fn norm(&self, x: &V) -> Self::Scalar;
}

/// Uniform indexing into vectors (dense or sparse).
pub trait Indexing {
    /// Number of rows (or length for a vector).
    fn nrows(&self) -> usize;
}
