//! Wrappers for faer dense matrix types and vector operations.
//!
//! This module provides implementations of the core linear algebra traits for `faer::Mat`, `faer::MatRef`
//! and `Vec<T>`, enabling their use in the generic solvers and preconditioners. Inner products and norms
//! are evaluated by the reduction core in [`crate::core::reduction`], which picks a packed, scalar or
//! (with the `rayon` feature) data-parallel traversal.
//!
//! # References
//! - [faer crate documentation](https://docs.rs/faer)
//! - [num-traits crate documentation](https://docs.rs/num-traits)

use crate::core::reduction;
use crate::core::traits::{Indexing, InnerProduct, MatTransVec, MatVec};
use faer::{Mat, MatRef};
use num_traits::Float;

fn dense_matvec<T: Float>(a: MatRef<'_, T>, x: &[T], y: &mut [T]) {
    assert_eq!(a.nrows(), y.len(), "Output vector y has incorrect length");
    assert_eq!(a.ncols(), x.len(), "Input vector x has incorrect length");
    y.iter_mut().for_each(|yi| *yi = T::zero());
    // column sweep keeps the access pattern contiguous for column-major storage
    for (j, &xj) in x.iter().enumerate() {
        if xj == T::zero() {
            continue;
        }
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = *yi + a[(i, j)] * xj;
        }
    }
}

fn dense_mattransvec<T: Float>(a: MatRef<'_, T>, x: &[T], y: &mut [T]) {
    assert_eq!(a.ncols(), y.len(), "Output vector y has incorrect length");
    assert_eq!(a.nrows(), x.len(), "Input vector x has incorrect length");
    for (j, yj) in y.iter_mut().enumerate() {
        let mut acc = T::zero();
        for (i, &xi) in x.iter().enumerate() {
            acc = acc + a[(i, j)] * xi;
        }
        *yj = acc;
    }
}

/// Implements matrix-vector multiplication for `faer::Mat`.
///
/// Computes `y = A * x` where `A` is a dense matrix, `x` and `y` are vectors.
impl<T: Float> MatVec<Vec<T>> for Mat<T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        dense_matvec(self.as_ref(), x, y);
    }
}

/// Implements matrix-vector multiplication for a matrix reference (`faer::MatRef`).
impl<'a, T: Float> MatVec<Vec<T>> for MatRef<'a, T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        dense_matvec(*self, x, y);
    }
}

/// Implements matrix-transpose-vector multiplication for `faer::Mat`.
///
/// Computes `y = A^T * x`.
impl<T: Float> MatTransVec<Vec<T>> for Mat<T> {
    fn mattransvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        dense_mattransvec(self.as_ref(), x, y);
    }
}

impl<'a, T: Float> MatTransVec<Vec<T>> for MatRef<'a, T> {
    fn mattransvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        dense_mattransvec(*self, x, y);
    }
}

/// Inner product and norm for vectors, routed through the reduction core.
impl<T: Float + Send + Sync> InnerProduct<Vec<T>> for () {
    type Scalar = T;
    /// Computes the dot product of two vectors: `x^T y`.
    fn dot(&self, x: &Vec<T>, y: &Vec<T>) -> T {
        reduction::dot(x, y)
    }
    /// Computes the Euclidean norm of a vector: `||x||_2`.
    fn norm(&self, x: &Vec<T>) -> T {
        reduction::norm(x)
    }
}

/// Implements the `Indexing` trait for `Vec<T>`, treating a vector as a column vector.
impl<T> Indexing for Vec<T> {
    /// Returns the number of rows (length) of the vector.
    fn nrows(&self) -> usize {
        self.len()
    }
}

/// Implements the `Indexing` trait for `faer::Mat`, returning the number of rows.
impl<T> Indexing for Mat<T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }
}
