//! Orthogonalization helpers: Modified Gram-Schmidt and seeded random
//! orthonormal bases (shadow spaces).

use crate::core::reduction::{dot, norm};
use crate::core::traits::Real;
use crate::utils::block::{axpy, scale};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Orthogonalize `w` against the orthonormal vectors `basis` with Modified
/// Gram-Schmidt. Returns the projection coefficients `h[i] = ⟨basis_i, w⟩`.
pub fn mgs<'a, T, I>(basis: I, w: &mut [T]) -> Vec<T>
where
    T: Real,
    I: IntoIterator<Item = &'a [T]>,
{
    basis
        .into_iter()
        .map(|v| {
            let h = dot(v, w);
            axpy(-h, v, w);
            h
        })
        .collect()
}

/// Normalize `v` in place. Returns the original norm; a zero vector is left
/// untouched and reported as `0`.
pub fn normalize<T: Real>(v: &mut [T]) -> T {
    let nrm = norm(v);
    if nrm != T::zero() {
        scale(T::one() / nrm, v);
    }
    nrm
}

/// `count` orthonormal vectors of length `n`, drawn uniformly from
/// `[-1, 1)` with a seeded generator and orthonormalized by MGS.
///
/// Random vectors are linearly dependent with probability zero; a draw that
/// collapses numerically is redrawn.
pub fn random_orthonormal<T: Real>(n: usize, count: usize, seed: u64) -> Vec<Vec<T>> {
    assert!(count <= n, "cannot build {count} orthonormal vectors in dimension {n}");
    let mut rng = StdRng::seed_from_u64(seed);
    let mut basis: Vec<Vec<T>> = Vec::with_capacity(count);
    let floor = T::from_f64(1e-8).unwrap_or_else(T::epsilon);
    while basis.len() < count {
        let mut v: Vec<T> = (0..n)
            .map(|_| T::from_f64(rng.gen_range(-1.0..1.0)).unwrap_or_else(T::zero))
            .collect();
        let before = norm(&v);
        mgs(basis.iter().map(|b| b.as_slice()), &mut v);
        // second pass restores orthogonality lost to cancellation
        mgs(basis.iter().map(|b| b.as_slice()), &mut v);
        let after = normalize(&mut v);
        if after > floor * before {
            basis.push(v);
        }
    }
    basis
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_orthonormal_is_orthonormal_and_reproducible() {
        let q = random_orthonormal::<f64>(12, 5, 7);
        for i in 0..5 {
            for j in 0..5 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((dot(&q[i], &q[j]) - expected).abs() < 1e-12);
            }
        }
        let again = random_orthonormal::<f64>(12, 5, 7);
        assert_eq!(q, again);
        let other = random_orthonormal::<f64>(12, 5, 8);
        assert_ne!(q, other);
    }

    #[test]
    fn mgs_removes_components() {
        let e0 = vec![1.0, 0.0, 0.0];
        let e1 = vec![0.0, 1.0, 0.0];
        let mut w = vec![2.0, -3.0, 4.0];
        let h = mgs([e0.as_slice(), e1.as_slice()], &mut w);
        assert_eq!(h, vec![2.0, -3.0]);
        assert_eq!(w, vec![0.0, 0.0, 4.0]);
        assert_eq!(normalize(&mut w), 4.0);
        assert_eq!(w, vec![0.0, 0.0, 1.0]);
    }
}
