//! Small dense sub-problems solved with faer.
//!
//! The solvers only ever factor tiny matrices (`S×S` projections, `N×L`
//! least-squares blocks, `(S−1)×(S−1)` Hessenberg systems) or, in the
//! fallback path, the whole operator of a very small system. These are
//! assembled and factored in `f64` regardless of the solver's scalar type.

use crate::core::traits::Real;
use faer::linalg::solvers::{FullPivLu, Qr, SolveCore};
use faer::prelude::SolveLstsq;
use faer::{Conj, Mat, MatMut};

#[inline]
pub(crate) fn to_f64<T: Real>(v: T) -> f64 {
    v.to_f64().unwrap_or(f64::NAN)
}

#[inline]
pub(crate) fn from_f64<T: Real>(v: f64) -> T {
    T::from_f64(v).unwrap_or_else(T::nan)
}

/// Assemble an `nrows × ncols` matrix from columns.
pub fn mat_from_columns<T: Real>(nrows: usize, columns: &[&[T]]) -> Mat<f64> {
    assert!(columns.iter().all(|c| c.len() == nrows), "column length mismatch");
    Mat::from_fn(nrows, columns.len(), |i, j| to_f64(columns[j][i]))
}

/// Full-pivot LU factorization of a square matrix, reusable across several
/// right-hand sides.
pub struct DenseLu {
    factor: FullPivLu<f64>,
    n: usize,
}

impl DenseLu {
    pub fn new(a: &Mat<f64>) -> Self {
        assert_eq!(a.nrows(), a.ncols(), "LU needs a square matrix");
        Self { factor: FullPivLu::new(a.as_ref()), n: a.nrows() }
    }

    /// Solve `A x = rhs`. A singular matrix yields non-finite entries.
    pub fn solve<T: Real>(&self, rhs: &[T]) -> Vec<T> {
        assert_eq!(rhs.len(), self.n, "LU solve: rhs length mismatch");
        let mut x: Vec<f64> = rhs.iter().map(|&v| to_f64(v)).collect();
        let x_mat = MatMut::from_column_major_slice_mut(&mut x, self.n, 1);
        self.factor.solve_in_place_with_conj(Conj::No, x_mat);
        x.into_iter().map(from_f64).collect()
    }
}

/// `argmin_γ ‖rhs − A γ‖₂` via Householder QR. `A` must have at least as
/// many rows as columns; rank deficiency shows up as non-finite entries.
pub fn least_squares<T: Real>(a: &Mat<f64>, rhs: &[T]) -> Vec<T> {
    assert_eq!(a.nrows(), rhs.len(), "least squares: rhs length mismatch");
    assert!(a.nrows() >= a.ncols(), "least squares: system is underdetermined");
    let b = Mat::from_fn(rhs.len(), 1, |i, _| to_f64(rhs[i]));
    let sol = Qr::new(a.as_ref()).solve_lstsq(b);
    (0..a.ncols()).map(|i| from_f64(sol[(i, 0)])).collect()
}

/// True when every entry is finite.
pub fn all_finite<T: Real>(v: &[T]) -> bool {
    v.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn lu_solves_square_system() {
        // [[2,1,1],[1,3,2],[1,0,0]] x = [4,5,6] → x = [6,15,-23]
        let a = Mat::from_fn(3, 3, |i, j| match (i, j) {
            (0, 0) => 2.0, (0, 1) => 1.0, (0, 2) => 1.0,
            (1, 0) => 1.0, (1, 1) => 3.0, (1, 2) => 2.0,
            (2, 0) => 1.0,
            _ => 0.0,
        });
        let lu = DenseLu::new(&a);
        let x = lu.solve(&[4.0f64, 5.0, 6.0]);
        for (xi, ei) in x.iter().zip([6.0, 15.0, -23.0]) {
            assert_abs_diff_eq!(*xi, ei, epsilon = 1e-10);
        }
    }

    #[test]
    fn least_squares_fits_overdetermined_line() {
        // points on y = 1 + 2t: columns [1, t]
        let t = [0.0f64, 1.0, 2.0, 3.0];
        let ones = [1.0f64; 4];
        let a = mat_from_columns(4, &[&ones[..], &t[..]]);
        let y: Vec<f64> = t.iter().map(|ti| 1.0 + 2.0 * ti).collect();
        let gamma = least_squares(&a, &y);
        assert_abs_diff_eq!(gamma[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(gamma[1], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn single_precision_round_trips_through_f64() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 4.0 } else { 1.0 });
        let x = DenseLu::new(&a).solve(&[5.0f32, 5.0]);
        assert!((x[0] - 1.0).abs() < 1e-6 && (x[1] - 1.0).abs() < 1e-6);
    }
}
