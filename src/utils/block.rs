//! Fixed-capacity column-major work arrays for the solvers.
//!
//! A [`Block`] is allocated once per solve with its final shape; the
//! iterations address it by column and by row segment, never resizing it.

use num_traits::Float;
use std::ops::Range;

/// Dense column-major `nrows × ncols` scratch matrix.
#[derive(Clone, Debug)]
pub struct Block<T> {
    nrows: usize,
    ncols: usize,
    data: Vec<T>,
}

impl<T: Float> Block<T> {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self { nrows, ncols, data: vec![T::zero(); nrows * ncols] }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn col(&self, j: usize) -> &[T] {
        &self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    pub fn col_mut(&mut self, j: usize) -> &mut [T] {
        &mut self.data[j * self.nrows..(j + 1) * self.nrows]
    }

    /// Rows `rows` of column `j`.
    pub fn segment(&self, j: usize, rows: Range<usize>) -> &[T] {
        &self.col(j)[rows]
    }

    pub fn segment_mut(&mut self, j: usize, rows: Range<usize>) -> &mut [T] {
        &mut self.col_mut(j)[rows]
    }

    /// Mutable column `dst` alongside read-only column `src` (`src != dst`).
    pub fn col_pair_mut(&mut self, src: usize, dst: usize) -> (&[T], &mut [T]) {
        assert_ne!(src, dst, "column pair must be distinct");
        let n = self.nrows;
        if src < dst {
            let (lo, hi) = self.data.split_at_mut(dst * n);
            (&lo[src * n..(src + 1) * n], &mut hi[..n])
        } else {
            let (lo, hi) = self.data.split_at_mut(src * n);
            (&hi[..n], &mut lo[dst * n..(dst + 1) * n])
        }
    }

    pub fn set_zero(&mut self) {
        self.data.iter_mut().for_each(|v| *v = T::zero());
    }

    pub fn copy_from(&mut self, other: &Block<T>) {
        assert!(
            self.nrows == other.nrows && self.ncols == other.ncols,
            "block copy: shape mismatch"
        );
        self.data.copy_from_slice(&other.data);
    }

    /// `out = Σ_k coeffs[k] · self[rows, cols.start + k]`.
    pub fn combine(&self, cols: Range<usize>, rows: Range<usize>, coeffs: &[T], out: &mut [T]) {
        assert_eq!(cols.len(), coeffs.len(), "block combine: coefficient count");
        assert_eq!(rows.len(), out.len(), "block combine: output length");
        out.iter_mut().for_each(|v| *v = T::zero());
        for (j, &c) in cols.zip(coeffs) {
            axpy(c, self.segment(j, rows.clone()), out);
        }
    }

    /// `out -= Σ_k coeffs[k] · self[rows, cols.start + k]`.
    pub fn sub_combination(&self, cols: Range<usize>, rows: Range<usize>, coeffs: &[T], out: &mut [T]) {
        assert_eq!(cols.len(), coeffs.len(), "block combine: coefficient count");
        assert_eq!(rows.len(), out.len(), "block combine: output length");
        for (j, &c) in cols.zip(coeffs) {
            axpy(-c, self.segment(j, rows.clone()), out);
        }
    }
}

/// y ← y + alpha · x
#[inline]
pub fn axpy<T: Float>(alpha: T, x: &[T], y: &mut [T]) {
    assert_eq!(x.len(), y.len(), "axpy: length mismatch");
    for (yi, &xi) in y.iter_mut().zip(x) {
        *yi = *yi + alpha * xi;
    }
}

/// x ← alpha · x
#[inline]
pub fn scale<T: Float>(alpha: T, x: &mut [T]) {
    x.iter_mut().for_each(|xi| *xi = *xi * alpha);
}

/// out ← x − y
#[inline]
pub fn sub_into<T: Float>(x: &[T], y: &[T], out: &mut [T]) {
    assert!(x.len() == y.len() && y.len() == out.len(), "sub: length mismatch");
    for ((o, &a), &b) in out.iter_mut().zip(x).zip(y) {
        *o = a - b;
    }
}
