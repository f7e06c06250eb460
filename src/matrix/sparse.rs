// CSR sparse matrix: y = A x and y = Aᵀ x without densifying.

use crate::core::traits::{Indexing, MatTransVec, MatVec};
use faer::Mat;
use num_traits::Float;

/// Compressed sparse row matrix.
///
/// Structure invariants (checked at construction): `row_ptr` has
/// `nrows + 1` non-decreasing entries starting at 0, `col_idx` and `values`
/// have `row_ptr[nrows]` entries, every column index is `< ncols`.
#[derive(Clone, Debug)]
pub struct CsrMatrix<T> {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    values: Vec<T>,
}

impl<T: Float> CsrMatrix<T> {
    /// Build a CSR from raw row‐ptr, col‐idx, and values.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        values: Vec<T>,
    ) -> Self {
        assert_eq!(row_ptr.len(), nrows + 1, "row_ptr must have nrows + 1 entries");
        assert_eq!(row_ptr[0], 0, "row_ptr must start at 0");
        assert!(row_ptr.windows(2).all(|w| w[0] <= w[1]), "row_ptr must be non-decreasing");
        let nnz = row_ptr[nrows];
        assert!(col_idx.len() == nnz && values.len() == nnz, "col_idx/values must have nnz entries");
        assert!(col_idx.iter().all(|&c| c < ncols), "column index out of bounds");
        Self { nrows, ncols, row_ptr, col_idx, values }
    }

    /// Build from `(row, col, value)` triplets; duplicates are summed.
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, T)]) -> Self {
        let mut sorted: Vec<(usize, usize, T)> = triplets.to_vec();
        sorted.sort_by(|a, b| (a.0, a.1).cmp(&(b.0, b.1)));
        let mut row_ptr = vec![0; nrows + 1];
        let mut col_idx: Vec<usize> = Vec::with_capacity(sorted.len());
        let mut values: Vec<T> = Vec::with_capacity(sorted.len());
        let mut last: Option<(usize, usize)> = None;
        for &(i, j, v) in &sorted {
            assert!(i < nrows && j < ncols, "triplet ({i}, {j}) out of bounds");
            if last == Some((i, j)) {
                if let Some(acc) = values.last_mut() {
                    *acc = *acc + v;
                }
                continue;
            }
            col_idx.push(j);
            values.push(v);
            row_ptr[i + 1] += 1;
            last = Some((i, j));
        }
        for i in 0..nrows {
            row_ptr[i + 1] += row_ptr[i];
        }
        Self::from_csr(nrows, ncols, row_ptr, col_idx, values)
    }

    /// Sparse identity of size `n`.
    pub fn identity(n: usize) -> Self {
        Self::from_csr(n, n, (0..=n).collect(), (0..n).collect(), vec![T::one(); n])
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// Column indices and values of row `i`.
    pub fn row(&self, i: usize) -> (&[usize], &[T]) {
        let range = self.row_ptr[i]..self.row_ptr[i + 1];
        (&self.col_idx[range.clone()], &self.values[range])
    }

    /// Main diagonal (zeros where no entry is stored).
    pub fn diagonal(&self) -> Vec<T> {
        (0..self.nrows.min(self.ncols))
            .map(|i| {
                let (cols, vals) = self.row(i);
                cols.iter()
                    .zip(vals)
                    .filter(|&(&c, _)| c == i)
                    .fold(T::zero(), |acc, (_, &v)| acc + v)
            })
            .collect()
    }

    pub fn spmv(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        for (i, yi) in y.iter_mut().enumerate() {
            let (cols, vals) = self.row(i);
            *yi = cols.iter().zip(vals).fold(T::zero(), |acc, (&c, &v)| acc + v * x[c]);
        }
    }

    pub fn spmv_transpose(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.nrows);
        assert_eq!(y.len(), self.ncols);
        y.iter_mut().for_each(|v| *v = T::zero());
        for (i, &xi) in x.iter().enumerate() {
            let (cols, vals) = self.row(i);
            for (&c, &v) in cols.iter().zip(vals) {
                y[c] = y[c] + v * xi;
            }
        }
    }

    /// Dense copy (for small matrices and tests).
    pub fn to_dense(&self) -> Mat<T> {
        let mut data = vec![T::zero(); self.nrows * self.ncols];
        for i in 0..self.nrows {
            let (cols, vals) = self.row(i);
            for (&c, &v) in cols.iter().zip(vals) {
                data[c * self.nrows + i] = data[c * self.nrows + i] + v;
            }
        }
        Mat::from_fn(self.nrows, self.ncols, |i, j| data[j * self.nrows + i])
    }
}

#[cfg(feature = "rayon")]
use rayon::prelude::*;

#[cfg(feature = "rayon")]
impl<T: Float + Send + Sync> CsrMatrix<T> {
    /// Parallel SpMV using Rayon, one task per row chunk.
    pub fn spmv_parallel(&self, x: &[T], y: &mut [T]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        y.par_iter_mut().enumerate().for_each(|(i, yi)| {
            let (cols, vals) = self.row(i);
            *yi = cols.iter().zip(vals).fold(T::zero(), |acc, (&c, &v)| acc + v * x[c]);
        });
    }
}

/// Rows above which `matvec` dispatches to the parallel kernel.
#[cfg(feature = "rayon")]
const PARALLEL_ROWS: usize = 1 << 14;

#[cfg(feature = "rayon")]
impl<T: Float + Send + Sync> MatVec<Vec<T>> for CsrMatrix<T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        if self.nrows >= PARALLEL_ROWS {
            self.spmv_parallel(x, y);
        } else {
            self.spmv(x, y);
        }
    }
}

#[cfg(not(feature = "rayon"))]
impl<T: Float> MatVec<Vec<T>> for CsrMatrix<T> {
    fn matvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        self.spmv(x, y);
    }
}

impl<T: Float> MatTransVec<Vec<T>> for CsrMatrix<T> {
    fn mattransvec(&self, x: &Vec<T>, y: &mut Vec<T>) {
        self.spmv_transpose(x, y);
    }
}

impl<T> Indexing for CsrMatrix<T> {
    fn nrows(&self) -> usize {
        self.nrows
    }
}
