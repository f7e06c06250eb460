//! ILU(0) factorization with zero fill on the CSR pattern (Saad §10.3, Algorithm 10.4).
//!
//! The factors share the sparsity pattern of A: the strictly lower part holds the unit-lower
//! factor L, the diagonal and upper part hold U.

use crate::preconditioner::Preconditioner;
use crate::error::KError;
use crate::matrix::CsrMatrix;
use num_traits::Float;

pub struct Ilu0<T> {
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    lu: Vec<T>,
    diag_pos: Vec<usize>,
}

impl<T: Float> Ilu0<T> {
    pub fn new() -> Self {
        Self { row_ptr: vec![0], col_idx: Vec::new(), lu: Vec::new(), diag_pos: Vec::new() }
    }

    fn n(&self) -> usize {
        self.row_ptr.len() - 1
    }
}

impl<T: Float> Default for Ilu0<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Preconditioner<CsrMatrix<T>, Vec<T>> for Ilu0<T> {
    fn setup(&mut self, a: &CsrMatrix<T>) -> Result<(), KError> {
        let n = a.nrows();
        if n != a.ncols() {
            return Err(KError::FactorError("ILU(0) needs a square matrix".into()));
        }
        // copy the pattern with sorted columns per row
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(a.nnz());
        let mut lu = Vec::with_capacity(a.nnz());
        row_ptr.push(0);
        for i in 0..n {
            let (cols, vals) = a.row(i);
            let mut entries: Vec<(usize, T)> = cols.iter().copied().zip(vals.iter().copied()).collect();
            entries.sort_by_key(|&(c, _)| c);
            for (c, v) in entries {
                col_idx.push(c);
                lu.push(v);
            }
            row_ptr.push(col_idx.len());
        }
        let mut diag_pos = vec![0; n];
        for i in 0..n {
            let row = row_ptr[i]..row_ptr[i + 1];
            diag_pos[i] = row
                .clone()
                .find(|&p| col_idx[p] == i)
                .ok_or(KError::ZeroPivot(i))?;
        }

        // position of column j in the current row, usize::MAX when absent
        let mut marker = vec![usize::MAX; n];
        for i in 0..n {
            let row = row_ptr[i]..row_ptr[i + 1];
            for p in row.clone() {
                marker[col_idx[p]] = p;
            }
            for p in row.start..diag_pos[i] {
                let k = col_idx[p];
                let pivot = lu[diag_pos[k]];
                if pivot == T::zero() {
                    return Err(KError::ZeroPivot(k));
                }
                let l_ik = lu[p] / pivot;
                lu[p] = l_ik;
                for q in (diag_pos[k] + 1)..row_ptr[k + 1] {
                    let target = marker[col_idx[q]];
                    if target != usize::MAX {
                        lu[target] = lu[target] - l_ik * lu[q];
                    }
                }
            }
            for p in row {
                marker[col_idx[p]] = usize::MAX;
            }
            if lu[diag_pos[i]] == T::zero() {
                return Err(KError::ZeroPivot(i));
            }
        }
        self.row_ptr = row_ptr;
        self.col_idx = col_idx;
        self.lu = lu;
        self.diag_pos = diag_pos;
        Ok(())
    }

    fn apply(&self, x: &Vec<T>, y: &mut Vec<T>) -> Result<(), KError> {
        let n = self.n();
        if x.len() != n || y.len() != n {
            return Err(KError::PreconditionerError(format!(
                "ILU(0) set up for size {n}, applied to size {}",
                x.len()
            )));
        }
        // solve L y1 = x
        for i in 0..n {
            let mut acc = x[i];
            for p in self.row_ptr[i]..self.diag_pos[i] {
                acc = acc - self.lu[p] * y[self.col_idx[p]];
            }
            y[i] = acc;
        }
        // solve U y = y1
        for i in (0..n).rev() {
            let mut acc = y[i];
            for p in (self.diag_pos[i] + 1)..self.row_ptr[i + 1] {
                acc = acc - self.lu[p] * y[self.col_idx[p]];
            }
            y[i] = acc / self.lu[self.diag_pos[i]];
        }
        Ok(())
    }
}
