//! Right-preconditioned operator `A·M⁻¹` over flat slices.
//!
//! The solvers keep their work arrays as plain slices; this adapter moves data in and out of the
//! caller's vector type `V` for each operator or preconditioner application.

use crate::core::reduction::norm;
use crate::core::traits::{MatTransVec, MatVec, Real};
use crate::error::KError;
use crate::matrix::assemble_dense;
use crate::preconditioner::Preconditioner;
use crate::utils::block::sub_into;
use crate::utils::convergence::BestIterate;
use faer::Mat;
use log::debug;
use std::marker::PhantomData;

pub(crate) struct RightPreconditioned<'a, M, V, T> {
    a: &'a M,
    pc: Option<&'a dyn Preconditioner<M, V>>,
    n: usize,
    _scalar: PhantomData<T>,
}

impl<'a, M, V, T> RightPreconditioned<'a, M, V, T>
where
    M: MatVec<V>,
    V: AsRef<[T]> + AsMut<[T]> + From<Vec<T>>,
    T: Real,
{
    pub(crate) fn new(a: &'a M, pc: Option<&'a dyn Preconditioner<M, V>>, n: usize) -> Self {
        Self { a, pc, n, _scalar: PhantomData }
    }

    pub(crate) fn dim(&self) -> usize {
        self.n
    }

    /// `dst = M⁻¹ src`
    pub(crate) fn precondition(&self, src: &[T], dst: &mut [T]) -> Result<(), KError> {
        match self.pc {
            Some(pc) => {
                let r = V::from(src.to_vec());
                let mut z = V::from(vec![T::zero(); self.n]);
                pc.apply(&r, &mut z)?;
                dst.copy_from_slice(z.as_ref());
            }
            None => dst.copy_from_slice(src),
        }
        Ok(())
    }

    /// Dense copy of `A` (not `A M⁻¹`), built from `n` products with the unit vectors.
    pub(crate) fn assemble(&self) -> Mat<T> {
        assemble_dense::<M, V, T>(self.a, self.n)
    }

    /// `dst = A src`
    pub(crate) fn matvec(&self, src: &[T], dst: &mut [T]) {
        let x = V::from(src.to_vec());
        let mut y = V::from(vec![T::zero(); self.n]);
        self.a.matvec(&x, &mut y);
        dst.copy_from_slice(y.as_ref());
    }

    /// `dst = A M⁻¹ src`
    pub(crate) fn apply(&self, src: &[T], dst: &mut [T]) -> Result<(), KError> {
        let mut z = vec![T::zero(); self.n];
        self.precondition(src, &mut z)?;
        self.matvec(&z, dst);
        Ok(())
    }

    /// `r = b − A M⁻¹ y`; returns `‖r‖`.
    pub(crate) fn residual(&self, b: &[T], y: &[T], r: &mut [T]) -> Result<T, KError> {
        let mut ay = vec![T::zero(); self.n];
        self.apply(y, &mut ay)?;
        sub_into(b, &ay, r);
        Ok(norm(r))
    }

    /// Map a preconditioned-space correction back: `x = x0 + M⁻¹ y`.
    pub(crate) fn recover(&self, x0: &[T], y: &[T]) -> Result<Vec<T>, KError> {
        let mut x = vec![T::zero(); self.n];
        self.precondition(y, &mut x)?;
        for (xi, &x0i) in x.iter_mut().zip(x0) {
            *xi = *xi + x0i;
        }
        Ok(x)
    }

    /// `r = b − A x` for an unpreconditioned iterate; returns `‖r‖`.
    pub(crate) fn true_residual(&self, b: &[T], x: &[T]) -> T {
        let mut ax = vec![T::zero(); self.n];
        self.matvec(x, &mut ax);
        let mut r = vec![T::zero(); self.n];
        sub_into(b, &ax, &mut r);
        norm(&r)
    }

    /// Map the final correction `y` back to `x0 + M⁻¹ y`, switching to the best tracked iterate
    /// when the final one is worse. Returns the solution and its true residual norm.
    pub(crate) fn finish(&self, b: &[T], x0: &[T], y: &[T], best: &BestIterate<T>) -> Result<(Vec<T>, T), KError> {
        let x = self.recover(x0, y)?;
        let res = self.true_residual(b, &x);
        if res <= best.residual() {
            return Ok((x, res));
        }
        let candidate = self.recover(x0, best.x())?;
        let candidate_res = self.true_residual(b, &candidate);
        if candidate_res < res || !res.is_finite() {
            debug!("returning best iterate (residual {candidate_res:?}) instead of the last one ({res:?})");
            Ok((candidate, candidate_res))
        } else {
            Ok((x, res))
        }
    }
}

impl<'a, M, V, T> RightPreconditioned<'a, M, V, T>
where
    M: MatVec<V> + MatTransVec<V>,
    V: AsRef<[T]> + AsMut<[T]> + From<Vec<T>>,
    T: Real,
{
    /// `dst = Aᵀ src`
    pub(crate) fn mattransvec(&self, src: &[T], dst: &mut [T]) {
        let x = V::from(src.to_vec());
        let mut y = V::from(vec![T::zero(); self.n]);
        self.a.mattransvec(&x, &mut y);
        dst.copy_from_slice(y.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::Jacobi;
    use faer::Mat;

    #[test]
    fn applies_a_times_preconditioner() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 2.0 } else { 1.0 });
        let pc = Jacobi::from_diagonal(&[2.0, 2.0]).unwrap();
        let op = RightPreconditioned::<_, Vec<f64>, f64>::new(&a, Some(&pc), 2);
        let mut out = vec![0.0; 2];
        op.apply(&[2.0, 4.0], &mut out).unwrap();
        // M⁻¹ [2, 4] = [1, 2]; A [1, 2] = [4, 5]
        assert_eq!(out, vec![4.0, 5.0]);
        let mut r = vec![0.0; 2];
        let nrm = op.residual(&[4.0, 5.0], &[2.0, 4.0], &mut r).unwrap();
        assert_eq!(nrm, 0.0);
        assert_eq!(op.recover(&[1.0, 1.0], &[2.0, 4.0]).unwrap(), vec![2.0, 3.0]);
        let mut t = vec![0.0; 2];
        op.mattransvec(&[1.0, 0.0], &mut t);
        assert_eq!(t, vec![2.0, 1.0]);
    }

    #[test]
    fn finish_prefers_the_better_tracked_iterate() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let op = RightPreconditioned::<_, Vec<f64>, f64>::new(&a, None, 2);
        let b = [1.0, 1.0];
        let x0 = [0.0, 0.0];
        let best = BestIterate::new(vec![0.9, 1.0], 0.1);

        // the last iterate overshoots: the tracked one is returned
        let (x, res) = op.finish(&b, &x0, &[5.0, 5.0], &best).unwrap();
        assert_eq!(x, vec![0.9, 1.0]);
        assert!((res - 0.1).abs() < 1e-15);

        // a last iterate at least as good as the tracked one is kept
        let (x, res) = op.finish(&b, &x0, &[1.0, 1.0], &best).unwrap();
        assert_eq!(x, vec![1.0, 1.0]);
        assert_eq!(res, 0.0);

        // a non-finite last iterate is never returned
        let (x, _) = op.finish(&b, &x0, &[f64::NAN, 1.0], &best).unwrap();
        assert_eq!(x, vec![0.9, 1.0]);
    }
}
