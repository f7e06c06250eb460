// Jacobi preconditioner implementation

use crate::preconditioner::Preconditioner;
use crate::core::traits::{MatVec, Indexing};
use crate::error::KError;
use num_traits::Float;

/// Jacobi preconditioner: M⁻¹ = D⁻¹
#[derive(Clone, Debug)]
pub struct Jacobi<T> {
    pub(crate) inv_diag: Vec<T>,
}

impl<T: Float> Jacobi<T> {
    /// new with empty state; user must call `setup`.
    pub fn new() -> Self {
        Self { inv_diag: Vec::new() }
    }

    /// Build directly from a known diagonal.
    pub fn from_diagonal(diag: &[T]) -> Result<Self, KError> {
        Ok(Self { inv_diag: invert_diagonal(diag)? })
    }
}

impl<T: Float> Default for Jacobi<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn invert_diagonal<T: Float>(diag: &[T]) -> Result<Vec<T>, KError> {
    diag.iter()
        .enumerate()
        .map(|(i, &d)| if d != T::zero() { Ok(T::one() / d) } else { Err(KError::ZeroPivot(i)) })
        .collect()
}

impl<M, V, T> Preconditioner<M, V> for Jacobi<T>
where
    M: MatVec<V> + Indexing,
    V: AsRef<[T]> + AsMut<[T]> + From<Vec<T>>,
    T: Float + Send + Sync,
{
    /// Extract the diagonal by probing A with the unit vectors.
    fn setup(&mut self, a: &M) -> Result<(), KError> {
        let n = a.nrows();
        let mut diag = vec![T::zero(); n];
        let mut e = vec![T::zero(); n];
        for i in 0..n {
            e[i] = T::one();
            let mut col = V::from(vec![T::zero(); n]);
            a.matvec(&V::from(e.clone()), &mut col);
            diag[i] = col.as_ref()[i];
            e[i] = T::zero();
        }
        self.inv_diag = invert_diagonal(&diag)?;
        Ok(())
    }

    fn apply(&self, x: &V, y: &mut V) -> Result<(), KError> {
        let x_ref = x.as_ref();
        if x_ref.len() != self.inv_diag.len() {
            return Err(KError::PreconditionerError(format!(
                "Jacobi set up for size {}, applied to size {}",
                self.inv_diag.len(),
                x_ref.len()
            )));
        }
        for ((yi, &xi), &di) in y.as_mut().iter_mut().zip(x_ref).zip(&self.inv_diag) {
            *yi = di * xi;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    #[test]
    fn setup_probes_diagonal() {
        let a = Mat::from_fn(3, 3, |i, j| if i == j { (i + 1) as f64 * 2.0 } else { 1.0 });
        let mut pc = Jacobi::<f64>::new();
        Preconditioner::<Mat<f64>, Vec<f64>>::setup(&mut pc, &a).unwrap();
        let mut z = vec![0.0; 3];
        Preconditioner::<Mat<f64>, Vec<f64>>::apply(&pc, &vec![2.0, 4.0, 6.0], &mut z).unwrap();
        assert_eq!(z, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn zero_diagonal_is_rejected() {
        assert!(matches!(Jacobi::from_diagonal(&[1.0, 0.0]), Err(KError::ZeroPivot(1))));
    }
}
