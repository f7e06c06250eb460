//! Dense operators on top of Faer.
//!
//! [`assemble_dense`] materializes any operator by applying it to the unit vectors; the IDR(S)Stab(L)
//! fallback factors the result directly.

use crate::core::traits::MatVec;
use faer::Mat;
use num_traits::Float;

/// Build the dense `n × n` matrix of an operator column by column (`n`
/// matrix-vector products). Only sensible for small `n`.
pub fn assemble_dense<M, V, T>(a: &M, n: usize) -> Mat<T>
where
    M: MatVec<V>,
    V: AsRef<[T]> + AsMut<[T]> + From<Vec<T>>,
    T: Float,
{
    let mut data = Vec::with_capacity(n * n);
    let mut e = vec![T::zero(); n];
    for j in 0..n {
        e[j] = T::one();
        let mut col = V::from(vec![T::zero(); n]);
        a.matvec(&V::from(e.clone()), &mut col);
        data.extend_from_slice(col.as_ref());
        e[j] = T::zero();
    }
    Mat::from_fn(n, n, |i, j| data[j * n + i])
}
