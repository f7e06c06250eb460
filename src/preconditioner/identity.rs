// Identity preconditioner: M = I.

use crate::error::KError;
use crate::preconditioner::Preconditioner;

/// M⁻¹ = I; `apply` copies its input.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl<M, V: Clone> Preconditioner<M, V> for Identity {
    fn apply(&self, r: &V, z: &mut V) -> Result<(), KError> {
        z.clone_from(r);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    #[test]
    fn identity_returns_input() {
        let pc = Identity;
        let r = vec![1.0, -2.0, 3.0];
        let mut z = vec![0.0; 3];
        <Identity as Preconditioner<Mat<f64>, Vec<f64>>>::apply(&pc, &r, &mut z).unwrap();
        assert_eq!(z, r);
    }
}
