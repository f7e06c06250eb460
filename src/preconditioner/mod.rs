//! Preconditioners for linear solvers.
//!
//! This module defines the Preconditioner trait and includes the identity, Jacobi and sparse ILU(0)
//! preconditioners. The stabilized solvers apply them from the right: they iterate on `A·M⁻¹` and
//! recover `x = M⁻¹·y` at the end, so `apply` is called once per matrix-vector product.

use crate::error::KError;

/// A preconditioner M ≈ A⁻¹.
pub trait Preconditioner<M, V> {
    /// Apply M⁻¹ to r, writing z = M⁻¹ r
    fn apply(&self, r: &V, z: &mut V) -> Result<(), KError>;
    /// Optionally: setup/factorize from A
    fn setup(&mut self, _a: &M) -> Result<(), KError> { Ok(()) }
}

pub mod identity;
pub mod ilu;
pub mod jacobi;

pub use identity::Identity;
pub use ilu::Ilu0;
pub use jacobi::Jacobi;
