//! Stabilized Krylov solvers: BiCGStab(L) and IDR(S)Stab(L).

use crate::preconditioner::Preconditioner;
use crate::utils::convergence::SolveStats;

/// Common interface for the iterative solvers.
pub trait LinearSolver<M, V> {
    type Error;
    type Scalar: Copy + PartialOrd;

    /// Solve A·x = b, using the contents of `x` as initial guess and writing the result into it.
    /// Returns iteration stats (including convergence info).
    fn solve(
        &mut self,
        a: &M,
        pc: Option<&dyn Preconditioner<M, V>>,
        b: &V,
        x: &mut V,
    ) -> Result<SolveStats<Self::Scalar>, Self::Error>;
}

/// Seed of the random shadow spaces unless the caller picks one.
pub const DEFAULT_SEED: u64 = 0x5EED_B1C6;

pub(crate) mod operator;

pub mod bicgstabl;
pub use bicgstabl::BiCgStabLSolver;

pub mod idrstabl;
pub use idrstabl::IdrStabLSolver;
