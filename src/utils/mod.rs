//! Shared solver machinery: convergence bookkeeping, work arrays,
//! orthogonalization and small dense solves.

pub mod block;
pub mod convergence;
pub mod ortho;
pub mod small_dense;

pub use convergence::{BestIterate, ComputationInfo, Convergence, ReliableUpdate, SolveStats, UpdateAction};
