//! krystab: stabilized Krylov solvers (BiCGStab(L), IDR(S)Stab(L)) over Faer
//!
//! This crate provides right-preconditioned BiCGStab(L) and IDR(S)Stab(L) solvers for large
//! nonsymmetric linear systems, the reduction core (dot products and norms) they are built on,
//! dense and CSR operators, and a PETSc-style context with option parsing.

pub mod config;
pub mod context;
pub mod core;
pub mod error;
pub mod matrix;
pub mod preconditioner;
pub mod solver;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use crate::core::*;
pub use error::*;
pub use matrix::*;
pub use preconditioner::*;
pub use solver::*;
pub use utils::*;

// Re-export SolveStats at the crate root for convenience
pub use utils::convergence::SolveStats;
