//! Context module: solver selection, parameter management and the operator-owning solve loop.
//!
//! Modules:
//! - [`ksp_context`]: Contains the `KspContext` struct for Krylov subspace solver configuration and management.
//!
//! # Example
//! ```rust
//! use krystab::context::{KspContext, SolverKind};
//! use krystab::matrix::CsrMatrix;
//!
//! let a = CsrMatrix::from_triplets(2, 2, &[(0, 0, 4.0), (0, 1, 1.0), (1, 0, -1.0), (1, 1, 3.0)]);
//! let mut ksp = KspContext::<_, Vec<f64>, f64>::new(SolverKind::BiCgStabL, a);
//! ksp.set_tolerance(1e-12);
//! let x = ksp.solve(&vec![5.0, 2.0]).unwrap();
//! assert!((x[0] - 1.0).abs() < 1e-10 && (x[1] - 1.0).abs() < 1e-10);
//! ```

pub mod ksp_context;
pub use ksp_context::{KspContext, SolverKind};
