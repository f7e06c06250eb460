//! Core capabilities: operator/vector traits, the reduction core, and trait
//! implementations for faer and std types.

pub mod reduction;
pub mod traits;
pub mod wrappers;

pub use reduction::{BinaryReduce, InnerProductOp, MaxAbsDiffOp, SquaredDistanceOp};
pub use traits::{Indexing, InnerProduct, MatTransVec, MatVec, Real};
