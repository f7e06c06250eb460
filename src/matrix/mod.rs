//! Matrix module: dense and sparse operator types.

pub mod dense;
pub use dense::assemble_dense;
pub mod sparse;
pub use sparse::CsrMatrix;
