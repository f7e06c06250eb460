use thiserror::Error;

// Unified error type for krystab. Numerical outcomes of a solve (breakdown,
// stagnation) are reported through `ComputationInfo`, never through here.

#[derive(Error, Debug)]
pub enum KError {
    #[error("factorization error: {0}")]
    FactorError(String),
    #[error("preconditioner error: {0}")]
    PreconditionerError(String),
    #[error("zero pivot at row {0}")]
    ZeroPivot(usize),
    #[error("invalid option {option}: {reason}")]
    InvalidOption { option: String, reason: String },
}
