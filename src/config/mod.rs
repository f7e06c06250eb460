//! Option parsing for building solver contexts.

pub mod options;
pub use options::{KspOptions, PcType};
