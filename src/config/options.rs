//! Command-line or API options for the solvers and preconditioners.
//!
//! Options use PETSc-style names and come in `-name value` pairs:
//!
//! | option            | meaning                             |
//! |-------------------|-------------------------------------|
//! | `-ksp_type`       | `bcgsl` or `idrstabl`               |
//! | `-ksp_rtol`       | relative residual tolerance         |
//! | `-ksp_max_it`     | maximum number of outer iterations  |
//! | `-ksp_bcgsl_ell`  | L, the number of polynomial steps   |
//! | `-ksp_idr_s`      | S, the shadow-space dimension       |
//! | `-ksp_seed`       | seed of the random shadow space     |
//! | `-pc_type`        | `none` or `jacobi`                  |

use crate::context::SolverKind;
use crate::error::KError;
use std::str::FromStr;

/// Preconditioner selectable through options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PcType {
    #[default]
    None,
    Jacobi,
}

impl FromStr for PcType {
    type Err = KError;

    fn from_str(s: &str) -> Result<Self, KError> {
        match s.to_ascii_lowercase().as_str() {
            "none" => Ok(PcType::None),
            "jacobi" => Ok(PcType::Jacobi),
            other => Err(KError::InvalidOption {
                option: "-pc_type".into(),
                reason: format!("unknown preconditioner type '{other}'"),
            }),
        }
    }
}

/// Solver types & parameters. `None` keeps the context default.
#[derive(Debug, Clone, PartialEq)]
pub struct KspOptions {
    pub ksp_type: SolverKind,
    pub rtol: Option<f64>,
    pub max_it: Option<usize>,
    pub ell: Option<usize>,
    pub idr_s: Option<usize>,
    pub seed: Option<u64>,
    pub pc_type: PcType,
}

impl Default for KspOptions {
    fn default() -> Self {
        Self {
            ksp_type: SolverKind::IdrStabL,
            rtol: None,
            max_it: None,
            ell: None,
            idr_s: None,
            seed: None,
            pc_type: PcType::None,
        }
    }
}

fn parse_value<F: FromStr>(option: &str, value: &str) -> Result<F, KError>
where
    F::Err: std::fmt::Display,
{
    value.parse().map_err(|e: F::Err| KError::InvalidOption {
        option: option.to_string(),
        reason: format!("'{value}': {e}"),
    })
}

impl KspOptions {
    /// Parse `-name value` pairs. Unknown names and missing or malformed values are errors.
    pub fn parse<S: AsRef<str>>(args: &[S]) -> Result<Self, KError> {
        let mut opts = Self::default();
        let mut iter = args.iter().map(<S as AsRef<str>>::as_ref);
        while let Some(option) = iter.next() {
            let value = iter.next().ok_or_else(|| KError::InvalidOption {
                option: option.to_string(),
                reason: "missing value".into(),
            })?;
            match option {
                "-ksp_type" => opts.ksp_type = value.parse()?,
                "-ksp_rtol" => {
                    let rtol: f64 = parse_value(option, value)?;
                    if !(rtol > 0.0) {
                        return Err(KError::InvalidOption {
                            option: option.into(),
                            reason: format!("tolerance must be positive, got {rtol}"),
                        });
                    }
                    opts.rtol = Some(rtol);
                }
                "-ksp_max_it" => opts.max_it = Some(parse_value(option, value)?),
                "-ksp_bcgsl_ell" => opts.ell = Some(parse_value(option, value)?),
                "-ksp_idr_s" => opts.idr_s = Some(parse_value(option, value)?),
                "-ksp_seed" => opts.seed = Some(parse_value(option, value)?),
                "-pc_type" => opts.pc_type = value.parse()?,
                _ => {
                    return Err(KError::InvalidOption {
                        option: option.to_string(),
                        reason: "unknown option".into(),
                    });
                }
            }
        }
        Ok(opts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_option_set() {
        let opts = KspOptions::parse(&[
            "-ksp_type", "bcgsl", "-ksp_rtol", "1e-9", "-ksp_max_it", "50",
            "-ksp_bcgsl_ell", "4", "-ksp_seed", "11", "-pc_type", "jacobi",
        ])
        .unwrap();
        assert_eq!(opts.ksp_type, SolverKind::BiCgStabL);
        assert_eq!(opts.rtol, Some(1e-9));
        assert_eq!(opts.max_it, Some(50));
        assert_eq!(opts.ell, Some(4));
        assert_eq!(opts.idr_s, None);
        assert_eq!(opts.seed, Some(11));
        assert_eq!(opts.pc_type, PcType::Jacobi);
    }

    #[test]
    fn rejects_malformed_input() {
        let bad: [&[&str]; 4] = [
            &["-ksp_max_it"],
            &["-ksp_idr_s", "four"],
            &["-ksp_rtol", "-1"],
            &["-ksp_restart", "30"],
        ];
        for args in bad {
            assert!(matches!(KspOptions::parse(args), Err(KError::InvalidOption { .. })), "{args:?}");
        }
    }
}
