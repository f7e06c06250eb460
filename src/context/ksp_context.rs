//! Operator-owning front end for the Krylov solvers.
//!
//! `KspContext` holds the system matrix, an optional preconditioner, the solver kind and its
//! parameters, and remembers the outcome of the last solve.
//!
//! # Usage
//!
//! 1. Construct a `KspContext` with the desired solver kind and matrix (or from parsed options).
//! 2. Optionally attach a preconditioner; its `setup` runs against the owned matrix.
//! 3. Call `solve` (zero initial guess) or `solve_with_guess`, then inspect `info()`.
//!
//! # References
//! - PETSc documentation: https://petsc.org/release/docs/manualpages/KSP/

use crate::config::options::{KspOptions, PcType};
use crate::core::traits::{Indexing, MatTransVec, MatVec, Real};
use crate::error::KError;
use crate::preconditioner::{Jacobi, Preconditioner};
use crate::solver::{BiCgStabLSolver, DEFAULT_SEED, IdrStabLSolver, LinearSolver};
use crate::utils::convergence::{ComputationInfo, SolveStats};
use log::warn;
use std::str::FromStr;

/// Enum representing the available Krylov solver types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolverKind {
    /// BiCGStab(L)
    BiCgStabL,
    /// IDR(S)Stab(L)
    IdrStabL,
}

impl FromStr for SolverKind {
    type Err = KError;

    fn from_str(s: &str) -> Result<Self, KError> {
        match s.to_ascii_lowercase().as_str() {
            "bcgsl" | "bicgstabl" => Ok(SolverKind::BiCgStabL),
            "idrstabl" | "idrs" => Ok(SolverKind::IdrStabL),
            other => Err(KError::InvalidOption {
                option: "-ksp_type".into(),
                reason: format!("unknown solver type '{other}'"),
            }),
        }
    }
}

/// Context and configuration for a Krylov subspace solver.
pub struct KspContext<M, V, T> {
    /// The type of Krylov solver to use
    pub kind: SolverKind,
    /// The system matrix
    pub a: M,
    /// Optional right preconditioner
    pub pc: Option<Box<dyn Preconditioner<M, V>>>,
    /// Relative residual tolerance
    pub tol: T,
    /// Maximum number of outer iterations
    pub max_it: usize,
    l: usize,
    s: usize,
    seed: u64,
    last: Option<SolveStats<T>>,
}

impl<M, V, T> KspContext<M, V, T>
where
    M: MatVec<V> + MatTransVec<V> + Indexing,
    V: AsMut<[T]> + AsRef<[T]> + From<Vec<T>> + Clone,
    T: Real,
{
    /// Context with default parameters: tolerance `T::epsilon()`, `2·N` iterations, `L = 2`,
    /// `S = 4`, no preconditioner.
    pub fn new(kind: SolverKind, a: M) -> Self {
        let max_it = 2 * a.nrows();
        Self {
            kind,
            a,
            pc: None,
            tol: T::epsilon(),
            max_it,
            l: IdrStabLSolver::<T>::DEFAULT_L,
            s: IdrStabLSolver::<T>::DEFAULT_S,
            seed: DEFAULT_SEED,
            last: None,
        }
    }

    /// Build a context from parsed options; unset options keep their defaults.
    pub fn from_options(a: M, opts: &KspOptions) -> Result<Self, KError> {
        let mut ctx = Self::new(opts.ksp_type, a);
        if let Some(rtol) = opts.rtol {
            ctx.tol = T::from_f64(rtol).ok_or_else(|| KError::InvalidOption {
                option: "-ksp_rtol".into(),
                reason: format!("{rtol} is not representable"),
            })?;
        }
        if let Some(max_it) = opts.max_it {
            ctx.max_it = max_it;
        }
        if let Some(l) = opts.ell {
            ctx.set_l(l);
        }
        if let Some(s) = opts.idr_s {
            ctx.set_s(s);
        }
        if let Some(seed) = opts.seed {
            ctx.seed = seed;
        }
        match opts.pc_type {
            PcType::None => {}
            PcType::Jacobi => ctx.set_preconditioner(Jacobi::<T>::new())?,
        }
        Ok(ctx)
    }

    pub fn set_tolerance(&mut self, tol: T) -> &mut Self {
        self.tol = tol;
        self
    }

    pub fn set_max_iterations(&mut self, max_it: usize) -> &mut Self {
        self.max_it = max_it;
        self
    }

    /// Set L; values below 1 fall back to the default.
    pub fn set_l(&mut self, l: usize) -> &mut Self {
        if l < 1 {
            warn!("KspContext: L = {l} is invalid, using L = {}", IdrStabLSolver::<T>::DEFAULT_L);
            self.l = IdrStabLSolver::<T>::DEFAULT_L;
        } else {
            self.l = l;
        }
        self
    }

    /// Set S (IDR(S)Stab(L) only); values below 1 fall back to the default.
    pub fn set_s(&mut self, s: usize) -> &mut Self {
        if s < 1 {
            warn!("KspContext: S = {s} is invalid, using S = {}", IdrStabLSolver::<T>::DEFAULT_S);
            self.s = IdrStabLSolver::<T>::DEFAULT_S;
        } else {
            self.s = s;
        }
        self
    }

    pub fn set_seed(&mut self, seed: u64) -> &mut Self {
        self.seed = seed;
        self
    }

    pub fn l(&self) -> usize {
        self.l
    }

    pub fn s(&self) -> usize {
        self.s
    }

    /// Attach a preconditioner, running its setup on the owned matrix.
    pub fn set_preconditioner<P>(&mut self, mut pc: P) -> Result<(), KError>
    where
        P: Preconditioner<M, V> + 'static,
    {
        pc.setup(&self.a)?;
        self.pc = Some(Box::new(pc));
        Ok(())
    }

    /// Solve `A x = b` from a zero initial guess.
    pub fn solve(&mut self, b: &V) -> Result<V, KError> {
        let mut x = V::from(vec![T::zero(); b.as_ref().len()]);
        self.solve_with_guess(b, &mut x)?;
        Ok(x)
    }

    /// Solve `A x = b` starting from `x`, which is overwritten with the solution.
    pub fn solve_with_guess(&mut self, b: &V, x: &mut V) -> Result<SolveStats<T>, KError> {
        let stats = match self.kind {
            SolverKind::BiCgStabL => {
                let mut solver = BiCgStabLSolver::new(self.tol, self.max_it)
                    .with_l(self.l)
                    .with_seed(self.seed);
                solver.solve(&self.a, self.pc.as_deref(), b, x)?
            }
            SolverKind::IdrStabL => {
                let mut solver = IdrStabLSolver::new(self.tol, self.max_it)
                    .with_l(self.l)
                    .with_s(self.s)
                    .with_seed(self.seed);
                solver.solve(&self.a, self.pc.as_deref(), b, x)?
            }
        };
        self.last = Some(stats.clone());
        Ok(stats)
    }

    /// Status of the last solve, `None` before the first one.
    pub fn info(&self) -> Option<ComputationInfo> {
        self.last.as_ref().map(|s| s.info)
    }

    /// Outer iterations of the last solve.
    pub fn iterations(&self) -> usize {
        self.last.as_ref().map_or(0, |s| s.iterations)
    }

    /// Relative residual of the last solution.
    pub fn error(&self) -> Option<T> {
        self.last.as_ref().map(|s| s.final_residual)
    }
}
