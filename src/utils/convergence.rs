//! Convergence tracking & tolerance checks for iterative solvers.
//!
//! Besides the stopping criteria this module holds the bookkeeping shared by
//! the stabilized solvers: the best-iterate tracker and the reliable-update
//! (residual replacement / group-wise update) policy of Sleijpen & van der
//! Vorst, as refined by Fokkema (1996).

use num_traits::Float;

/// Outcome of a solve.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComputationInfo {
    /// Relative residual below tolerance.
    Success,
    /// Iteration budget exhausted; the last (or best) iterate is returned.
    NoConvergence,
    /// The recurrence broke down (zero or non-finite pivot); the best iterate
    /// found so far is returned.
    NumericalIssue,
}

/// Stopping criteria & stats.
#[derive(Clone, Debug)]
pub struct Convergence<T> {
    pub tol: T,
    pub max_iters: usize,
}

#[derive(Clone, Debug)]
pub struct SolveStats<T> {
    pub iterations: usize,
    /// Relative residual `‖b − A x‖ / ‖b‖` of the returned iterate.
    pub final_residual: T,
    pub info: ComputationInfo,
}

impl<T> SolveStats<T> {
    pub fn converged(&self) -> bool {
        self.info == ComputationInfo::Success
    }
}

impl<T: Copy + Float> Convergence<T> {
    /// Absolute residual threshold `tol · ‖b‖`.
    pub fn threshold(&self, rhs_norm: T) -> T {
        self.tol * rhs_norm
    }

    /// Map the outcome of a solve to a status. `verified` means the iteration
    /// stopped on a recomputed residual below the threshold; the returned
    /// iterate then counts as converged even if the final unshifted residual
    /// lands a few ulps above `tol`.
    pub fn classify(&self, relative_residual: T, verified: bool, breakdown: bool) -> ComputationInfo {
        if !relative_residual.is_finite() {
            ComputationInfo::NumericalIssue
        } else if verified || relative_residual <= self.tol {
            ComputationInfo::Success
        } else if breakdown {
            ComputationInfo::NumericalIssue
        } else {
            ComputationInfo::NoConvergence
        }
    }
}

/// Keeps the iterate with the smallest observed residual norm.
///
/// The recurrences can transiently grow the residual even after a better
/// iterate was available; the solvers fall back to this snapshot when the
/// final iterate is worse.
#[derive(Clone, Debug)]
pub struct BestIterate<T> {
    x: Vec<T>,
    residual: T,
}

impl<T: Float> BestIterate<T> {
    pub fn new(x: Vec<T>, residual: T) -> Self {
        Self { x, residual }
    }

    /// Record `base + x` if `residual` improves on the stored one.
    pub fn observe(&mut self, residual: T, x: &[T], base: &[T]) -> bool {
        if !(residual < self.residual) {
            return false;
        }
        for ((b, &xi), &bi) in self.x.iter_mut().zip(x).zip(base) {
            *b = xi + bi;
        }
        self.residual = residual;
        true
    }

    pub fn residual(&self) -> T {
        self.residual
    }

    pub fn x(&self) -> &[T] {
        &self.x
    }
}

/// What the reliable-update policy asks the solver to do after an outer step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UpdateAction {
    /// Keep the recursive residual.
    Keep,
    /// Recompute the residual from its definition.
    ComputeResidual,
    /// Recompute the residual and fold the accumulated solution into the
    /// shifted base (group-wise update).
    GroupUpdate,
}

/// Running maxima `Mx`, `Mr` and the threshold `delta` deciding when the
/// recursively updated residual is replaced by the true one.
#[derive(Clone, Debug)]
pub struct ReliableUpdate<T> {
    delta: T,
    rhs_norm: T,
    /// Largest residual norm since the last group-wise update of x.
    mx: T,
    /// Largest residual norm since the last true-residual computation.
    mr: T,
}

impl<T: Float> ReliableUpdate<T> {
    pub fn new(initial_residual: T, rhs_norm: T) -> Self {
        Self {
            delta: T::from(0.01).unwrap_or_else(T::epsilon),
            rhs_norm,
            mx: initial_residual,
            mr: initial_residual,
        }
    }

    /// Feed the recursive residual norm at the end of an outer step.
    pub fn observe(&mut self, normr: T) -> UpdateAction {
        self.mx = self.mx.max(normr);
        self.mr = self.mr.max(normr);
        let update_app = normr < self.delta * self.rhs_norm && self.rhs_norm <= self.mx;
        if update_app {
            UpdateAction::GroupUpdate
        } else if normr < self.delta * self.mr && self.rhs_norm <= self.mr {
            UpdateAction::ComputeResidual
        } else {
            UpdateAction::Keep
        }
    }

    /// Reset the maxima after the residual was recomputed.
    pub fn residual_replaced(&mut self, normr: T, group_update: bool) {
        self.mr = normr;
        if group_update {
            self.mx = normr;
        }
    }
}
