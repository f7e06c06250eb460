//! BiCGStab(L): stabilized bi-conjugate gradients with L minimal-residual steps.
//!
//! Each outer iteration performs L BiCG sub-steps, building the residual block `r̂ = [r₀ … r_L]`
//! and the search-direction block `û = [u₀ … u_L]` (with `r_{j+1} = A M⁻¹ r_j`), followed by a
//! polynomial step that minimizes `‖r₀ − [r₁ … r_L] γ‖₂` with a Householder QR least-squares solve.
//!
//! The iteration is right preconditioned: it works on `A M⁻¹ y = r₀` for the correction `y` of the
//! initial guess `x₀`, and returns `x = x₀ + M⁻¹ y`.
//!
//! # Features
//! - Breakdown detection (non-finite `ρ`, zero `ρ₀` or `σ`, non-finite polynomial coefficients);
//!   the best iterate seen so far is returned with `ComputationInfo::NumericalIssue`.
//! - Early exit inside the BiCG phase, needed for trivial systems (`A = I`, exact preconditioner).
//! - Reliable updates: the recursive residual is replaced by `b' − A M⁻¹ x` when it has decreased
//!   by a factor `δ = 0.01` relative to the running maxima, and the solution is folded into a
//!   shifted base (group-wise update).
//! - Best-iterate fallback when the final iterate is worse than an earlier one.
//!
//! # References
//! - Sleijpen, G. L. G., & Fokkema, D. R. (1993). BiCGstab(ℓ) for linear equations involving
//!   unsymmetric matrices with complex spectrum. ETNA 1, 11–32.
//! - Sleijpen, G. L. G., & van Gijzen, M. B. (2010). Exploiting BiCGstab(ℓ) strategies to induce
//!   dimension reduction. SIAM J. Sci. Comput. 32(5).
//! - Fokkema, D. R. (1996). Enhanced implementation of BiCGstab(ℓ) for solving linear systems of
//!   equations. Preprint 976, Utrecht University.

use crate::core::reduction::{dot, norm};
use crate::core::traits::{MatVec, Real};
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use crate::solver::{DEFAULT_SEED, LinearSolver};
use crate::solver::operator::RightPreconditioned;
use crate::utils::block::{Block, axpy, sub_into};
use crate::utils::convergence::{
    BestIterate, ComputationInfo, Convergence, ReliableUpdate, SolveStats, UpdateAction,
};
use crate::utils::ortho::random_orthonormal;
use crate::utils::small_dense::{all_finite, least_squares, mat_from_columns};
use log::{debug, trace, warn};

/// BiCGStab(L) solver.
pub struct BiCgStabLSolver<T> {
    /// Relative tolerance and outer-iteration budget.
    pub conv: Convergence<T>,
    l: usize,
    seed: u64,
    last: Option<SolveStats<T>>,
}

impl<T: Real> BiCgStabLSolver<T> {
    /// Number of minimal-residual steps used when none (or an invalid one) is given.
    pub const DEFAULT_L: usize = 2;

    pub fn new(tol: T, max_iters: usize) -> Self {
        Self {
            conv: Convergence { tol, max_iters },
            l: Self::DEFAULT_L,
            seed: DEFAULT_SEED,
            last: None,
        }
    }

    pub fn with_l(mut self, l: usize) -> Self {
        self.set_l(l);
        self
    }

    /// Seed of the random shadow residual `r̃`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set L. Values below 1 fall back to [`Self::DEFAULT_L`].
    pub fn set_l(&mut self, l: usize) {
        if l < 1 {
            warn!("BiCGStab(L): L = {l} is invalid, using L = {}", Self::DEFAULT_L);
            self.l = Self::DEFAULT_L;
        } else {
            self.l = l;
        }
    }

    pub fn l(&self) -> usize {
        self.l
    }

    pub fn set_tolerance(&mut self, tol: T) {
        self.conv.tol = tol;
    }

    pub fn set_max_iterations(&mut self, max_iters: usize) {
        self.conv.max_iters = max_iters;
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Status of the last solve, `None` before the first one.
    pub fn info(&self) -> Option<ComputationInfo> {
        self.last.as_ref().map(|s| s.info)
    }

    /// Outer iterations performed by the last solve.
    pub fn iterations(&self) -> usize {
        self.last.as_ref().map_or(0, |s| s.iterations)
    }

    /// Relative residual of the last solution.
    pub fn error(&self) -> Option<T> {
        self.last.as_ref().map(|s| s.final_residual)
    }

    fn run<M, V>(
        &self,
        op: &RightPreconditioned<'_, M, V, T>,
        b: &[T],
        x0: &[T],
    ) -> Result<(Vec<T>, SolveStats<T>), KError>
    where
        M: MatVec<V>,
        V: AsRef<[T]> + AsMut<[T]> + From<Vec<T>>,
    {
        let n = op.dim();
        assert_eq!(b.len(), n, "right-hand side has incorrect length");
        assert_eq!(x0.len(), n, "initial guess has incorrect length");

        let rhs_norm = norm(b);
        if rhs_norm == T::zero() {
            debug!("BiCGStab(L): zero right-hand side, x = 0");
            let stats = SolveStats { iterations: 0, final_residual: T::zero(), info: ComputationInfo::Success };
            return Ok((vec![T::zero(); n], stats));
        }
        let l = self.l.min(n);
        let tol2 = self.conv.threshold(rhs_norm);
        debug!(
            "BiCGStab(L): n = {n}, L = {l}, tol = {:?}, max_iters = {}",
            self.conv.tol, self.conv.max_iters
        );

        // shifted problem A M⁻¹ y = b', starting from y = 0
        let mut b_prime = vec![T::zero(); n];
        {
            let mut ax0 = vec![T::zero(); n];
            op.matvec(x0, &mut ax0);
            sub_into(b, &ax0, &mut b_prime);
        }
        let mut r_hat = Block::zeros(n, l + 1);
        let mut u_hat = Block::zeros(n, l + 1);
        r_hat.col_mut(0).copy_from_slice(&b_prime);
        let mut normr = norm(r_hat.col(0));
        if normr == T::zero() {
            debug!("BiCGStab(L): initial guess is exact");
            let stats = SolveStats { iterations: 0, final_residual: T::zero(), info: ComputationInfo::Success };
            return Ok((x0.to_vec(), stats));
        }

        // must not be orthogonal to any residual; a random unit vector is, with probability 1
        let r_shadow = random_orthonormal::<T>(n, 1, self.seed).swap_remove(0);

        let mut x_prime = vec![T::zero(); n];
        let mut x = vec![T::zero(); n];
        let mut best = BestIterate::new(vec![T::zero(); n], normr);
        let mut reliable = ReliableUpdate::new(normr, rhs_norm);

        let mut rho0 = T::one();
        let mut alpha = T::zero();
        let mut omega = T::one();
        let mut k = 0;
        let mut breakdown = false;

        'outer: while normr > tol2 && k < self.conv.max_iters {
            rho0 = rho0 * -omega;
            let mut bicg_convergence = false;

            for j in 0..l {
                let rho1 = dot(&r_shadow, r_hat.col(j));
                if !rho1.is_finite() || rho0 == T::zero() {
                    warn!("BiCGStab(L): breakdown at iteration {k}, rho = {rho1:?}, rho0 = {rho0:?}");
                    breakdown = true;
                    break 'outer;
                }
                let beta = alpha * (rho1 / rho0);
                rho0 = rho1;

                // update search directions
                for i in 0..=j {
                    for (u, &r) in u_hat.col_mut(i).iter_mut().zip(r_hat.col(i)) {
                        *u = r - beta * *u;
                    }
                }
                {
                    let (src, dst) = u_hat.col_pair_mut(j, j + 1);
                    op.apply(src, dst)?;
                }
                let sigma = dot(&r_shadow, u_hat.col(j + 1));
                if sigma == T::zero() || !sigma.is_finite() {
                    warn!("BiCGStab(L): breakdown at iteration {k}, sigma = {sigma:?}");
                    breakdown = true;
                    break 'outer;
                }
                alpha = rho1 / sigma;

                // update residuals
                for i in 0..=j {
                    axpy(-alpha, u_hat.col(i + 1), r_hat.col_mut(i));
                }
                {
                    let (src, dst) = r_hat.col_pair_mut(j, j + 1);
                    op.apply(src, dst)?;
                }
                // complete the BiCG step
                axpy(alpha, u_hat.col(0), &mut x);

                normr = norm(r_hat.col(0));
                if normr < tol2 {
                    bicg_convergence = true;
                    break;
                }
                best.observe(normr, &x, &x_prime);
            }

            if !bicg_convergence {
                // polynomial step: argmin ‖r₀ − [r₁ … r_L] γ‖
                let cols: Vec<&[T]> = (1..=l).map(|c| r_hat.col(c)).collect();
                let gamma = least_squares(&mat_from_columns(n, &cols), r_hat.col(0));
                if !all_finite(&gamma) {
                    warn!("BiCGStab(L): polynomial step broke down at iteration {k}");
                    breakdown = true;
                    break 'outer;
                }
                for (i, &g) in gamma.iter().enumerate() {
                    axpy(g, r_hat.col(i), &mut x);
                }
                for (i, &g) in gamma.iter().enumerate() {
                    let (src, dst) = r_hat.col_pair_mut(i + 1, 0);
                    axpy(-g, src, dst);
                    let (src, dst) = u_hat.col_pair_mut(i + 1, 0);
                    axpy(-g, src, dst);
                }
                normr = norm(r_hat.col(0));
                omega = gamma[l - 1];
            }
            best.observe(normr, &x, &x_prime);
            k += 1;
            trace!("BiCGStab(L) iter {k}: residual = {:?}", normr / rhs_norm);

            let mut action = reliable.observe(normr);
            if bicg_convergence || normr <= tol2 {
                // verify convergence against the true residual
                action = UpdateAction::GroupUpdate;
            }
            if action != UpdateAction::Keep {
                normr = op.residual(&b_prime, &x, r_hat.col_mut(0))?;
                let group = action == UpdateAction::GroupUpdate;
                reliable.residual_replaced(normr, group);
                if group {
                    for (xp, xi) in x_prime.iter_mut().zip(x.iter_mut()) {
                        *xp = *xp + *xi;
                        *xi = T::zero();
                    }
                    b_prime.copy_from_slice(r_hat.col(0));
                }
                debug!(
                    "BiCGStab(L) iter {k}: residual replaced (group update: {group}), residual = {:?}",
                    normr / rhs_norm
                );
                best.observe(normr, &x, &x_prime);
            }
        }

        let y: Vec<T> = x_prime.iter().zip(&x).map(|(&p, &q)| p + q).collect();
        let (x_out, final_norm) = op.finish(b, x0, &y, &best)?;

        let error = final_norm / rhs_norm;
        // the loop only stops on a small normr after recomputing it
        let verified = !breakdown && normr <= tol2;
        let info = self.conv.classify(error, verified, breakdown);
        debug!("BiCGStab(L): {info:?} after {k} iterations, relative residual = {error:?}");
        Ok((x_out, SolveStats { iterations: k, final_residual: error, info }))
    }
}

impl<M, V, T> LinearSolver<M, V> for BiCgStabLSolver<T>
where
    M: MatVec<V>,
    V: AsMut<[T]> + AsRef<[T]> + From<Vec<T>> + Clone,
    T: Real,
{
    type Error = KError;
    type Scalar = T;

    /// Solve `A x = b` starting from the guess in `x`; `x` is overwritten with the solution.
    fn solve(&mut self, a: &M, pc: Option<&dyn Preconditioner<M, V>>, b: &V, x: &mut V) -> Result<SolveStats<T>, KError> {
        let op = RightPreconditioned::new(a, pc, b.as_ref().len());
        let (sol, stats) = self.run(&op, b.as_ref(), x.as_ref())?;
        x.as_mut().copy_from_slice(&sol);
        self.last = Some(stats.clone());
        Ok(stats)
    }
}
