//! IDR(S)Stab(L): induced dimension reduction with S-dimensional shadow spaces, polished by L
//! minimal-residual steps.
//!
//! Right preconditioned (Saad §9.3): the iteration runs on `A M⁻¹ y = b − A x₀` and returns
//! `x = x₀ + M⁻¹ y`.
//!
//! Layout of the work arrays: the stacked residual `[r₀; …; r_L]` is an `N × (L+1)` block with
//! one column per segment; the nested subspaces `U` and `V` are `N(L+1) × S` blocks whose row
//! segment `i` holds `A^i` applied to the leading segment.
//!
//! # Features
//! - Dense LU fallback when `S ≥ N` or `L ≥ N`.
//! - Arnoldi construction of the initial `U` with an early exit through the Full
//!   Orthogonalization Method when its residual estimate (Saad, Prop. 6.7) is already small,
//!   including the case of an exhausted Krylov space.
//! - Reliable updates, best-iterate fallback and breakdown detection shared with BiCGStab(L).
//!
//! # References
//! - Aihara, K., Abe, K., & Ishiwata, E. (2014). A variant of IDRstab with reliable update
//!   strategies for solving sparse linear systems. J. Comput. Appl. Math. 259, 244–258.
//! - Aihara, K., Abe, K., & Ishiwata, E. (2015). Preconditioned IDRStab algorithms for solving
//!   nonsymmetric linear systems. Int. J. Appl. Math. 45(3).
//! - Saad, Y. (2003). Iterative Methods for Sparse Linear Systems, 2nd ed. SIAM.
//! - Sonneveld, P., & van Gijzen, M. B. (2009). IDR(s): a family of simple and fast algorithms
//!   for solving large nonsymmetric systems of linear equations. SIAM J. Sci. Comput. 31(2).

use crate::core::reduction::{dot, norm, squared_norm};
use crate::core::traits::{MatTransVec, MatVec, Real};
use crate::error::KError;
use crate::preconditioner::Preconditioner;
use crate::solver::operator::RightPreconditioned;
use crate::solver::{DEFAULT_SEED, LinearSolver};
use crate::utils::block::{Block, axpy, scale, sub_into};
use crate::utils::convergence::{
    BestIterate, ComputationInfo, Convergence, ReliableUpdate, SolveStats, UpdateAction,
};
use crate::utils::ortho::{mgs, normalize, random_orthonormal};
use crate::utils::small_dense::{DenseLu, all_finite, least_squares, mat_from_columns, to_f64};
use faer::Mat;
use log::{debug, trace, warn};

/// IDR(S)Stab(L) solver.
pub struct IdrStabLSolver<T> {
    /// Relative tolerance and outer-iteration budget.
    pub conv: Convergence<T>,
    l: usize,
    s: usize,
    seed: u64,
    last: Option<SolveStats<T>>,
}

impl<T: Real> IdrStabLSolver<T> {
    pub const DEFAULT_L: usize = 2;
    pub const DEFAULT_S: usize = 4;

    pub fn new(tol: T, max_iters: usize) -> Self {
        Self {
            conv: Convergence { tol, max_iters },
            l: Self::DEFAULT_L,
            s: Self::DEFAULT_S,
            seed: DEFAULT_SEED,
            last: None,
        }
    }

    pub fn with_l(mut self, l: usize) -> Self {
        self.set_l(l);
        self
    }

    pub fn with_s(mut self, s: usize) -> Self {
        self.set_s(s);
        self
    }

    /// Seed of the random shadow space `R_T`.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Set L. Values below 1 fall back to [`Self::DEFAULT_L`].
    pub fn set_l(&mut self, l: usize) {
        if l < 1 {
            warn!("IDR(S)Stab(L): L = {l} is invalid, using L = {}", Self::DEFAULT_L);
            self.l = Self::DEFAULT_L;
        } else {
            self.l = l;
        }
    }

    /// Set S. Values below 1 fall back to [`Self::DEFAULT_S`].
    pub fn set_s(&mut self, s: usize) {
        if s < 1 {
            warn!("IDR(S)Stab(L): S = {s} is invalid, using S = {}", Self::DEFAULT_S);
            self.s = Self::DEFAULT_S;
        } else {
            self.s = s;
        }
    }

    pub fn l(&self) -> usize {
        self.l
    }

    pub fn s(&self) -> usize {
        self.s
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

    /// Solve with a dense LU of the assembled operator. The preconditioner and the initial
    /// guess play no part.
    fn solve_dense<M, V>(
        &self,
        op: &RightPreconditioned<'_, M, V, T>,
        b: &[T],
        rhs_norm: T,
    ) -> (Vec<T>, SolveStats<T>)
    where
        M: MatVec<V>,
        V: AsRef<[T]> + AsMut<[T]> + From<Vec<T>>,
    {
        let n = op.dim();
        let a = op.assemble();
        let x = DenseLu::new(&Mat::from_fn(n, n, |i, j| to_f64(a[(i, j)]))).solve(b);
        let error = op.true_residual(b, &x) / rhs_norm;
        let info = if all_finite(&x) && error.is_finite() {
            ComputationInfo::Success
        } else {
            ComputationInfo::NumericalIssue
        };
        debug!("IDR(S)Stab(L): dense fallback, relative residual = {error:?}");
        (x, SolveStats { iterations: 0, final_residual: error, info })
    }

    fn run<M, V>(
        &self,
        op: &RightPreconditioned<'_, M, V, T>,
        b: &[T],
        x0: &[T],
    ) -> Result<(Vec<T>, SolveStats<T>), KError>
    where
        M: MatVec<V> + MatTransVec<V>,
        V: AsRef<[T]> + AsMut<[T]> + From<Vec<T>>,
    {
        let n = op.dim();
        assert_eq!(b.len(), n, "right-hand side has incorrect length");
        assert_eq!(x0.len(), n, "initial guess has incorrect length");

        let rhs_norm = norm(b);
        if rhs_norm == T::zero() {
            debug!("IDR(S)Stab(L): zero right-hand side, x = 0");
            let stats = SolveStats { iterations: 0, final_residual: T::zero(), info: ComputationInfo::Success };
            return Ok((vec![T::zero(); n], stats));
        }
        let (l, s) = (self.l, self.s);
        if s >= n || l >= n {
            debug!("IDR(S)Stab(L): S = {s}, L = {l} not smaller than n = {n}, solving directly");
            return Ok(self.solve_dense(op, b, rhs_norm));
        }
        let tol2 = self.conv.threshold(rhs_norm);
        debug!(
            "IDR(S)Stab(L): n = {n}, S = {s}, L = {l}, tol = {:?}, max_iters = {}",
            self.conv.tol, self.conv.max_iters
        );

        // shifted problem A M⁻¹ y = b', starting from y = 0
        let mut b_prime = vec![T::zero(); n];
        {
            let mut ax0 = vec![T::zero(); n];
            op.matvec(x0, &mut ax0);
            sub_into(b, &ax0, &mut b_prime);
        }
        let mut normr = norm(&b_prime);
        if normr == T::zero() {
            debug!("IDR(S)Stab(L): initial guess is exact");
            let stats = SolveStats { iterations: 0, final_residual: T::zero(), info: ComputationInfo::Success };
            return Ok((x0.to_vec(), stats));
        }
        let mut best = BestIterate::new(vec![T::zero(); n], normr);

        // Arnoldi basis of span{r, A M⁻¹ r, …} in the leading segment of U, with the
        // S × (S−1) Hessenberg matrix of the process (row-major).
        let mut big_u = Block::zeros(n * (l + 1), s);
        let mut h_fom = vec![T::zero(); s * (s - 1)];
        let mut exhausted_at = None;
        {
            let top = big_u.segment_mut(0, 0..n);
            top.copy_from_slice(&b_prime);
            normalize(top);
        }
        // directions below rounding level of A M⁻¹ u carry no information
        let exhaustion_tol = T::epsilon() * T::from_usize(n.max(16)).unwrap_or_else(T::one);
        for c in 1..s {
            let mut w = vec![T::zero(); n];
            op.apply(big_u.segment(c - 1, 0..n), &mut w)?;
            let w_norm = norm(&w);
            let h = mgs((0..c).map(|i| big_u.segment(i, 0..n)), &mut w);
            for (i, hi) in h.into_iter().enumerate() {
                h_fom[i * (s - 1) + c - 1] = hi;
            }
            let hn = normalize(&mut w);
            if hn <= exhaustion_tol * w_norm {
                // the residual already lies in the span built so far
                exhausted_at = Some(c);
                break;
            }
            h_fom[c * (s - 1) + c - 1] = hn;
            big_u.segment_mut(c, 0..n).copy_from_slice(&w);
        }

        if s > 1 {
            let m = exhausted_at.unwrap_or(s - 1);
            let hm = Mat::from_fn(m, m, |i, c| to_f64(h_fom[i * (s - 1) + c]));
            let mut e1 = vec![T::zero(); m];
            e1[0] = normr;
            let y = DenseLu::new(&hm).solve(&e1);
            // Saad, Prop. 6.7: ‖b − A x_m‖ = h_{m+1,m} |e_mᵀ y|, no extra product needed
            let estimate = match exhausted_at {
                Some(_) => T::zero(),
                None => (h_fom[(s - 1) * (s - 1) + s - 2] * y[s - 2]).abs(),
            };
            if all_finite(&y) && estimate < tol2 {
                let mut correction = vec![T::zero(); n];
                big_u.combine(0..m, 0..n, &y, &mut correction);
                let x = op.recover(x0, &correction)?;
                let res = op.true_residual(b, &x);
                if res <= tol2 {
                    let error = res / rhs_norm;
                    debug!("IDR(S)Stab(L): converged in the initial FOM step, relative residual = {error:?}");
                    let stats = SolveStats { iterations: 0, final_residual: error, info: ComputationInfo::Success };
                    return Ok((x, stats));
                }
                best.observe(res, &correction, &vec![T::zero(); n]);
                debug!("IDR(S)Stab(L): FOM candidate rejected, residual = {:?}", res / rhs_norm);
            }
        }

        // shadow space: orthonormal rows R_T and AR_T = R_T A (stored as rows Aᵀ r_i)
        let r_t = random_orthonormal::<T>(n, s, self.seed);
        let ar_t: Vec<Vec<T>> = r_t
            .iter()
            .map(|ri| {
                let mut row = vec![T::zero(); n];
                op.mattransvec(ri, &mut row);
                row
            })
            .collect();
        // AR_T M⁻¹ v
        let project = |v: &[T]| -> Result<Vec<T>, KError> {
            let mut z = vec![T::zero(); n];
            op.precondition(v, &mut z)?;
            Ok(ar_t.iter().map(|row| dot(row, &z)).collect())
        };

        let mut r = Block::zeros(n, l + 1);
        let mut u = Block::zeros(n, l + 1);
        let mut big_v = Block::zeros(n * (l + 1), s);
        r.col_mut(0).copy_from_slice(&b_prime);
        let mut x_prime = vec![T::zero(); n];
        let mut x = vec![T::zero(); n];
        let mut update = vec![T::zero(); n];
        let mut tmp = vec![T::zero(); n];
        let mut reliable = ReliableUpdate::new(normr, rhs_norm);
        let mut k = 0;
        let mut breakdown = false;

        'outer: while normr > tol2 && k < self.conv.max_iters {
            let mut idr_converged = false;

            for j in 1..=l {
                // IDR step
                let sigma_cols = (0..s)
                    .map(|i| project(big_u.segment(i, n * (j - 1)..n * j)))
                    .collect::<Result<Vec<_>, _>>()?;
                let sigma_refs: Vec<&[T]> = sigma_cols.iter().map(|c| c.as_slice()).collect();
                let sigma = DenseLu::new(&mat_from_columns(s, &sigma_refs));
                let rhs: Vec<T> = if j == 1 {
                    r_t.iter().map(|row| dot(row, r.col(0))).collect()
                } else {
                    project(r.col(j - 2))?
                };
                let alpha = sigma.solve(&rhs);
                if !all_finite(&alpha) {
                    warn!("IDR(S)Stab(L): singular sigma at iteration {k}, step {j}");
                    breakdown = true;
                    break 'outer;
                }

                big_u.combine(0..s, 0..n, &alpha, &mut update);
                op.apply(&update, &mut tmp)?;
                axpy(-T::one(), &tmp, r.col_mut(0));
                axpy(T::one(), &update, &mut x);
                for i in 1..j.saturating_sub(1) {
                    big_u.sub_combination(0..s, n * (i + 1)..n * (i + 2), &alpha, r.col_mut(i));
                }
                if j > 1 {
                    let (src, dst) = r.col_pair_mut(j - 2, j - 1);
                    op.apply(src, dst)?;
                }
                normr = norm(r.col(0));
                if normr < tol2 {
                    idr_converged = true;
                    break;
                }
                best.observe(normr, &x, &x_prime);

                // rebuild the nested subspace into V
                let mut exhausted = false;
                for q in 1..=s {
                    if q == 1 {
                        for i in 0..=j {
                            u.col_mut(i).copy_from_slice(r.col(i));
                        }
                    } else {
                        for i in 0..j {
                            let (src, dst) = u.col_pair_mut(i + 1, i);
                            dst.copy_from_slice(src);
                        }
                    }
                    let beta = sigma.solve(&project(u.col(j - 1))?);
                    if !all_finite(&beta) {
                        warn!("IDR(S)Stab(L): singular sigma while rebuilding U at iteration {k}");
                        breakdown = true;
                        break 'outer;
                    }
                    for i in 0..j {
                        big_u.sub_combination(0..s, n * i..n * (i + 1), &beta, u.col_mut(i));
                    }
                    {
                        let (src, dst) = u.col_pair_mut(j - 1, j);
                        op.apply(src, dst)?;
                    }
                    // orthogonalize the new segment against V(:, 0..q−1)
                    for i in 0..q - 1 {
                        let lead = big_v.segment(i, n * j..n * (j + 1));
                        let coeff = dot(lead, u.col(j)) / squared_norm(lead);
                        for seg in 0..=j {
                            axpy(-coeff, big_v.segment(i, n * seg..n * (seg + 1)), u.col_mut(seg));
                        }
                    }
                    let nc = norm(u.col(j));
                    if nc == T::zero() {
                        // Krylov space exhausted: no further direction to add
                        debug!("IDR(S)Stab(L): subspace exhausted at iteration {k}, step {j}, column {q}");
                        u.set_zero();
                        exhausted = true;
                        break;
                    }
                    for seg in 0..=j {
                        scale(T::one() / nc, u.col_mut(seg));
                        big_v.segment_mut(q - 1, n * seg..n * (seg + 1)).copy_from_slice(u.col(seg));
                    }
                }
                if !exhausted {
                    big_u.copy_from(&big_v);
                }
            }

            if !idr_converged {
                // polynomial step: argmin ‖r₀ − [r₁ … r_L] γ‖
                {
                    let (src, dst) = r.col_pair_mut(l - 1, l);
                    op.apply(src, dst)?;
                }
                let cols: Vec<&[T]> = (1..=l).map(|c| r.col(c)).collect();
                let gamma = least_squares(&mat_from_columns(n, &cols), r.col(0));
                if !all_finite(&gamma) {
                    warn!("IDR(S)Stab(L): polynomial step broke down at iteration {k}");
                    breakdown = true;
                    break 'outer;
                }
                r.combine(0..l, 0..n, &gamma, &mut update);
                axpy(T::one(), &update, &mut x);
                op.apply(&update, &mut tmp)?;
                axpy(-T::one(), &tmp, r.col_mut(0));
                normr = norm(r.col(0));

                // U₀ ← U₀ − Σ γ_i U_i
                for c in 0..s {
                    let (top, rest) = big_u.col_mut(c).split_at_mut(n);
                    for (i, &g) in gamma.iter().enumerate() {
                        axpy(-g, &rest[n * i..n * (i + 1)], top);
                    }
                }
            }
            k += 1;
            trace!("IDR(S)Stab(L) iter {k}: residual = {:?}", normr / rhs_norm);
            best.observe(normr, &x, &x_prime);

            let mut action = reliable.observe(normr);
            if idr_converged || normr <= tol2 {
                action = UpdateAction::GroupUpdate;
            }
            if action != UpdateAction::Keep {
                normr = op.residual(&b_prime, &x, r.col_mut(0))?;
                let group = action == UpdateAction::GroupUpdate;
                reliable.residual_replaced(normr, group);
                if group {
                    for (xp, xi) in x_prime.iter_mut().zip(x.iter_mut()) {
                        *xp = *xp + *xi;
                        *xi = T::zero();
                    }
                    b_prime.copy_from_slice(r.col(0));
                }
                debug!(
                    "IDR(S)Stab(L) iter {k}: residual replaced (group update: {group}), residual = {:?}",
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
        debug!("IDR(S)Stab(L): {info:?} after {k} iterations, relative residual = {error:?}");
        Ok((x_out, SolveStats { iterations: k, final_residual: error, info }))
    }
}

impl<M, V, T> LinearSolver<M, V> for IdrStabLSolver<T>
where
    M: MatVec<V> + MatTransVec<V>,
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::CsrMatrix;
    use approx::assert_abs_diff_eq;

    fn tridiag(n: usize) -> CsrMatrix<f64> {
        let mut t = Vec::new();
        for i in 0..n {
            t.push((i, i, 4.0));
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            if i + 1 < n {
                t.push((i, i + 1, 0.5));
            }
        }
        CsrMatrix::from_triplets(n, n, &t)
    }

    #[test]
    fn small_system_falls_back_to_lu() {
        let a = tridiag(3);
        let b = vec![1.0, 2.0, 3.0];
        let expected = DenseLu::new(&mat_from_columns(
            3,
            &[&[4.0, -1.0, 0.0][..], &[0.5, 4.0, -1.0][..], &[0.0, 0.5, 4.0][..]],
        ))
        .solve(&b);
        for (s, l) in [(4, 1), (1, 3)] {
            let mut x = vec![0.0; 3];
            let mut solver = IdrStabLSolver::new(1e-12, 10).with_s(s).with_l(l);
            let stats = solver.solve(&a, None, &b, &mut x).unwrap();
            assert_eq!(stats.iterations, 0);
            assert_eq!(stats.info, ComputationInfo::Success);
            for (xi, ei) in x.iter().zip(&expected) {
                assert_abs_diff_eq!(*xi, *ei, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn identity_converges_without_outer_sweeps() {
        let a = CsrMatrix::<f64>::identity(10);
        let b: Vec<f64> = (0..10).map(|i| (i as f64).sin() + 2.0).collect();
        for s in [1, 2, 4] {
            let mut x = vec![0.0; 10];
            let mut solver = IdrStabLSolver::new(1e-12, 20).with_s(s);
            let stats = solver.solve(&a, None, &b, &mut x).unwrap();
            assert_eq!(stats.info, ComputationInfo::Success, "S = {s}");
            assert!(stats.iterations <= 1, "S = {s}: {} iterations", stats.iterations);
            for (xi, bi) in x.iter().zip(&b) {
                assert_abs_diff_eq!(*xi, *bi, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn two_eigenvalues_exit_through_fom() {
        // minimal polynomial of degree 2: the initial basis already holds the solution
        let n = 10;
        let t: Vec<(usize, usize, f64)> = (0..n).map(|i| (i, i, if i % 2 == 0 { 2.0 } else { 5.0 })).collect();
        let a = CsrMatrix::from_triplets(n, n, &t);
        let b = vec![1.0; n];
        let mut x = vec![0.0; n];
        let mut solver = IdrStabLSolver::new(1e-10, 20).with_s(4);
        let stats = solver.solve(&a, None, &b, &mut x).unwrap();
        assert!(stats.converged());
        assert_eq!(stats.iterations, 0);
        for (i, xi) in x.iter().enumerate() {
            let expected = if i % 2 == 0 { 0.5 } else { 0.2 };
            assert_abs_diff_eq!(*xi, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn solves_nonsymmetric_tridiagonal() {
        let n = 40;
        let a = tridiag(n);
        let x_true: Vec<f64> = (0..n).map(|i| 1.0 + (i % 5) as f64).collect();
        let mut b = vec![0.0; n];
        a.spmv(&x_true, &mut b);
        for (s, l) in [(1, 1), (2, 2), (4, 2), (8, 4)] {
            let mut x = vec![0.0; n];
            let mut solver = IdrStabLSolver::new(1e-11, 200).with_s(s).with_l(l);
            let stats = solver.solve(&a, None, &b, &mut x).unwrap();
            assert!(stats.converged(), "S = {s}, L = {l}: {stats:?}");
            for (xi, ti) in x.iter().zip(&x_true) {
                assert_abs_diff_eq!(*xi, *ti, epsilon = 1e-8);
            }
        }
    }

    #[test]
    fn zero_rhs_returns_zero() {
        let a = tridiag(8);
        let mut x = vec![1.0; 8];
        let mut solver = IdrStabLSolver::new(1e-10, 20);
        let stats = solver.solve(&a, None, &vec![0.0; 8], &mut x).unwrap();
        assert_eq!(x, vec![0.0; 8]);
        assert_eq!(stats.iterations, 0);
        assert_eq!(solver.error(), Some(0.0));
    }

    #[test]
    fn invalid_parameters_are_clamped() {
        let mut solver = IdrStabLSolver::<f64>::new(1e-8, 10);
        solver.set_s(0);
        solver.set_l(0);
        assert_eq!(solver.s(), IdrStabLSolver::<f64>::DEFAULT_S);
        assert_eq!(solver.l(), IdrStabLSolver::<f64>::DEFAULT_L);
    }
}
