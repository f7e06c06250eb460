//! Integration tests for preconditioners and the stabilized solvers.
//!
//! This module verifies that the preconditioners (Identity, Jacobi, ILU0) compose with
//! BiCGStab(L) and IDR(S)Stab(L) as right preconditioners: exact preconditioners give
//! convergence in at most one outer iteration, inexact ones still converge to the true
//! solution, and preconditioner failures surface as errors.

use approx::assert_abs_diff_eq;
use faer::Mat;
use krystab::error::KError;
use krystab::matrix::CsrMatrix;
use krystab::preconditioner::{Identity, Ilu0, Jacobi, Preconditioner};
use krystab::solver::{BiCgStabLSolver, IdrStabLSolver, LinearSolver};
use krystab::utils::convergence::ComputationInfo;

/// Construct a non-symmetric tridiagonal matrix of size `n` with a varying diagonal.
/// Returns the matrix, the right-hand side vector `b` for the solution x = [1, ..., 1],
/// and the true solution vector.
fn nonsym_csr(n: usize) -> (CsrMatrix<f64>, Vec<f64>, Vec<f64>) {
    let mut t = Vec::new();
    for i in 0..n {
        t.push((i, i, 2.0 + i as f64));
        if i > 0 {
            t.push((i, i - 1, -1.0));
        }
        if i + 1 < n {
            t.push((i, i + 1, 0.5));
        }
    }
    let a = CsrMatrix::from_triplets(n, n, &t);
    let x_true = vec![1.0; n];
    let mut b = vec![0.0; n];
    a.spmv(&x_true, &mut b);
    (a, b, x_true)
}

/// Compute the relative L2 error between two vectors.
fn rel_error(x: &[f64], x_true: &[f64]) -> f64 {
    let num: f64 = x.iter().zip(x_true).map(|(xi, ti)| (xi - ti).powi(2)).sum();
    let denom: f64 = x_true.iter().map(|ti| ti.powi(2)).sum();
    (num / denom).sqrt()
}

/// Build a badly conditioned diagonal matrix of size `n` with condition number `kappa`.
/// Returns the matrix and a right-hand side vector of all ones.
fn ill_cond(n: usize, kappa: f64) -> (Mat<f64>, Vec<f64>) {
    let mut a = Mat::zeros(n, n);
    for i in 0..n {
        a[(i, i)] = 1.0;
    }
    a[(n - 1, n - 1)] = kappa;
    let b = vec![1.0; n];
    (a, b)
}

/// Jacobi is exact on a diagonal matrix: A·M⁻¹ = I, so both solvers finish within one sweep.
#[test]
fn jacobi_is_exact_on_diagonal() {
    let (a, b) = ill_cond(6, 1e6);
    let mut pc = Jacobi::new();
    <Jacobi<f64> as Preconditioner<Mat<f64>, Vec<f64>>>::setup(&mut pc, &a).unwrap();

    let mut x = vec![0.0; 6];
    let stats = BiCgStabLSolver::new(1e-12, 50).solve(&a, Some(&pc), &b, &mut x).unwrap();
    assert!(stats.converged());
    assert!(stats.iterations <= 1);
    assert_abs_diff_eq!(x[5], 1e-6, epsilon = 1e-15);

    let mut x = vec![0.0; 6];
    let stats = IdrStabLSolver::new(1e-12, 50).solve(&a, Some(&pc), &b, &mut x).unwrap();
    assert!(stats.converged());
    assert!(stats.iterations <= 1);
    assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-12);
    assert_abs_diff_eq!(x[5], 1e-6, epsilon = 1e-15);
}

/// A = M = I: the BiCG-phase and FOM early exits end the solve immediately.
#[test]
fn identity_operator_and_preconditioner() {
    let n = 12;
    let a = CsrMatrix::<f64>::identity(n);
    let b: Vec<f64> = (0..n).map(|i| 1.0 + i as f64).collect();
    for l in [1, 2, 4, 8] {
        let mut x = vec![0.0; n];
        let stats = BiCgStabLSolver::new(1e-12, 10).with_l(l).solve(&a, Some(&Identity), &b, &mut x).unwrap();
        assert_eq!(stats.info, ComputationInfo::Success);
        assert!(stats.iterations <= 1, "L = {l}");
        for s in [1, 2, 4, 8] {
            let mut x = vec![0.0; n];
            let stats = IdrStabLSolver::new(1e-12, 10)
                .with_l(l)
                .with_s(s)
                .solve(&a, Some(&Identity), &b, &mut x)
                .unwrap();
            assert_eq!(stats.info, ComputationInfo::Success, "L = {l}, S = {s}");
            assert!(stats.iterations <= 1, "L = {l}, S = {s}");
            assert!(rel_error(&x, &b) < 1e-12);
        }
    }
}

/// ILU(0) of a tridiagonal matrix is its exact LU factorization.
#[test]
fn ilu0_is_exact_on_tridiagonal() {
    let n = 40;
    let (a, b, x_true) = nonsym_csr(n);
    let mut pc = Ilu0::new();
    pc.setup(&a).unwrap();

    let mut x = vec![0.0; n];
    let stats = BiCgStabLSolver::new(1e-12, 20).solve(&a, Some(&pc), &b, &mut x).unwrap();
    assert!(stats.converged());
    assert!(stats.iterations <= 1);
    assert!(rel_error(&x, &x_true) < 1e-10);

    let mut x = vec![0.0; n];
    let stats = IdrStabLSolver::new(1e-12, 20).solve(&a, Some(&pc), &b, &mut x).unwrap();
    assert!(stats.converged());
    assert!(stats.iterations <= 1);
    assert!(rel_error(&x, &x_true) < 1e-10);
}

/// An inexact preconditioner changes the iteration but not the answer.
#[test]
fn jacobi_preconditioned_solves_converge() {
    let n = 80;
    let (a, b, x_true) = nonsym_csr(n);
    let mut pc = Jacobi::new();
    <Jacobi<f64> as Preconditioner<CsrMatrix<f64>, Vec<f64>>>::setup(&mut pc, &a).unwrap();

    for l in [1, 2, 4] {
        let mut x = vec![0.0; n];
        let stats = BiCgStabLSolver::new(1e-12, 200).with_l(l).solve(&a, Some(&pc), &b, &mut x).unwrap();
        assert!(stats.converged(), "L = {l}: {stats:?}");
        assert!(rel_error(&x, &x_true) < 1e-10);

        let mut x = vec![0.0; n];
        let stats = IdrStabLSolver::new(1e-12, 200).with_l(l).solve(&a, Some(&pc), &b, &mut x).unwrap();
        assert!(stats.converged(), "L = {l}: {stats:?}");
        assert!(rel_error(&x, &x_true) < 1e-10);
    }
}

/// The identity preconditioner reproduces the unpreconditioned iteration exactly.
#[test]
fn identity_preconditioner_changes_nothing() {
    let n = 30;
    let (a, b, _) = nonsym_csr(n);
    let mut plain = vec![0.0; n];
    let mut with_pc = vec![0.0; n];
    let s1 = IdrStabLSolver::new(1e-10, 100).solve(&a, None, &b, &mut plain).unwrap();
    let s2 = IdrStabLSolver::new(1e-10, 100).solve(&a, Some(&Identity), &b, &mut with_pc).unwrap();
    assert_eq!(plain, with_pc);
    assert_eq!(s1.iterations, s2.iterations);
}

/// A preconditioner set up for another size is an error, not a numerical status.
#[test]
fn preconditioner_failure_is_an_error() {
    let (a, b, _) = nonsym_csr(10);
    let pc = Jacobi::from_diagonal(&[1.0; 4]).unwrap();
    let mut x = vec![0.0; 10];
    let res = BiCgStabLSolver::new(1e-10, 20).solve(&a, Some(&pc), &b, &mut x);
    assert!(matches!(res, Err(KError::PreconditionerError(_))));
    let res = IdrStabLSolver::new(1e-10, 20).solve(&a, Some(&pc), &b, &mut x);
    assert!(matches!(res, Err(KError::PreconditionerError(_))));
}
