//! Binary reductions: fold two equally shaped scalar sequences into one value.
//!
//! Every dot product and norm in the crate funnels through [`redux`]. A
//! reduction is described by a [`BinaryReduce`] operator: an identity value,
//! a per-coefficient step `f(acc, a_i, b_i)` and a `merge` that combines two
//! partial accumulators. The traversal is free to reassociate the fold:
//!
//! - the *scalar* path keeps two interleaved accumulators and merges them at
//!   the end;
//! - the *packed* path keeps `2 × LANES` independent accumulators, walks the
//!   input in chunks of `LANES`, horizontally merges the lanes and then folds
//!   the `n mod LANES` tail scalarly;
//! - the *unrolled* path handles sizes known at compile time with a plain
//!   left fold;
//! - with the `rayon` feature, very long inputs are split into independent
//!   blocks reduced with the packed path and merged pairwise.
//!
//! All paths agree with the sequential left fold up to floating-point
//! accumulation error. An empty input yields the operator's identity.
//! Mismatched lengths are a contract violation and panic.
//!
//! # References
//! - Higham, N. J. (2002). Accuracy and Stability of Numerical Algorithms, §3.1.

use faer::Mat;
use num_traits::Float;

/// Width of one packed chunk (scalars accumulated side by side).
pub const DEFAULT_LANES: usize = 4;

/// Inputs at least this long are split across threads when `rayon` is on.
#[cfg(feature = "rayon")]
pub const PARALLEL_THRESHOLD: usize = 1 << 15;

#[cfg(feature = "rayon")]
const PARALLEL_BLOCK: usize = 1 << 12;

/// A binary reduction operator.
pub trait BinaryReduce<T: Copy> {
    /// Whether reassociating the fold (packed traversal) is permitted.
    const PACKET_ACCESS: bool = true;
    /// Identity value of the fold.
    fn init(&self) -> T;
    /// One step of the fold: `acc ⊕ f(a, b)`.
    fn coeff(&self, acc: T, a: T, b: T) -> T;
    /// Combine two partial accumulators.
    fn merge(&self, lhs: T, rhs: T) -> T;
}

/// Multiply-accumulate: `Σ aᵢ bᵢ`. For real scalars the conjugate of the
/// left operand is the operand itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct InnerProductOp;

impl<T: Float> BinaryReduce<T> for InnerProductOp {
    #[inline(always)]
    fn init(&self) -> T {
        T::zero()
    }
    #[inline(always)]
    fn coeff(&self, acc: T, a: T, b: T) -> T {
        a * b + acc
    }
    #[inline(always)]
    fn merge(&self, lhs: T, rhs: T) -> T {
        lhs + rhs
    }
}

/// Squared Euclidean distance: `Σ (aᵢ − bᵢ)²`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SquaredDistanceOp;

impl<T: Float> BinaryReduce<T> for SquaredDistanceOp {
    #[inline(always)]
    fn init(&self) -> T {
        T::zero()
    }
    #[inline(always)]
    fn coeff(&self, acc: T, a: T, b: T) -> T {
        let d = a - b;
        d * d + acc
    }
    #[inline(always)]
    fn merge(&self, lhs: T, rhs: T) -> T {
        lhs + rhs
    }
}

/// Largest absolute difference: `max |aᵢ − bᵢ|`.
#[derive(Clone, Copy, Debug, Default)]
pub struct MaxAbsDiffOp;

impl<T: Float> BinaryReduce<T> for MaxAbsDiffOp {
    #[inline(always)]
    fn init(&self) -> T {
        T::zero()
    }
    #[inline(always)]
    fn coeff(&self, acc: T, a: T, b: T) -> T {
        acc.max((a - b).abs())
    }
    #[inline(always)]
    fn merge(&self, lhs: T, rhs: T) -> T {
        lhs.max(rhs)
    }
}

#[inline]
fn assert_same_len<T>(lhs: &[T], rhs: &[T]) {
    assert_eq!(
        lhs.len(),
        rhs.len(),
        "binary reduction: lhs and rhs must have the same length"
    );
}

/// Reduce `lhs` and `rhs` with `op`, choosing the traversal automatically.
pub fn redux<T, F>(op: &F, lhs: &[T], rhs: &[T]) -> T
where
    T: Copy + Send + Sync,
    F: BinaryReduce<T> + Sync,
{
    assert_same_len(lhs, rhs);
    if !F::PACKET_ACCESS || lhs.len() < DEFAULT_LANES {
        return redux_scalar(op, lhs, rhs);
    }
    #[cfg(feature = "rayon")]
    {
        if lhs.len() >= PARALLEL_THRESHOLD {
            return redux_parallel(op, lhs, rhs);
        }
    }
    redux_packed::<T, F, DEFAULT_LANES>(op, lhs, rhs)
}

/// Scalar traversal with two interleaved accumulators.
pub fn redux_scalar<T, F>(op: &F, lhs: &[T], rhs: &[T]) -> T
where
    T: Copy,
    F: BinaryReduce<T>,
{
    assert_same_len(lhs, rhs);
    let size = lhs.len();
    let size2 = size - size % 2;
    let mut result = op.init();
    if size2 > 0 {
        let mut result2 = op.init();
        for k in (0..size2).step_by(2) {
            result = op.coeff(result, lhs[k], rhs[k]);
            result2 = op.coeff(result2, lhs[k + 1], rhs[k + 1]);
        }
        result = op.merge(result, result2);
    }
    if size > size2 {
        result = op.coeff(result, lhs[size2], rhs[size2]);
    }
    result
}

/// Packed traversal: `LANES`-wide chunks with two packet accumulators, then
/// a horizontal merge and a scalar tail.
pub fn redux_packed<T, F, const LANES: usize>(op: &F, lhs: &[T], rhs: &[T]) -> T
where
    T: Copy,
    F: BinaryReduce<T>,
{
    assert!(LANES > 0, "packed reduction needs at least one lane");
    assert_same_len(lhs, rhs);
    let size = lhs.len();
    let packet_end = size - size % LANES;
    let packet_end2 = size - size % (2 * LANES);

    let mut result = op.init();
    if packet_end > 0 {
        let mut packet = [op.init(); LANES];
        if packet_end2 > 0 {
            let mut packet2 = [op.init(); LANES];
            for (l, r) in lhs[..packet_end2]
                .chunks_exact(2 * LANES)
                .zip(rhs[..packet_end2].chunks_exact(2 * LANES))
            {
                for lane in 0..LANES {
                    packet[lane] = op.coeff(packet[lane], l[lane], r[lane]);
                    packet2[lane] = op.coeff(packet2[lane], l[LANES + lane], r[LANES + lane]);
                }
            }
            for lane in 0..LANES {
                packet[lane] = op.merge(packet[lane], packet2[lane]);
            }
        }
        if packet_end > packet_end2 {
            for lane in 0..LANES {
                let k = packet_end2 + lane;
                packet[lane] = op.coeff(packet[lane], lhs[k], rhs[k]);
            }
        }
        result = predux(op, &packet);
    }
    for k in packet_end..size {
        result = op.coeff(result, lhs[k], rhs[k]);
    }
    result
}

/// Horizontal merge of one packet, pairwise.
#[inline]
fn predux<T: Copy, F: BinaryReduce<T>>(op: &F, packet: &[T]) -> T {
    match packet.len() {
        0 => op.init(),
        1 => packet[0],
        n => {
            let (lo, hi) = packet.split_at(n / 2);
            op.merge(predux(op, lo), predux(op, hi))
        }
    }
}

/// Fully unrolled reduction for sizes fixed at compile time.
#[inline(always)]
pub fn redux_unrolled<T, F, const N: usize>(op: &F, lhs: &[T; N], rhs: &[T; N]) -> T
where
    T: Copy,
    F: BinaryReduce<T>,
{
    lhs.iter()
        .zip(rhs.iter())
        .fold(op.init(), |acc, (&a, &b)| op.coeff(acc, a, b))
}

/// Data-parallel reduction: blocks reduced with the packed path, then merged
/// in block order so the result does not depend on the thread schedule.
#[cfg(feature = "rayon")]
pub fn redux_parallel<T, F>(op: &F, lhs: &[T], rhs: &[T]) -> T
where
    T: Copy + Send + Sync,
    F: BinaryReduce<T> + Sync,
{
    use rayon::prelude::*;
    assert_same_len(lhs, rhs);
    let partials: Vec<T> = lhs
        .par_chunks(PARALLEL_BLOCK)
        .zip(rhs.par_chunks(PARALLEL_BLOCK))
        .map(|(l, r)| redux_packed::<T, F, DEFAULT_LANES>(op, l, r))
        .collect();
    partials.into_iter().fold(op.init(), |a, b| op.merge(a, b))
}

/// Reduce two equally shaped dense matrices, column by column (faer's
/// storage order). Each column is walked in packets; the scalar tails of all
/// columns share one accumulator and the packet accumulator is merged last.
pub fn redux_columns<T, F>(op: &F, lhs: &Mat<T>, rhs: &Mat<T>) -> T
where
    T: Copy,
    F: BinaryReduce<T>,
{
    assert!(
        lhs.nrows() == rhs.nrows() && lhs.ncols() == rhs.ncols(),
        "binary reduction: incompatible matrix dimensions"
    );
    let inner = lhs.nrows();
    let packet_end = inner - inner % DEFAULT_LANES;
    let mut scalar = op.init();
    let mut packet = [op.init(); DEFAULT_LANES];
    for j in 0..lhs.ncols() {
        for i in (0..packet_end).step_by(DEFAULT_LANES) {
            for lane in 0..DEFAULT_LANES {
                packet[lane] = op.coeff(packet[lane], lhs[(i + lane, j)], rhs[(i + lane, j)]);
            }
        }
        for i in packet_end..inner {
            scalar = op.coeff(scalar, lhs[(i, j)], rhs[(i, j)]);
        }
    }
    op.merge(predux(op, &packet), scalar)
}

/// Dot product `Σ xᵢ yᵢ`.
#[inline]
pub fn dot<T: Float + Send + Sync>(x: &[T], y: &[T]) -> T {
    redux(&InnerProductOp, x, y)
}

/// Squared Euclidean norm.
#[inline]
pub fn squared_norm<T: Float + Send + Sync>(x: &[T]) -> T {
    redux(&InnerProductOp, x, x)
}

/// Euclidean norm.
#[inline]
pub fn norm<T: Float + Send + Sync>(x: &[T]) -> T {
    squared_norm(x).sqrt()
}

/// Euclidean distance `‖x − y‖₂`.
#[inline]
pub fn distance<T: Float + Send + Sync>(x: &[T], y: &[T]) -> T {
    redux(&SquaredDistanceOp, x, y).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn random_pair(n: usize, seed: u64) -> (Vec<f64>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let x = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        let y = (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect();
        (x, y)
    }

    fn naive_dot(x: &[f64], y: &[f64]) -> (f64, f64) {
        let mut acc = 0.0;
        let mut abs = 0.0;
        for (a, b) in x.iter().zip(y) {
            acc += a * b;
            abs += (a * b).abs();
        }
        (acc, abs)
    }

    #[test]
    fn dot_matches_sequential_fold() {
        for (seed, &n) in [0usize, 1, 2, 3, 4, 7, 16, 17, 100].iter().enumerate() {
            let (x, y) = random_pair(n, seed as u64);
            let (reference, magnitude) = naive_dot(&x, &y);
            let bound = 2.0 * (n as f64 + 1.0) * f64::EPSILON * magnitude;
            for got in [
                dot(&x, &y),
                redux_scalar(&InnerProductOp, &x, &y),
                redux_packed::<f64, _, 4>(&InnerProductOp, &x, &y),
                redux_packed::<f64, _, 8>(&InnerProductOp, &x, &y),
                redux_packed::<f64, _, 3>(&InnerProductOp, &x, &y),
            ] {
                assert!(
                    (got - reference).abs() <= bound,
                    "n = {n}: got {got}, reference {reference}, bound {bound}"
                );
            }
        }
    }

    #[test]
    fn empty_input_yields_identity() {
        let empty: [f64; 0] = [];
        assert_eq!(dot(&empty, &empty), 0.0);
        assert_eq!(redux_packed::<f64, _, 4>(&InnerProductOp, &empty, &empty), 0.0);
        assert_eq!(redux_unrolled(&InnerProductOp, &empty, &empty), 0.0);
        assert_eq!(norm::<f64>(&[]), 0.0);
    }

    #[test]
    fn unrolled_matches_packed() {
        let x = [1.0, -2.0, 3.5, 0.25, 4.0, -1.5, 2.0];
        let y = [0.5, 1.0, -2.0, 8.0, 0.125, 3.0, -1.0];
        let a = redux_unrolled(&InnerProductOp, &x, &y);
        let b = dot(&x, &y);
        assert!((a - b).abs() <= 16.0 * f64::EPSILON * 20.0);
    }

    #[test]
    fn distance_and_max_abs_diff() {
        let x = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y = [1.0, 0.0, 3.0, 1.0, 5.0];
        assert_eq!(distance(&x, &y), 13.0f64.sqrt());
        assert_eq!(redux(&MaxAbsDiffOp, &x, &y), 3.0);
    }

    #[test]
    fn column_traversal_matches_flat_dot() {
        let a = Mat::from_fn(7, 3, |i, j| (i as f64 + 1.0) * 0.5 - j as f64);
        let b = Mat::from_fn(7, 3, |i, j| (j as f64 + 2.0) / (i as f64 + 1.0));
        let flat_a: Vec<f64> = (0..3).flat_map(|j| (0..7).map(move |i| (i, j))).map(|(i, j)| a[(i, j)]).collect();
        let flat_b: Vec<f64> = (0..3).flat_map(|j| (0..7).map(move |i| (i, j))).map(|(i, j)| b[(i, j)]).collect();
        let expected = dot(&flat_a, &flat_b);
        let got = redux_columns(&InnerProductOp, &a, &b);
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    #[should_panic(expected = "same length")]
    fn mismatched_lengths_panic() {
        let _ = dot(&[1.0, 2.0], &[1.0]);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_path_matches_packed() {
        let (x, y) = random_pair(PARALLEL_THRESHOLD + 13, 42);
        let (reference, magnitude) = naive_dot(&x, &y);
        let bound = 2.0 * (x.len() as f64) * f64::EPSILON * magnitude;
        assert!((redux_parallel(&InnerProductOp, &x, &y) - reference).abs() <= bound);
        assert!((dot(&x, &y) - reference).abs() <= bound);
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn parallel_path_merges_blocks_in_order() {
        let (x, y) = random_pair(8 * PARALLEL_THRESHOLD + 5, 3);
        let expected = x
            .chunks(PARALLEL_BLOCK)
            .zip(y.chunks(PARALLEL_BLOCK))
            .map(|(l, r)| redux_packed::<f64, _, DEFAULT_LANES>(&InnerProductOp, l, r))
            .fold(0.0, |a, b| a + b);
        for _ in 0..8 {
            assert_eq!(redux_parallel(&InnerProductOp, &x, &y), expected);
            assert_eq!(dot(&x, &y), expected);
        }
    }
}
