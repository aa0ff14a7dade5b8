//! Contraction of Chebyshev moment tensors against kernel-weighted energy
//! integrals.
//!
//! The energy integral is always the trapezoid rule on the [`EnergyGrid`].
//! Rank-2 contractions fold the kernel into one moment index first, as a
//! dense `energies x M` kernel matrix times the (possibly transposed) moment
//! matrix, then the Green's function into the other index, then integrate.
//! The blocked parallel path in [`super::parallel`] uses the same product per
//! column block.

use super::DenseComplexMatrix;
use super::grid::{EnergyGrid, FrequencyGrid};
use super::moments::{MomentMatrix, MomentVector};
use super::stable_sum;
use num_complex::Complex64;
use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractionError {
    #[error("moment vector has length {actual}, expected NumMoments={expected}")]
    VectorLength { expected: usize, actual: usize },
    #[error("moment matrix is {rows}x{cols}, expected {expected}x{expected}")]
    MatrixShape {
        expected: usize,
        rows: usize,
        cols: usize,
    },
    #[error("thread count must be at least 1, got {threads}")]
    InvalidThreadCount { threads: usize },
    #[error("NumMoments={num_moments} is not divisible by {threads} threads")]
    UnevenPartition { num_moments: usize, threads: usize },
    #[error("failed to build worker pool: {message}")]
    ThreadPool { message: String },
}

/// Which side of the energy the frequency is placed on when the Green's
/// function is evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrequencyShift {
    /// `G(m, e + omega)`
    Add,
    /// `G(m, e - omega)`
    Subtract,
}

impl FrequencyShift {
    pub fn apply(self, energy: f64, frequency: f64) -> f64 {
        match self {
            Self::Add => energy + frequency,
            Self::Subtract => energy - frequency,
        }
    }
}

/// Which moment index the kernel is folded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MomentOrientation {
    /// `sum_nm K(n, e) mu_nm G(m, ..)`
    Direct,
    /// `sum_nm K(m, e) mu_nm G(n, ..)`, i.e. the contraction of `mu^T`.
    Transposed,
}

/// One Green's function term evaluated against a moment matrix.
#[derive(Clone, Copy)]
pub struct GreenBranch<'a> {
    pub shift: FrequencyShift,
    pub orientation: MomentOrientation,
    pub green: &'a (dyn Fn(usize, f64) -> Complex64 + Sync),
}

impl<'a> GreenBranch<'a> {
    pub fn new(
        shift: FrequencyShift,
        orientation: MomentOrientation,
        green: &'a (dyn Fn(usize, f64) -> Complex64 + Sync),
    ) -> Self {
        Self {
            shift,
            orientation,
            green,
        }
    }

    /// `G(m, e - omega)` against `mu_nm`.
    pub fn forward(green: &'a (dyn Fn(usize, f64) -> Complex64 + Sync)) -> Self {
        Self::new(FrequencyShift::Subtract, MomentOrientation::Direct, green)
    }

    /// Time-reversed partner of [`GreenBranch::forward`]: `G(n, e + omega)`
    /// against `mu_nm`, with the kernel on the second index.
    pub fn time_reversed(green: &'a (dyn Fn(usize, f64) -> Complex64 + Sync)) -> Self {
        Self::new(FrequencyShift::Add, MomentOrientation::Transposed, green)
    }
}

impl std::fmt::Debug for GreenBranch<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GreenBranch")
            .field("shift", &self.shift)
            .field("orientation", &self.orientation)
            .finish_non_exhaustive()
    }
}

/// Trapezoid rule over a (possibly non-uniform) ascending grid. Panels are
/// accumulated with compensated summation.
pub fn integrate_trapezoid(energies: &[f64], integrand: &[Complex64]) -> Complex64 {
    let panels: Vec<Complex64> = energies
        .windows(2)
        .zip(integrand.windows(2))
        .map(|(x, y)| (y[0] + y[1]) * ((x[1] - x[0]) * 0.5))
        .collect();
    let re: Vec<f64> = panels.iter().map(|panel| panel.re).collect();
    let im: Vec<f64> = panels.iter().map(|panel| panel.im).collect();
    Complex64::new(stable_sum(&re), stable_sum(&im))
}

/// `int de sum_n K(n, e) mu_n`
pub fn contract_rank1<K>(
    kernel: K,
    num_moments: usize,
    vector: &MomentVector,
    energies: &EnergyGrid,
) -> Result<Complex64, ContractionError>
where
    K: Fn(usize, f64) -> f64,
{
    if vector.len() != num_moments {
        return Err(ContractionError::VectorLength {
            expected: num_moments,
            actual: vector.len(),
        });
    }

    let integrand: Vec<Complex64> = energies
        .points()
        .iter()
        .map(|&energy| {
            vector
                .values()
                .iter()
                .enumerate()
                .map(|(n, &moment)| moment * kernel(n, energy))
                .sum()
        })
        .collect();

    Ok(integrate_trapezoid(energies.points(), &integrand))
}

/// `int de sum_nm K(n, e) mu_nm G(m, e -/+ omega)` for every frequency, or
/// the same with `n` and `m` swapped in `K` and `G` when the branch is
/// [`MomentOrientation::Transposed`].
pub fn contract_rank2<K>(
    kernel: K,
    branch: GreenBranch<'_>,
    num_moments: usize,
    matrix: &MomentMatrix,
    energies: &EnergyGrid,
    frequencies: &FrequencyGrid,
) -> Result<Vec<Complex64>, ContractionError>
where
    K: Fn(usize, f64) -> f64,
{
    validate_square(num_moments, matrix)?;
    let weights = kernel_matrix(&kernel, num_moments, energies.points());
    let projected = project_columns(&weights, matrix, branch.orientation, 0..num_moments);

    Ok(frequencies
        .points()
        .iter()
        .map(|&frequency| {
            let integrand = fold_green(&projected, 0, &branch, energies.points(), frequency);
            integrate_trapezoid(energies.points(), &integrand)
        })
        .collect())
}

pub(super) fn validate_square(
    num_moments: usize,
    matrix: &MomentMatrix,
) -> Result<(), ContractionError> {
    if matrix.nrows() != num_moments || matrix.ncols() != num_moments {
        return Err(ContractionError::MatrixShape {
            expected: num_moments,
            rows: matrix.nrows(),
            cols: matrix.ncols(),
        });
    }
    Ok(())
}

/// `W(i, n) = K(n, energies[i])`
pub(super) fn kernel_matrix<K>(
    kernel: &K,
    num_moments: usize,
    energies: &[f64],
) -> DenseComplexMatrix
where
    K: Fn(usize, f64) -> f64,
{
    DenseComplexMatrix::from_fn(energies.len(), num_moments, |i, n| {
        Complex64::new(kernel(n, energies[i]), 0.0)
    })
}

/// `W * mu` (or `W * mu^T`) restricted to `columns`. Row `i` of the result
/// belongs to `energies[i]`, column `j` to moment `columns.start + j`.
pub(super) fn project_columns(
    weights: &DenseComplexMatrix,
    matrix: &MomentMatrix,
    orientation: MomentOrientation,
    columns: Range<usize>,
) -> DenseComplexMatrix {
    let dense = matrix.as_dense().as_ref();
    let oriented = match orientation {
        MomentOrientation::Direct => dense,
        MomentOrientation::Transposed => dense.transpose(),
    };
    weights.as_ref() * oriented.subcols(columns.start, columns.len())
}

/// `sum_j P(i, j) G(offset + j, e_i -/+ omega)` at every energy `e_i`.
pub(super) fn fold_green(
    projected: &DenseComplexMatrix,
    offset: usize,
    branch: &GreenBranch<'_>,
    energies: &[f64],
    frequency: f64,
) -> Vec<Complex64> {
    energies
        .iter()
        .enumerate()
        .map(|(i, &energy)| {
            let shifted = branch.shift.apply(energy, frequency);
            (0..projected.ncols())
                .map(|j| projected[(i, j)] * (branch.green)(offset + j, shifted))
                .sum()
        })
        .collect()
}
