pub mod contraction;
pub mod grid;
pub mod kernels;
pub mod moments;
pub mod parallel;

pub use contraction::{
    ContractionError, FrequencyShift, GreenBranch, MomentOrientation, contract_rank1,
    contract_rank2, integrate_trapezoid,
};
pub use grid::{EnergyGrid, FrequencyGrid, GridError};
pub use kernels::{
    DampingKernel, SpectralKernel, delta, fermi_function, green_advanced, green_retarded,
    jackson_kernel, lorentz_kernel,
};
pub use moments::{MomentCube, MomentMatrix, MomentVector, TensorShapeError};
pub use parallel::{contract_rank2_blocked, validate_partition};

use faer::Mat;
use num_complex::Complex64;

pub type DenseComplexMatrix = Mat<Complex64>;

fn kahan_add(sum: &mut f64, correction: &mut f64, value: f64) {
    let corrected = value - *correction;
    let next = *sum + corrected;
    *correction = (next - *sum) - corrected;
    *sum = next;
}

pub fn stable_sum(values: &[f64]) -> f64 {
    let mut sum = 0.0;
    let mut correction = 0.0;

    for &value in values {
        kahan_add(&mut sum, &mut correction, value);
    }

    sum
}

pub fn linear_grid(start: f64, end: f64, count: usize) -> Option<Vec<f64>> {
    if count < 2 {
        return None;
    }

    let step = (end - start) / ((count - 1) as f64);
    let mut grid = Vec::with_capacity(count);
    for index in 0..count {
        grid.push(start + step * (index as f64));
    }

    if let Some(last) = grid.last_mut() {
        *last = end;
    }

    Some(grid)
}

/// Accepts `lhs` when it lies within `abs_tol` of `rhs`, or within `rel_tol`
/// relative to the larger modulus (never below `relative_floor`).
pub fn complex_within_tolerance(
    lhs: Complex64,
    rhs: Complex64,
    abs_tol: f64,
    rel_tol: f64,
    relative_floor: f64,
) -> bool {
    let abs_diff = (lhs - rhs).norm();
    let scale = lhs.norm().max(rhs.norm()).max(relative_floor);
    abs_diff <= abs_tol || abs_diff / scale <= rel_tol
}
