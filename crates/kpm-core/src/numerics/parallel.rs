//! Column-block partitioned rank-2 contraction.
//!
//! The moment matrix columns are split into `threads` equal blocks. Each
//! worker owns its energy x block product and produces a partial response
//! vector; partials come back in block order and are folded once on the
//! calling thread.

use super::DenseComplexMatrix;
use super::contraction::{
    ContractionError, GreenBranch, fold_green, integrate_trapezoid, kernel_matrix,
    project_columns, validate_square,
};
use super::grid::{EnergyGrid, FrequencyGrid};
use super::moments::MomentMatrix;
use num_complex::Complex64;
use rayon::prelude::*;
use std::ops::Range;

/// Checks that `num_moments` columns split evenly over `threads` workers.
pub fn validate_partition(num_moments: usize, threads: usize) -> Result<usize, ContractionError> {
    if threads == 0 {
        return Err(ContractionError::InvalidThreadCount { threads });
    }
    if num_moments % threads != 0 {
        return Err(ContractionError::UnevenPartition {
            num_moments,
            threads,
        });
    }
    Ok(num_moments / threads)
}

/// Sum over `branches` of the [`super::contract_rank2`] result for each
/// branch, computed on a dedicated pool of exactly `threads` workers.
pub fn contract_rank2_blocked<K>(
    kernel: K,
    branches: &[GreenBranch<'_>],
    num_moments: usize,
    matrix: &MomentMatrix,
    energies: &EnergyGrid,
    frequencies: &FrequencyGrid,
    threads: usize,
) -> Result<Vec<Complex64>, ContractionError>
where
    K: Fn(usize, f64) -> f64 + Sync,
{
    let block_width = validate_partition(num_moments, threads)?;
    validate_square(num_moments, matrix)?;

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|source| ContractionError::ThreadPool {
            message: source.to_string(),
        })?;
    let weights = kernel_matrix(&kernel, num_moments, energies.points());

    let partials: Vec<Vec<Complex64>> = pool.install(|| {
        (0..threads)
            .into_par_iter()
            .map(|block| {
                let columns = block * block_width..(block + 1) * block_width;
                block_partial(&weights, branches, matrix, energies, frequencies, columns)
            })
            .collect()
    });

    Ok(fold_partials(frequencies.len(), partials))
}

fn block_partial(
    weights: &DenseComplexMatrix,
    branches: &[GreenBranch<'_>],
    matrix: &MomentMatrix,
    energies: &EnergyGrid,
    frequencies: &FrequencyGrid,
    columns: Range<usize>,
) -> Vec<Complex64> {
    let offset = columns.start;
    let projected: Vec<DenseComplexMatrix> = branches
        .iter()
        .map(|branch| project_columns(weights, matrix, branch.orientation, columns.clone()))
        .collect();

    frequencies
        .points()
        .iter()
        .map(|&frequency| {
            let mut integrand = vec![Complex64::new(0.0, 0.0); energies.len()];
            for (branch, block) in branches.iter().zip(&projected) {
                let values = fold_green(block, offset, branch, energies.points(), frequency);
                for (total, value) in integrand.iter_mut().zip(values) {
                    *total += value;
                }
            }
            integrate_trapezoid(energies.points(), &integrand)
        })
        .collect()
}

fn fold_partials(len: usize, partials: Vec<Vec<Complex64>>) -> Vec<Complex64> {
    partials
        .into_iter()
        .fold(vec![Complex64::new(0.0, 0.0); len], |mut total, partial| {
            for (accumulated, value) in total.iter_mut().zip(partial) {
                *accumulated += value;
            }
            total
        })
}
