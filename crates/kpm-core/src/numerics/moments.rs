use super::DenseComplexMatrix;
use num_complex::Complex64;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TensorShapeError {
    #[error("moment data length mismatch: expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Single-index Chebyshev moments `mu_n`.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentVector {
    values: Vec<Complex64>,
}

impl MomentVector {
    pub fn new(values: Vec<Complex64>) -> Self {
        Self { values }
    }

    pub fn from_fn(len: usize, f: impl Fn(usize) -> Complex64) -> Self {
        Self {
            values: (0..len).map(f).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Complex64] {
        &self.values
    }
}

/// Two-index moments `mu_nm`, row index `n`, column index `m`.
#[derive(Debug, Clone)]
pub struct MomentMatrix {
    values: DenseComplexMatrix,
}

impl MomentMatrix {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self {
            values: DenseComplexMatrix::zeros(rows, cols),
        }
    }

    pub fn from_fn(rows: usize, cols: usize, f: impl Fn(usize, usize) -> Complex64) -> Self {
        let mut matrix = Self::zeros(rows, cols);
        for row in 0..rows {
            for col in 0..cols {
                matrix.values[(row, col)] = f(row, col);
            }
        }
        matrix
    }

    pub fn from_row_major(
        rows: usize,
        cols: usize,
        data: &[Complex64],
    ) -> Result<Self, TensorShapeError> {
        let expected = rows.checked_mul(cols).unwrap_or(usize::MAX);
        if data.len() != expected {
            return Err(TensorShapeError::LengthMismatch {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self::from_fn(rows, cols, |row, col| data[row * cols + col]))
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn get(&self, row: usize, col: usize) -> Complex64 {
        self.values[(row, col)]
    }

    pub fn as_dense(&self) -> &DenseComplexMatrix {
        &self.values
    }
}

/// Three-index moments `mu_nmp`, flattened with `p` fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct MomentCube {
    dimension: usize,
    values: Vec<Complex64>,
}

impl MomentCube {
    pub fn from_flat(dimension: usize, values: Vec<Complex64>) -> Result<Self, TensorShapeError> {
        let expected = dimension
            .checked_mul(dimension)
            .and_then(|square| square.checked_mul(dimension))
            .unwrap_or(usize::MAX);
        if values.len() != expected {
            return Err(TensorShapeError::LengthMismatch {
                expected,
                actual: values.len(),
            });
        }
        Ok(Self { dimension, values })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn get(&self, n: usize, m: usize, p: usize) -> Complex64 {
        self.values[(n * self.dimension + m) * self.dimension + p]
    }
}
