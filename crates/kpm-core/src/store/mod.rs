//! Keyed container of named numeric arrays written by the moment simulation
//! stage, and the typed readers the response pipelines use on top of it.
//!
//! Moment tensors leave this module as complex data only: real storage is
//! promoted here, once, and nowhere else.

mod dataset;
mod system;

pub use dataset::Dataset;

use crate::numerics::{MomentCube, MomentMatrix, MomentVector};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read moment store '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse moment store '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("dataset '{key}' is missing")]
    MissingKey { key: String },
    #[error("dataset '{key}' holds {actual} data, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        actual: &'static str,
    },
    #[error("dataset '{key}' has shape {shape:?}, expected {expected}")]
    ShapeMismatch {
        key: String,
        shape: Vec<usize>,
        expected: String,
    },
    #[error("dataset '{key}' is malformed: {detail}")]
    Malformed { key: String, detail: String },
}

impl StoreError {
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Read { .. } | Self::Parse { .. } => None,
            Self::MissingKey { key }
            | Self::TypeMismatch { key, .. }
            | Self::ShapeMismatch { key, .. }
            | Self::Malformed { key, .. } => Some(key),
        }
    }
}

/// Read access to the moment datasets. Only [`MomentStore::dataset`] is
/// required; the typed readers are shared.
pub trait MomentStore {
    fn dataset(&self, key: &str) -> Option<&Dataset>;

    fn contains(&self, key: &str) -> bool {
        self.dataset(key).is_some()
    }

    fn require(&self, key: &str) -> Result<&Dataset, StoreError> {
        self.dataset(key).ok_or_else(|| StoreError::MissingKey {
            key: key.to_string(),
        })
    }

    fn read_int(&self, key: &str) -> Result<i64, StoreError> {
        let dataset = self.require(key)?;
        let values = dataset
            .integer_values()
            .ok_or_else(|| StoreError::TypeMismatch {
                key: key.to_string(),
                expected: "int",
                actual: dataset.dtype(),
            })?;
        scalar_value(key, dataset, values)
    }

    fn read_real(&self, key: &str) -> Result<f64, StoreError> {
        let dataset = self.require(key)?;
        let values = self.read_real_values(key)?;
        scalar_value(key, dataset, &values)
    }

    /// Integer storage is accepted and widened.
    fn read_real_values(&self, key: &str) -> Result<Vec<f64>, StoreError> {
        let dataset = self.require(key)?;
        dataset.real_values().ok_or_else(|| StoreError::TypeMismatch {
            key: key.to_string(),
            expected: "real",
            actual: dataset.dtype(),
        })
    }

    /// Loads a rank-1 tensor stored as `[M]` or `[1, M]`. `Ok(None)` when the
    /// key is absent.
    fn load_vector(
        &self,
        key: &str,
        num_moments: usize,
        expect_complex: bool,
    ) -> Result<Option<MomentVector>, StoreError> {
        let Some(dataset) = self.dataset(key) else {
            debug!(key, "moment vector not present");
            return Ok(None);
        };
        let accepted = match dataset.shape() {
            [len] => *len == num_moments,
            [1, len] => *len == num_moments,
            _ => false,
        };
        if !accepted {
            return Err(shape_mismatch(
                key,
                dataset,
                format!("[{num_moments}] or [1, {num_moments}]"),
            ));
        }
        let values = promoted_values(key, dataset, expect_complex)?;
        debug!(key, num_moments, "loaded moment vector");
        Ok(Some(MomentVector::new(values)))
    }

    /// Loads a rank-2 tensor stored row-major as `[M, M]`.
    fn load_matrix(
        &self,
        key: &str,
        num_moments: usize,
        expect_complex: bool,
    ) -> Result<Option<MomentMatrix>, StoreError> {
        let Some(dataset) = self.dataset(key) else {
            debug!(key, "moment matrix not present");
            return Ok(None);
        };
        if dataset.shape() != [num_moments, num_moments] {
            return Err(shape_mismatch(
                key,
                dataset,
                format!("[{num_moments}, {num_moments}]"),
            ));
        }
        let values = promoted_values(key, dataset, expect_complex)?;
        let matrix = MomentMatrix::from_row_major(num_moments, num_moments, &values).map_err(
            |source| StoreError::Malformed {
                key: key.to_string(),
                detail: source.to_string(),
            },
        )?;
        debug!(key, num_moments, "loaded moment matrix");
        Ok(Some(matrix))
    }

    /// Loads a rank-3 tensor stored as `[M, M, M]` or flattened `[1, M^3]`.
    fn load_cube(
        &self,
        key: &str,
        num_moments: usize,
        expect_complex: bool,
    ) -> Result<Option<MomentCube>, StoreError> {
        let Some(dataset) = self.dataset(key) else {
            debug!(key, "moment cube not present");
            return Ok(None);
        };
        let Some(volume) = num_moments
            .checked_mul(num_moments)
            .and_then(|square| square.checked_mul(num_moments))
        else {
            return Err(shape_mismatch(
                key,
                dataset,
                format!("M^3 values for M={num_moments}, which overflows usize"),
            ));
        };
        let accepted = match dataset.shape() {
            [a, b, c] => *a == num_moments && *b == num_moments && *c == num_moments,
            [1, len] => *len == volume,
            _ => false,
        };
        if !accepted {
            return Err(shape_mismatch(
                key,
                dataset,
                format!("[{num_moments}, {num_moments}, {num_moments}] or [1, {volume}]"),
            ));
        }
        let values = promoted_values(key, dataset, expect_complex)?;
        let cube = MomentCube::from_flat(num_moments, values).map_err(|source| {
            StoreError::Malformed {
                key: key.to_string(),
                detail: source.to_string(),
            }
        })?;
        debug!(key, num_moments, "loaded moment cube");
        Ok(Some(cube))
    }
}

fn scalar_value<T: Copy>(key: &str, dataset: &Dataset, values: &[T]) -> Result<T, StoreError> {
    match values {
        [value] if dataset.is_scalar() => Ok(*value),
        _ => Err(shape_mismatch(key, dataset, "a scalar".to_string())),
    }
}

fn shape_mismatch(key: &str, dataset: &Dataset, expected: String) -> StoreError {
    StoreError::ShapeMismatch {
        key: key.to_string(),
        shape: dataset.shape().to_vec(),
        expected,
    }
}

fn promoted_values(
    key: &str,
    dataset: &Dataset,
    expect_complex: bool,
) -> Result<Vec<num_complex::Complex64>, StoreError> {
    if let Some(detail) = dataset.consistency_issue() {
        return Err(StoreError::Malformed {
            key: key.to_string(),
            detail,
        });
    }
    if dataset.is_complex() != expect_complex {
        warn!(
            key,
            stored = dataset.dtype(),
            expected = if expect_complex { "complex" } else { "real" },
            "moment representation disagrees with IS_COMPLEX; using stored representation"
        );
    }
    Ok(dataset.promote_to_complex())
}

/// JSON-backed moment store: `{"datasets": {"<key>": <dataset>, ...}}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct DataStore {
    datasets: BTreeMap<String, Dataset>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let source = fs::read_to_string(path).map_err(|source| StoreError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let store: Self = serde_json::from_str(&source).map_err(|source| StoreError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(
            path = %path.display(),
            datasets = store.datasets.len(),
            "opened moment store"
        );
        Ok(store)
    }

    pub fn insert(&mut self, key: impl Into<String>, dataset: Dataset) -> Option<Dataset> {
        self.datasets.insert(key.into(), dataset)
    }

    pub fn remove(&mut self, key: &str) -> Option<Dataset> {
        self.datasets.remove(key)
    }

    pub fn with_dataset(mut self, key: impl Into<String>, dataset: Dataset) -> Self {
        self.insert(key, dataset);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.datasets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.datasets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.datasets.is_empty()
    }

    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl MomentStore for DataStore {
    fn dataset(&self, key: &str) -> Option<&Dataset> {
        self.datasets.get(key)
    }
}
