use num_complex::Complex64;
use serde::{Deserialize, Serialize};

/// One named array of the moment store. Scalars use shape `[]` or `[1]`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "dtype", rename_all = "lowercase")]
pub enum Dataset {
    Int {
        shape: Vec<usize>,
        data: Vec<i64>,
    },
    Real {
        shape: Vec<usize>,
        data: Vec<f64>,
    },
    Complex {
        shape: Vec<usize>,
        re: Vec<f64>,
        im: Vec<f64>,
    },
}

impl Dataset {
    pub fn int_scalar(value: i64) -> Self {
        Self::Int {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn real_scalar(value: f64) -> Self {
        Self::Real {
            shape: Vec::new(),
            data: vec![value],
        }
    }

    pub fn real(shape: Vec<usize>, data: Vec<f64>) -> Self {
        Self::Real { shape, data }
    }

    pub fn complex(shape: Vec<usize>, values: &[Complex64]) -> Self {
        Self::Complex {
            shape,
            re: values.iter().map(|value| value.re).collect(),
            im: values.iter().map(|value| value.im).collect(),
        }
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            Self::Int { .. } => "int",
            Self::Real { .. } => "real",
            Self::Complex { .. } => "complex",
        }
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::Int { shape, .. } | Self::Real { shape, .. } | Self::Complex { shape, .. } => {
                shape
            }
        }
    }

    pub fn is_complex(&self) -> bool {
        matches!(self, Self::Complex { .. })
    }

    /// Number of values the shape declares, `None` when that overflows.
    pub fn element_count(&self) -> Option<usize> {
        self.shape()
            .iter()
            .try_fold(1usize, |count, &extent| count.checked_mul(extent))
    }

    /// Describes the first inconsistency between the declared shape and the
    /// stored values, if any.
    pub fn consistency_issue(&self) -> Option<String> {
        let Some(expected) = self.element_count() else {
            return Some(format!(
                "shape {:?} declares more values than can be addressed",
                self.shape()
            ));
        };
        let stored = match self {
            Self::Int { data, .. } => data.len(),
            Self::Real { data, .. } => data.len(),
            Self::Complex { re, im, .. } => {
                if re.len() != im.len() {
                    return Some(format!(
                        "real part has {} values but imaginary part has {}",
                        re.len(),
                        im.len()
                    ));
                }
                re.len()
            }
        };
        (stored != expected).then(|| {
            format!(
                "shape {:?} declares {expected} values but {stored} are stored",
                self.shape()
            )
        })
    }

    pub fn is_scalar(&self) -> bool {
        self.element_count() == Some(1) && self.shape().len() <= 1
    }

    pub(crate) fn integer_values(&self) -> Option<&[i64]> {
        match self {
            Self::Int { data, .. } => Some(data),
            _ => None,
        }
    }

    pub(crate) fn real_values(&self) -> Option<Vec<f64>> {
        match self {
            Self::Int { data, .. } => Some(data.iter().map(|&value| value as f64).collect()),
            Self::Real { data, .. } => Some(data.clone()),
            Self::Complex { .. } => None,
        }
    }

    /// Complex view of the stored values. Real and integer storage gets a
    /// zero imaginary part.
    pub(crate) fn promote_to_complex(&self) -> Vec<Complex64> {
        match self {
            Self::Int { data, .. } => data
                .iter()
                .map(|&value| Complex64::new(value as f64, 0.0))
                .collect(),
            Self::Real { data, .. } => data
                .iter()
                .map(|&value| Complex64::new(value, 0.0))
                .collect(),
            Self::Complex { re, im, .. } => re
                .iter()
                .zip(im)
                .map(|(&re, &im)| Complex64::new(re, im))
                .collect(),
        }
    }
}
