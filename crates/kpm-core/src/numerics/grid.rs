use super::linear_grid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GridError {
    #[error("{axis} grid requires at least 2 points, got {actual}")]
    InsufficientPoints { axis: &'static str, actual: usize },
    #[error("energy grid limit must lie strictly inside (0, 1), got {value}")]
    InvalidEnergyLimit { value: f64 },
    #[error("frequency grid bounds must be finite with min <= max, got [{min}, {max}]")]
    InvalidFrequencyRange { min: f64, max: f64 },
}

/// Rescaled energies `[-lim, lim]` used as the quadrature nodes. The margin
/// below 1 keeps the Chebyshev weight `1/sqrt(1 - x^2)` finite.
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyGrid {
    points: Vec<f64>,
    limit: f64,
}

impl EnergyGrid {
    pub fn symmetric(count: usize, limit: f64) -> Result<Self, GridError> {
        if !(limit.is_finite() && limit > 0.0 && limit < 1.0) {
            return Err(GridError::InvalidEnergyLimit { value: limit });
        }
        let points = linear_grid(-limit, limit, count).ok_or(GridError::InsufficientPoints {
            axis: "energy",
            actual: count,
        })?;
        Ok(Self { points, limit })
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn limit(&self) -> f64 {
        self.limit
    }
}

/// Output frequencies in rescaled units, ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyGrid {
    points: Vec<f64>,
}

impl FrequencyGrid {
    pub fn linear(min: f64, max: f64, count: usize) -> Result<Self, GridError> {
        if !(min.is_finite() && max.is_finite() && min <= max) {
            return Err(GridError::InvalidFrequencyRange { min, max });
        }
        let points = linear_grid(min, max, count).ok_or(GridError::InsufficientPoints {
            axis: "frequency",
            actual: count,
        })?;
        Ok(Self { points })
    }

    /// Degenerate grid holding only `omega = 0`, used by static terms.
    pub fn static_point() -> Self {
        Self { points: vec![0.0] }
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}
