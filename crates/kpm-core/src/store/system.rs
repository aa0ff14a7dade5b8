use super::{MomentStore, StoreError};
use crate::common::constants::DEFAULT_SPIN_DEGENERACY;
use crate::domain::SystemInfo;
use tracing::debug;

pub const IS_COMPLEX_KEY: &str = "/IS_COMPLEX";
pub const ENERGY_SCALE_KEY: &str = "/EnergyScale";
pub const NUM_ORBITALS_KEY: &str = "/Hamiltonian/NOrbitals";
pub const SPIN_DEGENERACY_KEY: &str = "/Hamiltonian/SpinDegeneracy";
pub const LATTICE_VECTORS_KEY: &str = "/LattVectors";

impl SystemInfo {
    /// Reads the lattice model description written alongside the moments.
    pub fn from_store<S: MomentStore + ?Sized>(store: &S) -> Result<Self, StoreError> {
        let is_complex = store.read_int(IS_COMPLEX_KEY)? != 0;

        let energy_scale = store.read_real(ENERGY_SCALE_KEY)?;
        if !(energy_scale.is_finite() && energy_scale > 0.0) {
            return Err(malformed(
                ENERGY_SCALE_KEY,
                format!("energy scale must be positive, got {energy_scale}"),
            ));
        }

        let num_orbitals = positive_count(store, NUM_ORBITALS_KEY)?;
        let spin_degeneracy = if store.contains(SPIN_DEGENERACY_KEY) {
            positive_count(store, SPIN_DEGENERACY_KEY)?
        } else {
            DEFAULT_SPIN_DEGENERACY
        };

        let unit_cell_area = unit_cell_area(store)?;

        let system = Self {
            is_complex,
            num_orbitals,
            spin_degeneracy,
            unit_cell_area,
            energy_scale,
        };
        debug!(?system, "read system description");
        Ok(system)
    }
}

fn positive_count<S: MomentStore + ?Sized>(store: &S, key: &str) -> Result<usize, StoreError> {
    let value = store.read_int(key)?;
    usize::try_from(value)
        .ok()
        .filter(|count| *count > 0)
        .ok_or_else(|| malformed(key, format!("expected a positive count, got {value}")))
}

/// Area spanned by the first two primitive vectors, `|a1 x a2|`. Stored as a
/// `D x D` row-per-vector array with `D >= 2`.
fn unit_cell_area<S: MomentStore + ?Sized>(store: &S) -> Result<f64, StoreError> {
    let values = store.read_real_values(LATTICE_VECTORS_KEY)?;
    let dataset = store.require(LATTICE_VECTORS_KEY)?;
    let dimension = match dataset.shape() {
        [rows, cols] if rows == cols && *rows >= 2 && values.len() == rows * cols => *rows,
        shape => {
            return Err(StoreError::ShapeMismatch {
                key: LATTICE_VECTORS_KEY.to_string(),
                shape: shape.to_vec(),
                expected: "a square D x D array with D >= 2".to_string(),
            });
        }
    };

    let component = |row: usize, axis: usize| {
        if axis < dimension {
            values[row * dimension + axis]
        } else {
            0.0
        }
    };
    let (a, b) = (
        [component(0, 0), component(0, 1), component(0, 2)],
        [component(1, 0), component(1, 1), component(1, 2)],
    );
    let cross = [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ];
    let area = (cross[0] * cross[0] + cross[1] * cross[1] + cross[2] * cross[2]).sqrt();

    if !(area.is_finite() && area > 0.0) {
        return Err(malformed(
            LATTICE_VECTORS_KEY,
            format!("lattice vectors span a degenerate cell (area {area})"),
        ));
    }
    Ok(area)
}

fn malformed(key: &str, detail: String) -> StoreError {
    StoreError::Malformed {
        key: key.to_string(),
        detail,
    }
}
