pub mod errors;

pub use errors::{ExitPlaceholder, ResponseError, ResponseErrorCategory, ResponseResult};

use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ExecutionMode {
    #[default]
    Serial,
    /// Column-block partition of the dominant moment matrix over a fixed
    /// number of worker threads.
    Parallel { threads: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseKind {
    Optical,
    Nonlinear,
}

impl ResponseKind {
    pub const ALL: [ResponseKind; 2] = [Self::Optical, Self::Nonlinear];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Optical => "OPTICAL",
            Self::Nonlinear => "NONLINEAR",
        }
    }

    /// Location of this quantity's datasets inside the moment store.
    pub const fn store_prefix(self) -> &'static str {
        match self {
            Self::Optical => "/Calculation/conductivity_optical/",
            Self::Nonlinear => "/Calculation/conductivity_optical_nonlinear/",
        }
    }

    /// Key whose presence marks this quantity as requested.
    pub fn direction_key(self) -> String {
        format!("{}Direction", self.store_prefix())
    }

    pub const fn default_output_file(self) -> &'static str {
        match self {
            Self::Optical => "optical_cond.dat",
            Self::Nonlinear => "nonlinear_cond.dat",
        }
    }
}

impl Display for ResponseKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseRequest {
    pub kind: ResponseKind,
    pub execution_mode: ExecutionMode,
    pub store_path: PathBuf,
    pub output_dir: PathBuf,
}

impl ResponseRequest {
    pub fn new(
        kind: ResponseKind,
        store_path: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            kind,
            execution_mode: ExecutionMode::Serial,
            store_path: store_path.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn with_execution_mode(mut self, execution_mode: ExecutionMode) -> Self {
        self.execution_mode = execution_mode;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseArtifact {
    pub relative_path: PathBuf,
    pub line_count: usize,
}

impl ResponseArtifact {
    pub fn new(relative_path: impl Into<PathBuf>, line_count: usize) -> Self {
        Self {
            relative_path: relative_path.into(),
            line_count,
        }
    }
}

/// Description of the lattice model that produced the moments. Supplied by
/// the Hamiltonian stage and consumed read-only here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemInfo {
    pub is_complex: bool,
    pub num_orbitals: usize,
    pub spin_degeneracy: usize,
    pub unit_cell_area: f64,
    pub energy_scale: f64,
}

impl SystemInfo {
    /// `N_orb * g_s / A`, the per-area degeneracy shared by every
    /// conductivity prefactor.
    pub fn degeneracy_per_area(&self) -> f64 {
        (self.num_orbitals * self.spin_degeneracy) as f64 / self.unit_cell_area
    }
}

impl Default for SystemInfo {
    fn default() -> Self {
        Self {
            is_complex: false,
            num_orbitals: 1,
            spin_degeneracy: 1,
            unit_cell_area: 1.0,
            energy_scale: 1.0,
        }
    }
}
