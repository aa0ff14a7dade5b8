//! Response pipelines: each turns one group of moment tensors from the store
//! into a conductivity curve and writes it as a text artifact.
//!
//! A pipeline starts as `NotRequired` or `Required` and walks
//! `Required -> Loaded -> Calculated -> Written`. Construction only checks
//! for the `Direction` key. `read` loads and validates the tensors, then
//! `calculate` and `write_output` produce the artifact.

pub mod direction;
pub mod nonlinear;
pub mod optical;
pub mod settings;

pub use direction::{NonlinearDirection, OpticalDirection};
pub use nonlinear::{NonlinearConductivity, NonlinearMoments, SecondOrderCase};
pub use optical::{OpticalConductivity, OpticalMoments};
pub use settings::{NonlinearSettings, OpticalSettings, ResponseSettings};

use crate::common::constants::BOLTZMANN_EV_PER_K;
use crate::domain::{
    ExecutionMode, ResponseArtifact, ResponseError, ResponseKind, ResponseRequest,
    ResponseResult, SystemInfo,
};
use crate::numerics::{ContractionError, DampingKernel, EnergyGrid, FrequencyGrid, GridError};
use crate::serialization::{format_response_row, write_text_artifact};
use crate::store::{DataStore, MomentStore, StoreError};
use num_complex::Complex64;
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    NotRequired,
    Required,
    Loaded,
    Calculated,
    Written,
}

/// What the store offered for one response kind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletenessFlags {
    is_required: bool,
    terms: Vec<(&'static str, bool)>,
}

impl CompletenessFlags {
    pub fn required(is_required: bool) -> Self {
        Self {
            is_required,
            terms: Vec::new(),
        }
    }

    pub fn is_required(&self) -> bool {
        self.is_required
    }

    /// True once every term of the active formula has been found.
    pub fn is_possible(&self) -> bool {
        self.is_required && !self.terms.is_empty() && self.terms.iter().all(|(_, found)| *found)
    }

    pub fn is_present(&self, term: &str) -> bool {
        self.terms
            .iter()
            .any(|(name, found)| *name == term && *found)
    }

    pub fn missing_terms(&self) -> Vec<&'static str> {
        self.terms
            .iter()
            .filter(|(_, found)| !found)
            .map(|(name, _)| *name)
            .collect()
    }

    pub(crate) fn clear_terms(&mut self) {
        self.terms.clear();
    }

    pub(crate) fn record_term(&mut self, term: &'static str, found: bool) {
        self.terms.push((term, found));
    }
}

/// Response values on the rescaled frequency grid, physical prefactors
/// already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseCurve {
    frequencies: Vec<f64>,
    values: Vec<Complex64>,
    energy_scale: f64,
}

impl ResponseCurve {
    pub fn new(frequencies: Vec<f64>, values: Vec<Complex64>, energy_scale: f64) -> Self {
        Self {
            frequencies,
            values,
            energy_scale,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn values(&self) -> &[Complex64] {
        &self.values
    }

    pub fn energy_scale(&self) -> f64 {
        self.energy_scale
    }

    /// `(frequency in eV, value)` pairs in grid order.
    pub fn points(&self) -> impl Iterator<Item = (f64, Complex64)> + '_ {
        self.frequencies
            .iter()
            .zip(&self.values)
            .map(|(&frequency, &value)| (frequency * self.energy_scale, value))
    }

    pub fn render(&self) -> String {
        self.points()
            .map(|(frequency, value)| format_response_row(frequency, value))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub trait ResponseFunction {
    fn kind(&self) -> ResponseKind;

    fn stage(&self) -> PipelineStage;

    fn flags(&self) -> &CompletenessFlags;

    fn read(&mut self) -> ResponseResult<()>;

    fn calculate(&mut self) -> ResponseResult<&ResponseCurve>;

    fn calculate_with(&mut self, mode: ExecutionMode) -> ResponseResult<&ResponseCurve> {
        match mode {
            ExecutionMode::Serial => self.calculate(),
            ExecutionMode::Parallel { threads } => Err(ResponseError::configuration(
                "CONFIG.EXECUTION_MODE",
                format!(
                    "{} response has no parallel evaluation ({threads} threads requested)",
                    self.kind()
                ),
            )),
        }
    }

    fn curve(&self) -> Option<&ResponseCurve>;

    fn output_file(&self) -> &str;

    fn write_output(&mut self, output_dir: &Path) -> ResponseResult<ResponseArtifact>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseOutcome {
    Skipped,
    Written(ResponseArtifact),
}

/// Opens the store named by `request` and runs one response kind end to end.
pub fn run_response(
    request: &ResponseRequest,
    settings: &ResponseSettings,
) -> ResponseResult<ResponseOutcome> {
    let store = DataStore::open(&request.store_path)?;
    run_response_with_store(
        &store,
        request.kind,
        request.execution_mode,
        &request.output_dir,
        settings,
    )
}

pub fn run_response_with_store<S: MomentStore + ?Sized>(
    store: &S,
    kind: ResponseKind,
    execution_mode: ExecutionMode,
    output_dir: &Path,
    settings: &ResponseSettings,
) -> ResponseResult<ResponseOutcome> {
    if !store.contains(&kind.direction_key()) {
        info!(kind = %kind, "no data in the moment store; skipping");
        return Ok(ResponseOutcome::Skipped);
    }

    let system = SystemInfo::from_store(store)?;
    let mut pipeline: Box<dyn ResponseFunction + '_> = match kind {
        ResponseKind::Optical => Box::new(OpticalConductivity::new(
            store,
            system,
            settings.optical.clone(),
        )),
        ResponseKind::Nonlinear => Box::new(NonlinearConductivity::new(
            store,
            system,
            settings.nonlinear.clone(),
        )),
    };

    pipeline.read()?;
    pipeline.calculate_with(execution_mode)?;
    let artifact = pipeline.write_output(output_dir)?;
    Ok(ResponseOutcome::Written(artifact))
}

/// Scalars every response kind reads under its prefix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseMetadata {
    pub direction_code: i64,
    pub num_moments: usize,
    pub temperature: f64,
    pub num_points: usize,
}

impl ResponseMetadata {
    pub(crate) fn read<S: MomentStore + ?Sized>(store: &S, prefix: &str) -> ResponseResult<Self> {
        let direction_code = store.read_int(&format!("{prefix}Direction"))?;
        let num_moments = positive_count(store, &format!("{prefix}NumMoments"))?;
        let temperature = store.read_real(&format!("{prefix}Temperature"))?;
        let num_points = positive_count(store, &format!("{prefix}NumPoints"))?;
        Ok(Self {
            direction_code,
            num_moments,
            temperature,
            num_points,
        })
    }

    /// `1 / (k_B T)`.
    pub fn beta(&self) -> ResponseResult<f64> {
        if !(self.temperature.is_finite() && self.temperature > 0.0) {
            return Err(ResponseError::configuration(
                "CONFIG.TEMPERATURE",
                format!("temperature must be positive, got {}", self.temperature),
            ));
        }
        Ok(1.0 / (BOLTZMANN_EV_PER_K * self.temperature))
    }
}

fn positive_count<S: MomentStore + ?Sized>(store: &S, key: &str) -> ResponseResult<usize> {
    let value = store.read_int(key)?;
    usize::try_from(value)
        .ok()
        .filter(|count| *count > 0)
        .ok_or_else(|| {
            ResponseError::configuration(
                "CONFIG.COUNT",
                format!("'{key}' must be a positive count, got {value}"),
            )
        })
}

pub(crate) fn require_broadening(broadening: f64) -> ResponseResult<f64> {
    if broadening.is_finite() && broadening > 0.0 {
        Ok(broadening)
    } else {
        Err(ResponseError::configuration(
            "CONFIG.BROADENING",
            format!("broadening must be positive, got {broadening}"),
        ))
    }
}

pub(crate) struct RunSummary<'a> {
    pub kind: ResponseKind,
    pub beta: f64,
    pub fermi_level: f64,
    pub damping: DampingKernel,
    pub broadening: f64,
    pub energies: &'a EnergyGrid,
    pub frequencies: &'a FrequencyGrid,
    pub output_file: &'a str,
}

impl RunSummary<'_> {
    pub(crate) fn log(&self) {
        let frequencies = self.frequencies.points();
        info!(
            kind = %self.kind,
            beta = self.beta,
            fermi_level = self.fermi_level,
            kernel = self.damping.name(),
            broadening = self.broadening,
            energies = self.energies.len(),
            energy_limit = self.energies.limit(),
            frequencies = frequencies.len(),
            min_frequency = frequencies.first().copied().unwrap_or_default(),
            max_frequency = frequencies.last().copied().unwrap_or_default(),
            output = self.output_file,
            "evaluating response"
        );
    }
}

pub(crate) fn not_requested(kind: ResponseKind) -> ResponseError {
    ResponseError::not_requested(
        "RUN.NOT_REQUESTED",
        format!(
            "{kind} response was not requested: '{}Direction' is absent",
            kind.store_prefix()
        ),
    )
}

pub(crate) fn not_loaded(kind: ResponseKind) -> ResponseError {
    ResponseError::incomplete_data(
        "RUN.NOT_LOADED",
        format!("{kind} moments must be read before the response is calculated"),
    )
}

pub(crate) fn missing_terms(kind: ResponseKind, flags: &CompletenessFlags) -> ResponseError {
    ResponseError::incomplete_data(
        "INPUT.MISSING_TERMS",
        format!(
            "{kind} response cannot be calculated; missing moment tensors: {}",
            flags.missing_terms().join(", ")
        ),
    )
}

pub(crate) fn write_curve(
    kind: ResponseKind,
    curve: Option<&ResponseCurve>,
    output_dir: &Path,
    output_file: &str,
) -> ResponseResult<ResponseArtifact> {
    let curve = curve.ok_or_else(|| {
        ResponseError::incomplete_data(
            "RUN.NOT_CALCULATED",
            format!("{kind} response has not been calculated"),
        )
    })?;

    fs::create_dir_all(output_dir).map_err(|source| {
        ResponseError::io_system(
            "IO.OUTPUT_DIR",
            format!(
                "failed to create output directory '{}': {source}",
                output_dir.display()
            ),
        )
    })?;
    let path = output_dir.join(output_file);
    write_text_artifact(&path, &curve.render()).map_err(|source| {
        ResponseError::io_system(
            "IO.OUTPUT_WRITE",
            format!("failed to write '{}': {source}", path.display()),
        )
    })?;

    info!(kind = %kind, path = %path.display(), lines = curve.len(), "wrote response");
    Ok(ResponseArtifact::new(output_file, curve.len()))
}

impl From<StoreError> for ResponseError {
    fn from(error: StoreError) -> Self {
        let message = error.to_string();
        match error {
            StoreError::Read { .. } => Self::io_system("IO.STORE_READ", message),
            StoreError::Parse { .. } => Self::io_system("IO.STORE_PARSE", message),
            StoreError::MissingKey { .. } => {
                Self::incomplete_data("INPUT.MISSING_DATASET", message)
            }
            StoreError::TypeMismatch { .. } => Self::incomplete_data("INPUT.DATASET_TYPE", message),
            StoreError::Malformed { .. } => {
                Self::incomplete_data("INPUT.MALFORMED_DATASET", message)
            }
            StoreError::ShapeMismatch { .. } => Self::dimension("INPUT.TENSOR_SHAPE", message),
        }
    }
}

impl From<GridError> for ResponseError {
    fn from(error: GridError) -> Self {
        Self::configuration("CONFIG.GRID", error.to_string())
    }
}

impl From<ContractionError> for ResponseError {
    fn from(error: ContractionError) -> Self {
        let message = error.to_string();
        match error {
            ContractionError::VectorLength { .. } | ContractionError::MatrixShape { .. } => {
                Self::dimension("RUN.TENSOR_SHAPE", message)
            }
            ContractionError::InvalidThreadCount { .. }
            | ContractionError::UnevenPartition { .. } => {
                Self::configuration("CONFIG.THREAD_PARTITION", message)
            }
            ContractionError::ThreadPool { .. } => Self::io_system("IO.THREAD_POOL", message),
        }
    }
}
