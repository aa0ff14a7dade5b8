//! Linear optical conductivity
//!
//! `sigma(w) = i N_orb g_s / A / u * (T1(w) + T2(w) + T3) / (w + i s)`
//!
//! with `T1 = int de K(n,e) Gamma_nm G_A(m, e - w)`,
//! `T2 = int de K(m,e) Gamma_nm G_R(n, e + w)` (the time-reversed term, with
//! the kernel on the second index) and
//! `T3 = int de K(n,e) Lambda_n`, `s` the Green's function broadening.

use super::direction::OpticalDirection;
use super::settings::OpticalSettings;
use super::{
    CompletenessFlags, PipelineStage, ResponseCurve, ResponseFunction, ResponseMetadata,
    RunSummary, missing_terms, not_loaded, not_requested, require_broadening, write_curve,
};
use crate::domain::{
    ExecutionMode, ResponseArtifact, ResponseError, ResponseKind, ResponseResult, SystemInfo,
};
use crate::numerics::{
    EnergyGrid, FrequencyGrid, GreenBranch, MomentMatrix, MomentVector, SpectralKernel,
    contract_rank1, contract_rank2, contract_rank2_blocked, green_advanced, green_retarded,
    validate_partition,
};
use crate::store::MomentStore;
use num_complex::Complex64;
use std::path::Path;
use tracing::debug;

const KIND: ResponseKind = ResponseKind::Optical;

#[derive(Debug, Clone)]
pub struct OpticalMoments {
    pub direction: OpticalDirection,
    pub metadata: ResponseMetadata,
    pub gamma: Option<MomentMatrix>,
    pub lambda: Option<MomentVector>,
}

pub struct OpticalConductivity<'a, S: MomentStore + ?Sized> {
    store: &'a S,
    system: SystemInfo,
    settings: OpticalSettings,
    stage: PipelineStage,
    flags: CompletenessFlags,
    moments: Option<OpticalMoments>,
    curve: Option<ResponseCurve>,
}

impl<'a, S: MomentStore + ?Sized> OpticalConductivity<'a, S> {
    /// Looks up `Direction` under the optical prefix. Absence only marks the
    /// quantity as not required.
    pub fn new(store: &'a S, system: SystemInfo, settings: OpticalSettings) -> Self {
        let is_required = store.contains(&KIND.direction_key());
        debug!(is_required, "checked store for optical conductivity data");
        Self {
            store,
            system,
            settings,
            stage: if is_required {
                PipelineStage::Required
            } else {
                PipelineStage::NotRequired
            },
            flags: CompletenessFlags::required(is_required),
            moments: None,
            curve: None,
        }
    }

    pub fn moments(&self) -> Option<&OpticalMoments> {
        self.moments.as_ref()
    }

    /// Same curve as [`ResponseFunction::calculate`], with the two Gamma
    /// terms evaluated on `threads` workers over column blocks of the moment
    /// matrix. `NumMoments` must be divisible by `threads`.
    pub fn calculate_efficient(&mut self, threads: usize) -> ResponseResult<&ResponseCurve> {
        let curve = self.evaluate(Some(threads))?;
        self.stage = PipelineStage::Calculated;
        Ok(&*self.curve.insert(curve))
    }

    fn evaluate(&self, threads: Option<usize>) -> ResponseResult<ResponseCurve> {
        let moments = match self.stage {
            PipelineStage::NotRequired => return Err(not_requested(KIND)),
            PipelineStage::Required => return Err(not_loaded(KIND)),
            _ => self.moments.as_ref().ok_or_else(|| not_loaded(KIND))?,
        };
        let (Some(gamma), Some(lambda)) = (&moments.gamma, &moments.lambda) else {
            return Err(missing_terms(KIND, &self.flags));
        };
        let num_moments = moments.metadata.num_moments;
        if let Some(threads) = threads {
            validate_partition(num_moments, threads)?;
        }

        let beta = moments.metadata.beta()?;
        let energy_scale = self.system.energy_scale;
        let fermi_level = self.settings.fermi_energy_ev / energy_scale;
        let broadening = require_broadening(self.settings.broadening_ev / energy_scale)?;
        let unit_scale = self.settings.unit_scale;
        if !(unit_scale.is_finite() && unit_scale != 0.0) {
            return Err(ResponseError::configuration(
                "CONFIG.UNIT_SCALE",
                format!("unit scale must be finite and non-zero, got {unit_scale}"),
            ));
        }

        let energies =
            EnergyGrid::symmetric(moments.metadata.num_points, self.settings.energy_limit)?;
        let frequencies = FrequencyGrid::linear(
            self.settings.min_frequency,
            self.settings.max_frequency,
            self.settings.frequency_count,
        )?;
        let spectral = SpectralKernel::new(fermi_level, beta, num_moments, self.settings.damping);
        RunSummary {
            kind: KIND,
            beta,
            fermi_level,
            damping: self.settings.damping,
            broadening,
            energies: &energies,
            frequencies: &frequencies,
            output_file: &self.settings.output_file,
        }
        .log();

        let kernel = |n: usize, energy: f64| spectral.weight(n, energy);
        let advanced = green_advanced(broadening);
        let retarded = green_retarded(broadening);
        let branches = [
            GreenBranch::forward(&advanced),
            GreenBranch::time_reversed(&retarded),
        ];

        let gamma_terms: Vec<Complex64> = match threads {
            None => {
                let contract = |branch| {
                    contract_rank2(kernel, branch, num_moments, gamma, &energies, &frequencies)
                };
                let t1 = contract(branches[0])?;
                let t2 = contract(branches[1])?;
                t1.into_iter().zip(t2).map(|(t1, t2)| t1 + t2).collect()
            }
            Some(threads) => contract_rank2_blocked(
                kernel,
                &branches,
                num_moments,
                gamma,
                &energies,
                &frequencies,
                threads,
            )?,
        };
        let lambda_term = contract_rank1(kernel, num_moments, lambda, &energies)?;

        let prefactor = Complex64::new(0.0, self.system.degeneracy_per_area() / unit_scale);
        let values: Vec<Complex64> = frequencies
            .points()
            .iter()
            .zip(gamma_terms)
            .map(|(&frequency, gamma_term)| {
                prefactor * (gamma_term + lambda_term) / Complex64::new(frequency, broadening)
            })
            .collect();

        Ok(ResponseCurve::new(
            frequencies.points().to_vec(),
            values,
            energy_scale,
        ))
    }
}

impl<S: MomentStore + ?Sized> ResponseFunction for OpticalConductivity<'_, S> {
    fn kind(&self) -> ResponseKind {
        KIND
    }

    fn stage(&self) -> PipelineStage {
        self.stage
    }

    fn flags(&self) -> &CompletenessFlags {
        &self.flags
    }

    fn read(&mut self) -> ResponseResult<()> {
        if self.stage == PipelineStage::NotRequired {
            return Err(not_requested(KIND));
        }

        let metadata = ResponseMetadata::read(self.store, KIND.store_prefix())?;
        let direction = OpticalDirection::from_code(metadata.direction_code)?;
        let num_moments = metadata.num_moments;
        let is_complex = self.system.is_complex;

        let gamma = self.store.load_matrix(
            &key(&format!("Gamma{direction}")),
            num_moments,
            is_complex,
        )?;
        let lambda = self.store.load_vector(
            &key(&format!("Lambda{direction}")),
            num_moments,
            is_complex,
        )?;

        self.flags.clear_terms();
        self.flags.record_term("Gamma", gamma.is_some());
        self.flags.record_term("Lambda", lambda.is_some());
        debug!(
            %direction,
            num_moments,
            temperature = metadata.temperature,
            num_points = metadata.num_points,
            possible = self.flags.is_possible(),
            "read optical conductivity moments"
        );

        self.moments = Some(OpticalMoments {
            direction,
            metadata,
            gamma,
            lambda,
        });
        self.curve = None;
        self.stage = PipelineStage::Loaded;
        Ok(())
    }

    fn calculate(&mut self) -> ResponseResult<&ResponseCurve> {
        let curve = self.evaluate(None)?;
        self.stage = PipelineStage::Calculated;
        Ok(&*self.curve.insert(curve))
    }

    fn calculate_with(&mut self, mode: ExecutionMode) -> ResponseResult<&ResponseCurve> {
        match mode {
            ExecutionMode::Serial => self.calculate(),
            ExecutionMode::Parallel { threads } => self.calculate_efficient(threads),
        }
    }

    fn curve(&self) -> Option<&ResponseCurve> {
        self.curve.as_ref()
    }

    fn output_file(&self) -> &str {
        &self.settings.output_file
    }

    fn write_output(&mut self, output_dir: &Path) -> ResponseResult<ResponseArtifact> {
        let artifact = write_curve(
            KIND,
            self.curve.as_ref(),
            output_dir,
            &self.settings.output_file,
        )?;
        self.stage = PipelineStage::Written;
        Ok(artifact)
    }
}

fn key(name: &str) -> String {
    format!("{}{name}", KIND.store_prefix())
}
