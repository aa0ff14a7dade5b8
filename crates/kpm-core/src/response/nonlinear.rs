//! Second-order optical conductivity.
//!
//! Only the special case (`Special = 1`, materials where the three-index
//! term vanishes) has a closed formula:
//!
//! `sigma(w) = i N_orb g_s / A / E_s * (T1(w) + T2(w) + (T3 + T4) / 2) / (w^2 + s^2)`
//!
//! `T1` contracts `Gamma2` against the advanced Green's function at `e - w`,
//! `T2` is its time-reversed partner (retarded, `e + w`, kernel on the second
//! moment index). `T3`/`T4` are the same pair on `Gamma1` at zero frequency
//! with twice the broadening.

use super::direction::NonlinearDirection;
use super::settings::NonlinearSettings;
use super::{
    CompletenessFlags, PipelineStage, ResponseCurve, ResponseFunction, ResponseMetadata,
    RunSummary, missing_terms, not_loaded, not_requested, require_broadening, write_curve,
};
use crate::domain::{ResponseArtifact, ResponseError, ResponseKind, ResponseResult, SystemInfo};
use crate::numerics::{
    EnergyGrid, FrequencyGrid, GreenBranch, MomentCube, MomentMatrix, MomentVector,
    SpectralKernel, contract_rank2, green_advanced, green_retarded,
};
use crate::store::MomentStore;
use num_complex::Complex64;
use std::path::Path;
use tracing::debug;

const KIND: ResponseKind = ResponseKind::Nonlinear;

/// Which second-order formula the stored moments belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecondOrderCase {
    /// `Special = 0`: needs `Gamma0`, `Gamma1`, `Gamma2` and `Gamma3`.
    General,
    /// `Special = 1`: `Gamma1` and `Gamma2` only.
    Special,
}

impl SecondOrderCase {
    pub fn from_code(code: i64) -> ResponseResult<Self> {
        match code {
            0 => Ok(Self::General),
            1 => Ok(Self::Special),
            other => Err(ResponseError::unsupported_case(
                "RUN.SECOND_ORDER_CASE",
                format!("second-order case code {other} is not recognised (expected 0 or 1)"),
            )),
        }
    }

    pub const fn required_terms(self) -> &'static [&'static str] {
        match self {
            Self::General => &["Gamma0", "Gamma1", "Gamma2", "Gamma3"],
            Self::Special => &["Gamma1", "Gamma2"],
        }
    }
}

#[derive(Debug, Clone)]
pub struct NonlinearMoments {
    pub direction: NonlinearDirection,
    pub metadata: ResponseMetadata,
    pub case: SecondOrderCase,
    pub gamma0: Option<MomentVector>,
    pub gamma1: Option<MomentMatrix>,
    pub gamma2: Option<MomentMatrix>,
    pub gamma3: Option<MomentCube>,
}

pub struct NonlinearConductivity<'a, S: MomentStore + ?Sized> {
    store: &'a S,
    system: SystemInfo,
    settings: NonlinearSettings,
    stage: PipelineStage,
    flags: CompletenessFlags,
    moments: Option<NonlinearMoments>,
    curve: Option<ResponseCurve>,
}

impl<'a, S: MomentStore + ?Sized> NonlinearConductivity<'a, S> {
    pub fn new(store: &'a S, system: SystemInfo, settings: NonlinearSettings) -> Self {
        let is_required = store.contains(&KIND.direction_key());
        debug!(is_required, "checked store for nonlinear conductivity data");
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

    pub fn moments(&self) -> Option<&NonlinearMoments> {
        self.moments.as_ref()
    }

    fn evaluate(&self) -> ResponseResult<ResponseCurve> {
        let moments = match self.stage {
            PipelineStage::NotRequired => return Err(not_requested(KIND)),
            PipelineStage::Required => return Err(not_loaded(KIND)),
            _ => self.moments.as_ref().ok_or_else(|| not_loaded(KIND))?,
        };
        if !self.flags.is_possible() {
            return Err(missing_terms(KIND, &self.flags));
        }
        let (gamma1, gamma2) = match (moments.case, &moments.gamma1, &moments.gamma2) {
            (SecondOrderCase::General, _, _) => {
                return Err(ResponseError::unsupported_case(
                    "RUN.SECOND_ORDER_GENERAL",
                    "the general second-order case (Special = 0) is not implemented; \
                     only Special = 1 moments can be evaluated",
                ));
            }
            (SecondOrderCase::Special, Some(gamma1), Some(gamma2)) => (gamma1, gamma2),
            (SecondOrderCase::Special, _, _) => return Err(missing_terms(KIND, &self.flags)),
        };

        let num_moments = moments.metadata.num_moments;
        let beta = moments.metadata.beta()?;
        let fermi_level = self.settings.fermi_level;
        let broadening = require_broadening(self.settings.broadening)?;

        let energies =
            EnergyGrid::symmetric(moments.metadata.num_points, self.settings.energy_limit)?;
        let frequencies = FrequencyGrid::linear(
            self.settings.min_frequency,
            self.settings.max_frequency,
            self.settings.frequency_count,
        )?;
        let static_grid = FrequencyGrid::static_point();
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
        let contract = |branch, matrix: &MomentMatrix, grid: &FrequencyGrid| {
            contract_rank2(kernel, branch, num_moments, matrix, &energies, grid)
        };
        let advanced = green_advanced(broadening);
        let retarded = green_retarded(broadening);
        let static_advanced = green_advanced(2.0 * broadening);
        let static_retarded = green_retarded(2.0 * broadening);

        let t1 = contract(GreenBranch::forward(&advanced), gamma2, &frequencies)?;
        let t2 = contract(GreenBranch::time_reversed(&retarded), gamma2, &frequencies)?;
        let t3 = contract(GreenBranch::forward(&static_advanced), gamma1, &static_grid)?;
        let t4 = contract(GreenBranch::time_reversed(&static_retarded), gamma1, &static_grid)?;
        let static_term = (t3[0] + t4[0]) * 0.5;

        let prefactor = Complex64::new(
            0.0,
            self.system.degeneracy_per_area() / self.system.energy_scale,
        );
        let values: Vec<Complex64> = frequencies
            .points()
            .iter()
            .zip(t1.into_iter().zip(t2))
            .map(|(&frequency, (t1, t2))| {
                let denominator = frequency * frequency + broadening * broadening;
                prefactor * (t1 + t2 + static_term) / denominator
            })
            .collect();

        Ok(ResponseCurve::new(
            frequencies.points().to_vec(),
            values,
            self.system.energy_scale,
        ))
    }
}

impl<S: MomentStore + ?Sized> ResponseFunction for NonlinearConductivity<'_, S> {
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
        let direction = NonlinearDirection::from_code(metadata.direction_code)?;
        let case = SecondOrderCase::from_code(self.store.read_int(&key("Special"))?)?;
        let num_moments = metadata.num_moments;
        let is_complex = self.system.is_complex;
        let general = case == SecondOrderCase::General;
        let name = |stem: &str| key(&format!("{stem}{direction}"));

        let gamma0 = if general {
            self.store.load_vector(&name("Gamma0"), num_moments, is_complex)?
        } else {
            None
        };
        let gamma1 = self.store.load_matrix(&name("Gamma1"), num_moments, is_complex)?;
        let gamma2 = self.store.load_matrix(&name("Gamma2"), num_moments, is_complex)?;
        let gamma3 = if general {
            self.store.load_cube(&name("Gamma3"), num_moments, is_complex)?
        } else {
            None
        };

        self.flags.clear_terms();
        for &term in case.required_terms() {
            let found = match term {
                "Gamma0" => gamma0.is_some(),
                "Gamma1" => gamma1.is_some(),
                "Gamma2" => gamma2.is_some(),
                _ => gamma3.is_some(),
            };
            self.flags.record_term(term, found);
        }
        debug!(
            %direction,
            ?case,
            num_moments,
            temperature = metadata.temperature,
            num_points = metadata.num_points,
            possible = self.flags.is_possible(),
            "read nonlinear conductivity moments"
        );

        self.moments = Some(NonlinearMoments {
            direction,
            metadata,
            case,
            gamma0,
            gamma1,
            gamma2,
            gamma3,
        });
        self.curve = None;
        self.stage = PipelineStage::Loaded;
        Ok(())
    }

    fn calculate(&mut self) -> ResponseResult<&ResponseCurve> {
        let curve = self.evaluate()?;
        self.stage = PipelineStage::Calculated;
        Ok(&*self.curve.insert(curve))
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
