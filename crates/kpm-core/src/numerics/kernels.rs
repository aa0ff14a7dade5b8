//! Chebyshev spectral kernels: the delta-function approximant, thermal
//! occupation, damping kernels and the broadened single-particle Green's
//! functions used by the conductivity formulas.
//!
//! Every energy argument is in rescaled units, i.e. inside `(-1, 1)` for the
//! spectral density and anywhere on the real line for the Green's functions.

use crate::common::constants::FERMI_EXPONENT_LIMIT;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// KPM approximant of `delta(x - H)` at Chebyshev order `n`:
/// `2 T_n(x) / (pi sqrt(1 - x^2))`.
pub fn delta(n: usize, x: f64) -> f64 {
    2.0 * (n as f64 * x.acos()).cos() / (PI * (1.0 - x * x).sqrt())
}

/// Fermi-Dirac occupation `1 / (1 + exp(beta (x - mu)))`.
pub fn fermi_function(x: f64, mu: f64, beta: f64) -> f64 {
    let exponent = beta * (x - mu);
    if exponent > FERMI_EXPONENT_LIMIT {
        0.0
    } else if exponent < -FERMI_EXPONENT_LIMIT {
        1.0
    } else {
        1.0 / (1.0 + exponent.exp())
    }
}

/// Jackson damping factor for moment `n` of an expansion truncated at
/// `num_moments`.
pub fn jackson_kernel(n: usize, num_moments: usize) -> f64 {
    let order = num_moments as f64;
    let phase = PI / (order + 1.0);
    let n = n as f64;
    ((order - n + 1.0) * (n * phase).cos() + (n * phase).sin() / phase.tan()) / (order + 1.0)
}

/// Lorentz damping factor `sinh(lambda (1 - n/M)) / sinh(lambda)`.
pub fn lorentz_kernel(n: usize, num_moments: usize, lambda: f64) -> f64 {
    (lambda * (1.0 - n as f64 / num_moments as f64)).sinh() / lambda.sinh()
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DampingKernel {
    #[default]
    Jackson,
    Lorentz {
        lambda: f64,
    },
}

impl DampingKernel {
    pub fn factor(&self, n: usize, num_moments: usize) -> f64 {
        match self {
            Self::Jackson => jackson_kernel(n, num_moments),
            Self::Lorentz { lambda } => lorentz_kernel(n, num_moments, *lambda),
        }
    }

    pub const fn name(&self) -> &'static str {
        match self {
            Self::Jackson => "Jackson",
            Self::Lorentz { .. } => "Lorentz",
        }
    }
}

/// Retarded Chebyshev Green's function kernel
/// `-2i exp(-i n acos z) / sqrt(1 - z^2)` with `z = x + i scat`.
pub fn green_retarded(broadening: f64) -> impl Fn(usize, f64) -> Complex64 + Copy + Send + Sync {
    move |n, energy| {
        let z = Complex64::new(energy, broadening);
        let denominator = (Complex64::new(1.0, 0.0) - z * z).sqrt();
        let phase = Complex64::new(0.0, -(n as f64)) * z.acos();
        Complex64::new(0.0, -2.0) / denominator * phase.exp()
    }
}

/// Advanced Chebyshev Green's function kernel
/// `2i exp(i n acos z) / sqrt(1 - z^2)` with `z = x - i scat`.
pub fn green_advanced(broadening: f64) -> impl Fn(usize, f64) -> Complex64 + Copy + Send + Sync {
    move |n, energy| {
        let z = Complex64::new(energy, -broadening);
        let denominator = (Complex64::new(1.0, 0.0) - z * z).sqrt();
        let phase = Complex64::new(0.0, n as f64) * z.acos();
        Complex64::new(0.0, 2.0) / denominator * phase.exp()
    }
}

/// Energy weight of moment `n` in every conductivity term: delta approximant,
/// halved zeroth moment, Fermi occupation and damping, for one fixed
/// temperature and Fermi level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralKernel {
    fermi_level: f64,
    beta: f64,
    num_moments: usize,
    damping: DampingKernel,
}

impl SpectralKernel {
    pub fn new(fermi_level: f64, beta: f64, num_moments: usize, damping: DampingKernel) -> Self {
        Self {
            fermi_level,
            beta,
            num_moments,
            damping,
        }
    }

    pub fn fermi_level(&self) -> f64 {
        self.fermi_level
    }

    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn num_moments(&self) -> usize {
        self.num_moments
    }

    pub fn damping(&self) -> DampingKernel {
        self.damping
    }

    pub fn weight(&self, n: usize, energy: f64) -> f64 {
        let degeneracy = if n == 0 { 0.5 } else { 1.0 };
        delta(n, energy)
            * degeneracy
            * fermi_function(energy, self.fermi_level, self.beta)
            * self.damping.factor(n, self.num_moments)
    }
}

#[cfg(test)]
mod tests {
    use super::{
        DampingKernel, SpectralKernel, delta, fermi_function, green_advanced, green_retarded,
        jackson_kernel, lorentz_kernel,
    };
    use std::f64::consts::PI;

    #[test]
    fn retarded_and_advanced_kernels_are_complex_conjugates() {
        for broadening in [1.0e-4, 3.388_299e-3, 0.0166, 0.25] {
            let retarded = green_retarded(broadening);
            let advanced = green_advanced(broadening);
            for n in [0, 1, 2, 7, 31, 128] {
                for energy in [-2.4, -1.0, -0.73, -0.01, 0.0, 0.35, 0.99, 1.0, 1.6] {
                    let lhs = retarded(n, energy);
                    let rhs = advanced(n, energy).conj();
                    let scale = lhs.norm().max(1.0);
                    assert!(
                        (lhs - rhs).norm() <= 1.0e-12 * scale,
                        "scat={broadening} n={n} x={energy}: {lhs} vs {rhs}"
                    );
                }
            }
        }
    }

    #[test]
    fn green_kernels_decay_with_moment_order() {
        let retarded = green_retarded(0.05);
        let low = retarded(2, 0.3).norm();
        let high = retarded(200, 0.3).norm();
        assert!(high < low);
        assert!(high.is_finite());
    }

    #[test]
    fn delta_follows_chebyshev_recurrence() {
        for x in [-0.95_f64, -0.4, 0.0, 0.21, 0.87] {
            let weight = PI * (1.0 - x * x).sqrt() / 2.0;
            let mut previous = delta(0, x) * weight;
            let mut current = delta(1, x) * weight;
            assert!((previous - 1.0).abs() < 1.0e-12);
            assert!((current - x).abs() < 1.0e-12);
            for n in 2..40 {
                let next = delta(n, x) * weight;
                assert!(
                    (next - (2.0 * x * current - previous)).abs() < 1.0e-10,
                    "recurrence broke at n={n}, x={x}"
                );
                previous = current;
                current = next;
            }
        }
    }

    #[test]
    fn delta_has_even_odd_parity() {
        for n in 0..12 {
            let sign = if n % 2 == 0 { 1.0 } else { -1.0 };
            assert!((delta(n, -0.37) - sign * delta(n, 0.37)).abs() < 1.0e-12);
        }
    }

    #[test]
    fn jackson_kernel_starts_at_one_and_never_increases() {
        for num_moments in [1, 2, 3, 8, 64, 1024] {
            assert!((jackson_kernel(0, num_moments) - 1.0).abs() < 1.0e-12);
            let mut previous = jackson_kernel(0, num_moments);
            for n in 1..num_moments {
                let current = jackson_kernel(n, num_moments);
                assert!(current >= -1.0e-12, "M={num_moments} n={n} gave {current}");
                assert!(
                    current <= previous + 1.0e-12,
                    "M={num_moments} n={n}: {current} > {previous}"
                );
                previous = current;
            }
        }
    }

    #[test]
    fn lorentz_kernel_starts_at_one_and_vanishes_at_truncation() {
        assert!((lorentz_kernel(0, 64, 4.0) - 1.0).abs() < 1.0e-12);
        assert!(lorentz_kernel(64, 64, 4.0).abs() < 1.0e-12);
        assert!(lorentz_kernel(10, 64, 4.0) > lorentz_kernel(20, 64, 4.0));
    }

    #[test]
    fn fermi_function_is_monotone_and_saturates() {
        let mu = 0.1;
        let beta = 38.68;
        assert_eq!(fermi_function(mu, mu, beta), 0.5);

        let mut previous = fermi_function(-1.0, mu, beta);
        for index in 1..=200 {
            let x = -1.0 + 2.0 * index as f64 / 200.0;
            let current = fermi_function(x, mu, beta);
            assert!(current <= previous, "fermi increased at x={x}");
            previous = current;
        }

        assert_eq!(fermi_function(-1.0e6, mu, beta), 1.0);
        assert_eq!(fermi_function(1.0e6, mu, beta), 0.0);
        assert_eq!(fermi_function(0.2, 0.0, 1.0e9), 0.0);
        assert_eq!(fermi_function(-0.2, 0.0, 1.0e9), 1.0);
    }

    #[test]
    fn spectral_kernel_halves_zeroth_moment() {
        let kernel = SpectralKernel::new(0.0, 10.0, 16, DampingKernel::Jackson);
        let energy = -0.3;
        let occupation = fermi_function(energy, 0.0, 10.0);
        let zeroth = kernel.weight(0, energy);
        assert!((zeroth - 0.5 * delta(0, energy) * occupation).abs() < 1.0e-12);

        let third = kernel.weight(3, energy);
        let expected = delta(3, energy) * occupation * jackson_kernel(3, 16);
        assert!((third - expected).abs() < 1.0e-12);
    }

    #[test]
    fn damping_kernel_deserializes_from_tagged_json() {
        let jackson: DampingKernel = serde_json::from_str(r#"{"kind":"jackson"}"#).unwrap();
        assert_eq!(jackson, DampingKernel::Jackson);
        let lorentz: DampingKernel =
            serde_json::from_str(r#"{"kind":"lorentz","lambda":4.0}"#).unwrap();
        assert_eq!(lorentz, DampingKernel::Lorentz { lambda: 4.0 });
        assert_eq!(lorentz.name(), "Lorentz");
    }
}
