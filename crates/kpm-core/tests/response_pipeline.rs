use kpm_core::common::constants::BOLTZMANN_EV_PER_K;
use kpm_core::numerics::{EnergyGrid, SpectralKernel, green_advanced, integrate_trapezoid};
use kpm_core::response::{OpticalConductivity, OpticalSettings, ResponseCurve, ResponseFunction};
use kpm_core::store::{DataStore, Dataset};
use kpm_core::{
    ExecutionMode, ResponseErrorCategory, ResponseKind, ResponseOutcome, ResponseRequest,
    ResponseSettings, SystemInfo, run_response, run_response_with_store,
};
use num_complex::Complex64;
use std::fs;
use tempfile::TempDir;

const OPTICAL: &str = "/Calculation/conductivity_optical/";
const NONLINEAR: &str = "/Calculation/conductivity_optical_nonlinear/";

fn system_store() -> DataStore {
    DataStore::new()
        .with_dataset("/IS_COMPLEX", Dataset::int_scalar(0))
        .with_dataset("/EnergyScale", Dataset::real_scalar(2.5))
        .with_dataset("/Hamiltonian/NOrbitals", Dataset::int_scalar(2))
        .with_dataset(
            "/LattVectors",
            Dataset::real(vec![2, 2], vec![1.0, 0.0, 0.5, 0.8660254037844386]),
        )
}

fn optical_store(num_moments: usize) -> DataStore {
    system_store()
        .with_dataset(format!("{OPTICAL}Direction"), Dataset::int_scalar(0))
        .with_dataset(
            format!("{OPTICAL}NumMoments"),
            Dataset::int_scalar(num_moments as i64),
        )
        .with_dataset(format!("{OPTICAL}Temperature"), Dataset::real_scalar(300.0))
        .with_dataset(format!("{OPTICAL}NumPoints"), Dataset::int_scalar(50))
        .with_dataset(
            format!("{OPTICAL}Gammaxx"),
            Dataset::real(
                vec![num_moments, num_moments],
                vec![1.0; num_moments * num_moments],
            ),
        )
        .with_dataset(
            format!("{OPTICAL}Lambdaxx"),
            Dataset::real(vec![num_moments], vec![1.0; num_moments]),
        )
}

fn special_nonlinear_store(num_moments: usize) -> DataStore {
    let square = num_moments * num_moments;
    system_store()
        .with_dataset(format!("{NONLINEAR}Direction"), Dataset::int_scalar(0))
        .with_dataset(
            format!("{NONLINEAR}NumMoments"),
            Dataset::int_scalar(num_moments as i64),
        )
        .with_dataset(format!("{NONLINEAR}Temperature"), Dataset::real_scalar(10.0))
        .with_dataset(format!("{NONLINEAR}NumPoints"), Dataset::int_scalar(40))
        .with_dataset(format!("{NONLINEAR}Special"), Dataset::int_scalar(1))
        .with_dataset(
            format!("{NONLINEAR}Gamma1xxx"),
            Dataset::complex(
                vec![num_moments, num_moments],
                &vec![Complex64::new(0.25, -0.1); square],
            ),
        )
        .with_dataset(
            format!("{NONLINEAR}Gamma2xxx"),
            Dataset::complex(
                vec![num_moments, num_moments],
                &vec![Complex64::new(0.5, 0.3); square],
            ),
        )
}

/// Real symmetric part plus imaginary antisymmetric part.
fn hermitian_gamma(n: usize, m: usize) -> Complex64 {
    Complex64::new(
        1.0 / (1.0 + (n + m) as f64),
        0.3 * (n as f64 - m as f64).sin(),
    )
}

fn hermitian_store(num_moments: usize) -> DataStore {
    let gamma: Vec<Complex64> = (0..num_moments * num_moments)
        .map(|index| hermitian_gamma(index / num_moments, index % num_moments))
        .collect();
    system_store()
        .with_dataset("/IS_COMPLEX", Dataset::int_scalar(1))
        .with_dataset(format!("{OPTICAL}Direction"), Dataset::int_scalar(3))
        .with_dataset(
            format!("{OPTICAL}NumMoments"),
            Dataset::int_scalar(num_moments as i64),
        )
        .with_dataset(format!("{OPTICAL}Temperature"), Dataset::real_scalar(300.0))
        .with_dataset(format!("{OPTICAL}NumPoints"), Dataset::int_scalar(50))
        .with_dataset(
            format!("{OPTICAL}Gammaxy"),
            Dataset::complex(vec![num_moments, num_moments], &gamma),
        )
        .with_dataset(
            format!("{OPTICAL}Lambdaxy"),
            Dataset::real(vec![num_moments], vec![1.0; num_moments]),
        )
}

fn largest_magnitude(curve: &ResponseCurve) -> f64 {
    curve
        .values()
        .iter()
        .map(|value| value.norm())
        .fold(0.0, f64::max)
}

fn table_columns(table: &str) -> Vec<[f64; 3]> {
    table
        .lines()
        .map(|line| {
            let values: Vec<f64> = line
                .split_whitespace()
                .map(|column| column.parse().expect("numeric column"))
                .collect();
            assert_eq!(values.len(), 3, "line: {line}");
            [values[0], values[1], values[2]]
        })
        .collect()
}

#[test]
fn optical_run_writes_table_from_store_file() {
    let temp = TempDir::new().expect("tempdir should be created");
    let store_path = temp.path().join("moments.json");
    fs::write(
        &store_path,
        optical_store(8).to_json_string().expect("store should serialize"),
    )
    .expect("store should be written");

    let request = ResponseRequest::new(ResponseKind::Optical, &store_path, temp.path());
    let outcome =
        run_response(&request, &ResponseSettings::default()).expect("optical run succeeds");
    let ResponseOutcome::Written(artifact) = outcome else {
        panic!("expected a written table, got {outcome:?}");
    };
    assert_eq!(artifact.line_count, 60);

    let table = fs::read_to_string(temp.path().join(&artifact.relative_path)).expect("table");
    let rows = table_columns(&table);
    assert_eq!(rows.len(), 60);
    assert!(rows.windows(2).all(|pair| pair[0][0] < pair[1][0]));
    // first frequency is 0.01 in rescaled units, times EnergyScale
    assert!((rows[0][0] - 0.025).abs() < 1.0e-12);
    assert!((rows[59][0] - 3.75).abs() < 1.0e-12);
    assert!(rows.iter().all(|row| row[1].is_finite() && row[2].is_finite()));
}

#[test]
fn parallel_and_serial_tables_agree() {
    let store = optical_store(8);
    let settings = ResponseSettings::default();
    let serial_dir = TempDir::new().expect("tempdir should be created");
    let parallel_dir = TempDir::new().expect("tempdir should be created");

    run_response_with_store(
        &store,
        ResponseKind::Optical,
        ExecutionMode::Serial,
        serial_dir.path(),
        &settings,
    )
    .expect("serial run");
    run_response_with_store(
        &store,
        ResponseKind::Optical,
        ExecutionMode::Parallel { threads: 4 },
        parallel_dir.path(),
        &settings,
    )
    .expect("parallel run");

    let read = |dir: &TempDir| {
        table_columns(
            &fs::read_to_string(dir.path().join("optical_cond.dat")).expect("table"),
        )
    };
    for (serial, parallel) in read(&serial_dir).iter().zip(read(&parallel_dir).iter()) {
        assert_eq!(serial[0], parallel[0]);
        let magnitude = serial[1].hypot(serial[2]).max(1.0e-12);
        for column in 1..3 {
            assert!(
                (serial[column] - parallel[column]).abs() / magnitude < 1.0e-9,
                "{serial:?} vs {parallel:?}"
            );
        }
    }
}

#[test]
fn efficient_path_matches_sequential_curve() {
    let store = optical_store(8);
    let system = SystemInfo::from_store(&store).expect("system info");
    let settings = ResponseSettings::default().optical;

    let mut sequential = OpticalConductivity::new(&store, system, settings.clone());
    sequential.read().expect("read");
    let expected = sequential.calculate().expect("calculate").clone();

    let mut efficient = OpticalConductivity::new(&store, system, settings);
    efficient.read().expect("read");
    let actual = efficient.calculate_efficient(2).expect("efficient");

    assert_eq!(expected.frequencies(), actual.frequencies());
    for (lhs, rhs) in expected.values().iter().zip(actual.values()) {
        assert!((lhs - rhs).norm() <= 1.0e-10 * lhs.norm().max(1.0));
    }
}

#[test]
fn absent_response_is_skipped_without_output() {
    let temp = TempDir::new().expect("tempdir should be created");
    let outcome = run_response_with_store(
        &system_store(),
        ResponseKind::Optical,
        ExecutionMode::Serial,
        temp.path(),
        &ResponseSettings::default(),
    )
    .expect("skip is not an error");

    assert_eq!(outcome, ResponseOutcome::Skipped);
    assert!(!temp.path().join("optical_cond.dat").exists());
}

#[test]
fn uneven_partition_fails_before_writing() {
    let temp = TempDir::new().expect("tempdir should be created");
    let error = run_response_with_store(
        &optical_store(8),
        ResponseKind::Optical,
        ExecutionMode::Parallel { threads: 3 },
        temp.path(),
        &ResponseSettings::default(),
    )
    .expect_err("8 moments cannot split over 3 threads");

    assert_eq!(error.category(), ResponseErrorCategory::ConfigurationError);
    assert_eq!(error.exit_code(), 4);
    assert!(!temp.path().join("optical_cond.dat").exists());
}

#[test]
fn special_nonlinear_run_writes_full_grid() {
    let temp = TempDir::new().expect("tempdir should be created");
    let outcome = run_response_with_store(
        &special_nonlinear_store(4),
        ResponseKind::Nonlinear,
        ExecutionMode::Serial,
        temp.path(),
        &ResponseSettings::default(),
    )
    .expect("special case run");
    let ResponseOutcome::Written(artifact) = outcome else {
        panic!("expected a written table, got {outcome:?}");
    };
    assert_eq!(artifact.line_count, 1001);

    let table = fs::read_to_string(temp.path().join("nonlinear_cond.dat")).expect("table");
    let rows = table_columns(&table);
    assert_eq!(rows.len(), 1001);
    assert_eq!(rows[0][0], 0.0);
    assert!((rows[1000][0] - 5.0).abs() < 1.0e-12);
    assert!(rows.iter().all(|row| row[1].is_finite() && row[2].is_finite()));
}

#[test]
fn missing_gamma2_is_incomplete_data() {
    let temp = TempDir::new().expect("tempdir should be created");
    let mut store = special_nonlinear_store(4);
    store.remove(&format!("{NONLINEAR}Gamma2xxx"));

    let error = run_response_with_store(
        &store,
        ResponseKind::Nonlinear,
        ExecutionMode::Serial,
        temp.path(),
        &ResponseSettings::default(),
    )
    .expect_err("Gamma2 is required");
    assert_eq!(error.category(), ResponseErrorCategory::IncompleteData);
    assert_eq!(error.exit_code(), 2);
    assert!(error.message().contains("Gamma2"));
}

#[test]
fn hermitian_gamma_time_reversed_term_uses_the_transpose() {
    let num_moments = 8;
    let store = hermitian_store(num_moments);
    let system = SystemInfo::from_store(&store).expect("system info");
    let settings = OpticalSettings {
        frequency_count: 12,
        ..OpticalSettings::default()
    };
    let mut pipeline = OpticalConductivity::new(&store, system, settings.clone());
    pipeline.read().expect("read");
    let curve = pipeline.calculate().expect("calculate").clone();

    // sum_e [ u_m(e) G_A(m, e - w) + conj(u_m(e) G_A(m, e + w)) ] with
    // u_m(e) = sum_n K(n, e) Gamma_nm, written out independently of the
    // contraction helpers
    let energy_scale = system.energy_scale;
    let broadening = settings.broadening_ev / energy_scale;
    let beta = 1.0 / (BOLTZMANN_EV_PER_K * 300.0);
    let spectral = SpectralKernel::new(
        settings.fermi_energy_ev / energy_scale,
        beta,
        num_moments,
        settings.damping,
    );
    let energies = EnergyGrid::symmetric(50, settings.energy_limit).expect("energies");
    let advanced = green_advanced(broadening);
    let projected: Vec<Vec<Complex64>> = energies
        .points()
        .iter()
        .map(|&energy| {
            (0..num_moments)
                .map(|m| {
                    (0..num_moments)
                        .map(|n| hermitian_gamma(n, m) * spectral.weight(n, energy))
                        .sum()
                })
                .collect()
        })
        .collect();
    let lambda_integrand: Vec<Complex64> = energies
        .points()
        .iter()
        .map(|&energy| {
            (0..num_moments)
                .map(|n| Complex64::new(spectral.weight(n, energy), 0.0))
                .sum()
        })
        .collect();
    let lambda_term = integrate_trapezoid(energies.points(), &lambda_integrand);
    let prefactor = Complex64::new(0.0, system.degeneracy_per_area() / settings.unit_scale);

    let scale = largest_magnitude(&curve);
    for (&frequency, &actual) in curve.frequencies().iter().zip(curve.values()) {
        let integrand: Vec<Complex64> = energies
            .points()
            .iter()
            .zip(&projected)
            .map(|(&energy, row)| {
                let fold = |shifted: f64| -> Complex64 {
                    row.iter()
                        .enumerate()
                        .map(|(m, &weight)| weight * advanced(m, shifted))
                        .sum()
                };
                fold(energy - frequency) + fold(energy + frequency).conj()
            })
            .collect();
        let gamma_term = integrate_trapezoid(energies.points(), &integrand);
        let expected =
            prefactor * (gamma_term + lambda_term) / Complex64::new(frequency, broadening);
        assert!(
            (actual - expected).norm() <= 1.0e-9 * scale,
            "w={frequency}: {actual} vs {expected}"
        );
    }

    let efficient = pipeline.calculate_efficient(4).expect("efficient").clone();
    for (lhs, rhs) in curve.values().iter().zip(efficient.values()) {
        assert!((lhs - rhs).norm() <= 1.0e-10 * scale, "{lhs} vs {rhs}");
    }
}

#[test]
fn conductivity_is_conjugate_symmetric_about_zero_frequency() {
    // Hermitian Gamma and real Lambda give sigma(-w) = conj(sigma(w)) for the
    // (w + i s) denominator: even real part, odd imaginary part
    let store = hermitian_store(8);
    let system = SystemInfo::from_store(&store).expect("system info");
    let settings = OpticalSettings {
        min_frequency: -1.0,
        max_frequency: 1.0,
        frequency_count: 21,
        ..OpticalSettings::default()
    };
    let mut pipeline = OpticalConductivity::new(&store, system, settings);
    pipeline.read().expect("read");
    let serial = pipeline.calculate().expect("calculate").clone();
    let blocked = pipeline.calculate_efficient(2).expect("efficient").clone();

    for curve in [&serial, &blocked] {
        let frequencies = curve.frequencies();
        let values = curve.values();
        let scale = largest_magnitude(curve);
        for index in 0..values.len() {
            let mirror = values.len() - 1 - index;
            assert!((frequencies[index] + frequencies[mirror]).abs() < 1.0e-12);
            assert!(
                (values[mirror] - values[index].conj()).norm() <= 1.0e-9 * scale,
                "w={}: {} vs conj {}",
                frequencies[index],
                values[mirror],
                values[index]
            );
        }
        assert!(values.iter().any(|value| value.im.abs() > 1.0e-6 * scale));
    }
}

#[test]
fn unrequested_kind_skips_without_system_description() {
    let temp = TempDir::new().expect("tempdir should be created");
    let store =
        DataStore::new().with_dataset(format!("{OPTICAL}Direction"), Dataset::int_scalar(0));
    let settings = ResponseSettings::default();

    let outcome = run_response_with_store(
        &store,
        ResponseKind::Nonlinear,
        ExecutionMode::Serial,
        temp.path(),
        &settings,
    )
    .expect("unrequested kind never reads the system keys");
    assert_eq!(outcome, ResponseOutcome::Skipped);

    let error = run_response_with_store(
        &store,
        ResponseKind::Optical,
        ExecutionMode::Serial,
        temp.path(),
        &settings,
    )
    .expect_err("requested kind needs the system description");
    assert_eq!(error.category(), ResponseErrorCategory::IncompleteData);
    assert!(error.message().contains("/IS_COMPLEX"));
}
