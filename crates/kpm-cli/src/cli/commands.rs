use super::CliError;
use anyhow::Context;
use kpm_core::domain::{ExecutionMode, ResponseError, ResponseKind, ResponseRequest};
use kpm_core::response::{
    ResponseOutcome, ResponseSettings, run_response, run_response_with_store,
};
use kpm_core::store::DataStore;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(clap::Args)]
pub(super) struct StoreArgs {
    /// Moment store (JSON) written by the simulation stage
    #[arg(long)]
    store: PathBuf,

    /// Settings file overriding the default grids and parameters
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory receiving the conductivity tables
    #[arg(long, default_value = ".")]
    output_dir: PathBuf,
}

#[derive(clap::Args)]
pub(super) struct OpticalArgs {
    #[command(flatten)]
    store: StoreArgs,

    /// Evaluate the linear response on this many worker threads
    #[arg(long)]
    threads: Option<usize>,
}

#[derive(clap::Args)]
pub(super) struct SettingsArgs {
    /// Settings file to merge over the defaults
    #[arg(long)]
    config: Option<PathBuf>,
}

pub(super) fn run_optical_command(args: OpticalArgs) -> Result<i32, CliError> {
    let mode = execution_mode(args.threads);
    run_single(ResponseKind::Optical, &args.store, mode)
}

pub(super) fn run_nonlinear_command(args: StoreArgs) -> Result<i32, CliError> {
    run_single(ResponseKind::Nonlinear, &args, ExecutionMode::Serial)
}

/// Runs every response kind against one opened store. A failing kind is
/// reported and does not stop the others.
pub(super) fn run_all_command(args: OpticalArgs) -> Result<i32, CliError> {
    let settings = load_settings(args.store.config.as_deref())?;
    prepare_output_dir(&args.store.output_dir)?;
    let store = DataStore::open(&args.store.store).map_err(ResponseError::from)?;

    let mut failures = Vec::new();
    for kind in ResponseKind::ALL {
        let mode = match kind {
            ResponseKind::Optical => execution_mode(args.threads),
            ResponseKind::Nonlinear => ExecutionMode::Serial,
        };
        match run_response_with_store(&store, kind, mode, &args.store.output_dir, &settings) {
            Ok(outcome) => report_outcome(kind, &args.store.output_dir, &outcome),
            Err(error) => {
                eprintln!("{}", error.diagnostic_line());
                failures.push(error);
            }
        }
    }

    match failures.into_iter().next() {
        None => Ok(0),
        Some(first) => {
            if let Some(summary_line) = first.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            Ok(first.exit_code())
        }
    }
}

pub(super) fn run_settings_command(args: SettingsArgs) -> Result<i32, CliError> {
    let settings = load_settings(args.config.as_deref())?;
    let rendered =
        serde_json::to_string_pretty(&settings).context("failed to render settings as JSON")?;
    println!("{rendered}");
    Ok(0)
}

fn run_single(kind: ResponseKind, args: &StoreArgs, mode: ExecutionMode) -> Result<i32, CliError> {
    let settings = load_settings(args.config.as_deref())?;
    prepare_output_dir(&args.output_dir)?;
    let request =
        ResponseRequest::new(kind, &args.store, &args.output_dir).with_execution_mode(mode);
    let outcome = run_response(&request, &settings)?;
    report_outcome(kind, &args.output_dir, &outcome);
    Ok(0)
}

fn execution_mode(threads: Option<usize>) -> ExecutionMode {
    match threads {
        Some(threads) => ExecutionMode::Parallel { threads },
        None => ExecutionMode::Serial,
    }
}

fn load_settings(config: Option<&Path>) -> Result<ResponseSettings, CliError> {
    match config {
        Some(path) => {
            info!(path = %path.display(), "loading settings");
            Ok(ResponseSettings::load(path)?)
        }
        None => Ok(ResponseSettings::default()),
    }
}

fn prepare_output_dir(output_dir: &Path) -> Result<(), CliError> {
    fs::create_dir_all(output_dir).with_context(|| {
        format!(
            "failed to create output directory '{}'",
            output_dir.display()
        )
    })?;
    Ok(())
}

fn report_outcome(kind: ResponseKind, output_dir: &Path, outcome: &ResponseOutcome) {
    match outcome {
        ResponseOutcome::Written(artifact) => println!(
            "{kind}: wrote {} ({} lines)",
            output_dir.join(&artifact.relative_path).display(),
            artifact.line_count
        ),
        ResponseOutcome::Skipped => {
            println!("{kind}: not present in the moment store; skipped")
        }
    }
}
