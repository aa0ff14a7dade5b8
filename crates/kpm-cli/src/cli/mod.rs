mod commands;

use clap::Parser;
use kpm_core::domain::ResponseError;
use tracing_subscriber::EnvFilter;

pub fn run_from_env() -> i32 {
    let args: Vec<String> = std::env::args().skip(1).collect();

    match run(args) {
        Ok(code) => code,
        Err(error) => {
            let response_error = error.as_response_error();
            eprintln!("{}", response_error.diagnostic_line());
            if let Some(summary_line) = response_error.fatal_exit_line() {
                eprintln!("{}", summary_line);
            }
            response_error.exit_code()
        }
    }
}

pub fn run<I, S>(args: I) -> Result<i32, CliError>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let full_args = std::iter::once("kpm-response".to_string())
        .chain(args.into_iter().map(Into::into))
        .collect::<Vec<_>>();
    parse_and_dispatch(full_args)
}

fn parse_and_dispatch(args: Vec<String>) -> Result<i32, CliError> {
    match Cli::try_parse_from(&args) {
        Ok(cli) => {
            init_tracing(cli.verbose);
            dispatch_parsed(cli.command)
        }
        Err(err) => match err.kind() {
            clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion => {
                print!("{}", err);
                Ok(0)
            }
            _ => Err(CliError::Usage(err.to_string())),
        },
    }
}

/// `RUST_LOG` wins over `-v`. Repeated calls keep the first subscriber.
fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser)]
#[command(
    name = "kpm-response",
    version,
    about = "Optical conductivities from Kernel Polynomial Method moments"
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(clap::Subcommand)]
enum CliCommand {
    /// Compute the linear optical conductivity
    Optical(commands::OpticalArgs),
    /// Compute the second-order optical conductivity
    Nonlinear(commands::StoreArgs),
    /// Compute every response present in the moment store
    All(commands::OpticalArgs),
    /// Print the effective settings as JSON
    Settings(commands::SettingsArgs),
}

fn dispatch_parsed(command: CliCommand) -> Result<i32, CliError> {
    match command {
        CliCommand::Optical(args) => commands::run_optical_command(args),
        CliCommand::Nonlinear(args) => commands::run_nonlinear_command(args),
        CliCommand::All(args) => commands::run_all_command(args),
        CliCommand::Settings(args) => commands::run_settings_command(args),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("{0}")]
    Usage(String),
    #[error("{0}")]
    Compute(ResponseError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl CliError {
    fn as_response_error(&self) -> ResponseError {
        match self {
            Self::Usage(message) => {
                ResponseError::configuration("INPUT.CLI_USAGE", message.clone())
            }
            Self::Compute(error) => error.clone(),
            Self::Internal(error) => ResponseError::io_system("IO.CLI", format!("{error:#}")),
        }
    }
}

impl From<ResponseError> for CliError {
    fn from(error: ResponseError) -> Self {
        Self::Compute(error)
    }
}
