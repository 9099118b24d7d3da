#![allow(clippy::result_large_err)]

use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use miette::Diagnostic;
use thiserror::Error;

use crate::cli::Cli;
use crate::client::ReqwestClient;
use crate::clock::TokioClock;
use crate::outputter::ConsoleReporter;
use crate::outputter::Reporter;
use crate::parser::Format;
use crate::parser::ParseError;
use crate::session::RunStatus;
use crate::setup::Lifecycle;
use crate::setup::app::AppProcess;
use crate::setup::app::OutputSource;
use crate::setup::ready::ReadinessPolicy;
use crate::validator::Config;
use crate::validator::ValidationError;
use crate::validator::Validator;

mod asserter;
mod case;
mod cli;
mod client;
mod clock;
mod logging;
mod outputter;
mod parser;
mod runner;
mod session;
mod setup;
#[cfg(test)]
mod testing;
mod validator;

#[derive(Error, Debug, Diagnostic)]
pub enum ApicheckError {
    #[error("Failed to read config file `{path}`")]
    FileError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file")]
    Parsing(#[from] ParseError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    ValidationError(#[from] ValidationError),
}

/// Reads the config file and validates its run-wide settings.
fn load_config(path: &str) -> Result<Config, ApicheckError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ApicheckError::FileError {
        path: path.to_string(),
        source,
    })?;

    let test_file = parser::from_str(&contents, Format::from_path(path))?;
    let config = Validator::new(&test_file, &contents, path).validate()?;

    Ok(config)
}

/// Prints the captured stdout and stderr from the service.
async fn print_app_output(app: &AppProcess) {
    let output = app.output();
    let output = output.lock().await;

    println!("\n--- Captured Interleaved Output ---");
    for item in output.iter() {
        match item.source {
            OutputSource::StdOut => println!("[STDOUT] {}", item.line),
            OutputSource::StdErr => eprintln!("[STDERR] {}", item.line),
        }
    }
    println!("------------------------------------");
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let reporter = ConsoleReporter;

    let config = match load_config(&cli.path) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("{:?}", miette::Report::new(error));
            return RunStatus::Misconfigured.into();
        }
    };

    reporter.loaded(&cli.path, config.tests.len());

    let client = match ReqwestClient::new() {
        Ok(client) => client,
        Err(error) => {
            reporter.start_up_failed(&error);
            return RunStatus::StartUpFailed.into();
        }
    };

    // The spawned service is killed when `lifecycle` drops, whichever way
    // this function returns.
    let mut lifecycle = match Lifecycle::start(&config, cli.no_start, cli.stream_app) {
        Ok(lifecycle) => lifecycle,
        Err(error) => {
            reporter.start_up_failed(&error);
            return RunStatus::StartUpFailed.into();
        }
    };

    let policy = ReadinessPolicy::with_timeout(Duration::from_secs(cli.ready_timeout));
    let status = session::run_session(
        &config,
        &mut lifecycle,
        &client,
        &TokioClock,
        &reporter,
        policy,
    )
    .await;

    if cli.app_output
        && let Some(app) = lifecycle.app()
    {
        print_app_output(app).await;
    }

    status.into()
}
