use std::error::Error;

use console::Style;
use url::Url;

use crate::client::ClientError;
use crate::client::error_chain;
use crate::runner::RunError;
use crate::runner::RunSummary;
use crate::setup::CleanupError;

/// Receives progress from the prober, the runner and the session.
pub trait Reporter {
    fn loaded(&self, path: &str, n_tests: usize);

    fn waiting(&self, url: &Url, attempt: u32);

    fn testing(&self, name: &str);

    fn passed(&self, name: &str);

    fn failed(&self, error: &RunError);

    fn start_up_failed(&self, error: &dyn Error);

    fn cleanup_failed(&self, error: &CleanupError);

    fn finished(&self, summary: &RunSummary);
}

/// Styled lines on stdout; failures go to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn loaded(&self, path: &str, n_tests: usize) {
        let style = Style::new().bold().cyan();
        println!(
            "{}",
            style.apply_to(format!("Running test file: {path} Found {n_tests} tests: Running..."))
        );
    }

    fn waiting(&self, url: &Url, attempt: u32) {
        println!(
            "{}",
            console::style(format!("[SETUP] Waiting for service at {url} (attempt {attempt})"))
                .bold()
                .yellow()
        );
    }

    fn testing(&self, name: &str) {
        println!("Testing {name}.");
    }

    fn passed(&self, name: &str) {
        println!("{} {name} passed.", console::style("✔").green().bold());
    }

    fn failed(&self, error: &RunError) {
        eprintln!("{}", render_failure(error));
    }

    fn start_up_failed(&self, error: &dyn Error) {
        eprintln!(
            "{} {}",
            console::style("[SETUP] start up failed:").red().bold(),
            error_chain(error)
        );
    }

    fn cleanup_failed(&self, error: &CleanupError) {
        eprintln!(
            "{} {}",
            console::style("[TEARDOWN]").red().bold(),
            error_chain(error)
        );
    }

    fn finished(&self, summary: &RunSummary) {
        println!();
        println!(
            "{}",
            console::style(format!("All checks passed! ({} tests)", summary.passed))
                .bold()
                .green()
        );
    }
}

/// Full diagnostic for the failing case.
pub fn render_failure(error: &RunError) -> String {
    let header = format!(
        "{} {} {}",
        console::style("✘").red().bold(),
        console::style("FAIL!").red().bold(),
        console::style(error.name()).bold(),
    );

    match error {
        RunError::Mismatch(mismatch) => mismatch.to_string(),
        RunError::Request {
            source: ClientError::Decode { body, source, .. },
            ..
        } => format!(
            "{header}\n  {} {}\n  {}\n{}",
            console::style("Response is not JSON:").red(),
            source,
            console::style("Body:").red(),
            console::style(body).dim()
        ),
        RunError::Request { source, .. } => format!(
            "{header}\n  {} {}",
            console::style("Request failed with error:").red(),
            console::style(error_chain(source)).red().bold()
        ),
        RunError::Configuration { source, .. } => format!(
            "{header}\n  {} {}",
            console::style("Configuration error:").yellow().bold(),
            source
        ),
    }
}
