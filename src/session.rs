use std::process::ExitCode;

use tracing::info;

use crate::client::HttpClient;
use crate::clock::Clock;
use crate::outputter::Reporter;
use crate::runner::Runner;
use crate::setup::Lifecycle;
use crate::setup::Outcome;
use crate::setup::ready::ReadinessPolicy;
use crate::setup::ready::wait_until_ready;
use crate::validator::Config;

/// Process exit status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Passed,
    /// A response mismatched, or no usable response came back.
    Failed,
    /// The config file or a test case is invalid.
    Misconfigured,
    /// The service could not be started or never became reachable.
    StartUpFailed,
}

impl RunStatus {
    pub const fn code(self) -> u8 {
        match self {
            RunStatus::Passed => 0,
            RunStatus::Failed => 1,
            RunStatus::Misconfigured => 2,
            RunStatus::StartUpFailed => 3,
        }
    }
}

impl From<RunStatus> for ExitCode {
    fn from(status: RunStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Waits for the service, runs every test and tears the service down.
pub async fn run_session<C, K, R>(
    config: &Config,
    lifecycle: &mut Lifecycle,
    client: &C,
    clock: &K,
    reporter: &R,
    policy: ReadinessPolicy,
) -> RunStatus
where
    C: HttpClient,
    K: Clock,
    R: Reporter,
{
    if let Err(error) = wait_until_ready(client, clock, &config.base_url, policy, reporter).await {
        reporter.start_up_failed(&error);
        finish(lifecycle, client, reporter, Outcome::Aborted).await;
        return RunStatus::StartUpFailed;
    }

    let runner = Runner::new(client, clock, reporter, &config.base_url);

    let (status, outcome) = match runner.run_all(&config.tests).await {
        Ok(summary) => {
            reporter.finished(&summary);
            (RunStatus::Passed, Outcome::Passed)
        }
        Err(error) => {
            reporter.failed(&error);
            let status = error.status();
            let outcome = match status {
                RunStatus::Misconfigured => Outcome::Aborted,
                _ => Outcome::Failed,
            };
            (status, outcome)
        }
    };

    finish(lifecycle, client, reporter, outcome).await;
    info!(code = status.code(), "run finished");

    status
}

async fn finish<C, R>(lifecycle: &mut Lifecycle, client: &C, reporter: &R, outcome: Outcome)
where
    C: HttpClient,
    R: Reporter,
{
    if let Err(error) = lifecycle.teardown(client, outcome).await {
        reporter.cleanup_failed(&error);
    }
}
