use thiserror::Error;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client::ApiRequest;
use crate::client::ClientError;
use crate::client::HttpClient;
use crate::setup::app::AppError;
use crate::setup::app::AppProcess;
use crate::validator::CleanupAction;
use crate::validator::Config;

pub mod app;
pub mod ready;

#[derive(Debug, Error)]
pub enum StartUpError {
    #[error("no `setup.command` configured; pass --no-start to test a service that is already running")]
    MissingCommand,

    #[error("Start up process failed")]
    AppError(#[from] AppError),
}

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("cleanup request failed")]
    Request(#[source] ClientError),

    #[error(transparent)]
    Terminate(#[from] AppError),
}

/// How the run ended, which decides what teardown does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Passed,
    /// A test failed: reset the service's state before stopping it.
    Failed,
    /// Misconfiguration or start-up trouble: stop without touching state.
    Aborted,
}

/// Owns the service under test for the length of a run.
pub struct Lifecycle {
    app: Option<AppProcess>,
    cleanup: Option<CleanupAction>,
}

impl Lifecycle {
    pub fn start(config: &Config, no_start: bool, stream_app: bool) -> Result<Self, StartUpError> {
        let app = if no_start {
            print_with_color("[SETUP] --no-start given, using the running service! ⚙️");
            None
        } else {
            let setup = config.setup.as_ref().ok_or(StartUpError::MissingCommand)?;
            print_with_color(&format!("[SETUP] starting `{}`..! ⚙️", setup.command));
            let app = app::spawn(setup, stream_app)?;
            info!(pid = ?app.id(), "service started");
            Some(app)
        };

        Ok(Self {
            app,
            cleanup: config.cleanup.clone(),
        })
    }

    /// A lifecycle for a service somebody else runs.
    pub fn attached(cleanup: Option<CleanupAction>) -> Self {
        Self { app: None, cleanup }
    }

    pub fn app(&self) -> Option<&AppProcess> {
        self.app.as_ref()
    }

    /// Runs the cleanup action after a failed run, then stops the service.
    ///
    /// The service is stopped even when the cleanup request fails; the first
    /// error is returned.
    pub async fn teardown<C: HttpClient>(
        &mut self,
        client: &C,
        outcome: Outcome,
    ) -> Result<(), CleanupError> {
        let mut result = Ok(());

        if outcome == Outcome::Failed
            && let Some(cleanup) = &self.cleanup
        {
            result = run_cleanup(client, cleanup).await;
        }

        if let Some(app) = self.app.as_mut() {
            print_with_color("[TEARDOWN] stopping the service..! ⚙️");
            if let Err(error) = app.terminate().await {
                result = result.and(Err(CleanupError::Terminate(error)));
            }
        }

        result
    }
}

async fn run_cleanup<C: HttpClient>(client: &C, cleanup: &CleanupAction) -> Result<(), CleanupError> {
    info!(method = %cleanup.method, url = %cleanup.url, "resetting service state");

    let request = ApiRequest {
        method: cleanup.method,
        url: cleanup.url.clone(),
        body: cleanup.data.clone(),
    };

    match client.execute(request).await {
        Ok(_) => Ok(()),
        // The request reached the service; the reply just isn't JSON.
        Err(ClientError::Decode { body, .. }) => {
            debug!(%body, "cleanup answered without JSON");
            Ok(())
        }
        Err(error) => {
            warn!(%error, "cleanup request failed");
            Err(CleanupError::Request(error))
        }
    }
}

fn print_with_color(s: &str) {
    println!("{}", console::style(s).bold().yellow());
}
