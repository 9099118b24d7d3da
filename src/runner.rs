use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::asserter::Mismatch;
use crate::asserter::assert_response;
use crate::case::CaseError;
use crate::case::TestCase;
use crate::client::ClientError;
use crate::client::HttpClient;
use crate::clock::Clock;
use crate::outputter::Reporter;
use crate::session::RunStatus;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("test `{name}` is misconfigured")]
    Configuration {
        name: String,
        #[source]
        source: CaseError,
    },

    #[error("test `{name}` got no usable response")]
    Request {
        name: String,
        #[source]
        source: ClientError,
    },

    #[error("test `{}` failed: response did not match", .0.name)]
    Mismatch(Mismatch),
}

impl RunError {
    pub fn name(&self) -> &str {
        match self {
            RunError::Configuration { name, .. } | RunError::Request { name, .. } => name,
            RunError::Mismatch(mismatch) => &mismatch.name,
        }
    }

    pub fn status(&self) -> RunStatus {
        match self {
            RunError::Configuration { .. } => RunStatus::Misconfigured,
            RunError::Request { .. } | RunError::Mismatch(_) => RunStatus::Failed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub passed: usize,
}

/// Runs test cases one after another and stops at the first failure.
pub struct Runner<'a, C, K, R> {
    client: &'a C,
    clock: &'a K,
    reporter: &'a R,
    base_url: &'a Url,
}

impl<'a, C, K, R> Runner<'a, C, K, R>
where
    C: HttpClient,
    K: Clock,
    R: Reporter,
{
    pub fn new(client: &'a C, clock: &'a K, reporter: &'a R, base_url: &'a Url) -> Self {
        Self {
            client,
            clock,
            reporter,
            base_url,
        }
    }

    pub async fn run_all(&self, tests: &[TestCase]) -> Result<RunSummary, RunError> {
        for test in tests {
            self.run_one(test).await?;
        }

        Ok(RunSummary {
            passed: tests.len(),
        })
    }

    async fn run_one(&self, test: &TestCase) -> Result<(), RunError> {
        self.reporter.testing(&test.name);

        let misconfigured = |source| RunError::Configuration {
            name: test.name.clone(),
            source,
        };

        if let Some(delay) = test.delay().map_err(misconfigured)? {
            debug!(test = %test.name, ?delay, "waiting before request");
            self.clock.sleep(delay).await;
        }

        let request = test.request(self.base_url).map_err(misconfigured)?;

        let actual = self
            .client
            .execute(request)
            .await
            .map_err(|source| RunError::Request {
                name: test.name.clone(),
                source,
            })?;

        assert_response(&test.name, &test.response, actual).map_err(RunError::Mismatch)?;

        self.reporter.passed(&test.name);

        Ok(())
    }
}
