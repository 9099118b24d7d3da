use std::time::Duration;

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::client::HttpClient;
use crate::clock::Clock;
use crate::outputter::Reporter;

pub const PROBE_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    pub interval: Duration,
    pub timeout: Duration,
}

impl ReadinessPolicy {
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            interval: PROBE_INTERVAL,
            timeout,
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ReadinessError {
    #[error("service at {url} did not accept connections after {attempts} attempts ({waited:?})")]
    Timeout {
        url: Url,
        attempts: u32,
        waited: Duration,
    },
}

/// Polls `base_url` until a connection succeeds.
///
/// Any response counts, whatever its status; only transport failures mean
/// the service is not up yet. Returns the number of attempts made.
///
/// A probe waits for the time left until `policy.timeout`, and at least one
/// interval, so a service that accepts connections without answering can't
/// hold the loop past the deadline by more than one interval.
pub async fn wait_until_ready<C, K, R>(
    client: &C,
    clock: &K,
    base_url: &Url,
    policy: ReadinessPolicy,
    reporter: &R,
) -> Result<u32, ReadinessError>
where
    C: HttpClient,
    K: Clock,
    R: Reporter,
{
    let started = clock.now();
    let mut attempts = 0;

    loop {
        attempts += 1;

        let remaining = policy.timeout.saturating_sub(clock.now().saturating_duration_since(started));
        let probe_timeout = remaining.max(policy.interval);

        let Err(error) = client.probe(base_url, probe_timeout).await else {
            debug!(attempts, "service is ready");
            return Ok(attempts);
        };

        debug!(attempts, %error, "service not ready yet");

        let waited = clock.now().saturating_duration_since(started);
        if waited >= policy.timeout {
            return Err(ReadinessError::Timeout {
                url: base_url.clone(),
                attempts,
                waited,
            });
        }

        reporter.waiting(base_url, attempts);
        clock.sleep(policy.interval.min(policy.timeout - waited)).await;
    }
}
