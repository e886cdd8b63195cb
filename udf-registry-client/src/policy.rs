//! Timeout and retry handling around a single info command.

use std::time::Duration;

use rand::Rng;
use tokio::time::{sleep, timeout};
use tracing::instrument;
use udf_registry_core::protocol::parse_response;
use udf_registry_core::{InfoCommand, Result, UdfError};

use crate::config::CallPolicy;
use crate::transport::NodeTransport;

/// Calculates the next backoff duration with jitter applied.
pub(crate) fn calculate_backoff_with_jitter(
    current_backoff: Duration,
    multiplier: f64,
    max_backoff: Duration,
    jitter: f64,
) -> Duration {
    let base_backoff = current_backoff.as_secs_f64() * multiplier;

    let jitter_factor = if jitter > 0.0 {
        let mut rng = rand::thread_rng();
        1.0 + rng.gen_range(-jitter..=jitter)
    } else {
        1.0
    };

    let jittered_backoff = (base_backoff * jitter_factor).max(0.0);

    std::cmp::min(
        Duration::try_from_secs_f64(jittered_backoff).unwrap_or(max_backoff),
        max_backoff,
    )
}

/// Applies a [`CallPolicy`] to one info command.
///
/// Each attempt is bounded by the policy timeout. Transport failures and
/// timeouts are retried up to `max_retries` times with exponential backoff;
/// anything the node itself reported is returned on the first occurrence.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolicyExecutor;

impl PolicyExecutor {
    /// Sends `command` and returns the response value with the echoed
    /// command and trailing newline stripped.
    ///
    /// # Errors
    ///
    /// Returns the last `Transport`/`Timeout` error once retries are
    /// exhausted, or the node's rejection (`Server`, `NotFound`) at once.
    #[instrument(
        name = "policy.execute",
        skip_all,
        fields(command = command.name(), max_retries = policy.max_retries())
    )]
    pub async fn execute<T>(transport: &T, policy: &CallPolicy, command: &InfoCommand) -> Result<String>
    where
        T: NodeTransport + ?Sized,
    {
        let rendered = command.render();
        let mut current_backoff = policy.initial_backoff();
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match Self::attempt(transport, policy, command, &rendered).await {
                Ok(value) => {
                    tracing::trace!(attempt = attempt, "info command succeeded");
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt <= policy.max_retries() => {
                    tracing::warn!(
                        attempt = attempt,
                        backoff = ?current_backoff,
                        error = %e,
                        "info command failed, retrying"
                    );
                    sleep(current_backoff).await;
                    current_backoff = calculate_backoff_with_jitter(
                        current_backoff,
                        policy.multiplier(),
                        policy.max_backoff(),
                        policy.jitter(),
                    );
                }
                Err(e) => {
                    if e.is_retryable() {
                        tracing::error!(attempts = attempt, error = %e, "info command failed permanently");
                    } else {
                        tracing::debug!(error = %e, "info command rejected");
                    }
                    return Err(e);
                }
            }
        }
    }

    async fn attempt<T>(
        transport: &T,
        policy: &CallPolicy,
        command: &InfoCommand,
        rendered: &str,
    ) -> Result<String>
    where
        T: NodeTransport + ?Sized,
    {
        let raw = timeout(policy.timeout(), transport.send(&policy.node(), rendered))
            .await
            .map_err(|_| {
                UdfError::Timeout(format!(
                    "{} did not complete within {:?}",
                    command.name(),
                    policy.timeout()
                ))
            })??;

        parse_response(&raw)
            .map(str::to_string)
            .map_err(|report| report.into_error(command.target()))
    }
}
