//! # Readiness Poll
//!
//! Bounded wait for the component's deployments after an apply.

use crate::cluster::ClusterApi;
use std::time::Duration;
use tracing::{debug, warn};

/// How long to wait for deployments to become ready
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadinessPolicy {
    /// Number of checks, including the first immediate one
    pub max_attempts: u32,
    /// Delay between checks
    pub interval: Duration,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::constants::DEFAULT_READINESS_MAX_ATTEMPTS,
            interval: Duration::from_secs(crate::constants::DEFAULT_READINESS_INTERVAL_SECS),
        }
    }
}

/// Readiness budget exhausted
#[derive(Debug)]
pub struct ReadinessTimeout {
    pub attempts: u32,
    /// Last failed lookup, kept for diagnostics
    pub last_error: Option<anyhow::Error>,
}

/// Poll `ClusterApi::deployments_ready` until it reports ready.
///
/// Returns the number of checks performed. A failing lookup counts as a
/// not-ready attempt; the most recent failure is carried in the timeout.
pub async fn wait_for_availability(
    cluster: &dyn ClusterApi,
    component: &str,
    namespace: &str,
    policy: ReadinessPolicy,
) -> Result<u32, ReadinessTimeout> {
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = None;
    for attempt in 1..=max_attempts {
        match cluster.deployments_ready(component, namespace).await {
            Ok(true) => {
                debug!("{} ready after {} check(s)", component, attempt);
                return Ok(attempt);
            }
            Ok(false) => debug!(
                "{} not ready yet (check {}/{})",
                component, attempt, max_attempts
            ),
            Err(e) => {
                warn!(
                    "Readiness check {}/{} for {} failed: {:#}",
                    attempt, max_attempts, component, e
                );
                last_error = Some(e);
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(policy.interval).await;
        }
    }
    Err(ReadinessTimeout {
        attempts: max_attempts,
        last_error,
    })
}
