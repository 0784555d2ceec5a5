//! # Error Policy
//!
//! Requeue decisions for failed passes and classification of watch stream
//! errors.

use super::ControllerContext;
use crate::controller::reconciler::{BackoffState, ReconcileError};
use crate::crd::DataSciencePipelines;
use crate::observability::metrics;
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Requeue a failed object with its own Fibonacci backoff.
///
/// Every error kind is retried: a foreign Argo installation may be removed by
/// an administrator at any time, and readiness timeouts usually clear once
/// pods finish rolling out.
pub fn handle_reconciliation_error(
    obj: Arc<DataSciencePipelines>,
    error: &ReconcileError,
    ctx: Arc<ControllerContext>,
) -> Action {
    let name = obj.name_any();
    let kind = error.kind();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.reconciliation_error",
        resource.name = name.as_str(),
        error.kind = kind.as_str()
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}: {}", name, error);
    metrics::increment_reconciliation_errors(kind.as_str());

    let (delay, error_count) = match ctx.backoff_states.lock() {
        Ok(mut states) => {
            let state = states.entry(name.clone()).or_insert_with(BackoffState::default);
            state.increment_error();
            (state.backoff.next_backoff(), state.error_count)
        }
        Err(e) => {
            warn!("Failed to lock backoff_states: {}, using default backoff", e);
            (Duration::from_secs(60), 0)
        }
    };

    info!(
        "Retrying {} in {}s (error count: {}, kind: {})",
        name,
        delay.as_secs(),
        error_count,
        kind.as_str()
    );
    Action::requeue(delay)
}

/// What to do with a watch stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorAction {
    /// Keep consuming the stream
    Continue,
    /// Drop the event and restart the watch after `delay`
    Restart { delay: Duration },
}

/// Classify a watch stream error by its rendered message
#[must_use]
pub fn classify_watch_error(error_string: &str, restart_delay: Duration) -> WatchErrorAction {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_unauthorized = !is_not_found
        && (error_string.contains("401") || error_string.contains("Unauthorized"));
    let is_expired = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Gone");

    if is_unauthorized {
        error!("Watch authentication failed (401 Unauthorized), RBAC may have been revoked");
        WatchErrorAction::Restart {
            delay: restart_delay,
        }
    } else if is_expired {
        warn!("Watch resource version expired (410), watch will restart");
        WatchErrorAction::Restart {
            delay: Duration::ZERO,
        }
    } else if is_not_found {
        warn!("Object not found (404) while watching: {}", error_string);
        WatchErrorAction::Continue
    } else {
        error!("Controller stream error: {}", error_string);
        WatchErrorAction::Restart {
            delay: restart_delay,
        }
    }
}
