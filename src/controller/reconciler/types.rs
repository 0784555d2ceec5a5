//! # Types
//!
//! Errors, outcomes and per-resource retry state for the reconciler.

use crate::controller::backoff::FibonacciBackoff;
use crate::controller::manifests::ManifestLocation;
use thiserror::Error;

/// Failure of a reconcile pass.
///
/// Image parameter injection failures never surface here; they are logged and
/// the pass continues.
#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to download manifests for {component}: {source:#}")]
    ManifestFetch {
        component: String,
        source: anyhow::Error,
    },

    #[error("failed to check for existing Argo Workflows for {component}: {source:#}")]
    ConflictLookup {
        component: String,
        source: anyhow::Error,
    },

    /// A foreign installation owns a resource this component would take over
    #[error("{message}")]
    Conflict { component: String, message: String },

    #[error("failed to apply manifests for {component}: {source:#}")]
    Deploy {
        component: String,
        source: anyhow::Error,
    },

    #[error(
        "deployment for {component} is not ready to serve in namespace {namespace} after {attempts} check(s){}",
        last_error_suffix(.last_error.as_deref())
    )]
    NotReady {
        component: String,
        namespace: String,
        attempts: u32,
        /// Message of the last failed readiness lookup, if any check failed
        last_error: Option<String>,
    },

    #[error("failed to update SRE monitoring for {component}: {source:#}")]
    Monitoring {
        component: String,
        source: anyhow::Error,
    },

    #[error("failed to list DataSciencePipelines instances for {component}: {source:#}")]
    InstanceLookup {
        component: String,
        source: anyhow::Error,
    },

    /// Another `DataSciencePipelines` object already drives the component
    #[error("only one DataSciencePipelines instance is reconciled, {primary} is already active")]
    DuplicateInstance { component: String, primary: String },
}

fn last_error_suffix(last_error: Option<&str>) -> String {
    last_error.map_or_else(String::new, |e| format!(", last check failed: {e}"))
}

/// Coarse classification used for metrics and retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The cluster is in a state only an administrator can fix
    Precondition,
    /// Lookup, fetch, apply or monitoring failure expected to clear on retry
    Transient,
    /// Deployments did not become ready within the readiness budget
    ReadinessTimeout,
}

impl ErrorKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Precondition => "precondition",
            ErrorKind::Transient => "transient",
            ErrorKind::ReadinessTimeout => "readiness-timeout",
        }
    }
}

impl ReconcileError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::Conflict { .. } | ReconcileError::DuplicateInstance { .. } => {
                ErrorKind::Precondition
            }
            ReconcileError::NotReady { .. } => ErrorKind::ReadinessTimeout,
            ReconcileError::ManifestFetch { .. }
            | ReconcileError::ConflictLookup { .. }
            | ReconcileError::Deploy { .. }
            | ReconcileError::Monitoring { .. }
            | ReconcileError::InstanceLookup { .. } => ErrorKind::Transient,
        }
    }

    #[must_use]
    pub fn component(&self) -> &str {
        match self {
            ReconcileError::ManifestFetch { component, .. }
            | ReconcileError::ConflictLookup { component, .. }
            | ReconcileError::Conflict { component, .. }
            | ReconcileError::Deploy { component, .. }
            | ReconcileError::NotReady { component, .. }
            | ReconcileError::Monitoring { component, .. }
            | ReconcileError::InstanceLookup { component, .. }
            | ReconcileError::DuplicateInstance { component, .. } => component,
        }
    }
}

/// What a successful pass did
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Whether the component was applied (`true`) or torn down (`false`)
    pub enabled: bool,
    /// Manifest directory handed to the deployer
    pub location: ManifestLocation,
    /// Readiness checks performed, when the component was enabled
    pub readiness_attempts: Option<u32>,
    /// `Some(active)` when SRE monitoring was reconciled
    pub monitoring_active: Option<bool>,
}

/// Backoff state for a specific resource
#[derive(Debug, Clone, Default)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}
