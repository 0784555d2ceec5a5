//! # Argo Workflows Conflict Guard
//!
//! The pipelines component ships its own Argo Workflows controller and with it
//! the cluster-scoped `workflows.argoproj.io` CRD. A second Argo installation
//! owning that CRD would be clobbered by our apply, so enabling is refused
//! until the foreign installation is gone.

use crate::cluster::{is_owned_by, ClusterApi};
use crate::constants;
use crate::crd::Condition;
use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Condition type describing Argo Workflows availability for pipelines v2
pub const CAPABILITY_ARGO_CONDITION: &str = "CapabilityDSPv2Argo";
pub const ARGO_WORKFLOW_EXISTS_REASON: &str = "ArgoWorkflowExists";
pub const ARGO_WORKFLOW_AVAILABLE_REASON: &str = "ArgoWorkflowAvailable";
/// Component condition reason for a pass that failed before applying
pub const RECONCILE_FAILED_REASON: &str = "ReconcileFailed";

/// Outcome of a conflict check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConflictSignal {
    /// The CRD does not exist
    NoConflict,
    /// The CRD exists and carries our component label
    OwnedByUs,
    /// The CRD exists and belongs to someone else
    Foreign { message: String },
}

/// Look up the Argo Workflows CRD and classify its ownership.
///
/// Lookup failures other than not-found are returned as errors.
pub async fn check_conflicts(cluster: &dyn ClusterApi, component: &str) -> Result<ConflictSignal> {
    let crd = cluster
        .custom_resource_definition(constants::ARGO_WORKFLOW_CRD)
        .await
        .context("failed to get existing Workflow CRD")?;

    let Some(crd) = crd else {
        debug!("{} not present", constants::ARGO_WORKFLOW_CRD);
        return Ok(ConflictSignal::NoConflict);
    };

    if is_owned_by(&crd.metadata, component) {
        debug!("{} is managed by {}", constants::ARGO_WORKFLOW_CRD, component);
        return Ok(ConflictSignal::OwnedByUs);
    }

    warn!(
        "{} exists without label {}=true",
        constants::ARGO_WORKFLOW_CRD,
        constants::component_label(component)
    );
    Ok(ConflictSignal::Foreign {
        message: conflict_message(),
    })
}

/// Remediation text reported for a foreign Argo Workflows installation
#[must_use]
pub fn conflict_message() -> String {
    format!(
        "{} CRD already exists but not deployed by this operator. \
         Remove existing Argo workflows or set \
         `spec.components.datasciencepipelines.managementState` to Removed to proceed",
        constants::ARGO_WORKFLOW_CRD
    )
}

/// Conditions recorded when a foreign installation blocks the component
#[must_use]
pub fn conflict_conditions(message: &str) -> [Condition; 2] {
    [
        Condition::new(
            CAPABILITY_ARGO_CONDITION,
            false,
            ARGO_WORKFLOW_EXISTS_REASON,
            message,
        ),
        Condition::new("Ready", false, RECONCILE_FAILED_REASON, message),
    ]
}

/// Capability condition for a pass where the guard found no conflict.
///
/// Overwrites a `False` left behind by an earlier conflicting pass.
#[must_use]
pub fn available_condition(component: &str) -> Condition {
    Condition::new(
        CAPABILITY_ARGO_CONDITION,
        true,
        ARGO_WORKFLOW_AVAILABLE_REASON,
        &format!(
            "{} is absent or managed by {component}",
            constants::ARGO_WORKFLOW_CRD
        ),
    )
}
