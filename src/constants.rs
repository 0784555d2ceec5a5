//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Stable identity of the managed component
pub const COMPONENT_NAME: &str = "data-science-pipelines-operator";

/// Root directory holding every component's manifest tree
pub const DEFAULT_MANIFESTS_PATH: &str = "/opt/manifests";

/// Default namespace for application workloads
pub const DEFAULT_APPLICATIONS_NAMESPACE: &str = "opendatahub";

/// Default namespace for the managed-service monitoring stack
pub const DEFAULT_MONITORING_NAMESPACE: &str = "redhat-ods-monitoring";

/// Kustomize directory used when a developer override has no `sourcePath`
pub const DEFAULT_KUSTOMIZE_SOURCE_PATH: &str = "base";

/// Cluster-scoped CRD registered by the bundled Argo Workflows engine
pub const ARGO_WORKFLOW_CRD: &str = "workflows.argoproj.io";

/// Label prefix used to mark objects owned by a platform component
pub const COMPONENT_LABEL_PREFIX: &str = "app.opendatahub.io";

/// Identity used when applying the shared monitoring manifests
pub const MONITORING_COMPONENT_NAME: &str = "prometheus";

/// Default number of readiness checks before giving up
pub const DEFAULT_READINESS_MAX_ATTEMPTS: u32 = 6;

/// Default delay between readiness checks (seconds)
pub const DEFAULT_READINESS_INTERVAL_SECS: u64 = 20;

/// Default periodic re-sync interval (seconds)
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 300;

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default timeout for manifest tarball downloads (seconds)
pub const DEFAULT_MANIFEST_FETCH_TIMEOUT_SECS: u64 = 60;

/// Field manager recorded on server-side applied objects
pub const DEFAULT_FIELD_MANAGER: &str = "pipelines-controller";

/// Delay before restarting the watch stream after it ends (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Ownership label key for the managed component.
///
/// Every object rendered for the component carries `<key>: "true"`.
#[must_use]
pub fn component_label(component: &str) -> String {
    format!("{COMPONENT_LABEL_PREFIX}/{component}")
}
