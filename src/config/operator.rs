//! # Operator Configuration
//!
//! Settings loaded from environment variables. The deployment populates them
//! from a ConfigMap using `envFrom`; the platform operator publishes
//! `ODH_PLATFORM_TYPE`.

use crate::controller::readiness::ReadinessPolicy;
use crate::crd::{ManagementState, MonitoringSpec, Platform, PlatformContext};
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

/// Operator-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct OperatorConfig {
    /// Root of the bundled manifest tree (`MANIFESTS_PATH`)
    pub manifests_path: PathBuf,
    /// Raw platform tag (`ODH_PLATFORM_TYPE`)
    pub platform: Platform,
    /// Namespace receiving application workloads (`APPLICATIONS_NAMESPACE`)
    pub applications_namespace: String,
    /// Namespace of the SRE monitoring stack (`MONITORING_NAMESPACE`)
    pub monitoring_namespace: String,
    /// Whether monitoring is enabled (`MONITORING_MANAGEMENT_STATE`)
    pub monitoring_management_state: ManagementState,
    /// Readiness checks before a pass fails (`READINESS_MAX_ATTEMPTS`)
    pub readiness_max_attempts: u32,
    /// Delay between readiness checks (`READINESS_INTERVAL_SECS`)
    pub readiness_interval_secs: u64,
    /// Periodic re-sync interval (`RECONCILE_INTERVAL_SECS`)
    pub reconcile_interval_secs: u64,
    /// Port for `/metrics`, `/healthz` and `/readyz` (`METRICS_PORT`)
    pub metrics_port: u16,
    /// Server-side apply field manager (`FIELD_MANAGER`)
    pub field_manager: String,
    /// Timeout for manifest tarball downloads (`MANIFEST_FETCH_TIMEOUT_SECS`)
    pub manifest_fetch_timeout_secs: u64,
    /// Delay before restarting an ended watch stream (`WATCH_RESTART_DELAY_SECS`)
    pub watch_restart_delay_secs: u64,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            manifests_path: PathBuf::from(DEFAULT_MANIFESTS_PATH),
            platform: Platform::Unset,
            applications_namespace: DEFAULT_APPLICATIONS_NAMESPACE.to_string(),
            monitoring_namespace: DEFAULT_MONITORING_NAMESPACE.to_string(),
            monitoring_management_state: ManagementState::Removed,
            readiness_max_attempts: DEFAULT_READINESS_MAX_ATTEMPTS,
            readiness_interval_secs: DEFAULT_READINESS_INTERVAL_SECS,
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            field_manager: DEFAULT_FIELD_MANAGER.to_string(),
            manifest_fetch_timeout_secs: DEFAULT_MANIFEST_FETCH_TIMEOUT_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
        }
    }
}

impl OperatorConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        use crate::constants::*;
        let monitoring_management_state =
            match env_var_or_default_str("MONITORING_MANAGEMENT_STATE", "Removed").parse() {
                Ok(state) => state,
                Err(e) => {
                    warn!("{}, monitoring treated as Removed", e);
                    ManagementState::Removed
                }
            };

        Self {
            manifests_path: PathBuf::from(env_var_or_default_str(
                "MANIFESTS_PATH",
                DEFAULT_MANIFESTS_PATH,
            )),
            platform: Platform::from_tag(&env_var_or_default_str("ODH_PLATFORM_TYPE", "")),
            applications_namespace: env_var_or_default_str(
                "APPLICATIONS_NAMESPACE",
                DEFAULT_APPLICATIONS_NAMESPACE,
            ),
            monitoring_namespace: env_var_or_default_str(
                "MONITORING_NAMESPACE",
                DEFAULT_MONITORING_NAMESPACE,
            ),
            monitoring_management_state,
            readiness_max_attempts: env_var_or_default(
                "READINESS_MAX_ATTEMPTS",
                DEFAULT_READINESS_MAX_ATTEMPTS,
            ),
            readiness_interval_secs: env_var_or_default(
                "READINESS_INTERVAL_SECS",
                DEFAULT_READINESS_INTERVAL_SECS,
            ),
            reconcile_interval_secs: env_var_or_default(
                "RECONCILE_INTERVAL_SECS",
                DEFAULT_RECONCILE_INTERVAL_SECS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            field_manager: env_var_or_default_str("FIELD_MANAGER", DEFAULT_FIELD_MANAGER),
            manifest_fetch_timeout_secs: env_var_or_default(
                "MANIFEST_FETCH_TIMEOUT_SECS",
                DEFAULT_MANIFEST_FETCH_TIMEOUT_SECS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
        }
    }

    /// Platform context for one reconcile pass
    #[must_use]
    pub fn platform_context(&self) -> PlatformContext {
        PlatformContext {
            platform: self.platform,
            applications_namespace: self.applications_namespace.clone(),
            monitoring: MonitoringSpec {
                management_state: self.monitoring_management_state,
                namespace: self.monitoring_namespace.clone(),
            },
        }
    }

    #[must_use]
    pub fn readiness_policy(&self) -> ReadinessPolicy {
        ReadinessPolicy {
            max_attempts: self.readiness_max_attempts.max(1),
            interval: Duration::from_secs(self.readiness_interval_secs),
        }
    }

    /// Get periodic re-sync duration
    #[must_use]
    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    /// Get manifest download timeout
    #[must_use]
    pub fn manifest_fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.manifest_fetch_timeout_secs)
    }

    /// Get watch restart delay duration
    #[must_use]
    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
