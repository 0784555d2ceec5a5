//! # Platform Context
//!
//! Read-only description of the environment a reconcile pass runs in.

use super::ManagementState;
use crate::constants;
use tracing::warn;

/// Target deployment environment.
///
/// `Unset` is the default and behaves like `OpenDataHub`: absence of an
/// explicit platform tag must never disable deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Platform {
    /// Open-source community distribution
    OpenDataHub,
    /// Enterprise distribution installed by the customer
    SelfManagedRhoai,
    /// Enterprise distribution operated as a managed service
    ManagedRhoai,
    #[default]
    Unset,
}

impl Platform {
    /// Parse the platform tag published by the platform operator.
    ///
    /// Unrecognised tags fall back to `Unset`.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "OpenDataHub" => Platform::OpenDataHub,
            "SelfManagedRHOAI" => Platform::SelfManagedRhoai,
            "ManagedRHOAI" => Platform::ManagedRhoai,
            "" => Platform::Unset,
            other => {
                warn!("Unknown platform type '{}', treating as unset", other);
                Platform::Unset
            }
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::OpenDataHub => "OpenDataHub",
            Platform::SelfManagedRhoai => "SelfManagedRHOAI",
            Platform::ManagedRhoai => "ManagedRHOAI",
            Platform::Unset => "",
        }
    }

    /// True when the platform is the enterprise distribution (self-managed or managed)
    #[must_use]
    pub fn is_enterprise(self) -> bool {
        matches!(self, Platform::SelfManagedRhoai | Platform::ManagedRhoai)
    }

    /// True when the SRE monitoring stack is wired in
    #[must_use]
    pub fn is_managed_service(self) -> bool {
        self == Platform::ManagedRhoai
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Platform::Unset => f.write_str("<unset>"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Monitoring sub-configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringSpec {
    pub management_state: ManagementState,
    pub namespace: String,
}

impl MonitoringSpec {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.management_state == ManagementState::Managed
    }
}

impl Default for MonitoringSpec {
    fn default() -> Self {
        Self {
            management_state: ManagementState::Removed,
            namespace: constants::DEFAULT_MONITORING_NAMESPACE.to_string(),
        }
    }
}

/// Everything a reconcile pass needs to know about where it runs.
///
/// Built fresh for every pass and never mutated by the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformContext {
    pub platform: Platform,
    pub applications_namespace: String,
    pub monitoring: MonitoringSpec,
}

impl Default for PlatformContext {
    fn default() -> Self {
        Self {
            platform: Platform::Unset,
            applications_namespace: constants::DEFAULT_APPLICATIONS_NAMESPACE.to_string(),
            monitoring: MonitoringSpec::default(),
        }
    }
}
