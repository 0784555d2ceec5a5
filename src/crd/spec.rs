//! # DataSciencePipelines Spec
//!
//! Main CRD specification and default values.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::DataSciencePipelinesStatus;

/// DataSciencePipelines Custom Resource Definition
///
/// Declares whether the Data Science Pipelines component should be deployed
/// and, for development, where its manifests should come from.
///
/// # Example
///
/// ```yaml
/// apiVersion: components.platform.opendatahub.io/v1alpha1
/// kind: DataSciencePipelines
/// metadata:
///   name: default-dsp
/// spec:
///   managementState: Managed
///   devFlags:
///     manifests:
///       - uri: https://github.com/opendatahub-io/data-science-pipelines-operator/tarball/main
///         contextDir: config
///         sourcePath: overlays/odh
/// ```
#[derive(CustomResource, Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    kind = "DataSciencePipelines",
    group = "components.platform.opendatahub.io",
    version = "v1alpha1",
    status = "DataSciencePipelinesStatus",
    shortname = "dsp",
    printcolumn = r#"{"name":"State", "type":"string", "jsonPath":".spec.managementState"}"#,
    printcolumn = r#"{"name":"Ready", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Ready\")].status"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct DataSciencePipelinesSpec {
    /// Whether the component is deployed (`Managed`) or torn down (`Removed`)
    #[serde(default)]
    pub management_state: ManagementState,
    /// Developer overrides for the manifest source
    #[serde(default)]
    pub dev_flags: Option<DevFlags>,
}

impl DataSciencePipelinesSpec {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.management_state == ManagementState::Managed
    }

    /// First declared manifest override, if any.
    ///
    /// Only one override per component is honoured; later entries are ignored.
    #[must_use]
    pub fn manifest_override(&self) -> Option<&ManifestSource> {
        self.dev_flags
            .as_ref()
            .and_then(|flags| flags.manifests.first())
    }
}

/// Desired management state of a platform component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize, JsonSchema)]
pub enum ManagementState {
    Managed,
    #[default]
    Removed,
}

impl ManagementState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ManagementState::Managed => "Managed",
            ManagementState::Removed => "Removed",
        }
    }
}

impl std::str::FromStr for ManagementState {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Managed" => Ok(ManagementState::Managed),
            "Removed" => Ok(ManagementState::Removed),
            other => Err(anyhow::anyhow!(
                "invalid management state '{other}', expected Managed or Removed"
            )),
        }
    }
}

/// Developer-only settings
#[derive(Debug, Clone, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DevFlags {
    /// Manifest sources overriding the bundled manifests
    #[serde(default)]
    pub manifests: Vec<ManifestSource>,
}

/// Remote manifest source
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSource {
    /// Tarball URL, e.g. `https://github.com/<org>/<repo>/tarball/<ref>`
    pub uri: String,
    /// Directory inside the repository holding the component's manifests
    #[serde(default = "default_context_dir")]
    pub context_dir: String,
    /// Kustomize directory relative to `contextDir`, defaults to `base`
    #[serde(default)]
    pub source_path: Option<String>,
}

#[must_use]
pub fn default_context_dir() -> String {
    "manifests".to_string()
}
