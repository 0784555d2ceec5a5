//! # Cluster Collaborators
//!
//! Narrow contracts the reconciler depends on. The reconciliation core only
//! talks to these traits; the Kubernetes-backed implementations live in the
//! submodules and are wired together in `main.rs`.
//!
//! - `ClusterApi`: cluster object lookups (CRDs, component deployments)
//! - `ManifestDeployer`: render and apply, or tear down, a manifest directory
//! - `ManifestFetcher`: materialize a developer-supplied manifest tree
//! - `ConditionReporter`: record human-readable health conditions

use crate::constants;
use crate::crd::{Condition, ManifestSource};
use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::path::Path;

/// Read access to cluster objects needed by the conflict guard and readiness poll
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Look up a cluster-scoped CRD by name
    /// Returns `Ok(None)` when it does not exist; any other failure is an error
    async fn custom_resource_definition(
        &self,
        name: &str,
    ) -> Result<Option<CustomResourceDefinition>>;

    /// Check whether every deployment labelled for `component` in `namespace`
    /// has all of its replicas ready
    async fn deployments_ready(&self, component: &str, namespace: &str) -> Result<bool>;
}

/// Declarative apply / teardown engine
#[async_trait]
pub trait ManifestDeployer: Send + Sync {
    /// Render the kustomize directory at `path` into `namespace`.
    /// `active = true` applies the rendered objects, `active = false` deletes them.
    /// Must be idempotent in both directions.
    async fn apply_or_remove(
        &self,
        path: &Path,
        namespace: &str,
        component: &str,
        active: bool,
    ) -> Result<()>;
}

/// Remote manifest source materializer
#[async_trait]
pub trait ManifestFetcher: Send + Sync {
    /// Fetch `source` and lay it out under `<manifests_root>/<component>`
    async fn fetch(&self, manifests_root: &Path, component: &str, source: &ManifestSource)
        -> Result<()>;
}

/// Health condition sink
///
/// Fire-and-forget from the reconciler's perspective: implementations log
/// their own failures instead of returning them.
#[async_trait]
pub trait ConditionReporter: Send + Sync {
    async fn set_condition(&self, component: &str, condition: Condition);
}

/// Whether a live object carries `app.opendatahub.io/<component>: "true"`
#[must_use]
pub fn is_owned_by(metadata: &ObjectMeta, component: &str) -> bool {
    metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(&constants::component_label(component)))
        .is_some_and(|value| value == "true")
}

pub mod deploy;
pub mod fetch;
pub mod kubernetes;
