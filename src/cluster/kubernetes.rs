//! # Kubernetes Client Adapters
//!
//! `ClusterApi` and `ConditionReporter` backed by `kube::Client`.

use super::{ClusterApi, ConditionReporter};
use crate::constants;
use crate::crd::{upsert_condition, Condition, DataSciencePipelines, DataSciencePipelinesStatus};
use anyhow::{Context, Result};
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::Client;
use tracing::{debug, warn};

/// Cluster lookups through the Kubernetes API
#[derive(Clone)]
pub struct KubeCluster {
    client: Client,
}

impl std::fmt::Debug for KubeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeCluster").finish_non_exhaustive()
    }
}

impl KubeCluster {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ClusterApi for KubeCluster {
    async fn custom_resource_definition(
        &self,
        name: &str,
    ) -> Result<Option<CustomResourceDefinition>> {
        let api: Api<CustomResourceDefinition> = Api::all(self.client.clone());
        api.get_opt(name)
            .await
            .with_context(|| format!("Failed to get CustomResourceDefinition {name}"))
    }

    async fn deployments_ready(&self, component: &str, namespace: &str) -> Result<bool> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let selector = constants::component_label(component);
        let deployments = api
            .list(&ListParams::default().labels(&selector))
            .await
            .with_context(|| {
                format!("Failed to list deployments for {component} in namespace {namespace}")
            })?;

        debug!(
            "Waiting for {} deployment(s) to be ready for {}",
            deployments.items.len(),
            component
        );

        let all_ready = deployments.items.iter().all(|deployment| {
            let status = deployment.status.as_ref();
            let replicas = status.and_then(|s| s.replicas).unwrap_or(0);
            let ready = status.and_then(|s| s.ready_replicas).unwrap_or(0);
            replicas == ready
        });
        Ok(all_ready)
    }
}

/// Records conditions on the status subresource of one `DataSciencePipelines` object
#[derive(Clone)]
pub struct KubeStatusReporter {
    api: Api<DataSciencePipelines>,
    name: String,
    field_manager: String,
}

impl std::fmt::Debug for KubeStatusReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStatusReporter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl KubeStatusReporter {
    #[must_use]
    pub fn new(client: Client, name: &str, field_manager: &str) -> Self {
        Self {
            api: Api::all(client),
            name: name.to_string(),
            field_manager: field_manager.to_string(),
        }
    }

    /// Merge `condition` into the live status and optionally set the phase
    pub async fn update_status(&self, condition: Condition, phase: Option<&str>) -> Result<()> {
        let current = self
            .api
            .get_status(&self.name)
            .await
            .with_context(|| format!("Failed to read status of {}", self.name))?;

        let mut status: DataSciencePipelinesStatus = current.status.unwrap_or_default();
        upsert_condition(&mut status.conditions, condition);
        if let Some(phase) = phase {
            status.phase = Some(phase.to_string());
            status.observed_generation = current.metadata.generation;
            status.last_reconcile_time = Some(chrono::Utc::now().to_rfc3339());
        }

        let patch = serde_json::json!({ "status": status });
        self.api
            .patch_status(
                &self.name,
                &PatchParams::apply(&self.field_manager),
                &Patch::Merge(patch),
            )
            .await
            .with_context(|| format!("Failed to patch status of {}", self.name))?;
        Ok(())
    }
}

#[async_trait]
impl ConditionReporter for KubeStatusReporter {
    async fn set_condition(&self, component: &str, condition: Condition) {
        let condition_type = condition.r#type.clone();
        if let Err(e) = self.update_status(condition, None).await {
            warn!(
                "Failed to record condition {} for {}: {:#}",
                condition_type, component, e
            );
        }
    }
}
