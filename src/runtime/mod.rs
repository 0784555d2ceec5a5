//! # Runtime
//!
//! Wires the reconciler into a kube-runtime `Controller`.
//!
//! - `watch_loop`: watches `DataSciencePipelines` objects and runs passes
//! - `error_policy`: per-object Fibonacci backoff and watch error handling
//! - `instances`: picks the single object that drives the component

pub mod error_policy;
pub mod instances;
pub mod watch_loop;

use crate::cluster::kubernetes::KubeStatusReporter;
use crate::cluster::{ClusterApi, ConditionReporter, ManifestDeployer, ManifestFetcher};
use crate::config::OperatorConfig;
use crate::controller::reconciler::{BackoffState, PipelinesReconciler, ReconcilerSettings};
use crate::crd::DataSciencePipelines;
use anyhow::{Context, Result};
use kube::api::{Api, ListParams};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Shared state handed to every reconcile and error-policy invocation
pub struct ControllerContext {
    pub client: Client,
    pub config: OperatorConfig,
    pub cluster: Arc<dyn ClusterApi>,
    pub deployer: Arc<dyn ManifestDeployer>,
    pub fetcher: Arc<dyn ManifestFetcher>,
    /// Backoff state per object name
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
}

impl std::fmt::Debug for ControllerContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControllerContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ControllerContext {
    #[must_use]
    pub fn new(
        client: Client,
        config: OperatorConfig,
        cluster: Arc<dyn ClusterApi>,
        deployer: Arc<dyn ManifestDeployer>,
        fetcher: Arc<dyn ManifestFetcher>,
    ) -> Self {
        Self {
            client,
            config,
            cluster,
            deployer,
            fetcher,
            backoff_states: Mutex::new(HashMap::new()),
        }
    }

    /// Status reporter bound to the object `name`
    #[must_use]
    pub fn status_reporter(&self, name: &str) -> Arc<KubeStatusReporter> {
        Arc::new(KubeStatusReporter::new(
            self.client.clone(),
            name,
            &self.config.field_manager,
        ))
    }

    /// Reconciler recording its conditions through `reporter`
    #[must_use]
    pub fn reconciler(&self, reporter: Arc<dyn ConditionReporter>) -> PipelinesReconciler {
        PipelinesReconciler::new(
            Arc::clone(&self.cluster),
            Arc::clone(&self.deployer),
            Arc::clone(&self.fetcher),
            reporter,
            ReconcilerSettings {
                manifests_root: self.config.manifests_path.clone(),
                readiness: self.config.readiness_policy(),
            },
        )
    }

    /// Name of the `DataSciencePipelines` object allowed to drive the component
    pub async fn primary_instance(&self) -> Result<Option<String>> {
        let api: Api<DataSciencePipelines> = Api::all(self.client.clone());
        let list = api
            .list(&ListParams::default())
            .await
            .context("Failed to list DataSciencePipelines")?;
        Ok(instances::primary_instance(&list.items))
    }

    /// Forget accumulated backoff for `name` after a successful pass
    pub fn reset_backoff(&self, name: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(name) {
                state.reset();
            }
        }
    }
}
