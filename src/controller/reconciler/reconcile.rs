//! # Reconcile
//!
//! One convergence pass for the Data Science Pipelines component:
//!
//! 1. Resolve the manifest override, if enabled and declared (fatal on failure)
//! 2. Inject image references into `params.env` (best-effort)
//! 3. Refuse to enable over a foreign Argo Workflows installation
//! 4. Pick the override or the platform overlay
//! 5. Apply, or tear down, the rendered manifests
//! 6. Wait for the component's deployments when enabled
//! 7. Toggle the component's alerting rules on the managed service
//!
//! Every step is idempotent; a pass interrupted half-way is repaired by the next.

use super::types::{ReconcileError, ReconcileOutcome};
use crate::cluster::{ClusterApi, ConditionReporter, ManifestDeployer, ManifestFetcher};
use crate::constants;
use crate::controller::conflict::{self, ConflictSignal};
use crate::controller::images::{self, EnvLookup};
use crate::controller::manifests;
use crate::controller::monitoring;
use crate::controller::readiness::{self, ReadinessPolicy};
use crate::crd::{DataSciencePipelinesSpec, PlatformContext};
use crate::observability::metrics;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, warn, Instrument};

/// Static settings of the reconciler
#[derive(Debug, Clone)]
pub struct ReconcilerSettings {
    /// Root of the manifest tree (`/opt/manifests`)
    pub manifests_root: PathBuf,
    pub readiness: ReadinessPolicy,
}

/// Reconciles the pipelines component against its collaborators
#[derive(Clone)]
pub struct PipelinesReconciler {
    cluster: Arc<dyn ClusterApi>,
    deployer: Arc<dyn ManifestDeployer>,
    fetcher: Arc<dyn ManifestFetcher>,
    reporter: Arc<dyn ConditionReporter>,
    image_lookup: Arc<EnvLookup>,
    settings: ReconcilerSettings,
}

impl std::fmt::Debug for PipelinesReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelinesReconciler")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl PipelinesReconciler {
    #[must_use]
    pub fn new(
        cluster: Arc<dyn ClusterApi>,
        deployer: Arc<dyn ManifestDeployer>,
        fetcher: Arc<dyn ManifestFetcher>,
        reporter: Arc<dyn ConditionReporter>,
        settings: ReconcilerSettings,
    ) -> Self {
        Self {
            cluster,
            deployer,
            fetcher,
            reporter,
            image_lookup: Arc::new(images::process_env),
            settings,
        }
    }

    /// Read image variables from `lookup` instead of the process environment
    #[must_use]
    pub fn with_image_lookup(mut self, lookup: Arc<EnvLookup>) -> Self {
        self.image_lookup = lookup;
        self
    }

    /// Converge the cluster towards `spec` in `context`
    pub async fn reconcile(
        &self,
        spec: &DataSciencePipelinesSpec,
        context: &PlatformContext,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let component = constants::COMPONENT_NAME;
        let enabled = spec.is_enabled();
        let span = info_span!(
            "reconcile",
            component = component,
            platform = %context.platform,
            management_state = spec.management_state.as_str(),
            namespace = %context.applications_namespace
        );

        async move {
            let root = self.settings.manifests_root.as_path();

            let override_location = match spec.manifest_override() {
                Some(source) if enabled => Some(
                    manifests::resolve_override(self.fetcher.as_ref(), root, component, source)
                        .await
                        .map_err(|source| ReconcileError::ManifestFetch {
                            component: component.to_string(),
                            source,
                        })?,
                ),
                _ => None,
            };

            let params_dir = override_location.as_ref().map_or_else(
                || manifests::base_path(root, component),
                |location| location.path().to_path_buf(),
            );
            self.inject_images(&params_dir);

            if enabled {
                self.guard_conflicts(component).await?;
            }

            let location = override_location
                .unwrap_or_else(|| manifests::overlay_location(root, component, context.platform));

            info!(
                "{} {} manifests from {}",
                if enabled { "Applying" } else { "Removing" },
                location.describe(),
                location.path().display()
            );
            self.deployer
                .apply_or_remove(
                    location.path(),
                    &context.applications_namespace,
                    component,
                    enabled,
                )
                .await
                .map_err(|source| ReconcileError::Deploy {
                    component: component.to_string(),
                    source,
                })?;
            info!("apply manifests done");

            let readiness_attempts = if enabled {
                Some(self.await_ready(component, &context.applications_namespace).await?)
            } else {
                None
            };

            let monitoring_active = if context.platform.is_managed_service() {
                let active = enabled && context.monitoring.is_enabled();
                monitoring::integrate(
                    self.deployer.as_ref(),
                    root,
                    component,
                    &context.monitoring.namespace,
                    active,
                )
                .await
                .map_err(|source| ReconcileError::Monitoring {
                    component: component.to_string(),
                    source,
                })?;
                info!("updating SRE monitoring done");
                Some(active)
            } else {
                None
            };

            Ok(ReconcileOutcome {
                enabled,
                location,
                readiness_attempts,
                monitoring_active,
            })
        }
        .instrument(span)
        .await
    }

    fn inject_images(&self, dir: &Path) {
        let mapping = images::resolve_images(self.image_lookup.as_ref());
        if let Err(e) = images::apply_params(dir, &mapping) {
            warn!("Failed to update images in {}: {:#}", dir.display(), e);
        }
    }

    async fn guard_conflicts(&self, component: &str) -> Result<(), ReconcileError> {
        let signal = conflict::check_conflicts(self.cluster.as_ref(), component)
            .await
            .map_err(|source| ReconcileError::ConflictLookup {
                component: component.to_string(),
                source,
            })?;

        match signal {
            ConflictSignal::NoConflict | ConflictSignal::OwnedByUs => {
                self.reporter
                    .set_condition(component, conflict::available_condition(component))
                    .await;
                Ok(())
            }
            ConflictSignal::Foreign { message } => {
                metrics::increment_conflicts_detected();
                for condition in conflict::conflict_conditions(&message) {
                    self.reporter.set_condition(component, condition).await;
                }
                Err(ReconcileError::Conflict {
                    component: component.to_string(),
                    message,
                })
            }
        }
    }

    async fn await_ready(&self, component: &str, namespace: &str) -> Result<u32, ReconcileError> {
        let result = readiness::wait_for_availability(
            self.cluster.as_ref(),
            component,
            namespace,
            self.settings.readiness,
        )
        .await;

        let attempts = match &result {
            Ok(attempts) => *attempts,
            Err(timeout) => timeout.attempts,
        };
        metrics::observe_readiness_attempts(attempts);

        result.map_err(|timeout| ReconcileError::NotReady {
            component: component.to_string(),
            namespace: namespace.to_string(),
            attempts: timeout.attempts,
            last_error: timeout.last_error.map(|e| format!("{e:#}")),
        })
    }
}
