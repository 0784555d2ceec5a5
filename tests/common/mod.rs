//! Recording fakes of the collaborator traits and a reconciler harness.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use anyhow::Result;
use async_trait::async_trait;
use k8s_openapi::apiextensions_apiserver::pkg::apis::apiextensions::v1::CustomResourceDefinition;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use pipelines_controller::cluster::{
    ClusterApi, ConditionReporter, ManifestDeployer, ManifestFetcher,
};
use pipelines_controller::constants;
use pipelines_controller::controller::readiness::ReadinessPolicy;
use pipelines_controller::controller::reconciler::{PipelinesReconciler, ReconcilerSettings};
use pipelines_controller::crd::{
    Condition, DataSciencePipelinesSpec, DevFlags, ManagementState, ManifestSource,
    MonitoringSpec, Platform, PlatformContext,
};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const COMPONENT: &str = constants::COMPONENT_NAME;

/// State of `workflows.argoproj.io` seen by the fake cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgoCrd {
    Absent,
    OwnedByUs,
    Foreign,
    LookupFails,
}

#[derive(Debug)]
pub struct FakeCluster {
    pub argo_crd: Mutex<ArgoCrd>,
    /// Readiness checks answered `false` before the first `true`
    pub not_ready_checks: u32,
    /// Every readiness lookup fails
    pub readiness_fails: bool,
    pub crd_lookups: AtomicU32,
    pub readiness_checks: AtomicU32,
    pub readiness_namespaces: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn new(argo_crd: ArgoCrd) -> Self {
        Self {
            argo_crd: Mutex::new(argo_crd),
            not_ready_checks: 0,
            readiness_fails: false,
            crd_lookups: AtomicU32::new(0),
            readiness_checks: AtomicU32::new(0),
            readiness_namespaces: Mutex::new(Vec::new()),
        }
    }

    pub fn set_argo_crd(&self, argo_crd: ArgoCrd) {
        *self.argo_crd.lock().unwrap() = argo_crd;
    }

    pub fn crd_lookups(&self) -> u32 {
        self.crd_lookups.load(Ordering::SeqCst)
    }

    pub fn readiness_checks(&self) -> u32 {
        self.readiness_checks.load(Ordering::SeqCst)
    }
}

fn argo_crd(labels: Option<BTreeMap<String, String>>) -> CustomResourceDefinition {
    CustomResourceDefinition {
        metadata: ObjectMeta {
            name: Some(constants::ARGO_WORKFLOW_CRD.to_string()),
            labels,
            ..ObjectMeta::default()
        },
        ..CustomResourceDefinition::default()
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn custom_resource_definition(
        &self,
        name: &str,
    ) -> Result<Option<CustomResourceDefinition>> {
        assert_eq!(name, constants::ARGO_WORKFLOW_CRD);
        self.crd_lookups.fetch_add(1, Ordering::SeqCst);
        let crd_state = *self.argo_crd.lock().unwrap();
        match crd_state {
            ArgoCrd::Absent => Ok(None),
            ArgoCrd::OwnedByUs => {
                let mut labels = BTreeMap::new();
                labels.insert(constants::component_label(COMPONENT), "true".to_string());
                Ok(Some(argo_crd(Some(labels))))
            }
            ArgoCrd::Foreign => {
                let mut labels = BTreeMap::new();
                labels.insert(
                    "app.kubernetes.io/part-of".to_string(),
                    "argo-workflows".to_string(),
                );
                Ok(Some(argo_crd(Some(labels))))
            }
            ArgoCrd::LookupFails => Err(anyhow::anyhow!("etcdserver: request timed out")),
        }
    }

    async fn deployments_ready(&self, component: &str, namespace: &str) -> Result<bool> {
        assert_eq!(component, COMPONENT);
        let check = self.readiness_checks.fetch_add(1, Ordering::SeqCst) + 1;
        self.readiness_namespaces
            .lock()
            .unwrap()
            .push(namespace.to_string());
        if self.readiness_fails {
            return Err(anyhow::anyhow!(
                "deployments.apps is forbidden: User cannot list resource"
            ));
        }
        Ok(check > self.not_ready_checks)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployCall {
    pub path: PathBuf,
    pub namespace: String,
    pub component: String,
    pub active: bool,
}

#[derive(Debug, Default)]
pub struct RecordingDeployer {
    pub fail: bool,
    pub calls: Mutex<Vec<DeployCall>>,
}

impl RecordingDeployer {
    pub fn calls(&self) -> Vec<DeployCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManifestDeployer for RecordingDeployer {
    async fn apply_or_remove(
        &self,
        path: &Path,
        namespace: &str,
        component: &str,
        active: bool,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(DeployCall {
            path: path.to_path_buf(),
            namespace: namespace.to_string(),
            component: component.to_string(),
            active,
        });
        if self.fail {
            return Err(anyhow::anyhow!("server-side apply rejected"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingFetcher {
    pub fail: bool,
    pub calls: Mutex<Vec<(PathBuf, String, ManifestSource)>>,
}

impl RecordingFetcher {
    pub fn calls(&self) -> Vec<(PathBuf, String, ManifestSource)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ManifestFetcher for RecordingFetcher {
    async fn fetch(
        &self,
        manifests_root: &Path,
        component: &str,
        source: &ManifestSource,
    ) -> Result<()> {
        self.calls.lock().unwrap().push((
            manifests_root.to_path_buf(),
            component.to_string(),
            source.clone(),
        ));
        if self.fail {
            return Err(anyhow::anyhow!("Error downloading manifests: HTTP 404"));
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    pub conditions: Mutex<Vec<(String, Condition)>>,
}

impl RecordingReporter {
    pub fn conditions(&self) -> Vec<(String, Condition)> {
        self.conditions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConditionReporter for RecordingReporter {
    async fn set_condition(&self, component: &str, condition: Condition) {
        self.conditions
            .lock()
            .unwrap()
            .push((component.to_string(), condition));
    }
}

pub const PROMETHEUS_CONFIGS: &str = r"apiVersion: v1
kind: ConfigMap
metadata:
  name: prometheus
  namespace: redhat-ods-monitoring
data:
  prometheus.yml: |
    global:
      scrape_interval: 30s
    rule_files:
      - operator-recording.rules
";

/// Collaborators plus a temporary manifest tree
pub struct Harness {
    pub cluster: Arc<FakeCluster>,
    pub deployer: Arc<RecordingDeployer>,
    pub fetcher: Arc<RecordingFetcher>,
    pub reporter: Arc<RecordingReporter>,
    pub root: tempfile::TempDir,
    pub max_attempts: u32,
}

impl Harness {
    pub fn new(argo_crd: ArgoCrd) -> Self {
        Self::with_cluster(FakeCluster::new(argo_crd))
    }

    pub fn with_cluster(cluster: FakeCluster) -> Self {
        let root = tempfile::tempdir().unwrap();
        let apps = root.path().join("monitoring/prometheus/apps");
        std::fs::create_dir_all(&apps).unwrap();
        std::fs::write(apps.join("prometheus-configs.yaml"), PROMETHEUS_CONFIGS).unwrap();
        std::fs::create_dir_all(root.path().join(COMPONENT).join("base")).unwrap();

        Self {
            cluster: Arc::new(cluster),
            deployer: Arc::new(RecordingDeployer::default()),
            fetcher: Arc::new(RecordingFetcher::default()),
            reporter: Arc::new(RecordingReporter::default()),
            root,
            max_attempts: 3,
        }
    }

    pub fn with_failing_deployer(mut self) -> Self {
        self.deployer = Arc::new(RecordingDeployer {
            fail: true,
            ..RecordingDeployer::default()
        });
        self
    }

    pub fn with_failing_fetcher(mut self) -> Self {
        self.fetcher = Arc::new(RecordingFetcher {
            fail: true,
            ..RecordingFetcher::default()
        });
        self
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn reconciler(&self) -> PipelinesReconciler {
        PipelinesReconciler::new(
            self.cluster.clone(),
            self.deployer.clone(),
            self.fetcher.clone(),
            self.reporter.clone(),
            ReconcilerSettings {
                manifests_root: self.root.path().to_path_buf(),
                readiness: ReadinessPolicy {
                    max_attempts: self.max_attempts,
                    interval: Duration::ZERO,
                },
            },
        )
        .with_image_lookup(Arc::new(|_: &str| -> Option<String> { None }))
    }

    pub fn overlay_path(&self, overlay: &str) -> PathBuf {
        self.root().join(COMPONENT).join("overlays").join(overlay)
    }

    pub fn prometheus_configs(&self) -> String {
        std::fs::read_to_string(
            self.root()
                .join("monitoring/prometheus/apps/prometheus-configs.yaml"),
        )
        .unwrap()
    }
}

pub fn spec(state: ManagementState) -> DataSciencePipelinesSpec {
    DataSciencePipelinesSpec {
        management_state: state,
        dev_flags: None,
    }
}

pub fn spec_with_override(state: ManagementState, uri: &str, source_path: &str) -> DataSciencePipelinesSpec {
    DataSciencePipelinesSpec {
        management_state: state,
        dev_flags: Some(DevFlags {
            manifests: vec![ManifestSource {
                uri: uri.to_string(),
                context_dir: "config".to_string(),
                source_path: Some(source_path.to_string()),
            }],
        }),
    }
}

pub fn context(platform: Platform, namespace: &str, monitoring: ManagementState) -> PlatformContext {
    PlatformContext {
        platform,
        applications_namespace: namespace.to_string(),
        monitoring: MonitoringSpec {
            management_state: monitoring,
            namespace: constants::DEFAULT_MONITORING_NAMESPACE.to_string(),
        },
    }
}
