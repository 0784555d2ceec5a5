//! # Reconcile Tests
//!
//! Drive `PipelinesReconciler` against recording fakes and assert on the
//! collaborator calls it makes.

mod common;

use common::{
    context, spec, spec_with_override, ArgoCrd, DeployCall, FakeCluster, Harness, COMPONENT,
};
use pipelines_controller::constants;
use pipelines_controller::controller::conflict::{
    ARGO_WORKFLOW_AVAILABLE_REASON, ARGO_WORKFLOW_EXISTS_REASON, CAPABILITY_ARGO_CONDITION,
    RECONCILE_FAILED_REASON,
};
use pipelines_controller::controller::reconciler::{ErrorKind, ReconcileError};
use pipelines_controller::crd::ManagementState::{Managed, Removed};
use pipelines_controller::crd::Platform;
use std::sync::Arc;

#[tokio::test]
async fn test_managed_community_install_applies_and_waits() {
    let harness = Harness::new(ArgoCrd::Absent);

    let outcome = harness
        .reconciler()
        .reconcile(&spec(Managed), &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap();

    assert_eq!(
        harness.deployer.calls(),
        vec![DeployCall {
            path: harness.overlay_path("odh"),
            namespace: "ns1".to_string(),
            component: COMPONENT.to_string(),
            active: true,
        }]
    );
    assert_eq!(harness.cluster.crd_lookups(), 1);
    assert_eq!(outcome.readiness_attempts, Some(1));
    assert_eq!(
        *harness.cluster.readiness_namespaces.lock().unwrap(),
        vec!["ns1".to_string()]
    );
    assert_eq!(outcome.monitoring_active, None);
    assert!(harness.fetcher.calls().is_empty());
}

#[tokio::test]
async fn test_removed_skips_conflict_guard_and_tears_down() {
    let harness = Harness::new(ArgoCrd::Foreign);

    let outcome = harness
        .reconciler()
        .reconcile(&spec(Removed), &context(Platform::OpenDataHub, "ns1", Removed))
        .await
        .unwrap();

    assert!(!outcome.enabled);
    assert_eq!(harness.cluster.crd_lookups(), 0);
    assert_eq!(harness.cluster.readiness_checks(), 0);
    let calls = harness.deployer.calls();
    assert_eq!(calls.len(), 1);
    assert!(!calls[0].active);
    assert_eq!(calls[0].path, harness.overlay_path("odh"));
    assert!(harness.reporter.conditions().is_empty());
}

#[tokio::test]
async fn test_foreign_argo_crd_blocks_apply() {
    let harness = Harness::new(ArgoCrd::Foreign);

    let error = harness
        .reconciler()
        .reconcile(&spec(Managed), &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap_err();

    assert!(matches!(error, ReconcileError::Conflict { .. }));
    assert_eq!(error.kind(), ErrorKind::Precondition);
    let message = error.to_string();
    assert!(message.contains(constants::ARGO_WORKFLOW_CRD));
    assert!(message.contains("Remove existing Argo workflows"));
    assert!(message.contains("managementState` to Removed"));

    assert!(harness.deployer.calls().is_empty());
    assert_eq!(harness.cluster.readiness_checks(), 0);

    let conditions = harness.reporter.conditions();
    assert_eq!(conditions.len(), 2);
    let (component, capability) = &conditions[0];
    assert_eq!(component, COMPONENT);
    assert_eq!(capability.r#type, CAPABILITY_ARGO_CONDITION);
    assert_eq!(capability.status, "False");
    assert_eq!(capability.reason.as_deref(), Some(ARGO_WORKFLOW_EXISTS_REASON));
    assert_eq!(capability.message.as_deref(), Some(message.as_str()));
    assert_eq!(conditions[1].1.reason.as_deref(), Some(RECONCILE_FAILED_REASON));
}

#[tokio::test]
async fn test_argo_crd_owned_by_component_is_not_a_conflict() {
    let harness = Harness::new(ArgoCrd::OwnedByUs);

    let outcome = harness
        .reconciler()
        .reconcile(&spec(Managed), &context(Platform::OpenDataHub, "ns1", Removed))
        .await
        .unwrap();

    assert!(outcome.enabled);
    assert_eq!(harness.deployer.calls().len(), 1);
    let conditions = harness.reporter.conditions();
    assert_eq!(conditions.len(), 1);
    assert_eq!(conditions[0].1.r#type, CAPABILITY_ARGO_CONDITION);
    assert!(conditions[0].1.is_true());
}

#[tokio::test]
async fn test_capability_recovers_after_foreign_argo_is_removed() {
    let harness = Harness::new(ArgoCrd::Foreign);
    let reconciler = harness.reconciler();
    let ctx = context(Platform::OpenDataHub, "ns1", Removed);

    let error = reconciler.reconcile(&spec(Managed), &ctx).await.unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Precondition);

    harness.cluster.set_argo_crd(ArgoCrd::Absent);
    reconciler.reconcile(&spec(Managed), &ctx).await.unwrap();

    let conditions = harness.reporter.conditions();
    assert_eq!(conditions.len(), 3);
    let (_, latest) = conditions.last().unwrap();
    assert_eq!(latest.r#type, CAPABILITY_ARGO_CONDITION);
    assert!(latest.is_true());
    assert_eq!(latest.reason.as_deref(), Some(ARGO_WORKFLOW_AVAILABLE_REASON));
    assert_eq!(harness.deployer.calls().len(), 1);
}

#[tokio::test]
async fn test_conflict_lookup_failure_is_transient() {
    let harness = Harness::new(ArgoCrd::LookupFails);

    let error = harness
        .reconciler()
        .reconcile(&spec(Managed), &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap_err();

    assert!(matches!(error, ReconcileError::ConflictLookup { .. }));
    assert_eq!(error.kind(), ErrorKind::Transient);
    assert!(error.to_string().contains("request timed out"));
    assert!(harness.deployer.calls().is_empty());
    assert!(harness.reporter.conditions().is_empty());
}

#[tokio::test]
async fn test_reconcile_is_idempotent() {
    let harness = Harness::new(ArgoCrd::Absent);
    let reconciler = harness.reconciler();
    let spec = spec(Managed);
    let ctx = context(Platform::SelfManagedRhoai, "ns1", Removed);

    let first = reconciler.reconcile(&spec, &ctx).await.unwrap();
    let second = reconciler.reconcile(&spec, &ctx).await.unwrap();

    assert_eq!(first, second);
    let calls = harness.deployer.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0], calls[1]);
    assert_eq!(harness.cluster.crd_lookups(), 2);
}

#[tokio::test]
async fn test_overlay_follows_platform_regardless_of_state() {
    for (platform, overlay) in [
        (Platform::Unset, "odh"),
        (Platform::OpenDataHub, "odh"),
        (Platform::SelfManagedRhoai, "rhoai"),
        (Platform::ManagedRhoai, "rhoai"),
    ] {
        for state in [Managed, Removed] {
            let harness = Harness::new(ArgoCrd::Absent);
            let outcome = harness
                .reconciler()
                .reconcile(&spec(state), &context(platform, "ns1", Removed))
                .await
                .unwrap();

            let applied: Vec<_> = harness
                .deployer
                .calls()
                .into_iter()
                .filter(|call| call.component == COMPONENT)
                .collect();
            assert_eq!(applied.len(), 1, "{platform} {state:?}");
            assert_eq!(applied[0].path, harness.overlay_path(overlay));
            assert_eq!(outcome.location.path(), harness.overlay_path(overlay));
        }
    }
}

#[tokio::test]
async fn test_monitoring_only_on_managed_service() {
    for platform in [Platform::Unset, Platform::OpenDataHub, Platform::SelfManagedRhoai] {
        let harness = Harness::new(ArgoCrd::Absent);
        let outcome = harness
            .reconciler()
            .reconcile(&spec(Managed), &context(platform, "ns1", Managed))
            .await
            .unwrap();

        assert_eq!(outcome.monitoring_active, None);
        assert!(harness
            .deployer
            .calls()
            .iter()
            .all(|call| call.component == COMPONENT));
        assert_eq!(harness.prometheus_configs(), common::PROMETHEUS_CONFIGS);
    }
}

#[tokio::test]
async fn test_monitoring_active_only_when_both_managed() {
    let rules = format!("{COMPONENT}*.rules");
    for (state, monitoring, expected) in [
        (Managed, Managed, true),
        (Managed, Removed, false),
        (Removed, Managed, false),
        (Removed, Removed, false),
    ] {
        let harness = Harness::new(ArgoCrd::Absent);
        let outcome = harness
            .reconciler()
            .reconcile(&spec(state), &context(Platform::ManagedRhoai, "ns1", monitoring))
            .await
            .unwrap();

        assert_eq!(outcome.monitoring_active, Some(expected));

        let calls = harness.deployer.calls();
        assert_eq!(calls.len(), 2);
        let prometheus = &calls[1];
        assert_eq!(prometheus.component, constants::MONITORING_COMPONENT_NAME);
        assert_eq!(prometheus.namespace, constants::DEFAULT_MONITORING_NAMESPACE);
        assert!(prometheus.active, "prometheus manifests are always applied");
        assert!(prometheus.path.ends_with("monitoring/prometheus/apps"));

        assert_eq!(harness.prometheus_configs().contains(&rules), expected);
        let apps_dir = harness.root().join("monitoring/prometheus/apps");
        assert_eq!(std::fs::read_dir(apps_dir).unwrap().count(), 1);
    }
}

#[tokio::test]
async fn test_manifest_override_is_fetched_and_applied() {
    let harness = Harness::new(ArgoCrd::Absent);
    let spec = spec_with_override(Managed, "https://example.com/dspo.tar.gz", "overlayA");

    let outcome = harness
        .reconciler()
        .reconcile(&spec, &context(Platform::ManagedRhoai, "ns1", Removed))
        .await
        .unwrap();

    let fetches = harness.fetcher.calls();
    assert_eq!(fetches.len(), 1);
    assert_eq!(fetches[0].0, harness.root());
    assert_eq!(fetches[0].1, COMPONENT);
    assert_eq!(fetches[0].2.uri, "https://example.com/dspo.tar.gz");

    assert!(outcome.location.is_override());
    assert!(outcome.location.path().ends_with("overlayA"));
    assert_eq!(
        outcome.location.path(),
        harness.root().join(COMPONENT).join("overlayA")
    );
    assert_eq!(harness.deployer.calls()[0].path, outcome.location.path());
}

#[tokio::test]
async fn test_manifest_override_ignored_when_removed() {
    let harness = Harness::new(ArgoCrd::Absent);
    let spec = spec_with_override(Removed, "https://example.com/dspo.tar.gz", "overlayA");

    let outcome = harness
        .reconciler()
        .reconcile(&spec, &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap();

    assert!(harness.fetcher.calls().is_empty());
    assert!(!outcome.location.is_override());
    assert_eq!(harness.deployer.calls()[0].path, harness.overlay_path("odh"));
}

#[tokio::test]
async fn test_manifest_fetch_failure_aborts_before_conflict_check() {
    let harness = Harness::new(ArgoCrd::Absent).with_failing_fetcher();
    let spec = spec_with_override(Managed, "https://example.com/missing.tar.gz", "base");

    let error = harness
        .reconciler()
        .reconcile(&spec, &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap_err();

    assert!(matches!(error, ReconcileError::ManifestFetch { .. }));
    assert!(error.to_string().contains("HTTP 404"));
    assert_eq!(harness.fetcher.calls().len(), 1);
    assert_eq!(harness.cluster.crd_lookups(), 0);
    assert!(harness.deployer.calls().is_empty());
}

#[tokio::test]
async fn test_readiness_exhaustion_names_component_and_namespace() {
    let mut cluster = FakeCluster::new(ArgoCrd::Absent);
    cluster.not_ready_checks = u32::MAX;
    let harness = Harness::with_cluster(cluster);

    let error = harness
        .reconciler()
        .reconcile(&spec(Managed), &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap_err();

    match &error {
        ReconcileError::NotReady {
            component,
            namespace,
            attempts,
            last_error,
        } => {
            assert_eq!(component, COMPONENT);
            assert_eq!(namespace, "ns1");
            assert_eq!(*attempts, 3);
            assert!(last_error.is_none());
        }
        other => panic!("expected NotReady, got {other:?}"),
    }
    assert_eq!(error.kind(), ErrorKind::ReadinessTimeout);
    assert_eq!(harness.cluster.readiness_checks(), 3);
    assert_eq!(harness.deployer.calls().len(), 1);
}

#[tokio::test]
async fn test_readiness_lookup_failures_are_reported() {
    let mut cluster = FakeCluster::new(ArgoCrd::Absent);
    cluster.readiness_fails = true;
    let harness = Harness::with_cluster(cluster);

    let error = harness
        .reconciler()
        .reconcile(&spec(Managed), &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap_err();

    assert_eq!(error.kind(), ErrorKind::ReadinessTimeout);
    assert_eq!(harness.cluster.readiness_checks(), 3);
    assert!(error
        .to_string()
        .ends_with("last check failed: deployments.apps is forbidden: User cannot list resource"));
}

#[tokio::test]
async fn test_readiness_retries_until_ready() {
    let mut cluster = FakeCluster::new(ArgoCrd::Absent);
    cluster.not_ready_checks = 2;
    let harness = Harness::with_cluster(cluster);

    let outcome = harness
        .reconciler()
        .reconcile(&spec(Managed), &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap();

    assert_eq!(outcome.readiness_attempts, Some(3));
}

#[tokio::test]
async fn test_readiness_failure_skips_monitoring() {
    let mut cluster = FakeCluster::new(ArgoCrd::Absent);
    cluster.not_ready_checks = u32::MAX;
    let harness = Harness::with_cluster(cluster);

    let error = harness
        .reconciler()
        .reconcile(&spec(Managed), &context(Platform::ManagedRhoai, "ns1", Managed))
        .await
        .unwrap_err();

    assert!(matches!(error, ReconcileError::NotReady { .. }));
    assert_eq!(harness.deployer.calls().len(), 1);
    assert_eq!(harness.prometheus_configs(), common::PROMETHEUS_CONFIGS);
}

#[tokio::test]
async fn test_deploy_failure_is_wrapped_with_component() {
    let harness = Harness::new(ArgoCrd::Absent).with_failing_deployer();

    let error = harness
        .reconciler()
        .reconcile(&spec(Managed), &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap_err();

    assert!(matches!(error, ReconcileError::Deploy { .. }));
    assert_eq!(error.component(), COMPONENT);
    assert!(error.to_string().contains(COMPONENT));
    assert!(error.to_string().contains("server-side apply rejected"));
    assert_eq!(harness.cluster.readiness_checks(), 0);
}

#[tokio::test]
async fn test_missing_prometheus_config_fails_monitoring() {
    let harness = Harness::new(ArgoCrd::Absent);
    std::fs::remove_file(
        harness
            .root()
            .join("monitoring/prometheus/apps/prometheus-configs.yaml"),
    )
    .unwrap();

    let error = harness
        .reconciler()
        .reconcile(&spec(Removed), &context(Platform::ManagedRhoai, "ns1", Managed))
        .await
        .unwrap_err();

    assert!(matches!(error, ReconcileError::Monitoring { .. }));
    assert_eq!(error.kind(), ErrorKind::Transient);
}

#[tokio::test]
async fn test_image_references_are_injected_into_base_params() {
    let harness = Harness::new(ArgoCrd::Absent);
    let params = harness.root().join(COMPONENT).join("base/params.env");
    std::fs::write(&params, "IMAGES_DSPO=bundled\nIMAGES_LAUNCHER=bundled\n").unwrap();

    let reconciler = harness.reconciler().with_image_lookup(Arc::new(|key: &str| {
        (key == "RELATED_IMAGE_ODH_DATA_SCIENCE_PIPELINES_OPERATOR_CONTROLLER_IMAGE")
            .then(|| "quay.io/opendatahub/dspo@sha256:abc".to_string())
    }));
    reconciler
        .reconcile(&spec(Managed), &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap();

    assert_eq!(
        std::fs::read_to_string(&params).unwrap(),
        "IMAGES_DSPO=quay.io/opendatahub/dspo@sha256:abc\nIMAGES_LAUNCHER=bundled\n"
    );
}

#[tokio::test]
async fn test_params_path_that_is_not_a_file_is_skipped() {
    let harness = Harness::new(ArgoCrd::Absent);
    std::fs::create_dir_all(harness.root().join(COMPONENT).join("base/params.env/nested"))
        .unwrap();

    let reconciler = harness
        .reconciler()
        .with_image_lookup(Arc::new(|_: &str| Some("quay.io/x:1".to_string())));
    let outcome = reconciler
        .reconcile(&spec(Managed), &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap();

    assert!(outcome.enabled);
    assert_eq!(harness.deployer.calls().len(), 1);
}

#[tokio::test]
async fn test_image_injection_failure_does_not_block_apply() {
    let harness = Harness::new(ArgoCrd::Absent);
    let params = harness.root().join(COMPONENT).join("base/params.env");
    let mut unreadable = b"IMAGES_DSPO=".to_vec();
    unreadable.extend_from_slice(&[0xff, 0xfe]);
    std::fs::write(&params, &unreadable).unwrap();

    let reconciler = harness
        .reconciler()
        .with_image_lookup(Arc::new(|_: &str| Some("quay.io/x:1".to_string())));
    let outcome = reconciler
        .reconcile(&spec(Managed), &context(Platform::Unset, "ns1", Removed))
        .await
        .unwrap();

    assert!(outcome.enabled);
    assert_eq!(harness.deployer.calls().len(), 1);
    assert_eq!(std::fs::read(&params).unwrap(), unreadable);
}
