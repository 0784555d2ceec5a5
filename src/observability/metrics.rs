//! # Metrics
//!
//! Prometheus metrics for monitoring the controller.
//!
//! ## Metrics Exposed
//!
//! - `pipelines_reconciliations_total` - Total number of reconcile passes
//! - `pipelines_reconciliation_errors_total{kind}` - Failed passes by error kind
//! - `pipelines_reconciliation_duration_seconds` - Duration of reconcile passes
//! - `pipelines_conflicts_detected_total` - Foreign Argo Workflows CRDs found
//! - `pipelines_readiness_attempts` - Readiness checks needed per pass
//! - `pipelines_manifest_fetches_total` / `pipelines_manifest_fetch_errors_total`
//! - `pipelines_kustomize_build_duration_seconds` / `pipelines_kustomize_build_errors_total`

use anyhow::Result;
use prometheus::{Histogram, IntCounter, IntCounterVec, Registry};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static RECONCILIATIONS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pipelines_reconciliations_total",
        "Total number of reconciliations",
    )
    .expect("Failed to create RECONCILIATIONS_TOTAL metric - this should never happen")
});

static RECONCILIATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        prometheus::Opts::new(
            "pipelines_reconciliation_errors_total",
            "Total number of reconciliation errors by error kind",
        ),
        &["kind"],
    )
    .expect("Failed to create RECONCILIATION_ERRORS_TOTAL metric - this should never happen")
});

static RECONCILIATION_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "pipelines_reconciliation_duration_seconds",
            "Duration of reconciliation operations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 5.0, 30.0, 60.0, 120.0, 300.0]),
    )
    .expect("Failed to create RECONCILIATION_DURATION metric - this should never happen")
});

static CONFLICTS_DETECTED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pipelines_conflicts_detected_total",
        "Total number of passes blocked by a foreign Argo Workflows installation",
    )
    .expect("Failed to create CONFLICTS_DETECTED_TOTAL metric - this should never happen")
});

static READINESS_ATTEMPTS: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "pipelines_readiness_attempts",
            "Number of readiness checks performed per pass",
        )
        .buckets(vec![1.0, 2.0, 3.0, 4.0, 6.0, 10.0]),
    )
    .expect("Failed to create READINESS_ATTEMPTS metric - this should never happen")
});

static MANIFEST_FETCHES_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pipelines_manifest_fetches_total",
        "Total number of developer manifest downloads",
    )
    .expect("Failed to create MANIFEST_FETCHES_TOTAL metric - this should never happen")
});

static MANIFEST_FETCH_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pipelines_manifest_fetch_errors_total",
        "Total number of failed developer manifest downloads",
    )
    .expect("Failed to create MANIFEST_FETCH_ERRORS_TOTAL metric - this should never happen")
});

static KUSTOMIZE_BUILD_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "pipelines_kustomize_build_duration_seconds",
            "Duration of kustomize build operations in seconds",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.0, 5.0, 10.0]),
    )
    .expect("Failed to create KUSTOMIZE_BUILD_DURATION metric - this should never happen")
});

static KUSTOMIZE_BUILD_ERRORS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pipelines_kustomize_build_errors_total",
        "Total number of kustomize build errors",
    )
    .expect("Failed to create KUSTOMIZE_BUILD_ERRORS_TOTAL metric - this should never happen")
});

pub fn register_metrics() -> Result<()> {
    REGISTRY.register(Box::new(RECONCILIATIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(RECONCILIATION_DURATION.clone()))?;
    REGISTRY.register(Box::new(CONFLICTS_DETECTED_TOTAL.clone()))?;
    REGISTRY.register(Box::new(READINESS_ATTEMPTS.clone()))?;
    REGISTRY.register(Box::new(MANIFEST_FETCHES_TOTAL.clone()))?;
    REGISTRY.register(Box::new(MANIFEST_FETCH_ERRORS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(KUSTOMIZE_BUILD_DURATION.clone()))?;
    REGISTRY.register(Box::new(KUSTOMIZE_BUILD_ERRORS_TOTAL.clone()))?;

    Ok(())
}

pub fn increment_reconciliations() {
    RECONCILIATIONS_TOTAL.inc();
}

/// Count a failed pass under its error kind label
pub fn increment_reconciliation_errors(kind: &str) {
    RECONCILIATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

pub fn observe_reconciliation_duration(duration: f64) {
    RECONCILIATION_DURATION.observe(duration);
}

pub fn increment_conflicts_detected() {
    CONFLICTS_DETECTED_TOTAL.inc();
}

pub fn observe_readiness_attempts(attempts: u32) {
    READINESS_ATTEMPTS.observe(f64::from(attempts));
}

pub fn increment_manifest_fetches_total() {
    MANIFEST_FETCHES_TOTAL.inc();
}

pub fn increment_manifest_fetch_errors_total() {
    MANIFEST_FETCH_ERRORS_TOTAL.inc();
}

pub fn observe_kustomize_build_duration(duration: f64) {
    KUSTOMIZE_BUILD_DURATION.observe(duration);
}

pub fn increment_kustomize_build_errors_total() {
    KUSTOMIZE_BUILD_ERRORS_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics() {
        // This should not panic - metrics should register successfully
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_increment_reconciliations() {
        let before = RECONCILIATIONS_TOTAL.get();
        increment_reconciliations();
        assert_eq!(RECONCILIATIONS_TOTAL.get(), before + 1u64);
    }

    #[test]
    fn test_reconciliation_errors_are_labelled_by_kind() {
        let before = RECONCILIATION_ERRORS_TOTAL
            .with_label_values(&["precondition"])
            .get();
        increment_reconciliation_errors("precondition");
        assert_eq!(
            RECONCILIATION_ERRORS_TOTAL
                .with_label_values(&["precondition"])
                .get(),
            before + 1u64
        );
    }

    #[test]
    fn test_increment_conflicts_detected() {
        let before = CONFLICTS_DETECTED_TOTAL.get();
        increment_conflicts_detected();
        assert_eq!(CONFLICTS_DETECTED_TOTAL.get(), before + 1u64);
    }

    #[test]
    fn test_observe_readiness_attempts() {
        let before = READINESS_ATTEMPTS.get_sample_count();
        observe_readiness_attempts(3);
        assert_eq!(READINESS_ATTEMPTS.get_sample_count(), before + 1);
    }

    #[test]
    fn test_manifest_fetch_counters() {
        let fetches = MANIFEST_FETCHES_TOTAL.get();
        let errors = MANIFEST_FETCH_ERRORS_TOTAL.get();
        increment_manifest_fetches_total();
        increment_manifest_fetch_errors_total();
        assert_eq!(MANIFEST_FETCHES_TOTAL.get(), fetches + 1u64);
        assert_eq!(MANIFEST_FETCH_ERRORS_TOTAL.get(), errors + 1u64);
    }
}
