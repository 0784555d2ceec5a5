//! # Watch Loop
//!
//! Watches `DataSciencePipelines` objects and runs a reconcile pass on every
//! change and every `RECONCILE_INTERVAL_SECS`.

use super::error_policy::{classify_watch_error, handle_reconciliation_error, WatchErrorAction};
use super::ControllerContext;
use crate::cluster::kubernetes::KubeStatusReporter;
use crate::cluster::ConditionReporter;
use crate::constants;
use crate::controller::conflict::RECONCILE_FAILED_REASON;
use crate::controller::reconciler::{ReconcileError, ReconcileOutcome};
use crate::controller::server::ServerState;
use crate::crd::{Condition, DataSciencePipelines};
use crate::observability::metrics;
use futures::StreamExt;
use kube::api::Api;
use kube::ResourceExt;
use kube_runtime::controller::{self, Action};
use kube_runtime::{watcher, Controller};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

/// Run the controller until a shutdown signal is received.
///
/// The watch is restarted when its stream ends or fails with a restartable
/// error.
pub async fn run_watch_loop(
    api: Api<DataSciencePipelines>,
    ctx: Arc<ControllerContext>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let shutdown_state = Arc::clone(&server_state);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, initiating graceful shutdown...");
            shutdown_state.set_ready(false);
        }
    });

    let restart_delay = ctx.config.watch_restart_delay();
    server_state.set_ready(true);

    loop {
        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        info!("Starting controller watch loop...");
        // Passes share the manifest tree on disk, so they never overlap
        Controller::new(api.clone(), watcher::Config::default().any_semantic())
            .with_config(controller::Config::default().concurrency(1))
            .shutdown_on_signal()
            .run(reconcile, handle_reconciliation_error, Arc::clone(&ctx))
            .filter_map(move |result| async move {
                match result {
                    Ok((object, _)) => {
                        debug!("Reconciled {}", object.name);
                        Some(())
                    }
                    Err(e) => match classify_watch_error(&format!("{e:?}"), restart_delay) {
                        WatchErrorAction::Continue => Some(()),
                        WatchErrorAction::Restart { delay } => {
                            tokio::time::sleep(delay).await;
                            None
                        }
                    },
                }
            })
            .for_each(|()| futures::future::ready(()))
            .await;

        if !server_state.ready() {
            info!("Shutdown requested, exiting watch loop");
            break;
        }

        warn!(
            "Controller watch stream ended, restarting in {} seconds...",
            restart_delay.as_secs()
        );
        tokio::time::sleep(restart_delay).await;
    }

    info!("Controller stopped gracefully");
    Ok(())
}

/// One watch-triggered pass for `obj`
async fn reconcile(
    obj: Arc<DataSciencePipelines>,
    ctx: Arc<ControllerContext>,
) -> Result<Action, ReconcileError> {
    let name = obj.name_any();
    let span = tracing::info_span!(
        "controller.watch.reconcile",
        resource.name = name.as_str(),
        resource.generation = obj.metadata.generation.unwrap_or(0)
    );

    async move {
        let start = Instant::now();
        metrics::increment_reconciliations();

        let reporter = ctx.status_reporter(&name);
        let condition_reporter: Arc<dyn ConditionReporter> =
            Arc::<KubeStatusReporter>::clone(&reporter);
        let result = match claim_component(&ctx, &name).await {
            Ok(()) => {
                ctx.reconciler(condition_reporter)
                    .reconcile(&obj.spec, &ctx.config.platform_context())
                    .await
            }
            Err(e) => Err(e),
        };
        metrics::observe_reconciliation_duration(start.elapsed().as_secs_f64());

        let (condition, phase) = match &result {
            Ok(outcome) => success_condition(outcome),
            Err(e) => (
                Condition::new("Ready", false, RECONCILE_FAILED_REASON, &e.to_string()),
                "Failed",
            ),
        };
        if let Err(e) = reporter.update_status(condition, Some(phase)).await {
            warn!("Failed to update status of {}: {:#}", name, e);
        }

        let outcome = result?;
        ctx.reset_backoff(&name);
        info!(
            "Reconciled {} ({}) in {:.2}s",
            name,
            if outcome.enabled { "Managed" } else { "Removed" },
            start.elapsed().as_secs_f64()
        );
        Ok(Action::requeue(ctx.config.reconcile_interval()))
    }
    .instrument(span)
    .await
}

/// Fail the pass unless `name` is the primary `DataSciencePipelines` object
async fn claim_component(ctx: &ControllerContext, name: &str) -> Result<(), ReconcileError> {
    let primary = ctx
        .primary_instance()
        .await
        .map_err(|source| ReconcileError::InstanceLookup {
            component: constants::COMPONENT_NAME.to_string(),
            source,
        })?;
    match primary {
        Some(primary) if primary != name => Err(ReconcileError::DuplicateInstance {
            component: constants::COMPONENT_NAME.to_string(),
            primary,
        }),
        _ => Ok(()),
    }
}

fn success_condition(outcome: &ReconcileOutcome) -> (Condition, &'static str) {
    if outcome.enabled {
        (
            Condition::new(
                "Ready",
                true,
                "ReconcileCompleted",
                &format!("{} is deployed and available", constants::COMPONENT_NAME),
            ),
            "Ready",
        )
    } else {
        (
            Condition::new(
                "Ready",
                false,
                "Removed",
                &format!("{} is removed", constants::COMPONENT_NAME),
            ),
            "Removed",
        )
    }
}
