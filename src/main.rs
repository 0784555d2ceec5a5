//! # Data Science Pipelines Component Controller
//!
//! Kubernetes controller converging the Data Science Pipelines component of an
//! Open Data Hub platform to the state declared on its
//! `DataSciencePipelines` resource.
//!
//! ## Overview
//!
//! On every change, and every `RECONCILE_INTERVAL_SECS`, the controller:
//!
//! 1. **Selects manifests** - the platform overlay (`odh` or `rhoai`), or a
//!    developer override downloaded from `devFlags.manifests`
//! 2. **Injects images** - `RELATED_IMAGE_*` references into `params.env`
//! 3. **Guards against conflicts** - refuses to enable over a foreign Argo
//!    Workflows installation
//! 4. **Applies or removes** - renders with `kustomize build` and applies with
//!    server-side apply, or deletes what was applied
//! 5. **Waits for readiness** - bounded poll of the component's deployments
//! 6. **Wires SRE monitoring** - on the managed service only
//!
//! Configuration is read from the environment, see `config::OperatorConfig`.

use anyhow::{Context, Result};
use kube::api::Api;
use kube::Client;
use pipelines_controller::cluster::deploy::KustomizeDeployer;
use pipelines_controller::cluster::fetch::TarballFetcher;
use pipelines_controller::cluster::kubernetes::KubeCluster;
use pipelines_controller::config::OperatorConfig;
use pipelines_controller::controller::server::{start_server, ServerState};
use pipelines_controller::crd::DataSciencePipelines;
use pipelines_controller::observability;
use pipelines_controller::runtime::{watch_loop, ControllerContext};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    // Required for rustls 0.23+ before any TLS connection is made
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("Failed to install rustls crypto provider");
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipelines_controller=info".into()),
        )
        .init();

    info!("Starting Data Science Pipelines Component Controller");
    info!(
        "Build info: datetime={}, git_hash={}",
        env!("BUILD_DATETIME"),
        env!("BUILD_GIT_HASH")
    );

    let config = OperatorConfig::from_env();
    info!(
        "Platform: {}, applications namespace: {}, manifests: {}",
        config.platform,
        config.applications_namespace,
        config.manifests_path.display()
    );

    observability::register_metrics()?;

    let server_state = Arc::new(ServerState::default());
    let server_state_clone = Arc::clone(&server_state);
    let server_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = start_server(server_port, server_state_clone).await {
            error!("HTTP server error: {}", e);
        }
    });

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client")?;

    let fetcher = TarballFetcher::new(config.manifest_fetch_timeout())?;
    let ctx = Arc::new(ControllerContext::new(
        client.clone(),
        config.clone(),
        Arc::new(KubeCluster::new(client.clone())),
        Arc::new(KustomizeDeployer::new(client.clone(), &config.field_manager)),
        Arc::new(fetcher),
    ));

    let api: Api<DataSciencePipelines> = Api::all(client);
    watch_loop::run_watch_loop(api, ctx, server_state).await
}
