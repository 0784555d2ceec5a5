//! # Kustomize Deployer
//!
//! Renders a kustomize directory with `kustomize build` and applies the
//! resulting objects with server-side apply, or deletes them when the
//! component is being removed.
//!
//! Every rendered object is labelled `app.opendatahub.io/<component>: "true"`.
//! That label is what the conflict guard and the readiness poll look for.
//! Teardown renders the same directory, but only deletes live objects that
//! still carry the label: a cluster-scoped object installed by someone else
//! under the same name (the Argo Workflows CRD) is left alone.

use super::{is_owned_by, ManifestDeployer};
use crate::constants;
use crate::observability::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use kube::api::{Api, DeleteParams, Patch, PatchParams};
use kube::core::{DynamicObject, GroupVersionKind};
use kube::discovery::{self, Scope};
use kube::Client;
use serde::Deserialize;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, error, info, info_span, warn, Instrument};

/// `ManifestDeployer` backed by the `kustomize` binary and the Kubernetes API
#[derive(Clone)]
pub struct KustomizeDeployer {
    client: Client,
    field_manager: String,
}

impl std::fmt::Debug for KustomizeDeployer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KustomizeDeployer")
            .field("field_manager", &self.field_manager)
            .finish_non_exhaustive()
    }
}

impl KustomizeDeployer {
    #[must_use]
    pub fn new(client: Client, field_manager: &str) -> Self {
        Self {
            client,
            field_manager: field_manager.to_string(),
        }
    }

    async fn dynamic_api(
        &self,
        obj: &DynamicObject,
        namespace: &str,
    ) -> Result<(Api<DynamicObject>, bool)> {
        let gvk = object_gvk(obj)?;
        let (ar, caps) = discovery::pinned_kind(&self.client, &gvk)
            .await
            .with_context(|| format!("Failed to discover {}/{}", gvk.group, gvk.kind))?;
        if caps.scope == Scope::Namespaced {
            let ns = obj.metadata.namespace.as_deref().unwrap_or(namespace);
            Ok((Api::namespaced_with(self.client.clone(), ns, &ar), true))
        } else {
            Ok((Api::all_with(self.client.clone(), &ar), false))
        }
    }

    async fn apply_objects(&self, objects: Vec<DynamicObject>, namespace: &str) -> Result<()> {
        let params = PatchParams::apply(&self.field_manager).force();
        for mut obj in objects {
            let name = object_name(&obj)?;
            let (api, namespaced) = self.dynamic_api(&obj, namespace).await?;
            if namespaced && obj.metadata.namespace.is_none() {
                obj.metadata.namespace = Some(namespace.to_string());
            }
            api.patch(&name, &params, &Patch::Apply(&obj))
                .await
                .with_context(|| format!("Failed to apply {} {}", object_kind(&obj), name))?;
            debug!("Applied {} {}", object_kind(&obj), name);
        }
        Ok(())
    }

    async fn remove_objects(
        &self,
        objects: Vec<DynamicObject>,
        namespace: &str,
        component: &str,
    ) -> Result<()> {
        // Reverse render order so dependents go before what they depend on
        for obj in objects.into_iter().rev() {
            let name = object_name(&obj)?;
            let (api, _) = match self.dynamic_api(&obj, namespace).await {
                Ok(resolved) => resolved,
                Err(e) => {
                    // The kind itself is gone (e.g. its CRD was deleted earlier in this pass)
                    debug!("Skipping removal of {} {}: {:#}", object_kind(&obj), name, e);
                    continue;
                }
            };

            let live = api
                .get_opt(&name)
                .await
                .with_context(|| format!("Failed to get {} {}", object_kind(&obj), name))?;
            match live {
                None => {
                    debug!("{} {} already absent", object_kind(&obj), name);
                    continue;
                }
                Some(live) if !is_owned_by(&live.metadata, component) => {
                    info!(
                        "Leaving {} {} in place: not labelled {}=true",
                        object_kind(&obj),
                        name,
                        constants::component_label(component)
                    );
                    continue;
                }
                Some(_) => {}
            }

            match api.delete(&name, &DeleteParams::background()).await {
                Ok(_) => debug!("Deleted {} {}", object_kind(&obj), name),
                Err(kube::Error::Api(api_err)) if api_err.code == 404 => {
                    debug!("{} {} already absent", object_kind(&obj), name);
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Failed to delete {} {}", object_kind(&obj), name)
                    });
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ManifestDeployer for KustomizeDeployer {
    async fn apply_or_remove(
        &self,
        path: &Path,
        namespace: &str,
        component: &str,
        active: bool,
    ) -> Result<()> {
        let span = info_span!(
            "manifests.deploy",
            manifests.path = %path.display(),
            manifests.namespace = namespace,
            component = component,
            active = active
        );

        async move {
            if !path.exists() {
                if active {
                    return Err(anyhow::anyhow!(
                        "Manifest path does not exist: {}",
                        path.display()
                    ));
                }
                // Nothing was ever rendered from here, so there is nothing to tear down
                warn!(
                    "Manifest path {} does not exist, nothing to remove for {}",
                    path.display(),
                    component
                );
                return Ok(());
            }

            let rendered = kustomize_build(path).await?;
            let mut objects = parse_manifests(&rendered)?;
            for obj in &mut objects {
                label_for_component(obj, component);
            }

            info!(
                "{} {} object(s) for {} in namespace {}",
                if active { "Applying" } else { "Removing" },
                objects.len(),
                component,
                namespace
            );

            if active {
                self.apply_objects(objects, namespace).await
            } else {
                self.remove_objects(objects, namespace, component).await
            }
        }
        .instrument(span)
        .await
    }
}

/// Run `kustomize build` on `path` and return the rendered YAML stream
pub async fn kustomize_build(path: &Path) -> Result<String> {
    let start = Instant::now();
    let output = tokio::process::Command::new("kustomize")
        .arg("build")
        .arg(path)
        .output()
        .await
        .context("Failed to execute kustomize build")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Kustomize build failed for {}: {}", path.display(), stderr);
        metrics::increment_kustomize_build_errors_total();
        return Err(anyhow::anyhow!(
            "Kustomize build failed for {}: {stderr}",
            path.display()
        ));
    }

    metrics::observe_kustomize_build_duration(start.elapsed().as_secs_f64());
    String::from_utf8(output.stdout).context("Failed to decode kustomize output as UTF-8")
}

/// Parse a multi-document YAML stream into dynamic objects, skipping empty documents
pub fn parse_manifests(yaml: &str) -> Result<Vec<DynamicObject>> {
    let mut objects = Vec::new();
    for document in serde_yaml::Deserializer::from_str(yaml) {
        let value = serde_yaml::Value::deserialize(document)
            .context("Failed to parse rendered manifest document")?;
        if value.is_null() {
            continue;
        }
        let obj: DynamicObject = serde_yaml::from_value(value)
            .context("Rendered manifest is not a Kubernetes object")?;
        objects.push(obj);
    }
    Ok(objects)
}

/// Mark `obj` as owned by `component`
pub fn label_for_component(obj: &mut DynamicObject, component: &str) {
    obj.metadata
        .labels
        .get_or_insert_with(Default::default)
        .insert(constants::component_label(component), "true".to_string());
}

fn object_gvk(obj: &DynamicObject) -> Result<GroupVersionKind> {
    let types = obj
        .types
        .as_ref()
        .context("Rendered object is missing apiVersion/kind")?;
    let (group, version) = match types.api_version.split_once('/') {
        Some((group, version)) => (group, version),
        None => ("", types.api_version.as_str()),
    };
    Ok(GroupVersionKind::gvk(group, version, &types.kind))
}

fn object_name(obj: &DynamicObject) -> Result<String> {
    obj.metadata
        .name
        .clone()
        .with_context(|| format!("Rendered {} has no metadata.name", object_kind(obj)))
}

fn object_kind(obj: &DynamicObject) -> &str {
    obj.types.as_ref().map_or("object", |t| t.kind.as_str())
}
