//! # Image Parameters
//!
//! Maps the component's logical image slots to the `RELATED_IMAGE_*`
//! variables published by the operator deployment and writes the resolved
//! references into the kustomize `params.env` of a manifest directory.

use super::files::write_atomically;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// Name of the kustomize parameter file inside a manifest directory
pub const PARAMS_FILE: &str = "params.env";

/// Logical image slot → environment variable holding the image reference
pub const IMAGE_PARAMS: [(&str, &str); 9] = [
    (
        "IMAGES_DSPO",
        "RELATED_IMAGE_ODH_DATA_SCIENCE_PIPELINES_OPERATOR_CONTROLLER_IMAGE",
    ),
    (
        "IMAGES_APISERVER",
        "RELATED_IMAGE_ODH_ML_PIPELINES_API_SERVER_V2_IMAGE",
    ),
    (
        "IMAGES_PERSISTENCEAGENT",
        "RELATED_IMAGE_ODH_ML_PIPELINES_PERSISTENCEAGENT_V2_IMAGE",
    ),
    (
        "IMAGES_SCHEDULEDWORKFLOW",
        "RELATED_IMAGE_ODH_ML_PIPELINES_SCHEDULEDWORKFLOW_V2_IMAGE",
    ),
    (
        "IMAGES_ARGO_EXEC",
        "RELATED_IMAGE_ODH_DATA_SCIENCE_PIPELINES_ARGO_ARGOEXEC_IMAGE",
    ),
    (
        "IMAGES_ARGO_WORKFLOWCONTROLLER",
        "RELATED_IMAGE_ODH_DATA_SCIENCE_PIPELINES_ARGO_WORKFLOWCONTROLLER_IMAGE",
    ),
    (
        "IMAGES_DRIVER",
        "RELATED_IMAGE_ODH_ML_PIPELINES_DRIVER_IMAGE",
    ),
    (
        "IMAGES_LAUNCHER",
        "RELATED_IMAGE_ODH_ML_PIPELINES_LAUNCHER_IMAGE",
    ),
    (
        "IMAGES_MLMDGRPC",
        "RELATED_IMAGE_ODH_MLMD_GRPC_SERVER_IMAGE",
    ),
];

/// Lookup used to read image variables; `std::env::var` in production
pub type EnvLookup = dyn Fn(&str) -> Option<String> + Send + Sync;

/// Read the process environment
#[must_use]
pub fn process_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Resolve every slot whose variable is set to a non-empty value.
///
/// Unset slots are skipped with a warning; the bundled default in
/// `params.env` stays in effect for them.
pub fn resolve_images(lookup: &EnvLookup) -> BTreeMap<String, String> {
    let mut resolved = BTreeMap::new();
    for (slot, variable) in IMAGE_PARAMS {
        match lookup(variable).map(|v| v.trim().to_string()) {
            Some(image) if !image.is_empty() => {
                resolved.insert(slot.to_string(), image);
            }
            _ => warn!(
                "Image variable {} is not set, keeping bundled value for {}",
                variable, slot
            ),
        }
    }
    resolved
}

/// Rewrite `<dir>/params.env`, replacing the values of keys present in `mapping`.
///
/// Only keys already in the file are touched; comments, ordering and unknown
/// keys are preserved. A missing file is not an error. Returns the number of
/// replaced entries.
pub fn apply_params(dir: &Path, mapping: &BTreeMap<String, String>) -> Result<usize> {
    let params_path = dir.join(PARAMS_FILE);
    if !params_path.is_file() {
        debug!("No {} in {}, skipping image injection", PARAMS_FILE, dir.display());
        return Ok(0);
    }

    let contents = std::fs::read_to_string(&params_path)
        .with_context(|| format!("Failed to read {}", params_path.display()))?;
    let (rewritten, replaced) = rewrite_params(&contents, mapping);
    if replaced == 0 {
        return Ok(0);
    }

    write_atomically(&params_path, &rewritten)?;

    debug!(
        "Updated {} image parameter(s) in {}",
        replaced,
        params_path.display()
    );
    Ok(replaced)
}

fn rewrite_params(contents: &str, mapping: &BTreeMap<String, String>) -> (String, usize) {
    let mut replaced = 0;
    let mut out = String::with_capacity(contents.len());
    for line in contents.lines() {
        let replacement = line
            .split_once('=')
            .filter(|_| !line.trim_start().starts_with('#'))
            .and_then(|(key, _)| mapping.get_key_value(key.trim()));
        match replacement {
            Some((key, value)) => {
                out.push_str(key);
                out.push('=');
                out.push_str(value);
                replaced += 1;
            }
            None => out.push_str(line),
        }
        out.push('\n');
    }
    (out, replaced)
}
