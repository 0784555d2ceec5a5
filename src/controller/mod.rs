//! # Controller
//!
//! Reconciliation logic for the Data Science Pipelines component.
//!
//! - `reconciler`: the per-pass orchestration
//! - `images`: `RELATED_IMAGE_*` injection into `params.env`
//! - `manifests`: overlay / developer override selection
//! - `conflict`: Argo Workflows ownership guard
//! - `files`: atomic rewrites of manifest files
//! - `readiness`: bounded deployment readiness poll
//! - `monitoring`: SRE Prometheus rule wiring
//! - `backoff`: retry delays for failed passes
//! - `server`: metrics and probe endpoints

pub mod backoff;
pub mod conflict;
pub mod files;
pub mod images;
pub mod manifests;
pub mod monitoring;
pub mod readiness;
pub mod reconciler;
pub mod server;
