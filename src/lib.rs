//! Data Science Pipelines Component Controller Library
//!
//! Reconciles the Data Science Pipelines component of an Open Data Hub
//! platform: image parameters, manifest overlay selection, the Argo Workflows
//! conflict guard, apply or teardown, readiness and SRE monitoring wiring.
//!
//! The reconciliation core in [`controller`] depends only on the collaborator
//! traits in [`cluster`]; [`runtime`] binds it to a kube-runtime `Controller`.

pub mod cluster;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod runtime;
