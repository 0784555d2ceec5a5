//! # Reconciler
//!
//! Orchestrates one pass of the pipelines component.

mod reconcile;
mod types;

pub use reconcile::{PipelinesReconciler, ReconcilerSettings};
pub use types::{BackoffState, ErrorKind, ReconcileError, ReconcileOutcome};
