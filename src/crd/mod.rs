//! # Custom Resource Definitions
//!
//! CRD types for the pipelines component controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `DataSciencePipelines` specification, management state and developer overrides
//! - `platform.rs` - Platform context supplied to every reconcile pass
//! - `status.rs` - Status types for tracking reconciliation state

mod platform;
mod spec;
mod status;

// Re-export all public types
pub use platform::{MonitoringSpec, Platform, PlatformContext};
pub use spec::{
    default_context_dir, DataSciencePipelines, DataSciencePipelinesSpec, DevFlags,
    ManagementState, ManifestSource,
};
pub use status::{upsert_condition, Condition, DataSciencePipelinesStatus};
