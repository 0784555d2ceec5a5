//! # Instance Selection
//!
//! `DataSciencePipelines` is cluster-scoped but drives a single component
//! installation. When several objects exist, the oldest one is reconciled and
//! the others are reported as failed.

use crate::crd::DataSciencePipelines;
use kube::ResourceExt;

/// Name of the object that owns the component, if any.
///
/// Objects being deleted are skipped. Ties on creation time go to the
/// lexicographically smallest name.
#[must_use]
pub fn primary_instance(instances: &[DataSciencePipelines]) -> Option<String> {
    instances
        .iter()
        .filter(|dsp| dsp.metadata.deletion_timestamp.is_none())
        .min_by(|a, b| {
            a.metadata
                .creation_timestamp
                .cmp(&b.metadata.creation_timestamp)
                .then_with(|| a.name_any().cmp(&b.name_any()))
        })
        .map(ResourceExt::name_any)
}
