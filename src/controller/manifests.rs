//! # Manifest Source Selection
//!
//! Decides which kustomize directory a pass renders:
//!
//! - a developer override fetched into `<root>/<component>/<sourcePath|base>`
//! - otherwise the environment overlay `<root>/<component>/overlays/{odh,rhoai}`
//!
//! The chosen location is returned as a value and threaded through the rest
//! of the pass.

use crate::cluster::ManifestFetcher;
use crate::constants;
use crate::crd::{ManifestSource, Platform};
use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::info;

/// Environment-specific overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlay {
    /// `overlays/odh`
    Community,
    /// `overlays/rhoai`
    Enterprise,
}

impl Overlay {
    /// Overlay for `platform`; an unset platform selects the community overlay
    #[must_use]
    pub fn for_platform(platform: Platform) -> Self {
        if platform.is_enterprise() {
            Overlay::Enterprise
        } else {
            Overlay::Community
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Overlay::Community => "odh",
            Overlay::Enterprise => "rhoai",
        }
    }
}

/// Where manifests are rendered from in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestLocation {
    /// Bundled overlay for the platform
    Overlay { path: PathBuf, overlay: Overlay },
    /// Developer-supplied tree
    Override { path: PathBuf },
}

impl ManifestLocation {
    /// Directory handed to the deployer
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ManifestLocation::Overlay { path, .. } | ManifestLocation::Override { path } => path,
        }
    }

    #[must_use]
    pub fn is_override(&self) -> bool {
        matches!(self, ManifestLocation::Override { .. })
    }

    /// Overlay name, or `override` for developer trees
    #[must_use]
    pub fn describe(&self) -> &'static str {
        match self {
            ManifestLocation::Overlay { overlay, .. } => overlay.as_str(),
            ManifestLocation::Override { .. } => "override",
        }
    }
}

/// `<root>/<component>/base`, the directory holding `params.env`
#[must_use]
pub fn base_path(manifests_root: &Path, component: &str) -> PathBuf {
    manifests_root
        .join(component)
        .join(constants::DEFAULT_KUSTOMIZE_SOURCE_PATH)
}

/// Bundled overlay location for `platform`
#[must_use]
pub fn overlay_location(manifests_root: &Path, component: &str, platform: Platform) -> ManifestLocation {
    let overlay = Overlay::for_platform(platform);
    ManifestLocation::Overlay {
        path: manifests_root
            .join(component)
            .join("overlays")
            .join(overlay.as_str()),
        overlay,
    }
}

/// Fetch `source` and return the kustomize directory inside it.
///
/// Fetch failures propagate unchanged; there is no fallback to the bundled
/// manifests.
pub async fn resolve_override(
    fetcher: &dyn ManifestFetcher,
    manifests_root: &Path,
    component: &str,
    source: &ManifestSource,
) -> Result<ManifestLocation> {
    fetcher.fetch(manifests_root, component, source).await?;

    let source_path = source
        .source_path
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(constants::DEFAULT_KUSTOMIZE_SOURCE_PATH);
    let path = manifests_root.join(component).join(source_path);
    info!(
        "Using manifest override from {} at {}",
        source.uri,
        path.display()
    );
    Ok(ManifestLocation::Override { path })
}
