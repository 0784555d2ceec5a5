//! # Manifest Fetcher
//!
//! Downloads a developer-supplied manifest tarball (for example
//! `https://github.com/<org>/<repo>/tarball/<ref>`), extracts it into a
//! staging directory and copies the `contextDir` subtree into
//! `<manifests_root>/<component>`.
//!
//! Tarballs produced by source forges wrap everything in a single top-level
//! directory (`<org>-<repo>-<sha>/`); `contextDir` is resolved below it.

use super::ManifestFetcher;
use crate::crd::ManifestSource;
use crate::observability::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, Instrument};
use walkdir::WalkDir;

/// `ManifestFetcher` downloading gzip'd tarballs over HTTPS
#[derive(Debug, Clone)]
pub struct TarballFetcher {
    http: reqwest::Client,
}

impl TarballFetcher {
    /// Create a fetcher whose downloads time out after `timeout`
    pub fn new(timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self { http })
    }

    async fn download(&self, uri: &str, destination: &Path) -> Result<u64> {
        let response = self
            .http
            .get(uri)
            .send()
            .await
            .with_context(|| format!("Failed to download manifests from {uri}"))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!(
                "Error downloading manifests from {uri}: HTTP {}",
                status.as_u16()
            ));
        }

        let body = response
            .bytes()
            .await
            .with_context(|| format!("Failed to read manifest archive body from {uri}"))?;
        verify_gzip_magic(&body)?;

        tokio::fs::write(destination, &body)
            .await
            .with_context(|| format!("Failed to write archive to {}", destination.display()))?;
        Ok(body.len() as u64)
    }
}

#[async_trait]
impl ManifestFetcher for TarballFetcher {
    async fn fetch(
        &self,
        manifests_root: &Path,
        component: &str,
        source: &ManifestSource,
    ) -> Result<()> {
        let span = info_span!(
            "manifests.fetch",
            manifests.uri = %source.uri,
            manifests.context_dir = %source.context_dir,
            component = component
        );

        async move {
            let start = Instant::now();
            metrics::increment_manifest_fetches_total();
            let result: Result<()> = async {
                validate_relative(&source.context_dir)?;

                let staging = tempfile::tempdir().context("Failed to create staging directory")?;
                let archive = staging.path().join("manifests.tar.gz");
                let size = self.download(&source.uri, &archive).await?;
                debug!("Downloaded {} bytes from {}", size, source.uri);

                let extracted = staging.path().join("extracted");
                extract_archive(&archive, &extracted).await?;

                let destination = manifests_root.join(component);
                let context_dir = source.context_dir.clone();
                let copied = tokio::task::spawn_blocking(move || {
                    copy_context_dir(&extracted, &context_dir, &destination)
                })
                .await
                .context("Manifest copy task panicked")??;

                info!(
                    "Fetched {} manifest file(s) for {} from {} in {:.2}s",
                    copied,
                    component,
                    source.uri,
                    start.elapsed().as_secs_f64()
                );
                Ok(())
            }
            .await;

            if let Err(ref e) = result {
                error!("Manifest fetch for {} failed: {:#}", component, e);
                metrics::increment_manifest_fetch_errors_total();
            }
            result
        }
        .instrument(span)
        .await
    }
}

/// Reject gzip-less payloads early (e.g. an HTML error page served with 200)
fn verify_gzip_magic(body: &[u8]) -> Result<()> {
    if body.len() < 2 || body[0] != 0x1f || body[1] != 0x8b {
        return Err(anyhow::anyhow!(
            "Invalid manifest archive: expected gzip'd tarball"
        ));
    }
    Ok(())
}

/// Extract a tar.gz archive into `destination` using the system `tar`
async fn extract_archive(archive: &Path, destination: &Path) -> Result<()> {
    tokio::fs::create_dir_all(destination)
        .await
        .with_context(|| format!("Failed to create {}", destination.display()))?;

    let output = tokio::process::Command::new("tar")
        .arg("-xzf")
        .arg(archive)
        .arg("-C")
        .arg(destination)
        .arg("--no-same-owner")
        .output()
        .await
        .context("Failed to execute tar command")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow::anyhow!(
            "Failed to extract manifest archive: {stderr}"
        ));
    }
    Ok(())
}

fn validate_relative(context_dir: &str) -> Result<()> {
    let escapes = Path::new(context_dir)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(anyhow::anyhow!(
            "contextDir must be a relative path inside the repository: {context_dir}"
        ));
    }
    Ok(())
}

/// Copy `<extracted>/<top-level dir>/<context_dir>` into `destination`.
///
/// Existing files at the destination are overwritten; files not present in
/// the archive are left alone. Returns the number of files copied.
pub fn copy_context_dir(extracted: &Path, context_dir: &str, destination: &Path) -> Result<usize> {
    validate_relative(context_dir)?;
    let root = archive_root(extracted)?;
    let source = root.join(context_dir);
    if !source.is_dir() {
        return Err(anyhow::anyhow!(
            "contextDir '{}' not found in manifest archive",
            context_dir
        ));
    }

    let mut copied = 0;
    for entry in WalkDir::new(&source).follow_links(false) {
        let entry = entry.context("Failed to walk extracted manifests")?;
        let relative = entry
            .path()
            .strip_prefix(&source)
            .context("Extracted entry outside of contextDir")?;
        let target = destination.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create {}", target.display()))?;
        } else if entry.file_type().is_file() {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
            std::fs::copy(entry.path(), &target)
                .with_context(|| format!("Failed to copy to {}", target.display()))?;
            copied += 1;
        }
    }
    Ok(copied)
}

/// Single top-level directory of an extracted forge tarball
fn archive_root(extracted: &Path) -> Result<PathBuf> {
    let mut dirs = std::fs::read_dir(extracted)
        .with_context(|| format!("Failed to read {}", extracted.display()))?
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.path());

    match (dirs.next(), dirs.next()) {
        (Some(root), None) => Ok(root),
        (None, _) => Err(anyhow::anyhow!("Manifest archive is empty")),
        (Some(_), Some(_)) => Err(anyhow::anyhow!(
            "Manifest archive has more than one top-level directory"
        )),
    }
}
