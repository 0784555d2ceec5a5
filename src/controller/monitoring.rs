//! # SRE Monitoring Integration
//!
//! On the managed service the platform runs its own Prometheus in the
//! monitoring namespace. Each component contributes an alerting rule file;
//! whether Prometheus loads it is controlled by the `rule_files` list inside
//! the `prometheus.yml` key of the bundled `prometheus-configs.yaml` ConfigMap.

use super::files::write_atomically;
use crate::cluster::ManifestDeployer;
use crate::constants;
use anyhow::{Context, Result};
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const PROMETHEUS_CONFIG_KEY: &str = "prometheus.yml";
const RULE_FILES_KEY: &str = "rule_files";

/// `<root>/monitoring/prometheus/apps`
#[must_use]
pub fn prometheus_apps_dir(manifests_root: &Path) -> PathBuf {
    manifests_root
        .join("monitoring")
        .join("prometheus")
        .join("apps")
}

/// Toggle the component's rule file and (re)apply the Prometheus manifests.
///
/// The Prometheus manifests are always applied, even when `active` is false,
/// so the rule file removal takes effect.
pub async fn integrate(
    deployer: &dyn ManifestDeployer,
    manifests_root: &Path,
    component: &str,
    namespace: &str,
    active: bool,
) -> Result<()> {
    let apps_dir = prometheus_apps_dir(manifests_root);
    let config_path = apps_dir.join("prometheus-configs.yaml");

    let contents = tokio::fs::read_to_string(&config_path)
        .await
        .with_context(|| format!("Failed to read {}", config_path.display()))?;
    let (updated, changed) = toggle_rule_file(&contents, component, active)
        .with_context(|| format!("Failed to update {}", config_path.display()))?;
    if changed {
        write_atomically(&config_path, &updated)?;
        info!(
            "{} {} alerting rules in Prometheus config",
            if active { "Enabled" } else { "Disabled" },
            component
        );
    } else {
        debug!("Prometheus rule files already up to date for {}", component);
    }

    deployer
        .apply_or_remove(
            &apps_dir,
            namespace,
            constants::MONITORING_COMPONENT_NAME,
            true,
        )
        .await
}

/// Add or remove `<component>*.rules` in the embedded `prometheus.yml`.
///
/// Returns the re-serialized ConfigMap and whether anything changed.
pub fn toggle_rule_file(configmap: &str, component: &str, active: bool) -> Result<(String, bool)> {
    let mut document: Value =
        serde_yaml::from_str(configmap).context("Prometheus ConfigMap is not valid YAML")?;
    let embedded = document
        .get_mut("data")
        .and_then(|data| data.get_mut(PROMETHEUS_CONFIG_KEY))
        .with_context(|| format!("ConfigMap has no data.{PROMETHEUS_CONFIG_KEY}"))?;
    let raw = embedded
        .as_str()
        .with_context(|| format!("data.{PROMETHEUS_CONFIG_KEY} is not a string"))?;

    let mut prometheus: Value = serde_yaml::from_str(raw)
        .with_context(|| format!("data.{PROMETHEUS_CONFIG_KEY} is not valid YAML"))?;
    let mapping = prometheus
        .as_mapping_mut()
        .with_context(|| format!("data.{PROMETHEUS_CONFIG_KEY} is not a mapping"))?;

    let entry = format!("{component}*.rules");
    if mapping.get(RULE_FILES_KEY).is_none_or(Value::is_null) {
        mapping.insert(Value::from(RULE_FILES_KEY), Value::Sequence(Vec::new()));
    }
    let rules = mapping
        .get_mut(RULE_FILES_KEY)
        .and_then(Value::as_sequence_mut)
        .with_context(|| format!("{RULE_FILES_KEY} is not a list"))?;

    let present = rules.iter().any(|rule| rule.as_str() == Some(entry.as_str()));
    let changed = match (active, present) {
        (true, false) => {
            rules.push(Value::from(entry));
            true
        }
        (false, true) => {
            rules.retain(|rule| rule.as_str() != Some(entry.as_str()));
            true
        }
        _ => false,
    };

    if !changed {
        return Ok((configmap.to_string(), false));
    }

    *embedded = Value::from(
        serde_yaml::to_string(&prometheus).context("Failed to serialize prometheus.yml")?,
    );
    let rendered = serde_yaml::to_string(&document).context("Failed to serialize ConfigMap")?;
    Ok((rendered, true))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIGMAP: &str = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: prometheus
data:
  prometheus.yml: |
    global:
      scrape_interval: 30s
    rule_files:
      - operator-recording.rules
      - data-science-pipelines-operator*.rules
"#;

    fn rule_files(configmap: &str) -> Vec<String> {
        let document: Value = serde_yaml::from_str(configmap).unwrap();
        let raw = document["data"][PROMETHEUS_CONFIG_KEY].as_str().unwrap();
        let prometheus: Value = serde_yaml::from_str(raw).unwrap();
        prometheus[RULE_FILES_KEY]
            .as_sequence()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect()
    }

    #[test]
    fn test_disable_removes_component_rules() {
        let (updated, changed) =
            toggle_rule_file(CONFIGMAP, "data-science-pipelines-operator", false).unwrap();
        assert!(changed);
        assert_eq!(rule_files(&updated), vec!["operator-recording.rules"]);
    }

    #[test]
    fn test_enable_is_idempotent() {
        let (updated, changed) =
            toggle_rule_file(CONFIGMAP, "data-science-pipelines-operator", true).unwrap();
        assert!(!changed);
        assert_eq!(updated, CONFIGMAP);
    }

    #[test]
    fn test_enable_adds_missing_rule_list() {
        let configmap = "data:\n  prometheus.yml: |\n    global: {}\n";
        let (updated, changed) = toggle_rule_file(configmap, "kserve", true).unwrap();
        assert!(changed);
        assert_eq!(rule_files(&updated), vec!["kserve*.rules"]);
    }

    #[test]
    fn test_missing_prometheus_key_is_an_error() {
        assert!(toggle_rule_file("data: {}\n", "kserve", true).is_err());
    }
}
