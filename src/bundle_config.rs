// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::common::canonical_name;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read bundle config {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse bundle config: {0}")]
    ParseFailed(#[from] serde_yaml::Error),

    #[error("No bundles found in bundle config")]
    Empty,

    #[error("Bundles {first:?} and {second:?} both normalize to {canonical:?}")]
    DuplicateBundle {
        first: String,
        second: String,
        canonical: String,
    },
}

/// ExtraConfig is one values source handed down to a bundled app.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ExtraConfig {
    pub kind: String,
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub priority: i32,
}

/// BundleApp is the policy for one app deployed by a bundle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleApp {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub namespace: String,
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra_configs: Vec<ExtraConfig>,
}

/// BundleConfig is the registry entry of one bundle: its apps keyed by name.
///
/// It is also the document stored under `values` in the companion ConfigMap,
/// so a stored document of any other shape decodes to no apps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct BundleConfig {
    #[serde(default)]
    pub apps: BTreeMap<String, BundleApp>,
}

/// One top-level entry of the bundle config file.
#[derive(Debug, Clone, Default, Deserialize)]
struct BundleDefinition {
    #[serde(default)]
    bundles: BundleConfig,
}

/// BundleRegistry maps canonical bundle names to their configuration.
///
/// It is built once at startup and never mutated, so concurrent
/// reconciliations share it through an `Arc` without locking.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleRegistry {
    bundles: BTreeMap<String, BundleConfig>,
}

impl BundleRegistry {
    pub fn load(path: impl AsRef<Path>) -> Result<BundleRegistry, ConfigError> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = BundleRegistry::from_yaml(&yaml)?;
        tracing::info!(
            path = %path.display(),
            bundles = registry.len(),
            "Loaded bundle config"
        );
        Ok(registry)
    }

    pub fn from_yaml(yaml: &str) -> Result<BundleRegistry, ConfigError> {
        let definitions: Option<BTreeMap<String, BundleDefinition>> = serde_yaml::from_str(yaml)?;
        let bundles = definitions
            .unwrap_or_default()
            .into_iter()
            .map(|(name, definition)| (name, definition.bundles))
            .collect();
        BundleRegistry::from_bundles(bundles)
    }

    /// Builds a registry from bundles keyed by name as written; names are
    /// normalized with [`canonical_name`].
    pub fn from_bundles(bundles: BTreeMap<String, BundleConfig>) -> Result<BundleRegistry, ConfigError> {
        if bundles.is_empty() {
            return Err(ConfigError::Empty);
        }
        let mut originals: BTreeMap<String, String> = BTreeMap::new();
        let mut normalized = BTreeMap::new();
        for (name, bundle) in bundles {
            let canonical = canonical_name(&name);
            if let Some(first) = originals.get(&canonical) {
                return Err(ConfigError::DuplicateBundle {
                    first: first.clone(),
                    second: name,
                    canonical,
                });
            }
            originals.insert(canonical.clone(), name);
            normalized.insert(canonical, bundle);
        }
        Ok(BundleRegistry { bundles: normalized })
    }

    /// Looks up a bundle by the App's declared application name.
    pub fn get(&self, app_spec_name: &str) -> Option<&BundleConfig> {
        self.bundles.get(&canonical_name(app_spec_name))
    }

    pub fn contains(&self, app_spec_name: &str) -> bool {
        self.get(app_spec_name).is_some()
    }

    pub fn len(&self) -> usize {
        self.bundles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bundles.is_empty()
    }

    pub fn bundle_names(&self) -> impl Iterator<Item = &str> {
        self.bundles.keys().map(String::as_str)
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn is_zero(value: &i32) -> bool {
    *value == 0
}
