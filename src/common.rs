// Copyright 2022 VMware, Inc.
// SPDX-License-Identifier: MIT
use crate::app_types::App;
use crate::kubernetes_api_objects::common::ObjectKey;
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

pub const OPERATOR_NAME: &str = "bundle-operator";
pub const MANAGED_BY_LABEL: &str = "giantswarm.io/managed-by";
pub const HELM_RELEASE_NAME_ANNOTATION: &str = "meta.helm.sh/release-name";
pub const COMPANION_SUFFIX: &str = "-bundle-operator-config";
pub const VALUES_KEY: &str = "values";
pub const DEFAULT_ORG_NAMESPACE: &str = "org-giantswarm";

pub const EXTRA_CONFIG_KIND: &str = "configMap";
pub const EXTRA_CONFIG_PRIORITY: i32 = 25;

pub const LEGACY_SECURITY_BUNDLE: &str = "security-bundle";
pub const LEGACY_TARGET_VERSION: &str = "1.15.0";

/// Normalizes an application name to the registry key convention (lower camel case).
///
/// `-`, `_`, `.` and spaces separate words and are dropped, as is any other
/// non-alphanumeric character. The letter after a separator or a digit is
/// upper-cased, and an upper-case letter following another one is
/// lower-cased, so `security-bundle`, `SECURITY_BUNDLE`, `SecurityBundle` and
/// `securityBundle` all map to `securityBundle`.
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut cap_next = false;
    let mut prev_is_upper = false;
    for (i, c) in name.trim().chars().enumerate() {
        let is_upper = c.is_ascii_uppercase();
        let is_lower = c.is_ascii_lowercase();
        let c = if cap_next {
            c.to_ascii_uppercase()
        } else if i == 0 || (prev_is_upper && is_upper) {
            c.to_ascii_lowercase()
        } else {
            c
        };
        prev_is_upper = is_upper;
        if is_upper || is_lower {
            out.push(c);
            cap_next = false;
        } else if c.is_ascii_digit() {
            out.push(c);
            cap_next = true;
        } else {
            cap_next = matches!(c, '-' | '_' | '.' | ' ');
        }
    }
    out
}

pub fn companion_config_map_name(app_name: &str) -> String {
    format!("{}{}", app_name, COMPANION_SUFFIX)
}

pub fn companion_config_map_key(app_name: &str, app_namespace: &str) -> ObjectKey {
    ObjectKey::new(app_namespace, companion_config_map_name(app_name))
}

/// Reports whether the App is an item deployed by a bundle release.
///
/// Such Apps carry a Helm release-name annotation equal to their managed-by
/// label. Bundle entry points managed by a cluster chart carry different
/// values and are not members.
pub fn is_bundle_member(app: &App) -> bool {
    let release_name = app
        .metadata
        .annotations
        .as_ref()
        .and_then(|annotations| annotations.get(HELM_RELEASE_NAME_ANNOTATION));
    let managed_by = app
        .metadata
        .labels
        .as_ref()
        .and_then(|labels| labels.get(MANAGED_BY_LABEL));
    match (release_name, managed_by) {
        (Some(release_name), Some(managed_by)) => release_name == managed_by,
        _ => false,
    }
}

pub fn is_legacy_security_bundle(app: &App) -> bool {
    if app.spec.name != LEGACY_SECURITY_BUNDLE {
        return false;
    }
    match (app.spec.version.parse::<Version>(), LEGACY_TARGET_VERSION.parse::<Version>()) {
        (Ok(current), Ok(target)) => current < target,
        (Err(err), _) => {
            tracing::warn!(
                version = %app.spec.version,
                error = %err,
                "Cannot parse security-bundle version, skipping migration"
            );
            false
        }
        (_, Err(_)) => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid version {0:?}")]
pub struct VersionParseError(pub String);

/// A semantic version: `MAJOR.MINOR.PATCH` with an optional pre-release.
///
/// A leading `v` and build metadata (`+...`) are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<String>,
}

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || VersionParseError(input.to_string());
        let trimmed = input.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let without_build = trimmed.split('+').next().unwrap_or_default();
        let (core, pre) = match without_build.split_once('-') {
            Some((core, pre)) => (core, Some(pre)),
            None => (without_build, None),
        };

        let mut parts = core.split('.');
        let mut next_number = || -> Result<u64, VersionParseError> {
            parts
                .next()
                .ok_or_else(|| invalid())?
                .parse::<u64>()
                .map_err(|_| invalid())
        };
        let major = next_number()?;
        let minor = next_number()?;
        let patch = next_number()?;
        if parts.next().is_some() {
            return Err(invalid());
        }

        let pre = match pre {
            Some(pre) if pre.is_empty() || pre.split('.').any(str::is_empty) => return Err(invalid()),
            Some(pre) => pre.split('.').map(str::to_string).collect(),
            None => Vec::new(),
        };

        Ok(Version {
            major,
            minor,
            patch,
            pre,
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        if !self.pre.is_empty() {
            write!(f, "-{}", self.pre.join("."))?;
        }
        Ok(())
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch)
            .cmp(&(other.major, other.minor, other.patch))
            .then_with(|| compare_pre_release(&self.pre, &other.pre))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// A release sorts after any of its pre-releases.
fn compare_pre_release(a: &[String], b: &[String]) -> Ordering {
    match (a.is_empty(), b.is_empty()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Greater,
        (false, true) => return Ordering::Less,
        (false, false) => {}
    }
    for (x, y) in a.iter().zip(b.iter()) {
        let ordering = match (x.parse::<u64>(), y.parse::<u64>()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => x.cmp(y),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.len().cmp(&b.len())
}
