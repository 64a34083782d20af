// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Spec file parsing and data types for .devshell.yaml files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::environment::{EnvOp, is_valid_variable_name};
use crate::package::{PackageEntry, is_valid_package_dir, is_valid_package_name, is_valid_version};
use crate::platform::Platform;
use crate::source::Locator;

#[cfg(test)]
#[path = "./spec_test.rs"]
mod spec_test;

/// API version for spec files.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub enum ApiVersion {
    #[default]
    #[serde(rename = "devshell/v0")]
    V0,
}

/// Helper for two-stage deserialization to determine API version first.
#[derive(Deserialize)]
struct ApiVersionMapping {
    #[serde(default)]
    api: ApiVersion,
}

/// Where the language toolchain descriptor lives and how it is exposed.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ToolchainDecl {
    /// Path to `rust-toolchain.toml` (or legacy `rust-toolchain`).
    /// Relative paths are resolved against the declaring spec file.
    pub file: PathBuf,

    /// Name of the package that provides the toolchain, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,

    /// Source the toolchain package is taken from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// The package collection the overlay chain starts from.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct BaseSection {
    /// Default source for base packages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub packages: IndexMap<String, PackageEntry>,
}

/// One overlay as written in a spec file.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct OverlaySpec {
    pub name: String,

    /// Default source for packages this overlay defines.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default)]
    pub packages: IndexMap<String, PackageEntry>,
}

/// The shell output: which packages to expose and which variables to export.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ShellSection {
    /// Interactive tools available in the shell.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,

    /// Libraries needed at link time; also exposed in the shell.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub link_deps: Vec<String>,

    /// Variable holding the joined library paths of `link_deps`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub library_path_var: Option<String>,

    /// Environment variable operations (set, prepend, append, comment).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environment: Vec<EnvOp>,
}

/// Main specification from a .devshell.yaml file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct DevSpec {
    /// API version identifier.
    pub api: ApiVersion,

    /// Optional human-readable description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// In-tree inheritance control.
    /// When false (default), stops walking up directory tree.
    /// When true, discovers .devshell.yaml files in parent directories.
    #[serde(default)]
    pub inherit: bool,

    /// Out-of-tree includes loaded before this file.
    /// Can use absolute paths, home-relative (~/) paths, or relative paths.
    /// Relative paths are resolved relative to this file's directory.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub includes: Vec<String>,

    /// Root directory for computed package store paths.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub store_dir: Option<PathBuf>,

    /// Platforms the shell is evaluated for.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<Platform>,

    /// Platform used by `devshell shell` when none is requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_platform: Option<Platform>,

    /// Named, revision-pinned package sources.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub sources: BTreeMap<String, Locator>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<ToolchainDecl>,

    #[serde(default)]
    pub base: BaseSection,

    /// Overlays, applied in order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overlays: Vec<OverlaySpec>,

    #[serde(default)]
    pub shell: ShellSection,

    /// Path to the file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl DevSpec {
    /// Parse spec from YAML string.
    pub fn from_yaml<S: Into<String>>(yaml: S) -> crate::Result<Self> {
        let yaml = yaml.into();

        // Stage 1: Parse to get API version
        let value: serde_yaml::Value =
            serde_yaml::from_str(&yaml).map_err(|e| crate::Error::InvalidYaml {
                error: e,
                yaml_content: yaml.clone(),
            })?;

        let with_version: ApiVersionMapping =
            serde_yaml::from_value(value.clone()).map_err(|e| crate::Error::InvalidYaml {
                error: e,
                yaml_content: yaml.clone(),
            })?;

        // Stage 2: Deserialize based on version
        let spec: Self = match with_version.api {
            ApiVersion::V0 => {
                serde_yaml::from_value(value).map_err(|e| crate::Error::InvalidYaml {
                    error: e,
                    yaml_content: yaml,
                })?
            }
        };
        spec.validate_shape()?;
        Ok(spec)
    }

    /// Load spec from file path.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| crate::Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut spec = Self::from_yaml(yaml)?;
        spec.source_path = Some(path.to_path_buf());
        spec.resolve_toolchain_path();
        Ok(spec)
    }

    /// Checks that only need the parsed document.
    fn validate_shape(&self) -> crate::Result<()> {
        let mut seen = std::collections::HashSet::new();
        for overlay in &self.overlays {
            if overlay.name.trim().is_empty() {
                return Err(crate::Error::ValidationFailed(
                    "overlay names must not be empty".to_string(),
                ));
            }
            if !seen.insert(overlay.name.as_str()) {
                return Err(crate::Error::ValidationFailed(format!(
                    "overlay '{}' is declared more than once",
                    overlay.name
                )));
            }
        }

        validate_packages("base", &self.base.packages)?;
        for overlay in &self.overlays {
            validate_packages(&format!("overlay '{}'", overlay.name), &overlay.packages)?;
        }

        let shell_names = self.shell.tools.iter().chain(&self.shell.link_deps);
        let toolchain_name = self.toolchain.as_ref().and_then(|t| t.package.as_ref());
        for name in shell_names.chain(toolchain_name) {
            if !is_valid_package_name(name) {
                return Err(crate::Error::ValidationFailed(format!(
                    "'{name}' is not a valid package name"
                )));
            }
        }

        let variables = self
            .shell
            .environment
            .iter()
            .filter_map(EnvOp::variable)
            .chain(self.shell.library_path_var.as_deref());
        for var in variables {
            if !is_valid_variable_name(var) {
                return Err(crate::Error::ValidationFailed(format!(
                    "'{var}' is not a valid environment variable name"
                )));
            }
        }
        Ok(())
    }

    /// Make a relative toolchain path absolute using this spec's directory.
    fn resolve_toolchain_path(&mut self) {
        let Some(base_dir) = self.source_path.as_ref().and_then(|p| p.parent()) else {
            return;
        };
        if let Some(toolchain) = self.toolchain.as_mut() {
            if toolchain.file.is_relative() {
                toolchain.file = base_dir.join(&toolchain.file);
            }
        }
    }

    /// Resolve relative includes to absolute paths.
    pub fn resolve_includes(&self) -> crate::Result<Vec<PathBuf>> {
        let base_dir = self
            .source_path
            .as_ref()
            .and_then(|p| p.parent())
            .ok_or_else(|| {
                crate::Error::ValidationFailed(
                    "Cannot resolve includes without source_path".to_string(),
                )
            })?;

        self.includes
            .iter()
            .map(|include| crate::discovery::resolve_include_path(include, Some(base_dir)))
            .collect()
    }
}

/// Check the names, versions and directories of a package map.
fn validate_packages(
    section: &str,
    packages: &IndexMap<String, PackageEntry>,
) -> crate::Result<()> {
    for (name, entry) in packages {
        if !is_valid_package_name(name) {
            return Err(crate::Error::ValidationFailed(format!(
                "{section} declares '{name}', which is not a valid package name"
            )));
        }
        let def = entry.to_def();
        if let Some(version) = def.version.as_deref().filter(|v| !is_valid_version(v)) {
            return Err(crate::Error::ValidationFailed(format!(
                "{section} package '{name}' has an invalid version '{version}'"
            )));
        }
        for dir in def.lib_dir.iter().chain(&def.bin_dir) {
            if !is_valid_package_dir(dir) {
                return Err(crate::Error::ValidationFailed(format!(
                    "{section} package '{name}' directory '{dir}' must be relative to the package"
                )));
            }
        }
    }
    Ok(())
}
