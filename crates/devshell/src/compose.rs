// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Composition of a final package set into an environment descriptor.

use std::collections::BTreeMap;
use std::path::PathBuf;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::environment::{EnvOp, is_valid_variable_name};
use crate::overlay::PackageSet;
use crate::package::{Package, View};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./compose_test.rs"]
mod compose_test;

/// Variable that receives the joined library paths when none is configured.
pub const DEFAULT_LIBRARY_PATH_VAR: &str = "LD_LIBRARY_PATH";

/// Separator used to join library paths.
pub const LIBRARY_PATH_SEPARATOR: &str = ":";

const PACKAGE_PLACEHOLDER: &str = "${pkgs.";

/// Environment variables to compute for a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvTemplate {
    /// Variable set to the library paths of the link dependencies.
    pub library_path_var: String,
    /// Operations on every other variable, in order.
    pub operations: Vec<EnvOp>,
}

impl Default for EnvTemplate {
    fn default() -> Self {
        Self {
            library_path_var: DEFAULT_LIBRARY_PATH_VAR.to_string(),
            operations: Vec::new(),
        }
    }
}

impl EnvTemplate {
    pub fn new(operations: Vec<EnvOp>) -> Self {
        Self {
            operations,
            ..Default::default()
        }
    }

    pub fn with_library_path_var<S: Into<String>>(mut self, var: S) -> Self {
        self.library_path_var = var.into();
        self
    }

    /// Check that every variable can be exported by a shell.
    ///
    /// The library path variable holds exactly the link dependencies' library
    /// directories, so no operation may target it.
    pub fn validate(&self) -> Result<()> {
        if !is_valid_variable_name(&self.library_path_var) {
            return Err(Error::ValidationFailed(format!(
                "'{}' is not a valid library path variable name",
                self.library_path_var
            )));
        }
        for var in self.operations.iter().filter_map(EnvOp::variable) {
            if !is_valid_variable_name(var) {
                return Err(Error::ValidationFailed(format!(
                    "'{var}' is not a valid environment variable name"
                )));
            }
            if var == self.library_path_var {
                return Err(Error::ValidationFailed(format!(
                    "{var} is computed from shell link_deps and cannot be set by an operation"
                )));
            }
        }
        Ok(())
    }
}

/// A package as exposed by a shell.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ShellPackage {
    pub name: String,
    pub version: String,
    pub out_path: PathBuf,
}

impl From<&Package> for ShellPackage {
    fn from(package: &Package) -> Self {
        Self {
            name: package.name.clone(),
            version: package.version.clone(),
            out_path: package.out_path.clone(),
        }
    }
}

/// Everything needed to materialize a shell for one platform.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EnvironmentDescriptor {
    /// Union of the tools and link dependencies, first occurrence first.
    pub packages: Vec<ShellPackage>,
    /// Link dependencies in declared order.
    pub build_inputs: Vec<ShellPackage>,
    /// Executable directories, to be prepended to `PATH`.
    pub path: Vec<PathBuf>,
    /// Computed variable assignments.
    pub variables: BTreeMap<String, String>,
}

impl EnvironmentDescriptor {
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.packages.iter().map(|p| p.name.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.iter().any(|p| p.name == name)
    }
}

/// Combine the final package set with the shell's package lists and
/// variable template.
///
/// Only values are computed here; nothing is exported to a live process.
pub fn compose(
    final_set: &PackageSet,
    tools: &[String],
    link_deps: &[String],
    template: &EnvTemplate,
) -> Result<EnvironmentDescriptor> {
    template.validate()?;

    let mut names: IndexSet<&str> = IndexSet::new();
    let mut packages = Vec::new();
    for (name, required_by) in tools
        .iter()
        .map(|t| (t, "shell tools"))
        .chain(link_deps.iter().map(|l| (l, "shell link_deps")))
    {
        if names.insert(name.as_str()) {
            packages.push(lookup(final_set, name, required_by)?);
        }
    }

    let build_inputs = link_deps
        .iter()
        .map(|name| lookup(final_set, name, "shell link_deps"))
        .collect::<Result<Vec<_>>>()?;

    let mut variables = BTreeMap::new();
    if !build_inputs.is_empty() {
        let library_path = build_inputs
            .iter()
            .map(|p| p.lib_path().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(LIBRARY_PATH_SEPARATOR);
        variables.insert(template.library_path_var.clone(), library_path);
    }

    for op in &template.operations {
        let (Some(var), Some(raw)) = (op.variable(), op.value()) else {
            continue;
        };
        let value = interpolate(raw, final_set, var)?;
        op.apply_to(&mut variables, value);
    }

    tracing::debug!(
        packages = packages.len(),
        variables = variables.len(),
        "composed environment"
    );

    Ok(EnvironmentDescriptor {
        path: packages.iter().map(|p| p.bin_path()).collect(),
        packages: packages.into_iter().map(ShellPackage::from).collect(),
        build_inputs: build_inputs.into_iter().map(ShellPackage::from).collect(),
        variables,
    })
}

fn lookup<'a>(final_set: &'a PackageSet, name: &str, required_by: &str) -> Result<&'a Package> {
    final_set
        .get(name)
        .map(|p| p.as_ref())
        .ok_or_else(|| Error::OverlayResolution {
            reference: name.to_string(),
            view: View::Final,
            required_by: required_by.to_string(),
        })
}

/// Replace `${pkgs.NAME}`, `${pkgs.NAME.lib}` and `${pkgs.NAME.bin}` with
/// paths from the final set. Other `${...}` text is left alone.
pub fn interpolate(raw: &str, final_set: &PackageSet, var: &str) -> Result<String> {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find(PACKAGE_PLACEHOLDER) {
        let after = &rest[start + PACKAGE_PLACEHOLDER.len()..];
        let Some(end) = after.find('}') else {
            break;
        };
        out.push_str(&rest[..start]);
        out.push_str(&resolve_placeholder(&after[..end], final_set, var)?);
        rest = &after[end + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn resolve_placeholder(inner: &str, final_set: &PackageSet, var: &str) -> Result<String> {
    if let Some(package) = final_set.get(inner) {
        return Ok(package.out_path.to_string_lossy().into_owned());
    }

    let resolved = match inner.rsplit_once('.') {
        Some((name, "lib")) => final_set.get(name).map(|p| p.lib_path()),
        Some((name, "bin")) => final_set.get(name).map(|p| p.bin_path()),
        _ => None,
    };
    resolved
        .map(|p| p.to_string_lossy().into_owned())
        .ok_or_else(|| Error::OverlayResolution {
            reference: inner.to_string(),
            view: View::Final,
            required_by: format!("environment variable {var}"),
        })
}
