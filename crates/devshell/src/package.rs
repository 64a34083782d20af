// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Packages, package definitions and references between them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::platform::Platform;
use crate::source::SourceRef;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./package_test.rs"]
mod package_test;

/// Default root under which package store paths are computed.
pub const DEFAULT_STORE_DIR: &str = "/devshell/store";

const DEFAULT_LIB_DIR: &str = "lib";
const DEFAULT_BIN_DIR: &str = "bin";

/// Number of digest bytes kept in a store path hash.
const STORE_HASH_BYTES: usize = 20;

/// Whether `name` can name a package.
///
/// Names become part of a store path, so they are limited to a single
/// path-safe component.
pub fn is_valid_package_name(name: &str) -> bool {
    is_store_component(name)
}

/// Whether `version` can become part of a store path.
pub fn is_valid_version(version: &str) -> bool {
    is_store_component(version)
}

fn is_store_component(value: &str) -> bool {
    !value.is_empty()
        && !value.starts_with('.')
        && !value.contains("..")
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '+' | '.'))
}

/// Whether `dir` stays inside the package it is joined to.
pub fn is_valid_package_dir(dir: &str) -> bool {
    !dir.is_empty()
        && Path::new(dir)
            .components()
            .all(|c| matches!(c, Component::Normal(_)))
}

/// A fully resolved package for one platform.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Package {
    pub name: String,
    pub version: String,
    pub platform: Platform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,
    pub lib_dir: String,
    pub bin_dir: String,
    /// Store paths of the packages this one depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, String>,
    pub out_path: PathBuf,
}

impl Package {
    /// Start an unsealed package with default layout.
    pub fn new<S: Into<String>>(name: S, platform: Platform) -> Self {
        Self {
            name: name.into(),
            version: String::new(),
            platform,
            source: None,
            lib_dir: DEFAULT_LIB_DIR.to_string(),
            bin_dir: DEFAULT_BIN_DIR.to_string(),
            depends: Vec::new(),
            meta: BTreeMap::new(),
            out_path: PathBuf::new(),
        }
    }

    pub fn with_version<S: Into<String>>(mut self, version: S) -> Self {
        self.version = version.into();
        self
    }

    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = Some(source);
        self
    }

    /// Compute the store path from everything that identifies this package.
    pub fn seal(mut self, store_dir: &Path) -> Result<Self> {
        if !is_valid_package_name(&self.name) {
            return Err(Error::ValidationFailed(format!(
                "'{}' is not a valid package name",
                self.name
            )));
        }
        if self.version.is_empty() {
            return Err(Error::ValidationFailed(format!(
                "package '{}' has no version",
                self.name
            )));
        }
        if !is_valid_version(&self.version) {
            return Err(Error::ValidationFailed(format!(
                "package '{}' has an invalid version '{}'",
                self.name, self.version
            )));
        }
        for dir in [&self.lib_dir, &self.bin_dir] {
            if !is_valid_package_dir(dir) {
                return Err(Error::ValidationFailed(format!(
                    "package '{}' directory '{dir}' must be relative to the package",
                    self.name
                )));
            }
        }

        let mut hasher = Sha256::new();
        let mut field = |value: &str| {
            hasher.update(value.as_bytes());
            hasher.update([0u8]);
        };
        field(&self.name);
        field(&self.version);
        field(&self.platform.to_string());
        match &self.source {
            Some(source) => {
                field(&source.name);
                field(&source.locator.url);
                field(&source.locator.rev);
            }
            None => field("<none>"),
        }
        field(&self.lib_dir);
        field(&self.bin_dir);
        for (key, value) in &self.meta {
            field(key);
            field(value);
        }
        for dep in &self.depends {
            field(&dep.to_string_lossy());
        }
        let digest = hasher.finalize();
        let hash = data_encoding::BASE32_NOPAD
            .encode(&digest[..STORE_HASH_BYTES])
            .to_lowercase();

        self.out_path = store_dir.join(format!("{hash}-{}-{}", self.name, self.version));
        Ok(self)
    }

    /// Directory holding this package's shared libraries.
    pub fn lib_path(&self) -> PathBuf {
        self.out_path.join(&self.lib_dir)
    }

    /// Directory holding this package's executables.
    pub fn bin_path(&self) -> PathBuf {
        self.out_path.join(&self.bin_dir)
    }
}

/// Which view of the package set a reference reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum View {
    /// The set as it was immediately before the current overlay.
    Prev,
    /// The fully overlaid set.
    Final,
}

impl fmt::Display for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            View::Prev => f.write_str("prev"),
            View::Final => f.write_str("final"),
        }
    }
}

/// A reference to another package, e.g. `prev.openssl` or `final.cargo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct PackageRef {
    pub view: View,
    pub name: String,
}

impl PackageRef {
    pub fn prev<S: Into<String>>(name: S) -> Self {
        Self {
            view: View::Prev,
            name: name.into(),
        }
    }

    pub fn final_<S: Into<String>>(name: S) -> Self {
        Self {
            view: View::Final,
            name: name.into(),
        }
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.view, self.name)
    }
}

impl FromStr for PackageRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (view, name) = match s.split_once('.') {
            Some(("prev", name)) => (View::Prev, name),
            Some(("final", name)) => (View::Final, name),
            _ => (View::Final, s),
        };
        if !is_valid_package_name(name) {
            return Err(Error::InvalidPackageRef(s.to_string()));
        }
        Ok(Self {
            view,
            name: name.to_string(),
        })
    }
}

impl TryFrom<String> for PackageRef {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<PackageRef> for String {
    fn from(value: PackageRef) -> Self {
        value.to_string()
    }
}

/// Declarative definition of a package inside the base set or an overlay.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PackageDef {
    /// Package to start from; its fields are kept unless overridden here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<PackageRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Source registry entry the package comes from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lib_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bin_dir: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends: Vec<PackageRef>,

    /// Restrict the package to these platforms (empty means all).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub platforms: Vec<Platform>,

    /// Take the version from the toolchain descriptor.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub toolchain: bool,
}

impl PackageDef {
    pub fn version<S: Into<String>>(version: S) -> Self {
        Self {
            version: Some(version.into()),
            ..Default::default()
        }
    }

    /// Whether the definition exists on the given platform.
    pub fn available_on(&self, platform: Platform) -> bool {
        self.platforms.is_empty() || self.platforms.contains(&platform)
    }
}

/// A package entry as written in a spec: either a bare version or a full definition.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum PackageEntry {
    Version(String),
    Def(PackageDef),
}

impl PackageEntry {
    pub fn to_def(&self) -> PackageDef {
        match self {
            PackageEntry::Version(v) => PackageDef::version(v.clone()),
            PackageEntry::Def(def) => def.clone(),
        }
    }
}

impl From<PackageDef> for PackageEntry {
    fn from(def: PackageDef) -> Self {
        PackageEntry::Def(def)
    }
}
