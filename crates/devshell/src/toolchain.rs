// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Loading of the language toolchain descriptor (`rust-toolchain.toml`).

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

#[cfg(test)]
#[path = "./toolchain_test.rs"]
mod toolchain_test;

/// The exact toolchain a shell should provide.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct Toolchain {
    pub channel: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// File this toolchain was read from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

#[derive(Deserialize)]
struct ToolchainFile {
    toolchain: Toolchain,
}

impl Toolchain {
    /// Parse a descriptor, accepting both the TOML form and the legacy
    /// single-line channel form.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let trimmed = content.trim();
        if trimmed.is_empty() {
            return Err("file is empty".to_string());
        }

        if !trimmed.contains('\n') && !trimmed.contains('=') && !trimmed.starts_with('[') {
            return Ok(Self {
                channel: trimmed.to_string(),
                components: Vec::new(),
                targets: Vec::new(),
                profile: None,
                source_path: None,
            });
        }

        let file: ToolchainFile = toml::from_str(content).map_err(|e| e.to_string())?;
        if file.toolchain.channel.trim().is_empty() {
            return Err("toolchain.channel is empty".to_string());
        }
        Ok(file.toolchain)
    }

    /// Load a descriptor from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content =
            std::fs::read_to_string(path).map_err(|e| Error::MissingToolchainFile {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let mut toolchain = Self::parse(&content).map_err(|reason| {
            Error::MissingToolchainFile {
                path: path.to_path_buf(),
                reason,
            }
        })?;
        toolchain.source_path = Some(path.to_path_buf());
        tracing::debug!(channel = %toolchain.channel, path = ?path, "loaded toolchain");
        Ok(toolchain)
    }

    /// Metadata recorded on packages built from this toolchain.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let mut meta = BTreeMap::new();
        meta.insert("toolchain.channel".to_string(), self.channel.clone());
        if !self.components.is_empty() {
            meta.insert(
                "toolchain.components".to_string(),
                self.components.join(","),
            );
        }
        if !self.targets.is_empty() {
            meta.insert("toolchain.targets".to_string(), self.targets.join(","));
        }
        if let Some(profile) = &self.profile {
            meta.insert("toolchain.profile".to_string(), profile.clone());
        }
        meta
    }
}
