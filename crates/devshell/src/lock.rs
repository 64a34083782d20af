// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Lock file structures and helpers for devshell.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::merge::MergedSpec;
use crate::toolchain::Toolchain;

#[cfg(test)]
#[path = "./lock_test.rs"]
mod lock_test;

/// Lock file API version.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub enum LockApiVersion {
    #[serde(rename = "devshell/v0/lock")]
    V0,
}

/// Lock file structure capturing the spec files and every pinned input.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockFile {
    pub api: LockApiVersion,
    pub generated: GenerationMetadata,
    pub sources: Vec<SourceFile>,
    #[serde(default)]
    pub inputs: Vec<LockedInput>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub toolchain: Option<LockedToolchain>,
}

/// Metadata about when and where the lock was generated.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct GenerationMetadata {
    pub timestamp: DateTime<Utc>,
    pub devshell_version: String,
    pub hostname: String,
}

/// Spec file tracked by the lock.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SourceFile {
    pub path: PathBuf,
    pub sha256: String,
    pub mtime: DateTime<Utc>,
}

/// A named package source and the revision it was pinned to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockedInput {
    pub name: String,
    pub url: String,
    pub rev: String,
}

/// The toolchain descriptor the lock was generated against.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct LockedToolchain {
    pub path: PathBuf,
    pub sha256: String,
    pub channel: String,
}

impl LockFile {
    /// Load a lock file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path).map_err(|e| crate::Error::ReadFailed {
            path: path.to_path_buf(),
            error: e,
        })?;
        serde_yaml::from_str(&yaml).map_err(|e| crate::Error::InvalidYaml {
            error: e,
            yaml_content: yaml,
        })
    }

    /// Write this lock file to disk as YAML.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let yaml = serde_yaml::to_string(self).map_err(|e| {
            crate::Error::ValidationFailed(format!("failed to serialize lock file: {e}"))
        })?;
        std::fs::write(path, yaml)?;
        Ok(())
    }
}

/// Generate lock file from the merged spec.
pub fn generate_lock(merged: &MergedSpec) -> crate::Result<LockFile> {
    let mut sources = Vec::new();
    for path in &merged.source_files {
        let metadata = std::fs::metadata(path)?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .and_then(|d| DateTime::from_timestamp(d.as_secs() as i64, 0))
            .unwrap_or_else(Utc::now);

        sources.push(SourceFile {
            path: path.clone(),
            sha256: hash_file(path)?,
            mtime,
        });
    }

    let lock = LockFile {
        api: LockApiVersion::V0,
        generated: GenerationMetadata {
            timestamp: Utc::now(),
            devshell_version: env!("CARGO_PKG_VERSION").to_string(),
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "unknown".to_string()),
        },
        sources,
        inputs: locked_inputs(merged),
        toolchain: locked_toolchain(merged)?,
    };
    tracing::debug!(
        files = lock.sources.len(),
        inputs = lock.inputs.len(),
        "generated lock"
    );
    Ok(lock)
}

/// Verify lock file matches the current spec.
pub fn verify_lock(lock: &LockFile, merged: &MergedSpec) -> crate::Result<Vec<LockChange>> {
    let mut changes = Vec::new();

    // Check spec file hashes
    for source in &lock.sources {
        if !merged.source_files.contains(&source.path) {
            changes.push(LockChange {
                kind: LockChangeKind::SourceFileRemoved,
                reference: source.path.display().to_string(),
                expected: Some(source.sha256.clone()),
                actual: None,
            });
            continue;
        }

        let actual_hash = hash_file(&source.path)?;
        if actual_hash != source.sha256 {
            changes.push(LockChange {
                kind: LockChangeKind::SourceFileChanged,
                reference: source.path.display().to_string(),
                expected: Some(source.sha256.clone()),
                actual: Some(actual_hash),
            });
        }
    }
    for path in &merged.source_files {
        if !lock.sources.iter().any(|s| &s.path == path) {
            changes.push(LockChange {
                kind: LockChangeKind::SourceFileAdded,
                reference: path.display().to_string(),
                expected: None,
                actual: Some(hash_file(path)?),
            });
        }
    }

    // Check pinned inputs by name
    let locked: BTreeMap<&str, &LockedInput> =
        lock.inputs.iter().map(|i| (i.name.as_str(), i)).collect();
    let current = locked_inputs(merged);
    for input in &current {
        match locked.get(input.name.as_str()) {
            None => changes.push(LockChange {
                kind: LockChangeKind::InputAdded,
                reference: input.name.clone(),
                expected: None,
                actual: Some(describe_input(input)),
            }),
            Some(previous) if *previous != input => changes.push(LockChange {
                kind: LockChangeKind::InputChanged,
                reference: input.name.clone(),
                expected: Some(describe_input(previous)),
                actual: Some(describe_input(input)),
            }),
            Some(_) => {}
        }
    }
    for input in &lock.inputs {
        if !current.iter().any(|i| i.name == input.name) {
            changes.push(LockChange {
                kind: LockChangeKind::InputRemoved,
                reference: input.name.clone(),
                expected: Some(describe_input(input)),
                actual: None,
            });
        }
    }

    // Check the toolchain descriptor
    let toolchain = locked_toolchain(merged)?;
    if toolchain != lock.toolchain {
        let reference = toolchain
            .as_ref()
            .or(lock.toolchain.as_ref())
            .map(|t| t.path.display().to_string())
            .unwrap_or_default();
        changes.push(LockChange {
            kind: LockChangeKind::ToolchainChanged,
            reference,
            expected: lock.toolchain.as_ref().map(describe_toolchain),
            actual: toolchain.as_ref().map(describe_toolchain),
        });
    }

    Ok(changes)
}

fn hash_file(path: &Path) -> crate::Result<String> {
    let content = std::fs::read(path).map_err(|e| crate::Error::ReadFailed {
        path: path.to_path_buf(),
        error: e,
    })?;
    Ok(format!("{:x}", Sha256::digest(&content)))
}

fn locked_inputs(merged: &MergedSpec) -> Vec<LockedInput> {
    merged
        .sources
        .iter()
        .map(|(name, locator)| LockedInput {
            name: name.clone(),
            url: locator.url.clone(),
            rev: locator.rev.clone(),
        })
        .collect()
}

fn locked_toolchain(merged: &MergedSpec) -> crate::Result<Option<LockedToolchain>> {
    let Some(decl) = &merged.toolchain else {
        return Ok(None);
    };
    let toolchain = Toolchain::load(&decl.file)?;
    Ok(Some(LockedToolchain {
        path: decl.file.clone(),
        sha256: hash_file(&decl.file)?,
        channel: toolchain.channel,
    }))
}

fn describe_input(input: &LockedInput) -> String {
    format!("{}?rev={}", input.url, input.rev)
}

fn describe_toolchain(toolchain: &LockedToolchain) -> String {
    format!("{} ({})", toolchain.channel, toolchain.sha256)
}

/// A single detected change between lock and current spec.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockChange {
    pub kind: LockChangeKind,
    pub reference: String,
    pub expected: Option<String>,
    pub actual: Option<String>,
}

/// Types of lock mismatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum LockChangeKind {
    SourceFileChanged,
    SourceFileRemoved,
    SourceFileAdded,
    InputChanged,
    InputAdded,
    InputRemoved,
    ToolchainChanged,
}
