// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Merging logic for folding multiple spec files into a single spec.

use std::collections::BTreeMap;
use std::path::PathBuf;

use indexmap::IndexMap;

use crate::DevSpec;
use crate::environment::EnvOp;
use crate::package::PackageEntry;
use crate::platform::Platform;
use crate::source::Locator;
use crate::spec::{OverlaySpec, ToolchainDecl};

#[cfg(test)]
#[path = "./merge_test.rs"]
mod merge_test;

/// Merged view of every discovered spec file.
#[derive(Debug, Clone, Default)]
pub struct MergedSpec {
    /// Declared sources (later files replace earlier entries).
    pub sources: BTreeMap<String, Locator>,

    /// Toolchain declaration (last one set wins).
    pub toolchain: Option<ToolchainDecl>,

    /// Platforms to evaluate (last non-empty list wins).
    pub platforms: Vec<Platform>,

    /// Default platform for `devshell shell` (last one set wins).
    pub default_platform: Option<Platform>,

    /// Store root (last one set wins).
    pub store_dir: Option<PathBuf>,

    /// Default source of base packages (last one set wins).
    pub base_source: Option<String>,

    /// Base packages (later files replace earlier entries).
    pub base_packages: IndexMap<String, PackageEntry>,

    /// Overlays, in order.
    pub overlays: Vec<OverlaySpec>,

    /// Tool list, in order.
    pub tools: Vec<String>,

    /// Link dependency list, in order.
    pub link_deps: Vec<String>,

    /// Library path variable name (last one set wins).
    pub library_path_var: Option<String>,

    /// Environment variable operations, in order.
    pub environment: Vec<EnvOp>,

    /// Source files that contributed to this spec.
    pub source_files: Vec<PathBuf>,
}

impl MergedSpec {
    /// Create a new empty merged spec.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Merge multiple specs into one.
///
/// Specs are processed in order, with later specs layering on top of earlier ones.
pub fn merge_specs(specs: &[DevSpec]) -> MergedSpec {
    let mut merged = MergedSpec::default();

    for spec in specs {
        for (name, locator) in &spec.sources {
            if let Some(previous) = merged.sources.insert(name.clone(), locator.clone()) {
                if previous != *locator {
                    tracing::warn!(
                        source = %name,
                        from = %previous,
                        to = %locator,
                        "source redeclared by a later spec file"
                    );
                }
            }
        }

        if spec.toolchain.is_some() {
            merged.toolchain = spec.toolchain.clone();
        }
        if !spec.platforms.is_empty() {
            merged.platforms = spec.platforms.clone();
        }
        if spec.default_platform.is_some() {
            merged.default_platform = spec.default_platform;
        }
        if spec.store_dir.is_some() {
            merged.store_dir = spec.store_dir.clone();
        }

        if spec.base.source.is_some() {
            merged.base_source = spec.base.source.clone();
        }
        for (name, entry) in &spec.base.packages {
            merged.base_packages.insert(name.clone(), entry.clone());
        }

        // Overlays: append in order (later files apply on top)
        merged.overlays.extend(spec.overlays.iter().cloned());

        merged.tools.extend(spec.shell.tools.iter().cloned());
        merged.link_deps.extend(spec.shell.link_deps.iter().cloned());
        if spec.shell.library_path_var.is_some() {
            merged.library_path_var = spec.shell.library_path_var.clone();
        }
        merged
            .environment
            .extend(spec.shell.environment.iter().cloned());

        // Track source file
        if let Some(path) = &spec.source_path {
            merged.source_files.push(path.clone());
        }
    }

    merged
}
