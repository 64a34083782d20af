// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Discovery algorithm for finding and loading .devshell.yaml files.

use std::path::{Path, PathBuf};

#[cfg(test)]
#[path = "./discovery_test.rs"]
mod discovery_test;

use crate::{DEVSHELL_FILENAME, DEVSHELL_LOCAL_FILENAME, DevSpec};

/// Options for discovery behavior.
#[derive(Debug, Clone, Default)]
pub struct DiscoveryOptions {
    /// Disable in-tree inheritance (from --no-inherit or DEVSHELL_NO_INHERIT).
    pub no_inherit: bool,

    /// Enable in-tree inheritance (from --inherit or DEVSHELL_INHERIT).
    pub force_inherit: bool,

    /// Additional includes from CLI (from --include flags).
    pub cli_includes: Vec<String>,

    /// Additional includes from environment (from DEVSHELL_INCLUDE).
    pub env_includes: Vec<String>,
}

/// Discover all applicable .devshell.yaml files.
///
/// Returns specs in merge order (earlier specs are applied first).
pub fn discover_specs<P: AsRef<Path>>(
    start_path: P,
    options: &DiscoveryOptions,
) -> crate::Result<Vec<DevSpec>> {
    let mut specs = Vec::new();

    // Step 1: Process CLI includes (go first in the merge)
    for include_path in &options.cli_includes {
        let spec = load_spec_from_include(include_path, None)?;
        specs.push(spec);
    }

    // Step 2: Process environment variable includes
    for include_path in &options.env_includes {
        let spec = load_spec_from_include(include_path, None)?;
        specs.push(spec);
    }

    // Step 3: Discover in-tree specs
    let in_tree_specs = discover_in_tree(start_path.as_ref(), options)?;
    specs.extend(in_tree_specs);

    // Step 4: Resolve all includes recursively
    let mut all_specs = resolve_all_includes(specs, &mut Vec::new())?;

    // Step 5: Load local override if it exists
    let start = resolve_start_path(start_path.as_ref());
    let local_path = start.join(DEVSHELL_LOCAL_FILENAME);
    if local_path.is_file() {
        tracing::debug!(path = ?local_path, "loading local override");
        let local_spec = DevSpec::load(&local_path)?;
        all_specs.push(local_spec);
    }

    tracing::debug!(count = all_specs.len(), "discovered spec files");
    Ok(all_specs)
}

/// Resolve starting path, preferring $PWD to preserve symlinks.
fn resolve_start_path(start_path: &Path) -> PathBuf {
    if start_path.is_absolute() {
        start_path.to_owned()
    } else {
        match std::env::var("PWD").ok() {
            Some(pwd) => PathBuf::from(pwd).join(start_path),
            None => std::env::current_dir()
                .unwrap_or_default()
                .join(start_path),
        }
    }
}

/// Discover specs in directory tree (walking up parents).
fn discover_in_tree(start_path: &Path, options: &DiscoveryOptions) -> crate::Result<Vec<DevSpec>> {
    let start = resolve_start_path(start_path);
    let mut specs = Vec::new();
    let mut current = start.clone();

    // A path straight to a spec file is loaded on its own
    if start.is_file() {
        specs.push(DevSpec::load(&start)?);
        return Ok(specs);
    }

    // Always try to load the starting point's spec
    let start_spec_path = current.join(DEVSHELL_FILENAME);
    if start_spec_path.is_file() {
        let spec = DevSpec::load(&start_spec_path)?;
        let inherit = spec.inherit;
        specs.push(spec);

        // Check if we should walk up tree
        let should_inherit = if options.force_inherit {
            true // --inherit overrides spec
        } else if options.no_inherit {
            false // --no-inherit overrides spec
        } else {
            inherit
        };

        if !should_inherit {
            return Ok(specs);
        }
    } else if options.no_inherit {
        return Err(crate::Error::NotFoundAtPath(current));
    }

    // Walk up directory tree
    while current.pop() {
        let spec_path = current.join(DEVSHELL_FILENAME);

        if spec_path.is_file() {
            let spec = DevSpec::load(&spec_path)?;
            let inherit = spec.inherit;
            specs.insert(0, spec); // Parents go first

            if !inherit {
                break;
            }
        }
    }

    if specs.is_empty() {
        return Err(crate::Error::NotFoundInTree(start));
    }

    Ok(specs)
}

/// Load a spec from an include path (absolute, home-relative, or relative).
fn load_spec_from_include(include_path: &str, base_dir: Option<&Path>) -> crate::Result<DevSpec> {
    let path = resolve_include_path(include_path, base_dir)?;
    tracing::debug!(path = ?path, "loading include");
    DevSpec::load(&path)
}

/// Resolve include path to absolute canonical path.
pub(crate) fn resolve_include_path(include: &str, base_dir: Option<&Path>) -> crate::Result<PathBuf> {
    let path = if include.starts_with('~') {
        // Home-relative
        let home = dirs::home_dir().ok_or_else(|| {
            crate::Error::ValidationFailed("Cannot resolve ~ without HOME".to_string())
        })?;
        let rel = include.strip_prefix("~/").unwrap_or(include);
        home.join(rel)
    } else if Path::new(include).is_absolute() {
        PathBuf::from(include)
    } else {
        // Relative - need base_dir
        let base = base_dir.ok_or_else(|| {
            crate::Error::ValidationFailed(format!(
                "Cannot resolve relative include '{}' without base directory",
                include
            ))
        })?;
        base.join(include)
    };

    dunce::canonicalize(&path).map_err(|e| crate::Error::IncludeNotFound {
        path: path.clone(),
        error: e,
    })
}

/// Recursively resolve all includes in specs.
///
/// `stack` holds the files currently being expanded; meeting one of them
/// again means the includes form a cycle.
fn resolve_all_includes(
    specs: Vec<DevSpec>,
    stack: &mut Vec<PathBuf>,
) -> crate::Result<Vec<DevSpec>> {
    let mut result = Vec::new();

    for spec in specs {
        let own_path = spec
            .source_path
            .as_ref()
            .map(|p| dunce::canonicalize(p).unwrap_or_else(|_| p.clone()));
        if let Some(path) = &own_path {
            stack.push(path.clone());
        }

        // Process includes before this spec
        let base_dir = spec.source_path.as_ref().and_then(|p| p.parent());
        for include_path in &spec.includes {
            let path = resolve_include_path(include_path, base_dir)?;
            if stack.contains(&path) {
                return Err(crate::Error::CircularInclude(path));
            }

            tracing::debug!(path = ?path, "loading include");
            let include_spec = DevSpec::load(&path)?;

            // Recursively resolve includes from this include
            let nested = resolve_all_includes(vec![include_spec], stack)?;
            result.extend(nested);
        }

        if own_path.is_some() {
            stack.pop();
        }
        result.push(spec);
    }

    Ok(result)
}
