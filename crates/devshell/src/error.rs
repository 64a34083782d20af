// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Error types for devshell operations.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

use crate::package::View;
use crate::platform::Platform;

/// Convenience Result type with devshell Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during devshell operations.
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// No .devshell.yaml found in directory tree
    #[error("No .devshell.yaml found in {0:?} or any parent directory")]
    #[diagnostic(
        code(devshell::not_found_in_tree),
        help("Create a .devshell.yaml file with 'devshell init' or specify a path with -f")
    )]
    NotFoundInTree(PathBuf),

    /// .devshell.yaml not found at specified path
    #[error(".devshell.yaml not found at {0:?}")]
    #[diagnostic(code(devshell::not_found_at_path))]
    NotFoundAtPath(PathBuf),

    /// Invalid YAML in spec file
    #[error("Invalid .devshell.yaml file: {error}")]
    #[diagnostic(
        code(devshell::invalid_yaml),
        help("Check YAML syntax and ensure 'api: devshell/v0' is present")
    )]
    InvalidYaml {
        #[source]
        error: serde_yaml::Error,
        yaml_content: String,
    },

    /// Failed to read file
    #[error("Failed to read file: {path:?}")]
    #[diagnostic(code(devshell::read_failed))]
    ReadFailed {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Include file not found
    #[error("Include file not found: {path:?}")]
    #[diagnostic(
        code(devshell::include_not_found),
        help("Check that the include path is correct and the file exists")
    )]
    IncludeNotFound {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    /// Circular include detected
    #[error("Circular include detected: {0:?}")]
    #[diagnostic(
        code(devshell::circular_include),
        help("Remove the circular reference in your includes")
    )]
    CircularInclude(PathBuf),

    /// Validation error
    #[error("Validation failed: {0}")]
    #[diagnostic(code(devshell::validation_failed))]
    ValidationFailed(String),

    /// A source name with no registry entry
    #[error("Unknown source: {name}")]
    #[diagnostic(
        code(devshell::unknown_source),
        help("{}", suggestion_message("source", similar))
    )]
    UnknownSource { name: String, similar: Vec<String> },

    /// A package reference that is absent from the view it names
    #[error("{required_by} references '{reference}', which is not defined in the {view} package set")]
    #[diagnostic(
        code(devshell::overlay_resolution),
        help("Define '{reference}' in the base packages or an earlier overlay")
    )]
    OverlayResolution {
        reference: String,
        view: View,
        required_by: String,
    },

    /// A package definition that depends on itself
    #[error("Package '{package}' in {overlay} depends on its own value")]
    #[diagnostic(
        code(devshell::circular_definition),
        help("Use 'prev.{package}' to refer to the definition being replaced")
    )]
    CircularDefinition { package: String, overlay: String },

    /// Toolchain descriptor missing or unreadable
    #[error("Toolchain file {path:?} could not be loaded: {reason}")]
    #[diagnostic(
        code(devshell::missing_toolchain_file),
        help("Check the 'toolchain.file' entry; paths are relative to the declaring .devshell.yaml")
    )]
    MissingToolchainFile { path: PathBuf, reason: String },

    /// Unrecognized platform identifier
    #[error("Unknown platform: {0}")]
    #[diagnostic(
        code(devshell::unknown_platform),
        help("Platforms are written as <arch>-<os>, e.g. x86_64-linux or aarch64-darwin")
    )]
    UnknownPlatform(String),

    /// Malformed package reference
    #[error("Invalid package reference: {0:?}")]
    #[diagnostic(
        code(devshell::invalid_package_ref),
        help("References are written as 'prev.NAME', 'final.NAME' or 'NAME'")
    )]
    InvalidPackageRef(String),

    /// Failure while evaluating one platform
    #[error("Evaluation failed for platform {platform}")]
    #[diagnostic(code(devshell::platform_evaluation))]
    PlatformEvaluation {
        platform: Platform,
        #[source]
        source: Box<Error>,
    },

    /// IO error passthrough
    #[error(transparent)]
    #[diagnostic(code(devshell::io_error))]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Attach the platform being evaluated to this error.
    pub fn for_platform(self, platform: Platform) -> Self {
        match self {
            err @ Error::PlatformEvaluation { .. } => err,
            err => Error::PlatformEvaluation {
                platform,
                source: Box::new(err),
            },
        }
    }

    /// The innermost error, looking through platform context.
    pub fn root(&self) -> &Error {
        match self {
            Error::PlatformEvaluation { source, .. } => source.root(),
            err => err,
        }
    }
}

fn suggestion_message(kind: &str, similar: &[String]) -> String {
    if similar.is_empty() {
        format!("Check that the {kind} is declared")
    } else {
        format!("Did you mean one of: {}?", similar.join(", "))
    }
}

/// Names from `candidates` that look like a typo of `name`.
pub(crate) fn similar_names<'a, I>(name: &str, candidates: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a String>,
{
    let needle = name.to_lowercase();
    candidates
        .into_iter()
        .filter(|c| {
            let c = c.to_lowercase();
            c.contains(&needle) || needle.contains(&c) || edit_distance(&c, &needle) <= 2
        })
        .cloned()
        .collect()
}

fn edit_distance(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut prev = row[0];
        row[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let current = row[j + 1];
            row[j + 1] = if ca == *cb {
                prev
            } else {
                1 + prev.min(row[j]).min(row[j + 1])
            };
            prev = current;
        }
    }
    row[b.len()]
}
