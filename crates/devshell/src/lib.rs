// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! devshell - Reproducible, overlay-based development shells
//!
//! This crate provides the core library for describing development shells
//! through directory-based configuration files (`.devshell.yaml`) and
//! evaluating them into per-platform environment descriptors.
//!
//! # Overview
//!
//! A shell is built in three steps for every target platform:
//!
//! 1. named package sources are pinned to exact revisions in a registry
//! 2. a base package set is refined by an ordered chain of overlays, where
//!    each definition can read the set before its overlay (`prev`) and the
//!    fully overlaid set (`final`)
//! 3. the final set is composed with the shell's tools, link dependencies
//!    and environment variables into an [`EnvironmentDescriptor`]
//!
//! # Example
//!
//! ```yaml
//! # .devshell.yaml
//! api: devshell/v0
//! platforms: [x86_64-linux, aarch64-darwin]
//!
//! sources:
//!   pkgs: { url: "https://github.com/example/pkgs", rev: "a1b2c3" }
//!
//! base:
//!   source: pkgs
//!   packages:
//!     openssl: "3.0.13"
//!     cargo: "1.79.0"
//!
//! overlays:
//!   - name: pins
//!     packages:
//!       openssl: { from: prev.openssl, version: "3.1.4" }
//!
//! shell:
//!   tools: [cargo]
//!   link_deps: [openssl]
//! ```

pub mod compose;
pub mod discovery;
pub mod environment;
pub mod error;
pub mod evaluate;
pub mod lock;
pub mod merge;
pub mod overlay;
pub mod package;
pub mod platform;
pub mod shell;
pub mod source;
pub mod spec;
pub mod toolchain;

pub use compose::{EnvTemplate, EnvironmentDescriptor, ShellPackage, compose};
pub use discovery::{DiscoveryOptions, discover_specs};
pub use environment::EnvOp;
pub use error::{Error, Result};
pub use evaluate::{ShellEvaluator, evaluate_all, evaluate_platform};
pub use lock::{LockChange, LockChangeKind, LockFile, generate_lock, verify_lock};
pub use merge::{MergedSpec, merge_specs};
pub use overlay::{Overlay, PackageSet, Scope, apply};
pub use package::{Package, PackageDef, PackageEntry, PackageRef, View};
pub use platform::Platform;
pub use source::{Locator, SourceRef, SourceRegistry};
pub use spec::{ApiVersion, DevSpec};
pub use toolchain::Toolchain;

/// Well-known filename for shell specs.
pub const DEVSHELL_FILENAME: &str = ".devshell.yaml";

/// Well-known filename for local overrides.
pub const DEVSHELL_LOCAL_FILENAME: &str = ".devshell.local.yaml";

/// Well-known filename for lock files.
pub const DEVSHELL_LOCK_FILENAME: &str = ".devshell.lock.yaml";
