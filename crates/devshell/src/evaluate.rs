// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Per-platform evaluation of a merged spec.
//!
//! For every platform, the declared packages are compiled into overlay
//! definitions, the base set and overlay chain are applied, and the result is
//! composed into an [`EnvironmentDescriptor`]. Platforms share only the
//! immutable inputs held by a [`ShellEvaluator`], so they can be evaluated in
//! any order or in parallel.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;

use crate::compose::{EnvTemplate, EnvironmentDescriptor, compose};
use crate::merge::MergedSpec;
use crate::overlay::{self, Overlay, PackageSet, Scope};
use crate::package::{DEFAULT_STORE_DIR, Package, PackageDef, PackageEntry};
use crate::platform::Platform;
use crate::source::{SourceRef, SourceRegistry};
use crate::toolchain::Toolchain;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./evaluate_test.rs"]
mod evaluate_test;

/// Name of the overlay that holds the base package definitions.
pub const BASE_OVERLAY_NAME: &str = "base";

/// Immutable inputs shared by every platform evaluation of one spec.
#[derive(Debug)]
pub struct ShellEvaluator {
    spec: MergedSpec,
    registry: SourceRegistry,
    toolchain: Option<Toolchain>,
    store_dir: PathBuf,
}

impl ShellEvaluator {
    /// Validate the sources and variables and load the toolchain descriptor.
    pub fn new(spec: MergedSpec) -> Result<Self> {
        let registry = SourceRegistry::from_decls(&spec.sources)?;
        let toolchain = spec
            .toolchain
            .as_ref()
            .map(|decl| Toolchain::load(&decl.file))
            .transpose()?;
        let store_dir = spec
            .store_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_STORE_DIR));

        let evaluator = Self {
            spec,
            registry,
            toolchain,
            store_dir,
        };
        evaluator.template().validate()?;
        Ok(evaluator)
    }

    pub fn spec(&self) -> &MergedSpec {
        &self.spec
    }

    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    pub fn toolchain(&self) -> Option<&Toolchain> {
        self.toolchain.as_ref()
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Platforms to evaluate, in declared order.
    ///
    /// Falls back to the host platform when none are declared.
    pub fn platforms(&self) -> Result<Vec<Platform>> {
        if !self.spec.platforms.is_empty() {
            return Ok(self.spec.platforms.clone());
        }
        Platform::current().map(|p| vec![p]).ok_or_else(|| {
            Error::ValidationFailed(
                "the host platform is not supported; declare 'platforms' explicitly".to_string(),
            )
        })
    }

    /// Fail unless `platform` is one of the platforms this shell supports.
    pub fn check_platform(&self, platform: Platform) -> Result<Platform> {
        let platforms = self.platforms()?;
        if platforms.contains(&platform) {
            return Ok(platform);
        }
        let supported: Vec<_> = platforms.iter().map(|p| p.to_string()).collect();
        Err(Error::ValidationFailed(format!(
            "platform {platform} is not supported by this shell (supported: {})",
            supported.join(", ")
        )))
    }

    /// Platform used when none is requested.
    ///
    /// This is the declared `default_platform`, otherwise the host platform
    /// if it is declared, otherwise the first declared platform.
    pub fn default_platform(&self) -> Result<Platform> {
        let platforms = self.platforms()?;
        if let Some(platform) = self.spec.default_platform {
            if !platforms.contains(&platform) {
                return Err(Error::ValidationFailed(format!(
                    "default platform {platform} is not one of the declared platforms"
                )));
            }
            return Ok(platform);
        }
        if let Some(host) = Platform::current().filter(|p| platforms.contains(p)) {
            return Ok(host);
        }
        platforms.first().copied().ok_or_else(|| {
            Error::ValidationFailed("no platforms to evaluate".to_string())
        })
    }

    /// Resolve the final package set for one platform.
    pub fn packages(&self, platform: Platform) -> Result<PackageSet> {
        self.packages_inner(platform)
            .map_err(|err| err.for_platform(platform))
    }

    /// Evaluate the shell for one platform.
    pub fn evaluate(&self, platform: Platform) -> Result<EnvironmentDescriptor> {
        self.evaluate_inner(platform)
            .map_err(|err| err.for_platform(platform))
    }

    /// Evaluate every platform in declared order, stopping at the first failure.
    pub fn evaluate_all(&self) -> Result<IndexMap<Platform, EnvironmentDescriptor>> {
        let mut descriptors = IndexMap::new();
        for platform in self.platforms()? {
            descriptors.insert(platform, self.evaluate(platform)?);
        }
        Ok(descriptors)
    }

    /// The variable template for the shell.
    pub fn template(&self) -> EnvTemplate {
        let template = EnvTemplate::new(self.spec.environment.clone());
        match &self.spec.library_path_var {
            Some(var) => template.with_library_path_var(var.clone()),
            None => template,
        }
    }

    fn evaluate_inner(&self, platform: Platform) -> Result<EnvironmentDescriptor> {
        let final_set = self.packages_inner(platform)?;
        compose(
            &final_set,
            &self.spec.tools,
            &self.spec.link_deps,
            &self.template(),
        )
    }

    fn packages_inner(&self, platform: Platform) -> Result<PackageSet> {
        tracing::debug!(%platform, "evaluating packages");

        let base = self.build_base(platform)?;
        let overlays = self
            .spec
            .overlays
            .iter()
            .map(|spec| {
                let mut overlay = Overlay::new(&spec.name);
                for (name, entry) in &spec.packages {
                    self.compile_into(
                        &mut overlay,
                        platform,
                        name,
                        &entry.to_def(),
                        spec.source.as_deref(),
                    )?;
                }
                Ok(overlay)
            })
            .collect::<Result<Vec<_>>>()?;

        overlay::apply(&base, &overlays)
    }

    /// Evaluate the base definitions as a single overlay over an empty set,
    /// so that they can only see each other.
    fn build_base(&self, platform: Platform) -> Result<PackageSet> {
        let mut entries = self.spec.base_packages.clone();
        if let Some(name) = self.spec.toolchain.as_ref().and_then(|t| t.package.as_ref()) {
            if !entries.contains_key(name) {
                entries.insert(
                    name.clone(),
                    PackageEntry::Def(PackageDef {
                        toolchain: true,
                        ..Default::default()
                    }),
                );
            }
        }

        let mut base = Overlay::new(BASE_OVERLAY_NAME);
        for (name, entry) in &entries {
            self.compile_into(
                &mut base,
                platform,
                name,
                &entry.to_def(),
                self.spec.base_source.as_deref(),
            )?;
        }
        overlay::apply(&PackageSet::new(), &[base])
    }

    /// Turn a declared definition into a deferred definition in `overlay`.
    ///
    /// Nothing is added when the definition does not exist on `platform`.
    fn compile_into(
        &self,
        overlay: &mut Overlay,
        platform: Platform,
        name: &str,
        def: &PackageDef,
        default_source: Option<&str>,
    ) -> Result<()> {
        if !def.available_on(platform) {
            tracing::trace!(%platform, package = %name, "not available on platform");
            return Ok(());
        }

        let source = self.definition_source(def, default_source)?;
        let toolchain = if def.toolchain {
            if def.version.is_some() {
                return Err(Error::ValidationFailed(format!(
                    "package '{name}' takes its version from the toolchain and cannot set one"
                )));
            }
            let toolchain = self.toolchain.as_ref().ok_or_else(|| {
                Error::ValidationFailed(format!(
                    "package '{name}' uses the toolchain but no toolchain is declared"
                ))
            })?;
            Some((toolchain.channel.clone(), toolchain.metadata()))
        } else {
            None
        };

        let name = name.to_string();
        let def = def.clone();
        let store_dir = self.store_dir.clone();
        overlay.insert(name.clone(), move |scope: &Scope<'_>| {
            let mut package = match &def.from {
                Some(reference) => {
                    let mut package = Package::clone(&*scope.get(reference)?);
                    package.name = name.clone();
                    package.platform = platform;
                    package
                }
                None => Package::new(name.clone(), platform),
            };

            if let Some(source) = &source {
                package.source = Some(source.clone());
            }
            if let Some(version) = &def.version {
                package.version = version.clone();
            }
            if let Some((channel, meta)) = &toolchain {
                package.version = channel.clone();
                package.meta.extend(meta.clone());
            }
            if let Some(lib_dir) = &def.lib_dir {
                package.lib_dir = lib_dir.clone();
            }
            if let Some(bin_dir) = &def.bin_dir {
                package.bin_dir = bin_dir.clone();
            }
            if !def.depends.is_empty() {
                package.depends = def
                    .depends
                    .iter()
                    .map(|reference| scope.get(reference).map(|dep| dep.out_path.clone()))
                    .collect::<Result<_>>()?;
            }

            package.seal(&store_dir)
        });
        Ok(())
    }

    /// The source a definition comes from.
    ///
    /// An explicit `source` wins. Toolchain packages fall back to the
    /// toolchain's source. Definitions built `from` another package keep
    /// that package's source, and anything else uses the section default.
    fn definition_source(
        &self,
        def: &PackageDef,
        default_source: Option<&str>,
    ) -> Result<Option<SourceRef>> {
        let toolchain_source = self
            .spec
            .toolchain
            .as_ref()
            .and_then(|t| t.source.as_deref())
            .filter(|_| def.toolchain);

        let name = match (&def.source, toolchain_source, &def.from) {
            (Some(source), _, _) => Some(source.as_str()),
            (None, Some(source), _) => Some(source),
            (None, None, Some(_)) => None,
            (None, None, None) => default_source,
        };
        name.map(|n| self.registry.resolve(n).cloned()).transpose()
    }
}

/// Evaluate the shell of `spec` for a single platform.
pub fn evaluate_platform(spec: &MergedSpec, platform: Platform) -> Result<EnvironmentDescriptor> {
    ShellEvaluator::new(spec.clone())?.evaluate(platform)
}

/// Evaluate the shell of `spec` for every declared platform.
///
/// The first failing platform aborts the evaluation and its error names
/// the platform.
pub fn evaluate_all(spec: &MergedSpec) -> Result<IndexMap<Platform, EnvironmentDescriptor>> {
    ShellEvaluator::new(spec.clone())?.evaluate_all()
}
