// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Overlay chain evaluation.
//!
//! An [`Overlay`] maps package names to definitions. A definition is a
//! closure that is handed a [`Scope`] when it is forced, through which it can
//! read two views of the package set:
//!
//! - `prev`: the set as it was immediately before this overlay
//! - `final`: the set after every overlay in the chain has been applied
//!
//! Definitions are forced lazily and at most once. Every (overlay, package)
//! pair owns a slot in an index-addressed table, so a definition may read a
//! `final` package that a later overlay defines without the chain ever being
//! evaluated eagerly. Definitions that are shadowed by a later overlay and
//! never read through `prev` are never run.

use std::cell::Cell;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use once_cell::unsync::OnceCell;
use serde::Serialize;

use crate::package::{Package, PackageRef, View};
use crate::{Error, Result};

#[cfg(test)]
#[path = "./overlay_test.rs"]
mod overlay_test;

/// A deferred package definition.
pub type Definition = Arc<dyn Fn(&Scope<'_>) -> Result<Package> + Send + Sync>;

/// A named, ordered set of package definitions applied on top of a package set.
#[derive(Clone)]
pub struct Overlay {
    name: String,
    definitions: IndexMap<String, Definition>,
}

impl Overlay {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            definitions: IndexMap::new(),
        }
    }

    /// Add a definition, replacing any previous one for the same package.
    pub fn define<S, F>(mut self, package: S, definition: F) -> Self
    where
        S: Into<String>,
        F: Fn(&Scope<'_>) -> Result<Package> + Send + Sync + 'static,
    {
        self.insert(package, definition);
        self
    }

    pub fn insert<S, F>(&mut self, package: S, definition: F)
    where
        S: Into<String>,
        F: Fn(&Scope<'_>) -> Result<Package> + Send + Sync + 'static,
    {
        self.definitions.insert(package.into(), Arc::new(definition));
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Names of the packages this overlay defines, in declaration order.
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

impl fmt::Debug for Overlay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Overlay")
            .field("name", &self.name)
            .field("packages", &self.definitions.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// An immutable collection of resolved packages, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PackageSet {
    packages: BTreeMap<String, Arc<Package>>,
}

impl PackageSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<Package>> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Packages in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<Package>)> {
        self.packages.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.packages.keys().map(String::as_str)
    }
}

impl FromIterator<Package> for PackageSet {
    fn from_iter<T: IntoIterator<Item = Package>>(iter: T) -> Self {
        Self {
            packages: iter
                .into_iter()
                .map(|p| (p.name.clone(), Arc::new(p)))
                .collect(),
        }
    }
}

/// What a definition can see while it is being forced.
pub struct Scope<'a> {
    eval: &'a Evaluator<'a>,
    layer: usize,
    package: &'a str,
}

impl Scope<'_> {
    /// Read a package from the set as it was before this overlay.
    pub fn prev(&self, name: &str) -> Result<Arc<Package>> {
        self.eval
            .lookup(self.layer, name)?
            .ok_or_else(|| self.missing(name, View::Prev))
    }

    /// Read a package from the fully overlaid set.
    pub fn final_(&self, name: &str) -> Result<Arc<Package>> {
        self.eval
            .lookup(self.eval.overlays.len(), name)?
            .ok_or_else(|| self.missing(name, View::Final))
    }

    pub fn get(&self, reference: &PackageRef) -> Result<Arc<Package>> {
        match reference.view {
            View::Prev => self.prev(&reference.name),
            View::Final => self.final_(&reference.name),
        }
    }

    /// Name of the overlay whose definition is being forced.
    pub fn overlay(&self) -> &str {
        self.eval.overlays[self.layer].name()
    }

    /// Name of the package being defined.
    pub fn package(&self) -> &str {
        self.package
    }

    fn missing(&self, name: &str, view: View) -> Error {
        Error::OverlayResolution {
            reference: name.to_string(),
            view,
            required_by: format!("package '{}' in overlay '{}'", self.package, self.overlay()),
        }
    }
}

#[derive(Default)]
struct Slot {
    value: OnceCell<Arc<Package>>,
    forcing: Cell<bool>,
}

struct Evaluator<'a> {
    base: &'a PackageSet,
    overlays: &'a [Overlay],
    slots: Vec<Vec<Slot>>,
}

impl<'a> Evaluator<'a> {
    fn new(base: &'a PackageSet, overlays: &'a [Overlay]) -> Self {
        let slots = overlays
            .iter()
            .map(|o| o.definitions.keys().map(|_| Slot::default()).collect())
            .collect();
        Self {
            base,
            overlays,
            slots,
        }
    }

    /// Find `name` in the topmost overlay below `below`, falling back to the base set.
    fn lookup(&self, below: usize, name: &str) -> Result<Option<Arc<Package>>> {
        for layer in (0..below).rev() {
            if let Some((index, key, definition)) =
                self.overlays[layer].definitions.get_full(name)
            {
                return self.force(layer, index, key, definition).map(Some);
            }
        }
        Ok(self.base.get(name).cloned())
    }

    fn force(
        &self,
        layer: usize,
        index: usize,
        package: &str,
        definition: &Definition,
    ) -> Result<Arc<Package>> {
        let slot = &self.slots[layer][index];
        if let Some(value) = slot.value.get() {
            return Ok(Arc::clone(value));
        }
        if slot.forcing.replace(true) {
            return Err(Error::CircularDefinition {
                package: package.to_string(),
                overlay: format!("overlay '{}'", self.overlays[layer].name()),
            });
        }

        tracing::trace!(overlay = %self.overlays[layer].name(), %package, "forcing definition");
        let scope = Scope {
            eval: self,
            layer,
            package,
        };
        let result = definition(&scope);
        slot.forcing.set(false);

        let value = Arc::new(result?);
        Ok(Arc::clone(slot.value.get_or_init(|| value)))
    }
}

/// Apply `overlays` to `base` from left to right and return the final set.
///
/// Evaluation is pure: applying the same chain to the same base always
/// yields an equal set.
pub fn apply(base: &PackageSet, overlays: &[Overlay]) -> Result<PackageSet> {
    let evaluator = Evaluator::new(base, overlays);

    let names: BTreeSet<&str> = base
        .names()
        .chain(overlays.iter().flat_map(Overlay::package_names))
        .collect();

    let mut packages = BTreeMap::new();
    for name in names {
        if let Some(package) = evaluator.lookup(overlays.len(), name)? {
            packages.insert(name.to_string(), package);
        }
    }

    tracing::debug!(
        overlays = overlays.len(),
        packages = packages.len(),
        "applied overlay chain"
    );
    Ok(PackageSet { packages })
}
