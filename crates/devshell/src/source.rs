// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Registry of named, revision-pinned package sources.
//!
//! Sources are only described here. Fetching them is left to whatever
//! materializes the shell, so resolving a name never touches the network
//! or the filesystem.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::similar_names;
use crate::{Error, Result};

#[cfg(test)]
#[path = "./source_test.rs"]
mod source_test;

/// Where a source lives and the exact revision it is pinned to.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct Locator {
    pub url: String,
    pub rev: String,
}

impl Locator {
    /// Check that both halves of the locator are filled in.
    pub fn validate(&self, name: &str) -> Result<()> {
        if self.url.trim().is_empty() {
            return Err(Error::ValidationFailed(format!(
                "source '{name}' has an empty url"
            )));
        }
        if self.rev.trim().is_empty() {
            return Err(Error::ValidationFailed(format!(
                "source '{name}' must be pinned to a revision"
            )));
        }
        Ok(())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?rev={}", self.url, self.rev)
    }
}

/// A named, pinned external package source.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Hash)]
pub struct SourceRef {
    pub name: String,
    pub locator: Locator,
}

/// Immutable lookup table of declared sources.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    entries: BTreeMap<String, SourceRef>,
}

impl SourceRegistry {
    /// Build the registry from declarations, validating every locator.
    pub fn from_decls(decls: &BTreeMap<String, Locator>) -> Result<Self> {
        let mut entries = BTreeMap::new();
        for (name, locator) in decls {
            locator.validate(name)?;
            entries.insert(
                name.clone(),
                SourceRef {
                    name: name.clone(),
                    locator: locator.clone(),
                },
            );
        }
        tracing::debug!(count = entries.len(), "built source registry");
        Ok(Self { entries })
    }

    /// Look up a source by name.
    pub fn resolve(&self, name: &str) -> Result<&SourceRef> {
        self.entries.get(name).ok_or_else(|| Error::UnknownSource {
            name: name.to_string(),
            similar: similar_names(name, self.entries.keys()),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over sources in name order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceRef> {
        self.entries.values()
    }
}
