// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Platform identifiers that a shell is evaluated for.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

#[cfg(test)]
#[path = "./platform_test.rs"]
mod platform_test;

/// CPU architectures that shells can target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
)]
pub enum Arch {
    #[strum(serialize = "x86_64")]
    X86_64,
    #[strum(serialize = "aarch64")]
    Aarch64,
}

impl Arch {
    /// The architecture of the running process, if supported.
    pub fn current() -> Option<Self> {
        std::env::consts::ARCH.parse().ok()
    }
}

/// Operating systems that shells can target.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
)]
pub enum Os {
    #[strum(serialize = "linux")]
    Linux,
    #[strum(to_string = "darwin", serialize = "macos")]
    Darwin,
}

impl Os {
    /// The operating system of the running process, if supported.
    pub fn current() -> Option<Self> {
        std::env::consts::OS.parse().ok()
    }
}

/// Platform identifier combining architecture and OS (e.g. "aarch64-darwin").
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
#[serde(try_from = "String", into = "String")]
pub struct Platform {
    pub arch: Arch,
    pub os: Os,
}

impl Platform {
    pub fn new(arch: Arch, os: Os) -> Self {
        Self { arch, os }
    }

    /// Detect the platform of the running process.
    ///
    /// Returns `None` if the OS or architecture is not supported.
    pub fn current() -> Option<Self> {
        Some(Self {
            arch: Arch::current()?,
            os: Os::current()?,
        })
    }

    /// Every supported arch/os combination, in a stable order.
    pub fn all() -> Vec<Self> {
        Arch::iter()
            .flat_map(|arch| Os::iter().map(move |os| Self::new(arch, os)))
            .collect()
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.arch, self.os)
    }
}

impl FromStr for Platform {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        let unknown = || crate::Error::UnknownPlatform(s.to_string());
        let (arch, os) = s.split_once('-').ok_or_else(unknown)?;
        Ok(Self {
            arch: arch.parse().map_err(|_| unknown())?,
            os: os.parse().map_err(|_| unknown())?,
        })
    }
}

impl TryFrom<String> for Platform {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        value.parse()
    }
}

impl From<Platform> for String {
    fn from(platform: Platform) -> Self {
        platform.to_string()
    }
}
