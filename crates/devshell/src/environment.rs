// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Environment variable operations from a shell section.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "./environment_test.rs"]
mod environment_test;

/// Separator used by `prepend`/`append` when none is given.
pub const DEFAULT_SEPARATOR: &str = ":";

/// A single environment operation from a spec's `environment:` list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum EnvOp {
    Set(SetEnv),
    Prepend(PrependEnv),
    Append(AppendEnv),
    Comment(CommentEnv),
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SetEnv {
    pub set: String,
    pub value: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct PrependEnv {
    pub prepend: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct AppendEnv {
    pub append: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct CommentEnv {
    pub comment: String,
}

impl EnvOp {
    /// Name of the variable this operation touches, if any.
    pub fn variable(&self) -> Option<&str> {
        match self {
            EnvOp::Set(s) => Some(&s.set),
            EnvOp::Prepend(p) => Some(&p.prepend),
            EnvOp::Append(a) => Some(&a.append),
            EnvOp::Comment(_) => None,
        }
    }

    /// The value carried by this operation, if any.
    pub fn value(&self) -> Option<&str> {
        match self {
            EnvOp::Set(s) => Some(&s.value),
            EnvOp::Prepend(p) => Some(&p.value),
            EnvOp::Append(a) => Some(&a.value),
            EnvOp::Comment(_) => None,
        }
    }

    /// Apply this operation to a map of computed values.
    ///
    /// `prepend` and `append` extend an existing value with the separator
    /// and act like `set` when the variable has no value yet.
    pub fn apply_to(&self, vars: &mut BTreeMap<String, String>, value: String) {
        match self {
            EnvOp::Set(s) => {
                vars.insert(s.set.clone(), value);
            }
            EnvOp::Prepend(p) => {
                let sep = p.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
                let joined = match vars.get(&p.prepend) {
                    Some(existing) if !existing.is_empty() => format!("{value}{sep}{existing}"),
                    _ => value,
                };
                vars.insert(p.prepend.clone(), joined);
            }
            EnvOp::Append(a) => {
                let sep = a.separator.as_deref().unwrap_or(DEFAULT_SEPARATOR);
                let joined = match vars.get(&a.append) {
                    Some(existing) if !existing.is_empty() => format!("{existing}{sep}{value}"),
                    _ => value,
                };
                vars.insert(a.append.clone(), joined);
            }
            EnvOp::Comment(_) => {}
        }
    }
}

/// Escape a value for use inside double quotes in a POSIX shell.
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '"' | '\\' | '$' | '`') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Whether `name` can be exported by a POSIX shell.
pub fn is_valid_variable_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
