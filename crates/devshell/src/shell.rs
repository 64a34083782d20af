// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Materialization of an environment descriptor into a running shell.

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::process::Command;

use crate::compose::EnvironmentDescriptor;
use crate::environment::escape_value;
use crate::platform::Platform;

#[cfg(test)]
#[path = "./shell_test.rs"]
mod shell_test;

/// Variable exported inside a materialized shell, holding its platform.
pub const ACTIVE_SHELL_VAR: &str = "DEVSHELL_ACTIVE";

/// Shell used when `$SHELL` is not set.
const FALLBACK_SHELL: &str = "/bin/sh";

/// The user's preferred shell.
pub fn default_shell() -> String {
    std::env::var("SHELL")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| FALLBACK_SHELL.to_string())
}

/// Render a descriptor as a POSIX script that can be sourced.
///
/// Variable values are exported as computed. The package executable
/// directories are placed in front of the existing `PATH`.
pub fn startup_script(platform: Platform, descriptor: &EnvironmentDescriptor) -> String {
    let mut script = String::from("#!/bin/sh\n");
    script.push_str(&format!("# devshell environment for {platform}\n"));
    for (name, value) in &descriptor.variables {
        script.push_str(&format!("export {name}=\"{}\"\n", escape_value(value)));
    }
    if !descriptor.path.is_empty() {
        script.push_str(&format!(
            "export PATH=\"{}:${{PATH}}\"\n",
            escape_value(&joined_path(descriptor))
        ));
    }
    script.push_str(&format!("export {ACTIVE_SHELL_VAR}=\"{platform}\"\n"));
    script
}

/// Variables to set on a process entering the shell.
///
/// `host_path` is the `PATH` of the calling process, which stays reachable
/// after the package executable directories.
pub fn shell_variables(
    platform: Platform,
    descriptor: &EnvironmentDescriptor,
    host_path: Option<&str>,
) -> BTreeMap<String, String> {
    let mut vars = descriptor.variables.clone();
    let path = match (descriptor.path.is_empty(), host_path) {
        (true, Some(host)) => Some(host.to_string()),
        (true, None) => None,
        (false, Some(host)) if !host.is_empty() => {
            Some(format!("{}:{host}", joined_path(descriptor)))
        }
        (false, _) => Some(joined_path(descriptor)),
    };
    if let Some(path) = path {
        vars.insert("PATH".to_string(), path);
    }
    vars.insert(ACTIVE_SHELL_VAR.to_string(), platform.to_string());
    vars
}

/// Build a command that runs `program` inside the shell environment.
pub fn build_command<S, I, A>(
    platform: Platform,
    descriptor: &EnvironmentDescriptor,
    program: S,
    args: I,
) -> Command
where
    S: AsRef<OsStr>,
    I: IntoIterator<Item = A>,
    A: AsRef<OsStr>,
{
    let host_path = std::env::var("PATH").ok();
    let mut cmd = Command::new(program);
    cmd.args(args)
        .envs(shell_variables(platform, descriptor, host_path.as_deref()));
    tracing::debug!(%platform, command = ?cmd, "built shell command");
    cmd
}

fn joined_path(descriptor: &EnvironmentDescriptor) -> String {
    descriptor
        .path
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(":")
}
