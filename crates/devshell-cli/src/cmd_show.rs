// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `devshell show` command.

use std::collections::BTreeMap;
use std::path::Path;

use clap::Args;
use colored::Colorize;
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use devshell::spec::{BaseSection, OverlaySpec, ShellSection, ToolchainDecl};
use devshell::{DevSpec, EnvOp, Locator, MergedSpec, PackageEntry, Platform};

/// Display the merged shell configuration
#[derive(Debug, Args)]
pub struct CmdShow {
    #[clap(flatten)]
    discovery: crate::DiscoveryFlags,

    /// Show discovered files
    #[clap(long)]
    files: bool,

    /// Show sources, base packages and overlays
    #[clap(long)]
    packages: bool,

    /// Show the shell section
    #[clap(long)]
    shell: bool,

    /// Show all information
    #[clap(long)]
    all: bool,

    /// Output format: table, yaml, json
    #[clap(long, default_value = "table")]
    format: String,
}

impl CmdShow {
    pub async fn run(&mut self) -> Result<i32> {
        let specs = self.discovery.discover()?;
        let merged = devshell::merge_specs(&specs);

        // Display based on flags
        let none = !self.files && !self.packages && !self.shell;
        let show_files = self.files || self.all || none;
        let show_packages = self.packages || self.all || none;
        let show_shell = self.shell || self.all || none;

        match self.format.as_str() {
            "yaml" => print!(
                "{}",
                serde_yaml::to_string(&summary(&specs, &merged)).into_diagnostic()?
            ),
            "json" => println!(
                "{}",
                serde_json::to_string_pretty(&summary(&specs, &merged)).into_diagnostic()?
            ),
            _ => {
                // Table format
                if show_files {
                    show_files_table(&specs);
                }
                if show_files && show_packages {
                    println!();
                }
                if show_packages {
                    show_packages_table(&merged);
                }
                if (show_files || show_packages) && show_shell {
                    println!();
                }
                if show_shell {
                    show_shell_table(&merged);
                }
            }
        }

        Ok(0)
    }
}

/// Machine-readable view of the merged configuration.
#[derive(Serialize)]
struct Summary<'a> {
    discovered_files: Vec<&'a Path>,
    platforms: &'a [Platform],
    #[serde(skip_serializing_if = "Option::is_none")]
    default_platform: Option<Platform>,
    #[serde(skip_serializing_if = "Option::is_none")]
    store_dir: Option<&'a Path>,
    sources: &'a BTreeMap<String, Locator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    toolchain: Option<&'a ToolchainDecl>,
    base: BaseSection,
    overlays: &'a [OverlaySpec],
    shell: ShellSection,
}

fn summary<'a>(specs: &'a [DevSpec], merged: &'a MergedSpec) -> Summary<'a> {
    Summary {
        discovered_files: specs
            .iter()
            .filter_map(|s| s.source_path.as_deref())
            .collect(),
        platforms: &merged.platforms,
        default_platform: merged.default_platform,
        store_dir: merged.store_dir.as_deref(),
        sources: &merged.sources,
        toolchain: merged.toolchain.as_ref(),
        base: BaseSection {
            source: merged.base_source.clone(),
            packages: merged.base_packages.clone(),
        },
        overlays: &merged.overlays,
        shell: ShellSection {
            tools: merged.tools.clone(),
            link_deps: merged.link_deps.clone(),
            library_path_var: merged.library_path_var.clone(),
            environment: merged.environment.clone(),
        },
    }
}

fn show_files_table(specs: &[DevSpec]) {
    println!("{}", "Discovered Files:".bold());
    println!();

    for (i, spec) in specs.iter().enumerate() {
        let path = spec
            .source_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "<unknown>".to_string());

        let inherit_marker = if spec.inherit { " [inherit]" } else { "" };
        let includes_marker = if !spec.includes.is_empty() {
            format!(" [includes: {}]", spec.includes.len())
        } else {
            String::new()
        };

        println!(
            "  {}. {}{}{}",
            i + 1,
            path.cyan(),
            inherit_marker.yellow(),
            includes_marker.blue()
        );

        if let Some(desc) = &spec.description {
            println!("     {}", desc.dimmed());
        }
    }

    println!();
    println!("Total: {} file(s)", specs.len());
}

fn describe_entry(entry: &PackageEntry) -> String {
    let def = entry.to_def();
    let mut parts = Vec::new();
    if let Some(from) = &def.from {
        parts.push(format!("from {from}"));
    }
    if def.toolchain {
        parts.push("toolchain".to_string());
    } else if let Some(version) = &def.version {
        parts.push(version.clone());
    }
    if let Some(source) = &def.source {
        parts.push(format!("@{source}"));
    }
    if !def.platforms.is_empty() {
        let platforms: Vec<_> = def.platforms.iter().map(|p| p.to_string()).collect();
        parts.push(format!("[{}]", platforms.join(", ")));
    }
    parts.join(" ")
}

fn show_packages_table(merged: &MergedSpec) {
    println!("{}", "Sources:".bold());
    println!();
    if merged.sources.is_empty() {
        println!("  {}", "(no sources)".dimmed());
    }
    for (name, locator) in &merged.sources {
        println!("  {} {}", name.cyan(), locator.to_string().dimmed());
    }

    if let Some(toolchain) = &merged.toolchain {
        println!();
        println!(
            "{} {}",
            "Toolchain:".bold(),
            toolchain.file.display().to_string().cyan()
        );
    }

    println!();
    match &merged.base_source {
        Some(source) => println!("{} (source: {})", "Base Packages:".bold(), source.cyan()),
        None => println!("{}", "Base Packages:".bold()),
    }
    println!();
    if merged.base_packages.is_empty() {
        println!("  {}", "(no packages)".dimmed());
    }
    for (name, entry) in &merged.base_packages {
        println!("  {} {}", name.green(), describe_entry(entry));
    }

    println!();
    println!("{}", "Overlays:".bold());
    println!();
    if merged.overlays.is_empty() {
        println!("  {}", "(no overlays)".dimmed());
    }
    for (i, overlay) in merged.overlays.iter().enumerate() {
        let source = overlay
            .source
            .as_ref()
            .map(|s| format!(" (source: {s})"))
            .unwrap_or_default();
        println!("  {}. {}{}", i + 1, overlay.name.cyan(), source);
        for (name, entry) in &overlay.packages {
            println!("       {} {}", name.green(), describe_entry(entry));
        }
    }
}

fn show_shell_table(merged: &MergedSpec) {
    println!("{}", "Shell:".bold());
    println!();
    println!("  tools:     {}", merged.tools.join(", ").green());
    println!("  link deps: {}", merged.link_deps.join(", ").green());

    if merged.environment.is_empty() {
        return;
    }

    println!();
    println!("{}", "Environment Variables:".bold());
    println!();

    for (i, op) in merged.environment.iter().enumerate() {
        match op {
            EnvOp::Set(s) => {
                println!("  {}. {} = {}", i + 1, s.set.cyan(), s.value.green());
            }
            EnvOp::Prepend(p) => {
                println!(
                    "  {}. {} = {} + ${}",
                    i + 1,
                    p.prepend.cyan(),
                    p.value.green(),
                    p.prepend
                );
            }
            EnvOp::Append(a) => {
                println!(
                    "  {}. {} = ${} + {}",
                    i + 1,
                    a.append.cyan(),
                    a.append,
                    a.value.green()
                );
            }
            EnvOp::Comment(c) => {
                println!("  # {}", c.comment.dimmed());
            }
        }
    }
}
