// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! devshell - Overlay-based Development Shell CLI

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use miette::Result;

mod cmd_check;
mod cmd_eval;
mod cmd_init;
mod cmd_lock;
mod cmd_shell;
mod cmd_show;

use cmd_check::CmdCheck;
use cmd_eval::CmdEval;
use cmd_init::CmdInit;
use cmd_lock::CmdLock;
use cmd_shell::CmdShell;
use cmd_show::CmdShow;

#[derive(Parser)]
#[clap(
    name = "devshell",
    about = "Overlay-based Development Shells",
    version,
    long_about = "Describe development shells in directory-based configuration files \
                  and evaluate them for every target platform"
)]
struct Opt {
    #[clap(flatten)]
    logging: Logging,

    #[clap(subcommand)]
    cmd: Command,
}

#[derive(Parser)]
struct Logging {
    /// Increase verbosity (-v, -vv, -vvv)
    #[clap(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[clap(short, long, global = true)]
    quiet: bool,
}

/// Flags controlling which spec files are discovered.
#[derive(Parser, Clone, Debug)]
pub struct DiscoveryFlags {
    /// Start discovery from PATH (a directory or a spec file)
    #[clap(short = 'f', long, default_value = ".")]
    pub file: PathBuf,

    /// Enable in-tree discovery
    #[clap(long)]
    pub inherit: bool,

    /// Disable in-tree discovery
    #[clap(short = 'n', long)]
    pub no_inherit: bool,

    /// Additional .devshell.yaml to include
    #[clap(short = 'i', long = "include")]
    pub includes: Vec<String>,
}

impl DiscoveryFlags {
    /// Combine the flags with the DEVSHELL_* environment variables.
    pub fn options(&self) -> Result<devshell::DiscoveryOptions> {
        let cwd = std::env::current_dir()
            .map_err(|e| miette::miette!("Failed to read current directory: {e}"))?;

        let env_includes: Vec<String> = std::env::var("DEVSHELL_INCLUDE")
            .ok()
            .map(|s| {
                s.split(':')
                    .filter(|p| !p.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(devshell::DiscoveryOptions {
            no_inherit: self.no_inherit || env_flag("DEVSHELL_NO_INHERIT"),
            force_inherit: self.inherit || env_flag("DEVSHELL_INHERIT"),
            cli_includes: absolute_includes(&self.includes, &cwd),
            env_includes: absolute_includes(&env_includes, &cwd),
        })
    }

    /// Discover and load every applicable spec file.
    pub fn discover(&self) -> Result<Vec<devshell::DevSpec>> {
        let options = self.options()?;
        let specs = devshell::discover_specs(&self.file, &options)?;
        if specs.is_empty() {
            return Err(miette::miette!(
                "No .devshell.yaml files discovered. Run 'devshell init' to create one."
            ));
        }
        Ok(specs)
    }

    /// Discover the spec files and merge them.
    pub fn merged(&self) -> Result<devshell::MergedSpec> {
        Ok(devshell::merge_specs(&self.discover()?))
    }

    /// Location of the lock file for the discovery start path.
    pub fn lock_path(&self) -> PathBuf {
        let dir = if self.file.is_file() {
            self.file.parent().unwrap_or(Path::new("."))
        } else {
            self.file.as_path()
        };
        dir.join(devshell::DEVSHELL_LOCK_FILENAME)
    }
}

/// Whether a boolean-like environment variable is switched on.
fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .is_some_and(|v| matches!(v.as_str(), "1" | "true" | "yes" | "on"))
}

/// Relative includes given outside a spec file are relative to the working directory.
fn absolute_includes(includes: &[String], cwd: &Path) -> Vec<String> {
    includes
        .iter()
        .map(|include| {
            if include.starts_with('~') || Path::new(include).is_absolute() {
                include.clone()
            } else {
                cwd.join(include).display().to_string()
            }
        })
        .collect()
}

#[derive(Subcommand)]
enum Command {
    /// Create a new .devshell.yaml file
    Init(CmdInit),

    /// Display the merged shell configuration
    Show(CmdShow),

    /// Evaluate the shell into environment descriptors
    Eval(CmdEval),

    /// Enter the shell, or run a command inside it
    Shell(CmdShell),

    /// Generate or update lock file
    Lock(CmdLock),

    /// Verify the shell evaluates and matches the lock file
    Check(CmdCheck),
}

impl Opt {
    async fn run(self) -> Result<i32> {
        // Setup logging
        let log_level = match (self.logging.quiet, self.logging.verbose) {
            (true, _) => tracing::Level::ERROR,
            (false, 0) => tracing::Level::WARN,
            (false, 1) => tracing::Level::INFO,
            (false, 2) => tracing::Level::DEBUG,
            (false, _) => tracing::Level::TRACE,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_writer(std::io::stderr)
            .init();

        // Dispatch to command
        match self.cmd {
            Command::Init(mut cmd) => cmd.run().await,
            Command::Show(mut cmd) => cmd.run().await,
            Command::Eval(mut cmd) => cmd.run().await,
            Command::Shell(mut cmd) => cmd.run().await,
            Command::Lock(mut cmd) => cmd.run().await,
            Command::Check(mut cmd) => cmd.run().await,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let opt = Opt::parse();
    let code = opt.run().await?;
    std::process::exit(code);
}

#[cfg(test)]
#[path = "./main_test.rs"]
mod main_test;
