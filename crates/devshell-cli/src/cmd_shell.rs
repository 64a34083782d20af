// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `devshell shell` command.

use clap::Args;
use colored::Colorize;
use miette::Result;

use devshell::{Platform, ShellEvaluator};

/// Enter the shell, or run a command inside it
#[derive(Debug, Args)]
pub struct CmdShell {
    #[clap(flatten)]
    discovery: crate::DiscoveryFlags,

    /// Platform to materialize (default: the spec's default platform)
    #[clap(short, long, env = "DEVSHELL_PLATFORM")]
    platform: Option<Platform>,

    /// Print the startup script instead of entering the shell
    #[clap(long)]
    print: bool,

    /// Shell to use (default: $SHELL)
    #[clap(long)]
    shell: Option<String>,

    /// Command to run (default: the shell)
    #[clap(last = true)]
    command: Vec<String>,
}

impl CmdShell {
    pub async fn run(&mut self) -> Result<i32> {
        let merged = self.discovery.merged()?;
        let evaluator = ShellEvaluator::new(merged)?;
        let platform = match self.platform {
            Some(platform) => evaluator.check_platform(platform)?,
            None => evaluator.default_platform()?,
        };

        if Platform::current() != Some(platform) && !self.print {
            tracing::warn!(%platform, "materializing a shell for a platform other than the host");
        }

        let descriptor = evaluator.evaluate(platform)?;

        if self.print {
            print!("{}", devshell::shell::startup_script(platform, &descriptor));
            return Ok(0);
        }

        // Determine command to run
        let (program, args) = match self.command.split_first() {
            Some((program, args)) => (program.clone(), args.to_vec()),
            None => (
                self.shell.clone().unwrap_or_else(devshell::shell::default_shell),
                Vec::new(),
            ),
        };

        tracing::info!(
            "Entering {} shell with {} package(s)",
            platform.to_string().cyan(),
            descriptor.packages.len()
        );

        let cmd = devshell::shell::build_command(platform, &descriptor, &program, &args);
        let status = tokio::process::Command::from(cmd)
            .status()
            .await
            .map_err(|e| miette::miette!("Failed to run '{program}': {e}"))?;

        Ok(status.code().unwrap_or(1))
    }
}
