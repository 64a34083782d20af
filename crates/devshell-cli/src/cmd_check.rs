// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Verify that the shell evaluates and matches the lock file.

use std::sync::Arc;

use clap::Args;
use colored::Colorize;
use miette::Result;

use devshell::{LockChangeKind, LockFile, ShellEvaluator};

/// Verify the shell evaluates and matches the lock file
#[derive(Debug, Args)]
pub struct CmdCheck {
    #[clap(flatten)]
    discovery: crate::DiscoveryFlags,

    /// Exit with error on mismatch
    #[clap(long)]
    strict: bool,
}

impl CmdCheck {
    pub async fn run(&mut self) -> Result<i32> {
        let merged = self.discovery.merged()?;

        // Every declared platform must evaluate
        let evaluator = Arc::new(ShellEvaluator::new(merged.clone())?);
        let platforms = evaluator.platforms()?;
        let descriptors = crate::cmd_eval::evaluate_concurrently(&evaluator, &platforms).await?;
        for (platform, descriptor) in &descriptors {
            println!(
                "{} {} evaluates ({} package(s))",
                "✓".green(),
                platform.to_string().cyan(),
                descriptor.packages.len()
            );
        }

        // Load lock file
        let lock_path = self.discovery.lock_path();

        if !lock_path.exists() {
            if self.strict {
                return Err(miette::miette!("No lock file found at {:?}", lock_path));
            } else {
                println!("Warning: No lock file found");
                return Ok(2);
            }
        }

        let lock = LockFile::load(&lock_path)?;

        // Verify
        let changes = devshell::verify_lock(&lock, &merged)?;

        if changes.is_empty() {
            println!("{} Shell matches lock file", "✓".green());
            return Ok(0);
        }

        // Report changes
        if self.strict {
            eprintln!("Error: Shell differs from lock file:");
        } else {
            println!("Warning: Shell differs from lock file:");
        }

        for change in &changes {
            match &change.kind {
                LockChangeKind::InputChanged | LockChangeKind::ToolchainChanged => {
                    println!("  - {} '{}'", change.kind, change.reference);
                    if let (Some(exp), Some(act)) = (&change.expected, &change.actual) {
                        println!("    Expected: {}", exp);
                        println!("    Actual:   {}", act);
                    }
                }
                LockChangeKind::SourceFileChanged => {
                    println!("  - Spec file '{}' was modified", change.reference);
                }
                _ => {
                    println!("  - {}: {}", change.kind, change.reference);
                }
            }
        }

        if self.strict {
            return Ok(1);
        }

        println!("\nRun 'devshell lock --update' to update the lock file");
        Ok(0)
    }
}
