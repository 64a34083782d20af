// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Generate or update lock files for devshell specs.

use clap::Args;
use miette::Result;

use devshell::LockFile;

/// Generate or update lock file
#[derive(Debug, Args)]
pub struct CmdLock {
    #[clap(flatten)]
    discovery: crate::DiscoveryFlags,

    /// Update existing lock file
    #[clap(long)]
    update: bool,

    /// Force regeneration even if up-to-date
    #[clap(long)]
    force: bool,

    /// Verify lock is current (exit 1 if not)
    #[clap(long)]
    check: bool,
}

impl CmdLock {
    pub async fn run(&mut self) -> Result<i32> {
        let merged = self.discovery.merged()?;

        // Lock file lives beside the starting path
        let lock_path = self.discovery.lock_path();

        if self.check {
            // Verify mode
            if !lock_path.exists() {
                eprintln!("No lock file found at {:?}", lock_path);
                return Ok(2);
            }

            let lock = LockFile::load(&lock_path)?;
            let changes = devshell::verify_lock(&lock, &merged)?;

            if !changes.is_empty() {
                eprintln!("Lock file is out of date:");
                for change in &changes {
                    eprintln!("  - {}: {}", change.kind, change.reference);
                }
                return Ok(1);
            }

            println!("Lock file is up to date");
            return Ok(0);
        }

        // Generate / update mode
        if lock_path.exists() && !self.update && !self.force {
            return Err(miette::miette!(
                "Lock file already exists at {:?}. Use --update or --force",
                lock_path
            ));
        }

        if lock_path.exists() && self.update && !self.force {
            let lock = LockFile::load(&lock_path)?;
            if devshell::verify_lock(&lock, &merged)?.is_empty() {
                println!("Lock file is already up to date: {:?}", lock_path);
                return Ok(0);
            }
        }

        let lock = devshell::generate_lock(&merged)?;
        lock.save(&lock_path)?;
        println!("Generated lock file: {:?}", lock_path);

        Ok(0)
    }
}
