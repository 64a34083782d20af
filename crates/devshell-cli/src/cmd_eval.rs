// Copyright (c) Contributors to the SPK project.
// SPDX-License-Identifier: Apache-2.0

//! Implementation of the `devshell eval` command.

use std::sync::Arc;

use clap::Args;
use indexmap::IndexMap;
use miette::{IntoDiagnostic, Result};

use devshell::{EnvironmentDescriptor, Platform, ShellEvaluator};

/// Evaluate the shell into environment descriptors
#[derive(Debug, Args)]
pub struct CmdEval {
    #[clap(flatten)]
    discovery: crate::DiscoveryFlags,

    /// Platform to evaluate (default: the spec's default platform)
    #[clap(short, long, env = "DEVSHELL_PLATFORM", conflicts_with = "all")]
    platform: Option<Platform>,

    /// Evaluate every declared platform
    #[clap(short, long)]
    all: bool,

    /// Output the resolved package set instead of the shell
    #[clap(long)]
    packages: bool,

    /// Output format: yaml, json
    #[clap(long, default_value = "yaml")]
    format: String,
}

impl CmdEval {
    pub async fn run(&mut self) -> Result<i32> {
        let merged = self.discovery.merged()?;
        let evaluator = Arc::new(ShellEvaluator::new(merged)?);

        let platforms = if self.all {
            evaluator.platforms()?
        } else {
            match self.platform {
                Some(platform) => vec![evaluator.check_platform(platform)?],
                None => vec![evaluator.default_platform()?],
            }
        };

        let output = if self.packages {
            let mut sets = IndexMap::new();
            for platform in platforms {
                sets.insert(platform, evaluator.packages(platform)?);
            }
            self.render(&sets)?
        } else {
            let descriptors = evaluate_concurrently(&evaluator, &platforms).await?;
            match descriptors.first() {
                Some((_, descriptor)) if !self.all => self.render(descriptor)?,
                _ => self.render(&descriptors)?,
            }
        };

        print!("{output}");
        Ok(0)
    }

    fn render<T: serde::Serialize>(&self, value: &T) -> Result<String> {
        match self.format.as_str() {
            "json" => serde_json::to_string_pretty(value)
                .map(|s| s + "\n")
                .into_diagnostic(),
            "yaml" => serde_yaml::to_string(value).into_diagnostic(),
            other => Err(miette::miette!(
                "Unknown output format '{other}', expected yaml or json"
            )),
        }
    }
}

/// Evaluate each platform on its own blocking task.
///
/// Results are collected in the given order and the first failure in that
/// order is returned, matching a sequential evaluation.
pub async fn evaluate_concurrently(
    evaluator: &Arc<ShellEvaluator>,
    platforms: &[Platform],
) -> Result<IndexMap<Platform, EnvironmentDescriptor>> {
    let handles: Vec<_> = platforms
        .iter()
        .map(|&platform| {
            let evaluator = Arc::clone(evaluator);
            (
                platform,
                tokio::task::spawn_blocking(move || evaluator.evaluate(platform)),
            )
        })
        .collect();

    let mut descriptors = IndexMap::new();
    for (platform, handle) in handles {
        let descriptor = handle
            .await
            .map_err(|e| miette::miette!("Evaluation task for {platform} failed: {e}"))??;
        descriptors.insert(platform, descriptor);
    }
    Ok(descriptors)
}

#[cfg(test)]
#[path = "./cmd_eval_test.rs"]
mod cmd_eval_test;
