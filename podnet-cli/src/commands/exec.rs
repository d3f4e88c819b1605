//! Exec command implementation

use anyhow::{Context, Result};
use podnet_namespace::{NamespaceKind, NamespaceSwitcher};
use std::path::Path;
use std::process::Command;

pub fn execute(netns: &Path, command: &[String]) -> Result<()> {
    let (program, args) = command.split_first().context("No command given")?;

    let switcher = NamespaceSwitcher::open(netns)
        .with_context(|| format!("Failed to open namespace {}", netns.display()))?;

    if switcher.kind() != NamespaceKind::Network {
        anyhow::bail!("{} is not a network namespace", netns.display());
    }

    tracing::info!(netns = %netns.display(), command = %command.join(" "), "Executing in namespace");

    // The child inherits the namespaces of the forking thread
    let status = switcher
        .run(|_| Ok(Command::new(program).args(args).status()?))
        .with_context(|| format!("Failed to run {program}"))?;

    if !status.success() {
        anyhow::bail!("{program} exited with {status}");
    }

    Ok(())
}
