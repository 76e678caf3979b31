use anyhow::{Context, Result};
use std::process::Command;

use crate::step;

/// Runs in the foreground so the walkthrough prints straight to the terminal.
pub fn run() -> Result<()> {
    step::banner("🖥  Panel walkthrough (MockCog)");

    let status = Command::new("cargo")
        .args(["run", "-p", "ext3", "--example", "panel_walkthrough", "--features", "std"])
        .status()
        .context("Failed to run the walkthrough")?;
    if !status.success() {
        anyhow::bail!("Walkthrough exited with {status}");
    }
    Ok(())
}
