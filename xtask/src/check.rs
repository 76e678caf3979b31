use anyhow::Result;
use std::time::Instant;

use crate::step::{self, OnFailure};

/// Bare-metal target the driver is checked against.
const EMBEDDED_TARGET: &str = "thumbv7em-none-eabihf";

pub fn run() -> Result<()> {
    step::banner("🔍 Checking the EXT3 driver...");
    let start = Instant::now();

    // no_std: the driver and its lower crates without std
    step::cargo(
        "Embedded target (no_std)",
        &["check", "-p", "ext3", "--target", EMBEDDED_TARGET, "--no-default-features"],
        OnFailure::Fail,
    )?;

    step::cargo(
        "Embedded target with defmt",
        &["check", "-p", "ext3", "--target", EMBEDDED_TARGET, "--features", "defmt"],
        OnFailure::Fail,
    )?;

    // Host build with mocks, as the tests and the demo use it
    step::cargo(
        "Host (std)",
        &["check", "--workspace", "--all-targets", "--features", "ext3/std"],
        OnFailure::Fail,
    )?;

    step::cargo(
        "Clippy",
        &["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"],
        OnFailure::Warn,
    )?;

    if step::cargo("Formatting", &["fmt", "--all", "--check"], OnFailure::Warn)?.is_none() {
        eprintln!("     Run 'cargo fmt --all' to fix");
    }

    step::done("All checks completed", start);
    Ok(())
}
