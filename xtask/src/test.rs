use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{self, OnFailure};

/// Integration test binaries under `crates/*/tests`.
const INTEGRATION_PACKAGES: [&str; 2] = ["ext3", "epd-specs"];

pub fn run(unit_only: bool, integration_only: bool) -> Result<()> {
    step::banner("🧪 Running tests...");
    let start = Instant::now();

    if !integration_only {
        if let Some(output) = step::cargo("Unit tests", &["test", "--lib", "--workspace"], OnFailure::Fail)? {
            println!("    {}", step::test_summary(&output).dimmed());
        }
    }

    if !unit_only {
        for package in INTEGRATION_PACKAGES {
            let label = format!("Integration tests ({package})");
            if let Some(output) = step::cargo(&label, &["test", "-p", package, "--tests"], OnFailure::Fail)? {
                println!("    {}", step::test_summary(&output).dimmed());
            }
        }
    }

    step::cargo("Doc tests", &["test", "--doc", "--workspace"], OnFailure::Warn)?;

    step::done("All tests completed", start);
    Ok(())
}
