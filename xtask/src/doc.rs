use anyhow::Result;
use colored::Colorize;
use std::time::Instant;

use crate::step::{self, OnFailure};

pub fn run(open: bool) -> Result<()> {
    step::banner("📚 Building documentation...");
    let start = Instant::now();

    let mut args = vec!["doc", "--workspace", "--no-deps", "--features", "ext3/std"];
    if open {
        args.push("--open");
    }
    step::cargo("Documentation", &args, OnFailure::Fail)?;

    if !open {
        println!("   {}", "Open target/doc/ext3/index.html in your browser".dimmed());
        println!("   {}", "Or run 'cargo run -p xtask -- doc --open'".dimmed());
        println!();
    }

    step::done("Documentation built", start);
    Ok(())
}
