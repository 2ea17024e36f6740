use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;

use cinder_checker::{analyze_source, Verdict};

#[derive(Parser)]
#[command(
    name = "cinder",
    version,
    about = "Type-check a cinder program delivered as a JSON syntax tree."
)]
struct Cli {
    /// Path to the JSON-encoded syntax tree.
    input: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let contents = fs::read_to_string(&cli.input)
        .with_context(|| format!("Failed to read {:?}", cli.input))?;

    // Type errors are a verdict, not a failure: the analysis completed.
    // Anything else (unreadable file, bad JSON, malformed tree) propagates
    // and exits non-zero.
    match analyze_source(&contents)? {
        Verdict::Valid => println!("valid"),
        Verdict::Invalid(message) => println!("invalid: {message}"),
    }
    Ok(())
}
