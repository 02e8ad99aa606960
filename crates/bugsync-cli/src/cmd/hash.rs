//! `bugsync hash`: print the change-detection hash of a raw bug record.

use anyhow::{Context as _, Result};
use bugsync_core::hash::content_hash;
use clap::Args;
use serde::Serialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct HashArgs {
    /// JSON file holding one raw bug record.
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct HashOutput {
    file: String,
    hash: String,
}

pub fn run_hash(args: &HashArgs, output: OutputMode) -> Result<()> {
    let content = std::fs::read_to_string(&args.file)
        .with_context(|| format!("failed to read {}", args.file.display()))?;
    let record: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", args.file.display()))?;

    let result = HashOutput {
        file: args.file.display().to_string(),
        hash: content_hash(&record),
    };

    render_mode(
        output,
        &result,
        |result, w| writeln!(w, "{}", result.hash),
        |result, w| {
            pretty_kv(w, "file", &result.file)?;
            pretty_kv(w, "hash", &result.hash)
        },
    )
}
