//! Patch run command

use anyhow::{Context, Result};
use clap::Args;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;
use sw_patch::{PatchOptions, PatchOutcome, Patcher, ProgressCallback, ResourceDescriptor};

use crate::utils::create_progress_bar;

#[derive(Args)]
pub struct PatchArgs {
    /// Game installation directory (read only)
    #[arg(long, env = "SWPATCHER_GAME_ROOT")]
    pub game_root: PathBuf,

    /// Working directory holding the per-language inputs and outputs
    #[arg(long, env = "SWPATCHER_WORK_ROOT")]
    pub work_root: PathBuf,

    /// Language code to patch
    #[arg(short, long)]
    pub language: String,

    /// JSON file with the list of units to patch
    #[arg(short, long)]
    pub descriptors: PathBuf,

    /// Archive obfuscation key (decimal or 0x-prefixed hex)
    #[arg(long, value_parser = super::parse_key)]
    pub key: Option<u8>,
}

pub fn execute(args: PatchArgs, quiet: bool) -> Result<()> {
    let descriptors = load_descriptors(&args.descriptors)?;
    if descriptors.is_empty() {
        println!("No units to patch in {}", args.descriptors.display());
        return Ok(());
    }

    let mut options = PatchOptions::new(&args.game_root, &args.work_root, &args.language);
    if let Some(key) = args.key {
        options = options.with_key(key);
    }
    let output_dir = options.language_dir();

    let pb = create_progress_bar(descriptors.len() as u64, "Patching", quiet);
    let bar = pb.clone();
    let progress: ProgressCallback = Box::new(move |done, _total, unit| {
        bar.set_position(done as u64);
        bar.set_message(unit.to_string());
    });

    let start = Instant::now();
    let handle = Patcher::new(descriptors, options)
        .spawn(Some(progress))
        .context("Failed to start patch")?;
    let outcome = handle.join();
    pb.finish_and_clear();

    match outcome.with_context(|| format!("Failed to patch language '{}'", args.language))? {
        PatchOutcome::Completed(summary) => {
            println!(
                "Patched {} units in {} archives ({} of {} records translated) in {:.2?}",
                summary.units,
                summary.archives,
                summary.translated_records,
                summary.records,
                start.elapsed()
            );
            println!("Output: {}", output_dir.display());
        }
        PatchOutcome::Cancelled => println!("Patch cancelled, no files were changed"),
    }

    Ok(())
}

fn load_descriptors(path: &Path) -> Result<Vec<ResourceDescriptor>> {
    let file =
        File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse descriptor list {}", path.display()))
}
