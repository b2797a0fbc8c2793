//! Archive command implementations

use anyhow::{Context, Result};
use clap::Subcommand;
use std::fs;
use std::path::{Path, PathBuf};
use sw_archive::{ARCHIVE_KEY, extract_entry_to, list_entries, xor_file};
use tempfile::TempDir;

#[derive(Subcommand)]
pub enum ArchiveCommands {
    /// List the entries of an archive
    List {
        /// Path to the archive
        archive: PathBuf,

        /// The archive is still obfuscated
        #[arg(long)]
        obfuscated: bool,

        /// Obfuscation key (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = super::parse_key, default_value_t = ARCHIVE_KEY)]
        key: u8,
    },

    /// Extract a single entry
    Extract {
        /// Path to the archive
        archive: PathBuf,

        /// Entry to extract
        entry: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,

        /// The archive is still obfuscated
        #[arg(long)]
        obfuscated: bool,

        /// Obfuscation key (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = super::parse_key, default_value_t = ARCHIVE_KEY)]
        key: u8,
    },

    /// Toggle the obfuscation of a file in place
    Xor {
        /// File to transform
        file: PathBuf,

        /// Obfuscation key (decimal or 0x-prefixed hex)
        #[arg(long, value_parser = super::parse_key, default_value_t = ARCHIVE_KEY)]
        key: u8,
    },
}

pub fn execute(command: ArchiveCommands) -> Result<()> {
    match command {
        ArchiveCommands::List {
            archive,
            obfuscated,
            key,
        } => list_command(&archive, obfuscated.then_some(key)),
        ArchiveCommands::Extract {
            archive,
            entry,
            output,
            obfuscated,
            key,
        } => extract_command(&archive, &entry, &output, obfuscated.then_some(key)),
        ArchiveCommands::Xor { file, key } => {
            xor_file(&file, key).with_context(|| format!("Failed to transform {}", file.display()))?;
            println!("Transformed {} with key 0x{key:02x}", file.display());
            Ok(())
        }
    }
}

/// A readable zip: the archive itself or a de-obfuscated scratch copy
struct PlainArchive {
    _scratch: Option<TempDir>,
    path: PathBuf,
}

impl PlainArchive {
    fn open(archive: &Path, key: Option<u8>) -> Result<Self> {
        let Some(key) = key else {
            return Ok(Self {
                _scratch: None,
                path: archive.to_path_buf(),
            });
        };

        let scratch = TempDir::new().context("Failed to create scratch directory")?;
        let path = scratch.path().join("archive.zip");
        fs::copy(archive, &path)
            .with_context(|| format!("Failed to copy {}", archive.display()))?;
        xor_file(&path, key)?;

        Ok(Self {
            _scratch: Some(scratch),
            path,
        })
    }
}

fn list_command(archive: &Path, key: Option<u8>) -> Result<()> {
    let plain = PlainArchive::open(archive, key)?;
    let entries = list_entries(&plain.path)
        .with_context(|| format!("Failed to read {}", archive.display()))?;

    for entry in &entries {
        println!("{entry}");
    }
    log::info!("{} entries", entries.len());
    Ok(())
}

fn extract_command(archive: &Path, entry: &str, output: &Path, key: Option<u8>) -> Result<()> {
    let plain = PlainArchive::open(archive, key)?;
    let written = extract_entry_to(&plain.path, entry, output)
        .with_context(|| format!("Failed to extract {entry} from {}", archive.display()))?;
    println!("Extracted {}", written.display());
    Ok(())
}
