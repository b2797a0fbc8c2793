//! Entry-level access to client archives
//!
//! These functions operate on archives that have already been
//! de-obfuscated (see [`crate::obfuscation`]). Reads go straight through the
//! zip container; every modification writes a complete new container to a
//! temporary file beside the original and renames it over the original, so a
//! caller never observes an archive that lacks the entry being replaced.

use crate::path::{flattened_name, join_entry_path, normalize_entry_path, same_entry};
use crate::{Error, Result};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

type ArchiveReader = ZipArchive<BufReader<File>>;

fn open_archive(archive_path: &Path) -> Result<ArchiveReader> {
    let file = File::open(archive_path)?;
    Ok(ZipArchive::new(BufReader::new(file))?)
}

fn find_entry(archive: &mut ArchiveReader, entry_path: &str) -> Result<Option<usize>> {
    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        if !file.is_dir() && same_entry(file.name(), entry_path) {
            return Ok(Some(index));
        }
    }
    Ok(None)
}

/// List the names of all file entries in an archive
pub fn list_entries<P: AsRef<Path>>(archive_path: P) -> Result<Vec<String>> {
    let mut archive = open_archive(archive_path.as_ref())?;
    let mut names = Vec::with_capacity(archive.len());
    for index in 0..archive.len() {
        let file = archive.by_index(index)?;
        if !file.is_dir() {
            names.push(file.name().to_string());
        }
    }
    Ok(names)
}

/// Largest buffer reserved up front from a size declared in an entry header
const MAX_PREALLOC: u64 = 1 << 20;

/// Initial buffer size for an entry whose header declares `declared` bytes
///
/// Headers are not trusted; larger entries grow the buffer while reading.
fn capacity_hint(declared: u64) -> usize {
    declared.min(MAX_PREALLOC) as usize
}

/// Read the decompressed contents of a single entry
///
/// `entry_path` may use either path separator.
pub fn extract_entry<P: AsRef<Path>>(archive_path: P, entry_path: &str) -> Result<Vec<u8>> {
    let archive_path = archive_path.as_ref();
    let mut archive = open_archive(archive_path)?;

    let index = find_entry(&mut archive, entry_path)?.ok_or_else(|| {
        Error::entry_not_found(archive_path.display().to_string(), entry_path)
    })?;

    let mut file = archive.by_index(index)?;
    let mut data = Vec::with_capacity(capacity_hint(file.size()));
    file.read_to_end(&mut data)?;

    log::debug!(
        "Extracted {} ({} bytes) from {}",
        entry_path,
        data.len(),
        archive_path.display()
    );
    Ok(data)
}

/// Extract a single entry into `directory`, flattening its folder structure
///
/// Returns the path of the written file. An existing file is overwritten.
pub fn extract_entry_to<P: AsRef<Path>, D: AsRef<Path>>(
    archive_path: P,
    entry_path: &str,
    directory: D,
) -> Result<PathBuf> {
    let data = extract_entry(archive_path, entry_path)?;
    let directory = directory.as_ref();
    fs::create_dir_all(directory)?;

    let output = directory.join(flattened_name(entry_path));
    fs::write(&output, data)?;
    Ok(output)
}

/// Replace an entry with new contents
///
/// Every existing entry at `entry_path` is dropped and a single new entry
/// holding `data` is written under the same logical path.
pub fn replace_entry<P: AsRef<Path>>(archive_path: P, entry_path: &str, data: &[u8]) -> Result<()> {
    let archive_path = archive_path.as_ref();
    let name = normalize_entry_path(entry_path);

    rewrite_archive(
        archive_path,
        |existing| !same_entry(existing, &name),
        vec![(name.clone(), data.to_vec())],
    )?;

    log::debug!(
        "Replaced {} ({} bytes) in {}",
        name,
        data.len(),
        archive_path.display()
    );
    Ok(())
}

/// Merge every file of `source_archive` into `dest_archive` under `dest_directory`
///
/// Source folders are flattened, so `x/y/a.txt` lands at
/// `dest_directory/a.txt`. Destination entries at any of the target paths are
/// replaced; all other destination entries are left untouched. Returns the
/// number of merged entries.
pub fn merge_archive_into<S: AsRef<Path>, D: AsRef<Path>>(
    source_archive: S,
    dest_archive: D,
    dest_directory: &str,
) -> Result<usize> {
    let source_path = source_archive.as_ref();
    let dest_path = dest_archive.as_ref();

    let mut source = open_archive(source_path)?;
    let mut additions: Vec<(String, Vec<u8>)> = Vec::with_capacity(source.len());

    for index in 0..source.len() {
        let mut file = source.by_index(index)?;
        if file.is_dir() {
            continue;
        }

        let target = join_entry_path(dest_directory, flattened_name(file.name()));
        let mut data = Vec::with_capacity(capacity_hint(file.size()));
        file.read_to_end(&mut data)?;

        // Later entries win when flattening folds two names together
        if let Some(existing) = additions.iter_mut().find(|(name, _)| *name == target) {
            log::warn!(
                "{} flattens onto an earlier entry at {}",
                file.name(),
                target
            );
            existing.1 = data;
        } else {
            additions.push((target, data));
        }
    }
    drop(source);

    let merged = additions.len();
    let targets: Vec<String> = additions.iter().map(|(name, _)| name.clone()).collect();
    rewrite_archive(
        dest_path,
        |existing| !targets.iter().any(|target| same_entry(existing, target)),
        additions,
    )?;

    log::debug!(
        "Merged {} entries from {} into {}:{}",
        merged,
        source_path.display(),
        dest_path.display(),
        dest_directory
    );
    Ok(merged)
}

/// Write a new container holding the kept entries plus `additions`, then
/// swap it in place of `archive_path`
fn rewrite_archive<F>(
    archive_path: &Path,
    keep: F,
    additions: Vec<(String, Vec<u8>)>,
) -> Result<()>
where
    F: Fn(&str) -> bool,
{
    let mut source = open_archive(archive_path)?;

    let directory = match archive_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut temp = NamedTempFile::new_in(directory)?;

    {
        let mut writer = ZipWriter::new(BufWriter::new(temp.as_file_mut()));

        for index in 0..source.len() {
            let file = source.by_index(index)?;
            if !keep(file.name()) {
                log::trace!("Dropping {} from {}", file.name(), archive_path.display());
                continue;
            }
            writer.raw_copy_file(file)?;
        }

        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in additions {
            writer.start_file(name, options)?;
            writer.write_all(&data)?;
        }

        let mut inner = writer.finish()?;
        inner.flush()?;
    }

    // Release the source handle before the rename
    drop(source);

    fs::set_permissions(temp.path(), fs::metadata(archive_path)?.permissions())?;
    temp.persist(archive_path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}
