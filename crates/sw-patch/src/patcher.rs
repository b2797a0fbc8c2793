//! Patch run orchestration
//!
//! A run works on copies. Every archive named by the descriptors is copied
//! from the game root into a scratch directory under
//! `<work_root>/<language>/` and de-obfuscated once. All units are applied to
//! those copies, the archives are obfuscated again, and only then are the
//! results moved to `<work_root>/<language>/<archive path>`. A run that
//! fails or is cancelled before that move drops the scratch directory and
//! leaves every destination file as it was. The move itself is one rename
//! per output; if a rename fails, outputs renamed before it stay in place.

use crate::descriptor::ResourceDescriptor;
use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::thread::{self, JoinHandle};
use sw_archive::ARCHIVE_KEY;
use sw_res::{CancellationToken, FormatGrammar, PatchStats, RecordCodec, TranslationTable};
use tempfile::TempDir;

/// Progress callback, invoked after each unit with `(done, total, unit)`
pub type ProgressCallback = Box<dyn Fn(usize, usize, &str) + Send + Sync>;

/// Locations and settings for a patch run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchOptions {
    /// Game installation; only read from
    pub game_root: PathBuf,
    /// Working directory holding `<language>/` inputs and outputs
    pub work_root: PathBuf,
    /// Language code naming the per-language directory
    pub language: String,
    /// Archive obfuscation key
    pub key: u8,
}

impl PatchOptions {
    /// Create options using the standard archive key
    pub fn new(
        game_root: impl Into<PathBuf>,
        work_root: impl Into<PathBuf>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            game_root: game_root.into(),
            work_root: work_root.into(),
            language: language.into(),
            key: ARCHIVE_KEY,
        }
    }

    /// Use a different obfuscation key
    pub fn with_key(mut self, key: u8) -> Self {
        self.key = key;
        self
    }

    /// Directory holding this language's inputs and outputs
    pub fn language_dir(&self) -> PathBuf {
        self.work_root.join(&self.language)
    }
}

/// Totals of a completed run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchSummary {
    /// Units applied
    pub units: usize,
    /// Distinct archives rewritten
    pub archives: usize,
    /// Records written across all formatted units
    pub records: u64,
    /// Records that received translated text
    pub translated_records: u64,
    /// Files written under the language directory
    pub outputs: Vec<PathBuf>,
}

/// Terminal state of a run that did not fail
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOutcome {
    /// Every unit was applied and the outputs are in place
    Completed(PatchSummary),
    /// Cancellation was observed; no output was written
    Cancelled,
}

impl PatchOutcome {
    /// Check if the run was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, PatchOutcome::Cancelled)
    }

    /// Summary of a completed run
    pub fn summary(&self) -> Option<&PatchSummary> {
        match self {
            PatchOutcome::Completed(summary) => Some(summary),
            PatchOutcome::Cancelled => None,
        }
    }
}

/// A descriptor with everything resolved that can be checked up front
#[derive(Debug)]
struct PreparedUnit<'a> {
    descriptor: &'a ResourceDescriptor,
    name: String,
    target: PathBuf,
    grammar: Option<FormatGrammar>,
    input: PathBuf,
}

/// Applies a list of descriptors for one language
#[derive(Debug, Clone)]
pub struct Patcher {
    descriptors: Vec<ResourceDescriptor>,
    options: PatchOptions,
}

impl Patcher {
    /// Create a patcher
    pub fn new(descriptors: Vec<ResourceDescriptor>, options: PatchOptions) -> Self {
        Self {
            descriptors,
            options,
        }
    }

    /// Descriptors applied by this patcher
    pub fn descriptors(&self) -> &[ResourceDescriptor] {
        &self.descriptors
    }

    /// Options of this patcher
    pub fn options(&self) -> &PatchOptions {
        &self.options
    }

    /// Run the patch on the current thread
    ///
    /// `token` is polled between units and inside the record codec. Errors
    /// abort the run at the first failing unit.
    pub fn run(
        &self,
        token: &CancellationToken,
        progress: Option<&ProgressCallback>,
    ) -> Result<PatchOutcome> {
        let language = &self.options.language;
        let language_dir = self.options.language_dir();

        info!(
            "Starting {} patch: {} units -> {}",
            language,
            self.descriptors.len(),
            language_dir.display()
        );

        // Phase 1: resolve every unit before any file is touched
        debug!("Phase 1: Resolving units");
        let units = self.prepare(&language_dir)?;

        if token.is_cancelled() {
            info!("Patch cancelled before staging");
            return Ok(PatchOutcome::Cancelled);
        }

        // Phase 2: stage and de-obfuscate archives
        debug!("Phase 2: Staging archives");
        fs::create_dir_all(&language_dir).map_err(|e| Error::io(&language_dir, e))?;
        let mut staging = Staging::new(&language_dir)?;

        for unit in units.iter().filter(|u| u.descriptor.is_archive_entry()) {
            if token.is_cancelled() {
                info!("Patch cancelled while staging");
                return Ok(PatchOutcome::Cancelled);
            }
            staging
                .stage_archive(&self.options, &unit.target)
                .map_err(|e| e.for_unit(&unit.name, language))?;
        }

        // Phase 3: apply units
        debug!("Phase 3: Applying {} units", units.len());
        let mut summary = PatchSummary::default();
        let total = units.len();

        for (index, unit) in units.iter().enumerate() {
            if token.is_cancelled() {
                info!("Patch cancelled before {}", unit.name);
                return Ok(PatchOutcome::Cancelled);
            }

            match self.apply_unit(unit, &mut staging, token) {
                Ok(Some(stats)) => {
                    summary.records += stats.records;
                    summary.translated_records += stats.translated_records;
                }
                Ok(None) => {}
                Err(e) if is_cancellation(&e) => {
                    info!("Patch cancelled in {}", unit.name);
                    return Ok(PatchOutcome::Cancelled);
                }
                Err(e) => return Err(e.for_unit(&unit.name, language)),
            }

            summary.units += 1;
            if let Some(callback) = progress {
                callback(index + 1, total, &unit.name);
            }
        }

        if token.is_cancelled() {
            info!("Patch cancelled before writing outputs");
            return Ok(PatchOutcome::Cancelled);
        }

        // Phase 4: obfuscate archives and move outputs into place
        debug!("Phase 4: Writing outputs");
        staging.seal(self.options.key)?;
        summary.archives = staging.archive_count();
        summary.outputs = staging.persist(&language_dir)?;

        info!(
            "Finished {} patch: {} units, {} of {} records translated",
            language, summary.units, summary.translated_records, summary.records
        );

        Ok(PatchOutcome::Completed(summary))
    }

    /// Run the patch on a worker thread
    pub fn spawn(self, progress: Option<ProgressCallback>) -> Result<PatchHandle> {
        let token = CancellationToken::new();
        let worker_token = token.clone();

        let worker = thread::Builder::new()
            .name(format!("swpatch-{}", self.options.language))
            .spawn(move || self.run(&worker_token, progress.as_ref()))
            .map_err(Error::WorkerSpawn)?;

        Ok(PatchHandle { token, worker })
    }

    fn prepare<'a>(&'a self, language_dir: &Path) -> Result<Vec<PreparedUnit<'a>>> {
        let mut kinds: HashMap<PathBuf, bool> = HashMap::new();
        let mut units = Vec::with_capacity(self.descriptors.len());

        for descriptor in &self.descriptors {
            let name = descriptor.to_string();

            let target = descriptor.archive_relative_path();
            if target.as_os_str().is_empty() {
                return Err(Error::InvalidDescriptor(format!(
                    "{name}: empty archive path"
                )));
            }
            if !target.components().all(|c| matches!(c, Component::Normal(_))) {
                return Err(Error::InvalidDescriptor(format!(
                    "{name}: archive path must stay inside the game root"
                )));
            }

            let is_archive = descriptor.is_archive_entry();
            if let Some(previous) = kinds.insert(target.clone(), is_archive) {
                if previous != is_archive {
                    return Err(Error::InvalidDescriptor(format!(
                        "{name}: {} is used both as an archive and as a standalone file",
                        descriptor.archive_path
                    )));
                }
            }

            let input = descriptor.translation_path(language_dir).ok_or_else(|| {
                Error::InvalidDescriptor(format!("{name}: download path has no file name"))
            })?;

            let grammar = descriptor
                .grammar()
                .transpose()
                .map_err(|source| Error::GrammarSyntax {
                    unit: name.clone(),
                    source,
                })?;

            units.push(PreparedUnit {
                descriptor,
                name,
                target,
                grammar,
                input,
            });
        }

        Ok(units)
    }

    fn apply_unit(
        &self,
        unit: &PreparedUnit<'_>,
        staging: &mut Staging,
        token: &CancellationToken,
    ) -> Result<Option<PatchStats>> {
        let Some(grammar) = &unit.grammar else {
            debug!("Copying {} from {}", unit.name, unit.input.display());
            self.copy_substitute(unit, staging)?;
            return Ok(None);
        };

        let table = TranslationTable::load(
            &unit.input,
            grammar.text_field_count(),
            grammar.id_field_index(),
        )
        .map_err(|source| Error::TranslationParse {
            unit: unit.name.clone(),
            language: self.options.language.clone(),
            path: unit.input.clone(),
            source,
        })?;
        debug!(
            "Patching {} with {} translations from {}",
            unit.name,
            table.len(),
            unit.input.display()
        );

        let original = self.read_original(unit, staging)?;
        let (patched, stats) = RecordCodec::new(grammar, &table)
            .with_cancellation(token.clone())
            .patch_bytes(&original)
            .map_err(|source| Error::Resource {
                unit: unit.name.clone(),
                language: self.options.language.clone(),
                source,
            })?;

        if stats.translated_records == 0 && !table.is_empty() {
            warn!("No record of {} matched its translation table", unit.name);
        }

        self.write_patched(unit, staging, &patched)?;
        Ok(Some(stats))
    }

    fn read_original(&self, unit: &PreparedUnit<'_>, staging: &Staging) -> Result<Vec<u8>> {
        if unit.descriptor.is_archive_entry() {
            let archive = staging.archive_path(&unit.target)?;
            sw_archive::extract_entry(archive, &unit.descriptor.entry_path)
                .map_err(|source| self.archive_error(unit, source))
        } else {
            let source = staging
                .staged_path(&unit.target)
                .map(Path::to_path_buf)
                .unwrap_or_else(|| self.options.game_root.join(&unit.target));
            fs::read(&source).map_err(|e| Error::io(source, e))
        }
    }

    fn write_patched(
        &self,
        unit: &PreparedUnit<'_>,
        staging: &mut Staging,
        data: &[u8],
    ) -> Result<()> {
        if unit.descriptor.is_archive_entry() {
            let archive = staging.archive_path(&unit.target)?;
            sw_archive::replace_entry(archive, &unit.descriptor.entry_path, data)
                .map_err(|source| self.archive_error(unit, source))
        } else {
            let path = staging.stage_standalone(&unit.target)?;
            fs::write(&path, data).map_err(|e| Error::io(path, e))
        }
    }

    fn copy_substitute(&self, unit: &PreparedUnit<'_>, staging: &mut Staging) -> Result<()> {
        if !unit.descriptor.is_archive_entry() {
            let path = staging.stage_standalone(&unit.target)?;
            fs::copy(&unit.input, &path).map_err(|e| Error::io(&unit.input, e))?;
            return Ok(());
        }

        let archive = staging.archive_path(&unit.target)?;
        if is_zip(&unit.input) {
            let merged = sw_archive::merge_archive_into(
                &unit.input,
                archive,
                &unit.descriptor.entry_path,
            )
            .map_err(|source| self.archive_error(unit, source))?;
            debug!("Merged {} entries into {}", merged, unit.name);
            Ok(())
        } else {
            let data = fs::read(&unit.input).map_err(|e| Error::io(&unit.input, e))?;
            sw_archive::replace_entry(archive, &unit.descriptor.entry_path, &data)
                .map_err(|source| self.archive_error(unit, source))
        }
    }

    fn archive_error(&self, unit: &PreparedUnit<'_>, source: sw_archive::Error) -> Error {
        Error::ArchiveIo {
            unit: unit.name.clone(),
            language: self.options.language.clone(),
            source,
        }
    }
}

/// Handle to a patch run on a worker thread
#[derive(Debug)]
pub struct PatchHandle {
    token: CancellationToken,
    worker: JoinHandle<Result<PatchOutcome>>,
}

impl PatchHandle {
    /// Request cancellation; the run stops at its next check
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Token shared with the worker
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Check if the worker has stopped
    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the run to end
    pub fn join(self) -> Result<PatchOutcome> {
        self.worker.join().map_err(|_| Error::WorkerPanicked)?
    }
}

fn is_cancellation(error: &Error) -> bool {
    matches!(error, Error::Resource { source, .. } if source.is_cancelled())
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("zip"))
}

/// A file written by the run, relative to the language directory
#[derive(Debug)]
struct StagedFile {
    relative: PathBuf,
    path: PathBuf,
    obfuscated: bool,
}

/// Scratch copies of every file a run writes
#[derive(Debug)]
struct Staging {
    scratch: TempDir,
    files: Vec<StagedFile>,
    index: HashMap<PathBuf, usize>,
}

impl Staging {
    fn new(language_dir: &Path) -> Result<Self> {
        let scratch = tempfile::Builder::new()
            .prefix(".staging-")
            .tempdir_in(language_dir)
            .map_err(|e| Error::io(language_dir, e))?;
        debug!("Staging in {}", scratch.path().display());

        Ok(Self {
            scratch,
            files: Vec::new(),
            index: HashMap::new(),
        })
    }

    fn staged_path(&self, relative: &Path) -> Option<&Path> {
        self.index
            .get(relative)
            .map(|&i| self.files[i].path.as_path())
    }

    fn archive_path(&self, relative: &Path) -> Result<&Path> {
        self.staged_path(relative).ok_or_else(|| {
            Error::InvalidDescriptor(format!("{} was not staged", relative.display()))
        })
    }

    fn archive_count(&self) -> usize {
        self.files.iter().filter(|file| file.obfuscated).count()
    }

    /// Copy an archive out of the game root and de-obfuscate it
    fn stage_archive(&mut self, options: &PatchOptions, relative: &Path) -> Result<()> {
        if self.index.contains_key(relative) {
            return Ok(());
        }

        let source = options.game_root.join(relative);
        let path = self.scratch_path(relative)?;
        fs::copy(&source, &path).map_err(|e| Error::io(&source, e))?;
        sw_archive::xor_file(&path, options.key).map_err(|e| Error::io(&path, e))?;
        info!("Staged archive {}", relative.display());

        self.insert(relative, path, true);
        Ok(())
    }

    /// Scratch location for a standalone output
    fn stage_standalone(&mut self, relative: &Path) -> Result<PathBuf> {
        if let Some(path) = self.staged_path(relative) {
            return Ok(path.to_path_buf());
        }

        let path = self.scratch_path(relative)?;
        self.insert(relative, path.clone(), false);
        Ok(path)
    }

    fn scratch_path(&self, relative: &Path) -> Result<PathBuf> {
        let path = self.scratch.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }
        Ok(path)
    }

    fn insert(&mut self, relative: &Path, path: PathBuf, obfuscated: bool) {
        self.index.insert(relative.to_path_buf(), self.files.len());
        self.files.push(StagedFile {
            relative: relative.to_path_buf(),
            path,
            obfuscated,
        });
    }

    /// Re-apply obfuscation to every staged archive
    fn seal(&self, key: u8) -> Result<()> {
        for file in self.files.iter().filter(|file| file.obfuscated) {
            sw_archive::xor_file(&file.path, key).map_err(|e| Error::io(&file.path, e))?;
        }
        Ok(())
    }

    /// Move staged files to their destinations
    ///
    /// Every destination directory is created before the first file moves.
    fn persist(self, language_dir: &Path) -> Result<Vec<PathBuf>> {
        let outputs: Vec<PathBuf> = self
            .files
            .iter()
            .map(|file| language_dir.join(&file.relative))
            .collect();

        for destination in &outputs {
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
            }
        }

        for (file, destination) in self.files.iter().zip(&outputs) {
            fs::rename(&file.path, destination).map_err(|e| Error::io(destination, e))?;
            debug!("Wrote {}", destination.display());
        }

        Ok(outputs)
    }
}
