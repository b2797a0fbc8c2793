//! Patchable unit descriptors

use std::fmt;
use std::path::{Path, PathBuf};
use sw_res::FormatGrammar;

/// One patchable unit, fully resolved by the caller
///
/// * `archive_path` is relative to the game root, e.g. `datas/data12.v`
/// * `entry_path` is the entry inside that archive; empty when the unit is a
///   standalone file at `archive_path`
/// * `download_path` names the translation package file; only its file name
///   is used
/// * `format` is the record grammar; empty means the unit is copied verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResourceDescriptor {
    /// Archive (or standalone file) path relative to the game root
    pub archive_path: String,
    /// Entry path inside the archive
    #[cfg_attr(feature = "serde", serde(default))]
    pub entry_path: String,
    /// Path of the file in the translation package
    pub download_path: String,
    /// Record grammar, empty for verbatim units
    #[cfg_attr(feature = "serde", serde(default))]
    pub format: String,
}

impl ResourceDescriptor {
    /// Create a new descriptor
    pub fn new(
        archive_path: impl Into<String>,
        entry_path: impl Into<String>,
        download_path: impl Into<String>,
        format: impl Into<String>,
    ) -> Self {
        Self {
            archive_path: archive_path.into(),
            entry_path: entry_path.into(),
            download_path: download_path.into(),
            format: format.into(),
        }
    }

    /// Check if the unit lives inside an archive
    pub fn is_archive_entry(&self) -> bool {
        !self.entry_path.is_empty()
    }

    /// Check if the unit's records are rewritten rather than copied
    pub fn is_formatted(&self) -> bool {
        !self.format.trim().is_empty()
    }

    /// Parse the format grammar, if the unit has one
    pub fn grammar(&self) -> Option<sw_res::Result<FormatGrammar>> {
        self.is_formatted().then(|| FormatGrammar::parse(&self.format))
    }

    /// Archive path as a relative filesystem path
    ///
    /// Both `/` and `\` separate components.
    pub fn archive_relative_path(&self) -> PathBuf {
        self.archive_path
            .split(['/', '\\'])
            .filter(|part| !part.is_empty())
            .collect()
    }

    /// File name of the translation package file
    pub fn download_file_name(&self) -> Option<&str> {
        Path::new(&self.download_path)
            .file_name()
            .and_then(|name| name.to_str())
    }

    /// Location of the per-language input file for this unit
    ///
    /// Inputs for `a/b/data12.v` live under `<language_dir>/a/b/data12/`;
    /// inputs for units without an archive sit directly in `language_dir`.
    pub fn translation_path(&self, language_dir: &Path) -> Option<PathBuf> {
        let file_name = self.download_file_name()?;
        let archive = self.archive_relative_path();

        let directory = match (archive.parent(), archive.file_stem()) {
            (Some(parent), Some(stem)) => language_dir.join(parent).join(stem),
            _ => language_dir.to_path_buf(),
        };
        Some(directory.join(file_name))
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entry_path.is_empty() {
            write!(f, "{}", self.archive_path)
        } else {
            write!(f, "{}:{}", self.archive_path, self.entry_path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_translation_path_inside_archive_directory() {
        let unit = ResourceDescriptor::new(
            "datas/data12.v",
            "tb_item.res",
            "Translations/EN/tb_item.txt",
            "0 4 4 len 2",
        );
        assert_eq!(
            unit.translation_path(Path::new("work/en")).unwrap(),
            Path::new("work/en/datas/data12/tb_item.txt")
        );
    }

    #[test]
    fn test_translation_path_with_backslashes() {
        let unit = ResourceDescriptor::new("datas\\data12.v", "tb_item.res", "tb_item.txt", "");
        assert_eq!(unit.archive_relative_path(), Path::new("datas/data12.v"));
        assert_eq!(
            unit.translation_path(Path::new("work/en")).unwrap(),
            Path::new("work/en/datas/data12/tb_item.txt")
        );
    }

    #[test]
    fn test_translation_path_without_archive() {
        let unit = ResourceDescriptor::new("", "", "fonts/font.ttf", "");
        assert_eq!(
            unit.translation_path(Path::new("work/en")).unwrap(),
            Path::new("work/en/font.ttf")
        );
    }

    #[test]
    fn test_flags_and_display() {
        let unit = ResourceDescriptor::new("data12.v", "a\\b.res", "b.txt", " ");
        assert!(unit.is_archive_entry());
        assert!(!unit.is_formatted());
        assert!(unit.grammar().is_none());
        assert_eq!(unit.to_string(), "data12.v:a\\b.res");

        let standalone = ResourceDescriptor::new("bin/config.res", "", "config.txt", "0 1 4");
        assert!(!standalone.is_archive_entry());
        assert!(standalone.grammar().unwrap().is_ok());
        assert_eq!(standalone.to_string(), "bin/config.res");
    }

    #[test]
    fn test_missing_download_name() {
        let unit = ResourceDescriptor::new("data12.v", "a.res", "", "");
        assert!(unit.translation_path(Path::new("work")).is_none());
    }
}
