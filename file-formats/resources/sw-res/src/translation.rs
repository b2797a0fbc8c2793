//! Translation tables
//!
//! A translation file is plain UTF-8 text made of fixed-size blocks, one per
//! record:
//!
//! ```text
//! ID=1001
//! Iron Sword
//! A plain sword.\nNothing special.
//!
//! ID=1002
//! ...
//! ```
//!
//! Each block holds one key line, one line per text field of the record and a
//! blank separator. The key line sits at the key field's index inside the
//! block; its first three characters are a tag and the rest is the decimal
//! key. The two-character sequence `\n` in any line stands for a line break.
//!
//! Lines may end in `\n`, `\r\n` or a lone `\r`.

use crate::{Error, Result};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fs;
use std::path::Path;

/// Tag written in front of the numeric key
pub const KEY_TAG: &str = "ID=";

/// Number of characters skipped before the numeric key
pub const KEY_TAG_LEN: usize = 3;

/// Replacement texts keyed by record key
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranslationTable {
    entries: HashMap<u64, Vec<String>>,
}

impl TranslationTable {
    /// Create an empty table; every record passes through unchanged
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse translation text
    ///
    /// `text_field_count` is the number of text fields per record and
    /// `id_field_index` the key field index of the grammar.
    ///
    /// # Examples
    ///
    /// ```
    /// use sw_res::TranslationTable;
    ///
    /// let table = TranslationTable::parse("ID=42\nHello\n\n", 1, 0).unwrap();
    /// assert_eq!(table.get(42), Some(&["Hello".to_string()][..]));
    /// ```
    pub fn parse(text: &str, text_field_count: usize, id_field_index: usize) -> Result<Self> {
        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        let lines = split_lines(text);

        // Key line plus text lines, then one blank separator
        let data_lines = text_field_count + 1;
        let block_len = data_lines + 1;

        if id_field_index >= data_lines {
            return Err(Error::translation(
                0,
                format!(
                    "key field {id_field_index} does not fit a block of {data_lines} lines"
                ),
            ));
        }

        let mut entries = HashMap::new();
        let mut start = 0;
        while start < lines.len() {
            let mut values: Vec<String> = (0..data_lines)
                .map(|offset| {
                    lines
                        .get(start + offset)
                        .map_or_else(String::new, |line| line.replace("\\n", "\n"))
                })
                .collect();

            // Trailing blank lines past the last block
            if values.iter().all(|value| value.trim().is_empty()) {
                log::trace!("Skipping blank block at line {start}");
                start += block_len;
                continue;
            }

            let key_line = start + id_field_index;
            let key = parse_key(&values.remove(id_field_index), key_line)?;

            match entries.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(values);
                }
                Entry::Occupied(_) => {
                    log::warn!("Ignoring duplicate translation key {key} at line {key_line}");
                }
            }

            start += block_len;
        }

        log::debug!("Loaded {} translation entries", entries.len());
        Ok(Self { entries })
    }

    /// Load and parse a translation file
    pub fn load<P: AsRef<Path>>(
        path: P,
        text_field_count: usize,
        id_field_index: usize,
    ) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text, text_field_count, id_field_index)
    }

    /// Insert an entry unless the key is already present
    ///
    /// Returns `false` when the key existed and the new values were dropped.
    pub fn insert(&mut self, key: u64, values: Vec<String>) -> bool {
        match self.entries.entry(key) {
            Entry::Vacant(slot) => {
                slot.insert(values);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Replacement texts for a record key, in text field order
    pub fn get(&self, key: u64) -> Option<&[String]> {
        self.entries.get(&key).map(Vec::as_slice)
    }

    /// Check if a key has replacement texts
    pub fn contains_key(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Split on `\r\n`, `\n` and `\r`; a final terminator adds no empty line
fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut rest = text;
    while !rest.is_empty() {
        match rest.find(|c: char| c == '\r' || c == '\n') {
            Some(end) => {
                lines.push(&rest[..end]);
                let skip = if rest[end..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[end + skip..];
            }
            None => {
                lines.push(rest);
                break;
            }
        }
    }
    lines
}

fn parse_key(line: &str, line_index: usize) -> Result<u64> {
    let digits: String = line.chars().skip(KEY_TAG_LEN).collect();
    digits
        .trim()
        .parse::<u64>()
        .map_err(|e| Error::translation(line_index, format!("invalid key '{line}': {e}")))
}
