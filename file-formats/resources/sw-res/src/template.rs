//! Translation templates
//!
//! Dumps the texts of an existing resource in the block format read by
//! [`TranslationTable`](crate::TranslationTable), giving translators a file
//! to edit. Feeding an unedited template back through the codec reproduces
//! the original record stream.

use crate::reader::RecordReader;
use crate::translation::KEY_TAG;
use crate::{Error, FormatGrammar, Result};
use std::io::{Read, Write};

/// Write one translation block per record of the resource read from `reader`
///
/// Returns the number of blocks written.
pub fn dump_translation_template<R: Read, W: Write>(
    reader: R,
    grammar: &FormatGrammar,
    writer: &mut W,
) -> Result<u64> {
    let id_index = grammar.id_field_index();
    if id_index > grammar.text_field_count() {
        return Err(Error::translation(
            0,
            format!("key field {id_index} does not fit a block of text lines"),
        ));
    }

    let mut records = RecordReader::new(reader, grammar)?;
    let mut blocks = 0u64;

    while let Some(record) = records.read_record()? {
        let key = record
            .key(id_index)
            .ok_or_else(|| Error::grammar("key field is not numeric"))?;

        let mut lines: Vec<String> = record.texts().iter().map(|text| escape(text)).collect();
        lines.insert(id_index, format!("{KEY_TAG}{key}"));

        for line in &lines {
            writeln!(writer, "{line}")?;
        }
        writeln!(writer)?;
        blocks += 1;
    }

    Ok(blocks)
}

fn escape(text: &str) -> String {
    text.replace("\r\n", "\\n").replace('\n', "\\n")
}
