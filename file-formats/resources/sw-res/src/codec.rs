//! Record stream rewriting
//!
//! [`RecordCodec`] streams a resource record by record: every field is
//! decoded according to the grammar and immediately written back out. Text
//! fields of records whose key appears in the translation table are replaced
//! by the table's values, consumed in text field order with a cursor that
//! restarts for every record. Everything written is folded into a
//! [`DataSum`], and the matching [`ChecksumTrailer`] closes the stream.

use crate::checksum::{ChecksumTrailer, DataSum, TRAILER_SIZE};
use crate::reader::{FieldValue, Record, RecordReader, encode_utf16le};
use crate::{CancellationToken, Error, FormatGrammar, Result, TranslationTable, Width};
use std::io::{self, Read, Write};

/// Summary of one rewrite
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchStats {
    /// Number of records written
    pub records: u64,
    /// Number of records whose key matched the translation table
    pub translated_records: u64,
    /// Number of text fields replaced
    pub replaced_texts: u64,
    /// Final value of the running data sum
    pub data_sum: u64,
    /// Trailer appended to the output
    pub trailer: ChecksumTrailer,
}

/// Rewrites record streams using a translation table
#[derive(Debug)]
pub struct RecordCodec<'a> {
    grammar: &'a FormatGrammar,
    table: &'a TranslationTable,
    cancel: Option<CancellationToken>,
}

impl<'a> RecordCodec<'a> {
    /// Create a codec for one grammar and table
    pub fn new(grammar: &'a FormatGrammar, table: &'a TranslationTable) -> Self {
        Self {
            grammar,
            table,
            cancel: None,
        }
    }

    /// Poll `token` between records and fields
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Rewrite the resource read from `reader` into `writer`
    ///
    /// Anything after the last declared record, usually the old trailer, is
    /// dropped and a fresh trailer is written.
    pub fn patch<R: Read, W: Write>(&self, reader: R, writer: &mut W) -> Result<PatchStats> {
        let mut records = RecordReader::new(reader, self.grammar)?;
        if let Some(token) = &self.cancel {
            records = records.with_cancellation(token.clone());
        }

        let count = records.record_count();
        self.grammar.count_width().write(writer, count)?;

        let mut sum = DataSum::new();
        let mut written = 0u64;
        let mut translated_records = 0u64;
        let mut replaced_texts = 0u64;

        while let Some(record) = records.read_record()? {
            if let Some(replaced) = self.write_record(&record, written, writer, &mut sum)? {
                translated_records += 1;
                replaced_texts += replaced;
            }
            written += 1;
        }

        let leftover = io::copy(&mut records.into_inner(), &mut io::sink())?;
        if leftover != 0 && leftover != TRAILER_SIZE as u64 {
            log::warn!("Dropped {leftover} unexpected bytes after {count} records");
        }

        let trailer = sum.trailer();
        trailer.write(writer)?;

        let stats = PatchStats {
            records: written,
            translated_records,
            replaced_texts,
            data_sum: sum.value(),
            trailer,
        };
        log::debug!(
            "Rewrote {} records ({} translated, {} texts replaced), data sum {}",
            stats.records,
            stats.translated_records,
            stats.replaced_texts,
            stats.data_sum
        );
        Ok(stats)
    }

    /// Rewrite an in-memory resource
    pub fn patch_bytes(&self, data: &[u8]) -> Result<(Vec<u8>, PatchStats)> {
        let mut output = Vec::with_capacity(data.len() + TRAILER_SIZE);
        let stats = self.patch(data, &mut output)?;
        Ok((output, stats))
    }

    /// Write one record; returns the number of replaced texts when the key
    /// matched the table
    fn write_record<W: Write>(
        &self,
        record: &Record,
        index: u64,
        writer: &mut W,
        sum: &mut DataSum,
    ) -> Result<Option<u64>> {
        let key = record
            .key(self.grammar.id_field_index())
            .ok_or_else(|| Error::grammar("key field is not numeric"))?;
        let replacements = self.table.get(key);

        // Cursor over this record's replacement texts
        let mut slot = 0usize;
        let mut replaced = 0u64;

        for (spec, value) in self.grammar.fields().iter().zip(record.fields()) {
            if let Some(token) = &self.cancel {
                token.check()?;
            }

            let width = spec.width();
            match value {
                FieldValue::Fixed(value) => {
                    width.write(writer, *value)?;
                    sum.add_value(*value);
                }
                FieldValue::Text { length, raw } => {
                    let replacement = replacements.and_then(|texts| texts.get(slot));
                    slot += 1;

                    if let Some(text) = replacement {
                        let encoded = encode_utf16le(text);
                        let new_length = (encoded.len() / 2) as u64;
                        if new_length > width.max_value() {
                            return Err(Error::LengthOverflow {
                                record: index,
                                width: width.bytes(),
                                length: new_length,
                            });
                        }
                        write_text(writer, width, new_length, &encoded, sum)?;
                        replaced += 1;
                    } else {
                        write_text(writer, width, *length, raw, sum)?;
                    }
                }
            }
        }

        if replacements.is_some() {
            log::trace!("Record {index} (key {key}): replaced {replaced} texts");
            Ok(Some(replaced))
        } else {
            Ok(None)
        }
    }
}

fn write_text<W: Write>(
    writer: &mut W,
    width: Width,
    length: u64,
    bytes: &[u8],
    sum: &mut DataSum,
) -> Result<()> {
    width.write(writer, length)?;
    writer.write_all(bytes)?;
    sum.add_value(length);
    sum.add_bytes(bytes);
    Ok(())
}

/// Fold a record into a data sum exactly as writing it unchanged would
fn accumulate(record: &Record, sum: &mut DataSum) {
    for value in record.fields() {
        match value {
            FieldValue::Fixed(value) => sum.add_value(*value),
            FieldValue::Text { length, raw } => {
                sum.add_value(*length);
                sum.add_bytes(raw);
            }
        }
    }
}

/// Result of checking a resource against its trailer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailerCheck {
    /// Number of records in the stream
    pub records: u64,
    /// Trailer computed from the record stream
    pub expected: ChecksumTrailer,
    /// Trailer stored in the resource
    pub actual: ChecksumTrailer,
}

impl TrailerCheck {
    /// Check if the stored trailer matches the records
    pub fn is_valid(&self) -> bool {
        self.expected == self.actual
    }
}

/// Recompute a resource's checksum and compare it with its stored trailer
pub fn verify_trailer<R: Read>(reader: R, grammar: &FormatGrammar) -> Result<TrailerCheck> {
    let mut records = RecordReader::new(reader, grammar)?;
    let mut sum = DataSum::new();
    while let Some(record) = records.read_record()? {
        accumulate(&record, &mut sum);
    }

    let count = records.record_count();
    let actual = ChecksumTrailer::read(&mut records.into_inner())?;
    Ok(TrailerCheck {
        records: count,
        expected: sum.trailer(),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn text_record(out: &mut Vec<u8>, key: u32, text: &str) {
        out.extend_from_slice(&key.to_le_bytes());
        out.extend_from_slice(&((text.encode_utf16().count()) as u16).to_le_bytes());
        out.extend_from_slice(&encode_utf16le(text));
    }

    #[test]
    fn test_substitutes_matching_key() {
        let grammar = FormatGrammar::parse("0 4 4 len 2").unwrap();
        let table = TranslationTable::parse("ID=42\nHello\n\n", 1, 0).unwrap();

        let mut input = 1u32.to_le_bytes().to_vec();
        text_record(&mut input, 42, "Hallo Welt");

        let (output, stats) = RecordCodec::new(&grammar, &table).patch_bytes(&input).unwrap();

        let mut expected = 1u32.to_le_bytes().to_vec();
        expected.extend_from_slice(&42u32.to_le_bytes());
        expected.extend_from_slice(&5u16.to_le_bytes());
        expected.extend_from_slice(&encode_utf16le("Hello"));
        assert_eq!(&output[..output.len() - TRAILER_SIZE], expected.as_slice());

        assert_eq!(stats.records, 1);
        assert_eq!(stats.translated_records, 1);
        assert_eq!(stats.replaced_texts, 1);

        // 42 + 5 + bytes of "Hello" in UTF-16LE
        let byte_sum: u64 = encode_utf16le("Hello").iter().map(|&b| u64::from(b)).sum();
        assert_eq!(stats.data_sum, 42 + 5 + byte_sum);

        let mut trailer = Vec::new();
        ChecksumTrailer::from_sum(stats.data_sum).write(&mut trailer).unwrap();
        assert_eq!(&output[output.len() - TRAILER_SIZE..], trailer.as_slice());
    }

    #[test]
    fn test_cursor_restarts_per_record() {
        let grammar = FormatGrammar::parse("0 1 2 len 1 len 1").unwrap();
        let table = TranslationTable::parse("ID=1\na\nb\n\nID=2\nc\nd\n\n", 2, 0).unwrap();

        let mut input = vec![2u8];
        for key in [1u16, 2] {
            input.extend_from_slice(&key.to_le_bytes());
            input.extend_from_slice(&[1, b'x', 0, 1, b'y', 0]);
        }

        let (output, stats) = RecordCodec::new(&grammar, &table).patch_bytes(&input).unwrap();
        let expected = vec![
            2, 1, 0, 1, b'a', 0, 1, b'b', 0, 2, 0, 1, b'c', 0, 1, b'd', 0,
        ];
        assert_eq!(&output[..expected.len()], expected.as_slice());
        assert_eq!(stats.replaced_texts, 4);
    }

    #[test]
    fn test_missing_slots_pass_through() {
        let grammar = FormatGrammar::parse("0 1 1 len 1 len 1").unwrap();
        let mut table = TranslationTable::new();
        table.insert(7, vec!["z".into()]);

        let input = vec![1u8, 7, 1, b'x', 0, 1, b'y', 0];
        let (output, stats) = RecordCodec::new(&grammar, &table).patch_bytes(&input).unwrap();
        assert_eq!(&output[..8], &[1u8, 7, 1, b'z', 0, 1, b'y', 0]);
        assert_eq!(stats.replaced_texts, 1);
    }

    #[test]
    fn test_length_overflow() {
        let grammar = FormatGrammar::parse("0 1 1 len 1").unwrap();
        let mut table = TranslationTable::new();
        table.insert(1, vec!["x".repeat(256)]);

        let input = vec![1u8, 1, 0];
        let err = RecordCodec::new(&grammar, &table).patch_bytes(&input).unwrap_err();
        assert!(matches!(err, Error::LengthOverflow { record: 0, width: 1, length: 256 }));
    }

    #[test]
    fn test_old_trailer_is_replaced() {
        let grammar = FormatGrammar::parse("0 2 4 len 2").unwrap();
        let table = TranslationTable::new();

        let mut records = 1u16.to_le_bytes().to_vec();
        text_record(&mut records, 3, "abc");
        let mut input = records.clone();
        ChecksumTrailer::from_sum(999).write(&mut input).unwrap();

        let (output, _) = RecordCodec::new(&grammar, &table).patch_bytes(&input).unwrap();
        assert_eq!(output.len(), records.len() + TRAILER_SIZE);
        assert_eq!(&output[..records.len()], records.as_slice());

        let check = verify_trailer(output.as_slice(), &grammar).unwrap();
        assert!(check.is_valid());
        assert_eq!(check.records, 1);

        let check = verify_trailer(input.as_slice(), &grammar).unwrap();
        assert!(!check.is_valid());
    }

    #[test]
    fn test_cancelled_before_first_record() {
        let grammar = FormatGrammar::parse("0 1 1").unwrap();
        let table = TranslationTable::new();
        let token = CancellationToken::new();
        token.cancel();

        let err = RecordCodec::new(&grammar, &table)
            .with_cancellation(token)
            .patch_bytes(&[1, 5])
            .unwrap_err();
        assert!(err.is_cancelled());
    }
}
