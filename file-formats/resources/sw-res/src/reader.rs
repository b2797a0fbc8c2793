//! Streaming record decoding

use crate::{CancellationToken, Error, FieldSpec, FormatGrammar, Result, Width};
use std::io::{self, Read};

/// Decoded value of one field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Value of a fixed-width numeric field
    Fixed(u64),
    /// Length prefix and raw UTF-16LE bytes of a text field
    Text {
        /// Character count as stored in the prefix
        length: u64,
        /// `length * 2` bytes of UTF-16 code units
        raw: Vec<u8>,
    },
}

impl FieldValue {
    /// Numeric value, if this is a fixed field
    pub fn as_fixed(&self) -> Option<u64> {
        match self {
            FieldValue::Fixed(value) => Some(*value),
            FieldValue::Text { .. } => None,
        }
    }

    /// Decode the text of a text field, replacing invalid code units
    pub fn text(&self) -> Option<String> {
        match self {
            FieldValue::Fixed(_) => None,
            FieldValue::Text { raw, .. } => Some(decode_utf16le(raw)),
        }
    }
}

/// Decode UTF-16LE bytes into a string
pub fn decode_utf16le(raw: &[u8]) -> String {
    let units: Vec<u16> = raw
        .chunks_exact(2)
        .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

/// Encode a string as UTF-16LE bytes
pub fn encode_utf16le(text: &str) -> Vec<u8> {
    text.encode_utf16().flat_map(u16::to_le_bytes).collect()
}

/// One decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    fields: Vec<FieldValue>,
}

impl Record {
    /// Field values in stream order
    pub fn fields(&self) -> &[FieldValue] {
        &self.fields
    }

    /// Value of the fixed field at `index`
    pub fn key(&self, index: usize) -> Option<u64> {
        self.fields.get(index).and_then(FieldValue::as_fixed)
    }

    /// Decoded texts of all text fields, in field order
    pub fn texts(&self) -> Vec<String> {
        self.fields.iter().filter_map(FieldValue::text).collect()
    }
}

/// Reads records one at a time according to a grammar
///
/// The record count is read when the reader is created; iteration yields
/// exactly that many records and leaves anything after them unread.
#[derive(Debug)]
pub struct RecordReader<'g, R> {
    reader: R,
    grammar: &'g FormatGrammar,
    count: u64,
    index: u64,
    cancel: Option<CancellationToken>,
}

impl<'g, R: Read> RecordReader<'g, R> {
    /// Read the record count header and prepare to decode records
    pub fn new(mut reader: R, grammar: &'g FormatGrammar) -> Result<Self> {
        let count = grammar
            .count_width()
            .read(&mut reader)
            .map_err(|e| eof_as(e, 0, 0))?;

        log::trace!("Record stream declares {count} records");
        Ok(Self {
            reader,
            grammar,
            count,
            index: 0,
            cancel: None,
        })
    }

    /// Poll `token` before every record and every field
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Record count from the header
    pub fn record_count(&self) -> u64 {
        self.count
    }

    /// Index of the next record to be read
    pub fn position(&self) -> u64 {
        self.index
    }

    /// Decode the next record, or `None` once all records were read
    pub fn read_record(&mut self) -> Result<Option<Record>> {
        if self.index >= self.count {
            return Ok(None);
        }
        self.check_cancelled()?;

        let grammar = self.grammar;
        let mut fields = Vec::with_capacity(grammar.fields().len());
        for spec in grammar.fields() {
            self.check_cancelled()?;
            let value = match *spec {
                FieldSpec::Fixed(width) => FieldValue::Fixed(self.read_value(width)?),
                FieldSpec::LengthPrefixedText(width) => {
                    let length = self.read_value(width)?;
                    let raw = self.read_text(length)?;
                    FieldValue::Text { length, raw }
                }
            };
            fields.push(value);
        }

        self.index += 1;
        Ok(Some(Record { fields }))
    }

    /// Give back the underlying reader
    pub fn into_inner(self) -> R {
        self.reader
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(token) => token.check(),
            None => Ok(()),
        }
    }

    fn read_value(&mut self, width: Width) -> Result<u64> {
        width
            .read(&mut self.reader)
            .map_err(|e| eof_as(e, self.index, self.count))
    }

    fn read_text(&mut self, length: u64) -> Result<Vec<u8>> {
        let byte_len = length.saturating_mul(2);
        let mut raw = Vec::new();
        (&mut self.reader).take(byte_len).read_to_end(&mut raw)?;
        if (raw.len() as u64) < byte_len {
            return Err(Error::UnexpectedEof {
                record: self.index,
                count: self.count,
            });
        }
        Ok(raw)
    }
}

impl<R: Read> Iterator for RecordReader<'_, R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_record().transpose()
    }
}

fn eof_as(err: io::Error, record: u64, count: u64) -> Error {
    if err.kind() == io::ErrorKind::UnexpectedEof {
        Error::UnexpectedEof { record, count }
    } else {
        Error::Io(err)
    }
}
