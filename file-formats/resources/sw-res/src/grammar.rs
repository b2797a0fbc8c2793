//! Record layout grammar
//!
//! A resource's layout is described by a short space-separated string such as
//! `"0 4 4 len 2 1"`:
//!
//! | Token | Meaning |
//! |-------|---------|
//! | `0` | index of the key field among the record fields |
//! | `4` | width of the record count at the start of the stream |
//! | `4` | a 4-byte numeric field |
//! | `len 2` | UTF-16 text with a 2-byte character count prefix |
//! | `1` | a 1-byte numeric field |

use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

/// Keyword introducing a length-prefixed text field
const TEXT_TOKEN: &str = "len";

/// Width of an unsigned little-endian integer on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Width {
    /// 1 byte
    W1,
    /// 2 bytes
    W2,
    /// 4 bytes
    W4,
    /// 8 bytes
    W8,
}

impl Width {
    /// Parse a width token
    pub fn from_token(token: &str) -> Option<Self> {
        match token {
            "1" => Some(Width::W1),
            "2" => Some(Width::W2),
            "4" => Some(Width::W4),
            "8" => Some(Width::W8),
            _ => None,
        }
    }

    /// Size in bytes
    pub fn bytes(self) -> usize {
        match self {
            Width::W1 => 1,
            Width::W2 => 2,
            Width::W4 => 4,
            Width::W8 => 8,
        }
    }

    /// Largest value representable in this width
    pub fn max_value(self) -> u64 {
        match self {
            Width::W1 => u8::MAX as u64,
            Width::W2 => u16::MAX as u64,
            Width::W4 => u32::MAX as u64,
            Width::W8 => u64::MAX,
        }
    }

    /// Read an unsigned value of this width
    pub fn read<R: Read>(self, reader: &mut R) -> std::io::Result<u64> {
        match self {
            Width::W1 => reader.read_u8().map(u64::from),
            Width::W2 => reader.read_u16::<LittleEndian>().map(u64::from),
            Width::W4 => reader.read_u32::<LittleEndian>().map(u64::from),
            Width::W8 => reader.read_u64::<LittleEndian>(),
        }
    }

    /// Write `value` in this width
    ///
    /// The caller guarantees `value <= self.max_value()`.
    pub fn write<W: Write>(self, writer: &mut W, value: u64) -> std::io::Result<()> {
        match self {
            Width::W1 => writer.write_u8(value as u8),
            Width::W2 => writer.write_u16::<LittleEndian>(value as u16),
            Width::W4 => writer.write_u32::<LittleEndian>(value as u32),
            Width::W8 => writer.write_u64::<LittleEndian>(value),
        }
    }
}

impl fmt::Display for Width {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.bytes())
    }
}

/// One field of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSpec {
    /// Opaque unsigned integer copied through unchanged
    Fixed(Width),
    /// UTF-16 text preceded by a character count of the given width
    LengthPrefixedText(Width),
}

impl FieldSpec {
    /// Check if this field carries translatable text
    pub fn is_text(&self) -> bool {
        matches!(self, FieldSpec::LengthPrefixedText(_))
    }

    /// Width of the value, or of the length prefix for text
    pub fn width(&self) -> Width {
        match *self {
            FieldSpec::Fixed(width) | FieldSpec::LengthPrefixedText(width) => width,
        }
    }
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSpec::Fixed(width) => write!(f, "{width}"),
            FieldSpec::LengthPrefixedText(width) => write!(f, "{TEXT_TOKEN} {width}"),
        }
    }
}

/// Parsed record layout of a resource
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatGrammar {
    id_field_index: usize,
    count_width: Width,
    fields: Vec<FieldSpec>,
}

impl FormatGrammar {
    /// Build a grammar from its parts, applying the same checks as parsing
    pub fn new(id_field_index: usize, count_width: Width, fields: Vec<FieldSpec>) -> Result<Self> {
        if fields.is_empty() {
            return Err(Error::grammar("record has no fields"));
        }

        match fields.get(id_field_index) {
            Some(FieldSpec::Fixed(_)) => {}
            Some(FieldSpec::LengthPrefixedText(_)) => {
                return Err(Error::grammar(format!(
                    "key field {id_field_index} is a text field"
                )));
            }
            None => {
                return Err(Error::grammar(format!(
                    "key field {} out of range for {} fields",
                    id_field_index,
                    fields.len()
                )));
            }
        }

        Ok(Self {
            id_field_index,
            count_width,
            fields,
        })
    }

    /// Parse a grammar string
    ///
    /// # Examples
    ///
    /// ```
    /// use sw_res::{FieldSpec, FormatGrammar, Width};
    ///
    /// let grammar = FormatGrammar::parse("0 4 4 len 2").unwrap();
    /// assert_eq!(grammar.id_field_index(), 0);
    /// assert_eq!(grammar.count_width(), Width::W4);
    /// assert_eq!(
    ///     grammar.fields(),
    ///     &[FieldSpec::Fixed(Width::W4), FieldSpec::LengthPrefixedText(Width::W2)]
    /// );
    /// ```
    pub fn parse(format: &str) -> Result<Self> {
        let mut tokens = format.split_ascii_whitespace();

        let id_token = tokens
            .next()
            .ok_or_else(|| Error::grammar("empty format string"))?;
        let id_field_index = id_token
            .parse::<usize>()
            .map_err(|_| Error::grammar(format!("invalid key field index '{id_token}'")))?;

        let count_token = tokens
            .next()
            .ok_or_else(|| Error::grammar("missing record count width"))?;
        let count_width = Width::from_token(count_token)
            .ok_or_else(|| Error::grammar(format!("invalid record count width '{count_token}'")))?;

        let mut fields = Vec::new();
        while let Some(token) = tokens.next() {
            let field = if token == TEXT_TOKEN {
                let width_token = tokens
                    .next()
                    .ok_or_else(|| Error::grammar("dangling 'len' without a width"))?;
                let width = Width::from_token(width_token).ok_or_else(|| {
                    Error::grammar(format!("invalid text length width '{width_token}'"))
                })?;
                FieldSpec::LengthPrefixedText(width)
            } else {
                let width = Width::from_token(token)
                    .ok_or_else(|| Error::grammar(format!("unrecognized token '{token}'")))?;
                FieldSpec::Fixed(width)
            };
            fields.push(field);
        }

        Self::new(id_field_index, count_width, fields)
    }

    /// Index of the key field among the record fields
    pub fn id_field_index(&self) -> usize {
        self.id_field_index
    }

    /// Width of the record count header
    pub fn count_width(&self) -> Width {
        self.count_width
    }

    /// Record fields in stream order
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Number of translatable text fields per record
    pub fn text_field_count(&self) -> usize {
        self.fields.iter().filter(|field| field.is_text()).count()
    }
}

impl FromStr for FormatGrammar {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for FormatGrammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.id_field_index, self.count_width)?;
        for field in &self.fields {
            write!(f, " {field}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_parse_mixed_layout() {
        let grammar = FormatGrammar::parse("1 2 1 4 len 2 8 len 4").unwrap();
        assert_eq!(grammar.id_field_index(), 1);
        assert_eq!(grammar.count_width(), Width::W2);
        assert_eq!(
            grammar.fields(),
            &[
                FieldSpec::Fixed(Width::W1),
                FieldSpec::Fixed(Width::W4),
                FieldSpec::LengthPrefixedText(Width::W2),
                FieldSpec::Fixed(Width::W8),
                FieldSpec::LengthPrefixedText(Width::W4),
            ]
        );
        assert_eq!(grammar.text_field_count(), 2);
    }

    #[test]
    fn test_display_is_canonical() {
        let grammar: FormatGrammar = "0  4 4   len 2".parse().unwrap();
        assert_eq!(grammar.to_string(), "0 4 4 len 2");
        assert_eq!(FormatGrammar::parse(&grammar.to_string()).unwrap(), grammar);
    }

    #[test_case("" ; "empty")]
    #[test_case("0" ; "missing count width")]
    #[test_case("0 4" ; "no fields")]
    #[test_case("0 4 4 len" ; "dangling len")]
    #[test_case("0 4 4 len len" ; "len without width")]
    #[test_case("0 4 3" ; "bad fixed width")]
    #[test_case("0 4 4 len 3" ; "bad text width")]
    #[test_case("0 x 4" ; "non numeric count width")]
    #[test_case("a 4 4" ; "non numeric key index")]
    #[test_case("-1 4 4" ; "negative key index")]
    #[test_case("0 4 4 str" ; "unknown token")]
    #[test_case("2 4 4 4" ; "key index out of range")]
    #[test_case("1 4 4 len 2" ; "key on text field")]
    fn test_rejects_malformed(format: &str) {
        let err = FormatGrammar::parse(format).unwrap_err();
        assert!(matches!(err, Error::GrammarSyntax(_)), "{format:?} gave {err:?}");
    }

    #[test]
    fn test_width_io() {
        let mut buf = Vec::new();
        Width::W2.write(&mut buf, 0x1234).unwrap();
        Width::W1.write(&mut buf, 0xAB).unwrap();
        assert_eq!(buf, vec![0x34, 0x12, 0xAB]);

        let mut cursor = std::io::Cursor::new(buf);
        assert_eq!(Width::W2.read(&mut cursor).unwrap(), 0x1234);
        assert_eq!(Width::W1.read(&mut cursor).unwrap(), 0xAB);
        assert!(Width::W4.read(&mut cursor).is_err());
    }
}
