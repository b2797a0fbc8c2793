//! # sw_res - SoulWorker resource codec
//!
//! `.res` files inside the client archives are flat record streams:
//!
//! ```text
//! count            unsigned, 1/2/4/8 bytes
//! record * count   fields laid out by a format grammar
//! u16 = 32         hash length
//! [u8; 32]         hex characters of the checksum
//! ```
//!
//! The layout of a record is not stored in the file. It comes from a format
//! grammar string such as `"0 4 4 len 2"` (see [`grammar`]). With a grammar
//! and a [`TranslationTable`] the [`RecordCodec`] rewrites the text fields of
//! a resource and appends a fresh [`ChecksumTrailer`].
//!
//! ## Examples
//!
//! ```no_run
//! use sw_res::{FormatGrammar, RecordCodec, TranslationTable};
//!
//! # fn main() -> Result<(), sw_res::Error> {
//! let grammar = FormatGrammar::parse("0 4 4 len 2")?;
//! let table = TranslationTable::load("tb_item.txt", grammar.text_field_count(), grammar.id_field_index())?;
//!
//! let original = std::fs::read("tb_item.res")?;
//! let (patched, stats) = RecordCodec::new(&grammar, &table).patch_bytes(&original)?;
//! println!("{} of {} records translated", stats.translated_records, stats.records);
//! std::fs::write("tb_item.patched.res", patched)?;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod cancel;
pub mod checksum;
pub mod codec;
pub mod error;
pub mod grammar;
pub mod reader;
pub mod template;
pub mod translation;

pub use cancel::CancellationToken;
pub use checksum::{ChecksumTrailer, DataSum, HASH_LENGTH, TRAILER_SIZE};
pub use codec::{PatchStats, RecordCodec, TrailerCheck, verify_trailer};
pub use error::{Error, Result};
pub use grammar::{FieldSpec, FormatGrammar, Width};
pub use reader::{FieldValue, Record, RecordReader, decode_utf16le, encode_utf16le};
pub use template::dump_translation_template;
pub use translation::TranslationTable;
