//! # sw_archive - SoulWorker archive access
//!
//! The SoulWorker client keeps its data in `.v` files: ordinary zip
//! containers whose bytes have been XORed with a fixed key. This crate
//! provides the two layers needed to edit them in place:
//!
//! - [`obfuscation`]: the reversible byte transform applied to whole files
//! - [`archive`]: extraction, replacement and merging of individual entries
//!
//! ## Examples
//!
//! ```no_run
//! use sw_archive::{ARCHIVE_KEY, extract_entry, replace_entry, xor_file};
//!
//! # fn main() -> Result<(), sw_archive::Error> {
//! xor_file("data12.v", ARCHIVE_KEY)?;
//!
//! let original = extract_entry("data12.v", "tb_item.res")?;
//! replace_entry("data12.v", "tb_item.res", &original)?;
//!
//! xor_file("data12.v", ARCHIVE_KEY)?;
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod archive;
pub mod error;
pub mod obfuscation;
pub mod path;

pub use archive::{extract_entry, extract_entry_to, list_entries, merge_archive_into, replace_entry};
pub use error::{Error, Result};
pub use obfuscation::{ARCHIVE_KEY, transform, xor_file, xor_in_place};
