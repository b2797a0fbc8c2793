//! # sw_patch - apply translation packages to SoulWorker data
//!
//! This crate ties the archive and resource layers together. A list of
//! [`ResourceDescriptor`]s names the units to patch; a [`Patcher`] applies
//! them for one language, either on the calling thread with
//! [`Patcher::run`] or on a worker thread with [`Patcher::spawn`].
//!
//! Per-language inputs are read from `<work_root>/<language>/` and outputs
//! are written there too, mirroring the game root's layout. The game root
//! itself is never modified.
//!
//! ## Examples
//!
//! ```no_run
//! use sw_patch::{PatchOptions, PatchOutcome, Patcher, ResourceDescriptor};
//!
//! # fn main() -> Result<(), sw_patch::Error> {
//! let units = vec![ResourceDescriptor::new(
//!     "datas/data12.v",
//!     "tb_item.res",
//!     "Translations/tb_item.txt",
//!     "0 4 4 len 2",
//! )];
//! let options = PatchOptions::new("C:/Games/SoulWorker", "patcher", "en");
//!
//! let handle = Patcher::new(units, options).spawn(None)?;
//! match handle.join()? {
//!     PatchOutcome::Completed(summary) => println!("{} units patched", summary.units),
//!     PatchOutcome::Cancelled => println!("cancelled"),
//! }
//! # Ok(())
//! # }
//! ```

#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod descriptor;
pub mod error;
pub mod patcher;

pub use descriptor::ResourceDescriptor;
pub use error::{Error, ErrorKind, Result};
pub use patcher::{
    PatchHandle, PatchOptions, PatchOutcome, PatchSummary, Patcher, ProgressCallback,
};
pub use sw_res::CancellationToken;
