//! Byte-wise archive obfuscation
//!
//! Client archives are stored on disk with every byte XORed against a single
//! fixed key. The transform is its own inverse, so the same call both reveals
//! the zip container and hides it again.

use std::fs;
use std::io;
use std::path::Path;

/// Key the game client applies to its `.v` archives
pub const ARCHIVE_KEY: u8 = 0x55;

/// XOR every byte of `data` with `key` in place
pub fn xor_in_place(data: &mut [u8], key: u8) {
    for byte in data.iter_mut() {
        *byte ^= key;
    }
}

/// Return a transformed copy of `data`
///
/// # Examples
///
/// ```
/// use sw_archive::obfuscation::{transform, ARCHIVE_KEY};
///
/// let hidden = transform(b"PK", ARCHIVE_KEY);
/// assert_eq!(transform(&hidden, ARCHIVE_KEY), b"PK");
/// ```
pub fn transform(data: &[u8], key: u8) -> Vec<u8> {
    data.iter().map(|byte| byte ^ key).collect()
}

/// Transform a file on disk, overwriting its contents
pub fn xor_file<P: AsRef<Path>>(path: P, key: u8) -> io::Result<()> {
    let path = path.as_ref();
    let mut data = fs::read(path)?;
    xor_in_place(&mut data, key);
    fs::write(path, &data)?;

    log::debug!("Applied XOR 0x{key:02X} to {} ({} bytes)", path.display(), data.len());
    Ok(())
}
