//! Resource checksum trailer
//!
//! The client validates a resource by summing every value and text byte of
//! its record stream into a wrapping 64-bit accumulator, hashing the decimal
//! string of that sum with MD5 and comparing the first 32 characters of the
//! lowercase hex digest. The trailer stores those characters as raw bytes
//! after a 2-byte length:
//!
//! ```text
//! u16 LE  = 32
//! [u8;32] = ASCII codes of hex(md5(decimal(sum)))[..32]
//! ```
//!
//! This is a fixed contract with the client's loader; the arithmetic must be
//! reproduced exactly, overflow included.

use crate::{Error, Result};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use md5::{Digest, Md5};
use std::io::{Read, Write};

/// Number of hash characters stored in the trailer
pub const HASH_LENGTH: u16 = 32;

/// Total size of the trailer in bytes
pub const TRAILER_SIZE: usize = 2 + HASH_LENGTH as usize;

/// Running sum over everything written to a record stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DataSum(u64);

impl DataSum {
    /// Start a new sum at zero
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a field value
    pub fn add_value(&mut self, value: u64) {
        self.0 = self.0.wrapping_add(value);
    }

    /// Add every byte of a text buffer
    pub fn add_bytes(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.0 = self.0.wrapping_add(u64::from(byte));
        }
    }

    /// Current value of the sum
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Trailer matching this sum
    pub fn trailer(&self) -> ChecksumTrailer {
        ChecksumTrailer::from_sum(self.0)
    }
}

/// Hash trailer appended after the last record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecksumTrailer {
    hash: [u8; HASH_LENGTH as usize],
}

impl ChecksumTrailer {
    /// Compute the trailer for a data sum
    ///
    /// # Examples
    ///
    /// ```
    /// use sw_res::ChecksumTrailer;
    ///
    /// // md5("0") = cfcd208495d565ef66e7dff9f98764da
    /// let trailer = ChecksumTrailer::from_sum(0);
    /// assert_eq!(trailer.hash(), b"cfcd208495d565ef66e7dff9f98764da");
    /// ```
    pub fn from_sum(sum: u64) -> Self {
        let digest = Md5::digest(sum.to_string().as_bytes());
        let hex = hex::encode(digest);

        let mut hash = [0u8; HASH_LENGTH as usize];
        for (slot, ch) in hash.iter_mut().zip(hex.chars()) {
            *slot = ch as u8;
        }
        Self { hash }
    }

    /// Hash characters as stored on disk
    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// Read a trailer from the current position
    pub fn read<R: Read>(reader: &mut R) -> Result<Self> {
        let length = reader
            .read_u16::<LittleEndian>()
            .map_err(|e| Error::MissingTrailer(e.to_string()))?;
        if length != HASH_LENGTH {
            return Err(Error::MissingTrailer(format!(
                "hash length {length}, expected {HASH_LENGTH}"
            )));
        }

        let mut hash = [0u8; HASH_LENGTH as usize];
        reader
            .read_exact(&mut hash)
            .map_err(|e| Error::MissingTrailer(e.to_string()))?;
        Ok(Self { hash })
    }

    /// Write the trailer
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u16::<LittleEndian>(HASH_LENGTH)?;
        writer.write_all(&self.hash)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        // md5("12345") = 827ccb0eea8a706c4c34a16891f84e7b
        let trailer = ChecksumTrailer::from_sum(12345);
        assert_eq!(trailer.hash(), b"827ccb0eea8a706c4c34a16891f84e7b");
    }

    #[test]
    fn test_sum_wraps() {
        let mut sum = DataSum::new();
        sum.add_value(u64::MAX);
        sum.add_bytes(&[2]);
        assert_eq!(sum.value(), 1);
    }

    #[test]
    fn test_write_then_read() {
        let trailer = ChecksumTrailer::from_sum(987_654_321);
        let mut buf = Vec::new();
        trailer.write(&mut buf).unwrap();

        assert_eq!(buf.len(), TRAILER_SIZE);
        assert_eq!(&buf[..2], &[32, 0]);
        assert_eq!(ChecksumTrailer::read(&mut buf.as_slice()).unwrap(), trailer);
    }

    #[test]
    fn test_read_rejects_bad_length() {
        let mut buf = vec![16, 0];
        buf.extend_from_slice(&[b'0'; 32]);
        assert!(matches!(
            ChecksumTrailer::read(&mut buf.as_slice()),
            Err(Error::MissingTrailer(_))
        ));
        assert!(ChecksumTrailer::read(&mut [32u8].as_slice()).is_err());
    }
}
