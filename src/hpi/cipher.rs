//! The two byte-level obfuscation layers of HPI archives.
//!
//! The keystream covers the directory region and every file's chunk data and
//! depends on the absolute position in the archive. The chunk transform sits
//! underneath it and only applies to payloads whose header sets the encrypted
//! flag.

use super::structures::HpiHeader;

/// Position-dependent XOR keyed by the header's derived key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Keystream {
    key: u8,
}

impl Keystream {
    pub fn new(key: u8) -> Self {
        Self { key }
    }

    pub fn from_header(header: &HpiHeader) -> Self {
        Self::new(header.derived_key())
    }

    pub fn key(&self) -> u8 {
        self.key
    }

    pub fn is_enabled(&self) -> bool {
        self.key != 0
    }

    /// Decrypt (or encrypt, it is an involution) `buf` in place.
    ///
    /// `offset` must be the absolute archive offset of `buf[0]`.
    pub fn apply(&self, buf: &mut [u8], offset: u64) {
        if !self.is_enabled() {
            return;
        }
        for (i, byte) in buf.iter_mut().enumerate() {
            let pos = offset.wrapping_add(i as u64) as u8;
            *byte ^= pos ^ self.key;
        }
    }
}

/// Undo the chunk payload transform in place: `plain = (cipher - i) ^ i`.
pub fn decrypt_chunk(data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        let i = i as u8;
        *byte = byte.wrapping_sub(i) ^ i;
    }
}
