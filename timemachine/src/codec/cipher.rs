//! Session XOR cipher

use std::fmt;

use super::CodecError;

/// Smallest usable key. The keystream walk starts at byte 16.
pub const MIN_KEY_LEN: usize = 17;

/// XOR key delivered with the database manifest.
///
/// The keystream starts at offset 16, skips 16 bytes after every 8 bytes
/// consumed and wraps back into the first 24 bytes when it runs off the end.
/// Applying the cipher twice restores the input.
#[derive(Clone, PartialEq, Eq)]
pub struct XorKey(Vec<u8>);

impl XorKey {
    pub fn new(key: impl Into<Vec<u8>>) -> Result<Self, CodecError> {
        let key = key.into();
        if key.len() < MIN_KEY_LEN {
            return Err(CodecError::InvalidKeyLength {
                len: key.len(),
                min: MIN_KEY_LEN,
            });
        }
        Ok(Self(key))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encrypts or decrypts `data` in place.
    pub fn apply(&self, data: &mut [u8]) {
        let key = &self.0;
        let len = key.len();
        let mut offset = 16;
        for byte in data.iter_mut() {
            *byte ^= key[offset];
            offset += 1;
            if offset % 8 == 0 {
                offset += 16;
            }
            if offset >= len {
                offset = (offset + 8) % 24;
            }
        }
    }
}

impl fmt::Debug for XorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XorKey").field("len", &self.0.len()).finish()
    }
}
