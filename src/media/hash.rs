//! Content addressing for uploaded media.
//!
//! An upload is identified by the SHA-256 of its bytes. The same digest
//! decides where the file lives on disk, so identical bytes always map to
//! the same record and are never stored twice.

use crate::error::{QbrackError, Result};
use crate::validation::normalize_filename;
use sha2::{Digest, Sha256};
use std::fmt;

/// Directory, relative to the static root, that holds every upload.
pub const UPLOADS_DIR: &str = "uploads";

/// A 32-byte SHA-256 digest of a file's contents.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hashes a complete buffer.
    pub fn compute(data: &[u8]) -> Self {
        let mut hasher = ContentHasher::new();
        hasher.update(data);
        hasher.finalize()
    }

    /// Creates a ContentHash from raw bytes.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Returns the raw hash bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Returns the lowercase hex form stored in the `media.sha256` column.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parses a ContentHash from a hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s)
            .map_err(|_| QbrackError::invalid_input("Invalid hex string for ContentHash"))?;
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            QbrackError::invalid_input("ContentHash must be exactly 32 bytes (64 hex characters)")
        })?;
        Ok(Self(arr))
    }

    /// First 8 bytes as hex, used in file names and log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({}...)", self.short())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

/// Incremental SHA-256 over chunks as they arrive.
#[derive(Clone, Default)]
pub struct ContentHasher {
    inner: Sha256,
    bytes: u64,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Bytes hashed so far.
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    pub fn finalize(self) -> ContentHash {
        ContentHash(self.inner.finalize().into())
    }
}

/// The relative path (under the static root) where content with `hash` is kept.
///
/// Layout: `uploads/<h0h1>/<h2h3>/<first 16 hex>_<stem>.<ext>`. The two
/// fan-out levels keep directories small; the stem is the normalised
/// original name so links stay readable. `ext` comes from the sniffed
/// content type, not from the client's file name.
pub fn storage_path(hash: &ContentHash, original_name: &str, ext: &str) -> String {
    let hex = hash.to_hex();
    let normalized = normalize_filename(original_name);
    let stem = match normalized.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => normalized.as_str(),
    };
    format!(
        "{UPLOADS_DIR}/{}/{}/{}_{}.{}",
        &hex[0..2],
        &hex[2..4],
        &hex[..16],
        stem,
        ext
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_digest() {
        let hash = ContentHash::compute(b"abc");
        assert_eq!(
            hash.to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_chunked_matches_one_shot() {
        let data: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let mut hasher = ContentHasher::new();
        for chunk in data.chunks(8192) {
            hasher.update(chunk);
        }
        assert_eq!(hasher.len(), data.len() as u64);
        assert_eq!(hasher.finalize(), ContentHash::compute(&data));
    }

    #[test]
    fn test_hex_parsing() {
        let hash = ContentHash::compute(b"abc");
        assert_eq!(ContentHash::from_hex(&hash.to_hex()).unwrap(), hash);
        assert!(ContentHash::from_hex("zz").is_err());
        assert!(ContentHash::from_hex("abcd").is_err());
    }

    #[test]
    fn test_storage_path_layout() {
        let hash = ContentHash::compute(b"abc");
        assert_eq!(
            storage_path(&hash, "Cat Picture.JPG", "jpg"),
            "uploads/ba/78/ba7816bf8f01cfea_cat_picture.jpg"
        );
        // Extension comes from the sniffed type, not the client
        assert_eq!(
            storage_path(&hash, "evil.php", "png"),
            "uploads/ba/78/ba7816bf8f01cfea_evil.png"
        );
        assert_eq!(
            storage_path(&hash, "", "gif"),
            "uploads/ba/78/ba7816bf8f01cfea_file.gif"
        );
    }
}
