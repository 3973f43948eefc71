//! Content-addressed cache keys

use sha1::{Digest, Sha1};

/// Cache file name for a URL: the uppercase hexadecimal SHA-1 of its UTF-8 bytes.
pub fn cache_key(url: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(url.as_bytes());
    format!("{:X}", hasher.finalize())
}
