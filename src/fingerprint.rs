//! Content fingerprinting for change detection.
//!
//! Hashes file bytes in bounded blocks so memory use stays flat regardless
//! of file size. Unreadable files degrade to a digest over the
//! path+size+mtime string, which collides when those coincide; the degraded
//! path is logged as a warning and flagged on the record, never treated as
//! equivalent in confidence to a content hash.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::warn;

const READ_BLOCK_BYTES: usize = 8192;

/// Hex digest of the file's bytes, or the degraded fallback digest. The
/// second element is true when the fallback was used. Never fails.
pub fn fingerprint_file(path: &Path) -> (String, bool) {
    match hash_contents(path) {
        Ok(digest) => (digest, false),
        Err(err) => {
            warn!(
                path = %path.display(),
                error = %err,
                "content hash failed, using degraded fingerprint"
            );
            (fallback_digest(path), true)
        }
    }
}

fn hash_contents(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut block = [0u8; READ_BLOCK_BYTES];
    loop {
        let n = file.read(&mut block)?;
        if n == 0 {
            break;
        }
        hasher.update(&block[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

fn fallback_digest(path: &Path) -> String {
    let (size, mtime) = match std::fs::metadata(path) {
        Ok(meta) => (meta.len(), mtime_secs(&meta)),
        Err(_) => (0, 0.0),
    };
    let mut hasher = Sha256::new();
    hasher.update(format!("{}_{}_{}", path.display(), size, mtime).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Modification time as fractional Unix seconds; 0.0 when unavailable.
pub fn mtime_secs(meta: &std::fs::Metadata) -> f64 {
    meta.modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::SystemTime::UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
