//! Artifact checksum verification (SHA-256, hex encoded)

use std::path::Path;

use sha2::{Digest, Sha256};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::{PluginError, PluginResult};

/// Hex length of a SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

const READ_CHUNK: usize = 64 * 1024;

/// Compute the lowercase hex SHA-256 of a file without loading it whole
pub async fn sha256_file(path: &Path) -> PluginResult<String> {
    let mut file = File::open(path)
        .await
        .map_err(|e| PluginError::io(format!("Failed to open {}", path.display()), e))?;

    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| PluginError::io(format!("Failed to read {}", path.display()), e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file against an expected hex digest.
///
/// An empty `expected` skips verification. A value that is not a 64-character
/// hex string can never match and is reported as a mismatch.
pub async fn verify(path: &Path, expected: &str) -> PluginResult<()> {
    let expected = expected.trim();
    if expected.is_empty() {
        debug!(path = %path.display(), "No checksum published, skipping verification");
        return Ok(());
    }

    let actual = sha256_file(path).await?;
    let well_formed =
        expected.len() == DIGEST_HEX_LEN && expected.chars().all(|c| c.is_ascii_hexdigit());

    if !well_formed || !actual.eq_ignore_ascii_case(expected) {
        warn!(path = %path.display(), expected, actual = %actual, "Checksum mismatch");
        return Err(PluginError::DigestMismatch {
            expected: expected.to_string(),
            actual,
        });
    }

    debug!(path = %path.display(), "Checksum verified");
    Ok(())
}
