//! Loading opaque cryptographic artifacts (the Groth16 verification key) from
//! disk with a content hash, so a swapped or corrupted file is caught at
//! startup rather than silently producing wrong verifications.
//!
//! The Circom circuit and trusted-setup ceremony that produced the
//! verification key are out of scope (§1); this module only knows how to
//! read the resulting JSON blob and hash it.

use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read artifact at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Raw bytes of an on-disk artifact plus its blake3 content hash, computed
/// once at load time.
#[derive(Clone, Debug)]
pub struct ArtifactBytes {
    pub bytes: Vec<u8>,
    pub blake3_hex: String,
}

pub fn load_artifact_bytes(path: impl AsRef<Path>) -> Result<ArtifactBytes, ArtifactError> {
    let path_ref = path.as_ref();
    let bytes = fs::read(path_ref).map_err(|source| ArtifactError::Io {
        path: path_ref.display().to_string(),
        source,
    })?;
    let blake3_hex = blake3::hash(&bytes).to_hex().to_string();
    Ok(ArtifactBytes { bytes, blake3_hex })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_and_reads_back_identical_bytes() {
        let path = std::env::temp_dir().join(format!("zeroid-artifact-test-{}", std::process::id()));
        fs::write(&path, b"{\"vk\": true}").unwrap();
        let loaded = load_artifact_bytes(&path).unwrap();
        assert_eq!(loaded.bytes, b"{\"vk\": true}");
        assert_eq!(
            loaded.blake3_hex,
            blake3::hash(b"{\"vk\": true}").to_hex().to_string()
        );
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn missing_file_is_a_distinct_error() {
        let err = load_artifact_bytes("/nonexistent/zeroid/path.json").unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }
}
