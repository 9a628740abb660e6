//! Content checksums used for logging and receive-side verification.
//!
//! Digests are observability only and never influence a transfer's result.

use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Block size for streaming a file through the hasher.
const READ_BLOCK: usize = 8192;

/// Hash function used for file digests.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    /// MD5: a fast demo checksum, not a security primitive.
    #[default]
    Md5,
    Sha256,
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => f.write_str("md5"),
            Self::Sha256 => f.write_str("sha256"),
        }
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "md5" => Ok(Self::Md5),
            "sha256" | "sha-256" => Ok(Self::Sha256),
            other => Err(format!("unknown digest algorithm: {other}")),
        }
    }
}

/// Incremental hasher over either algorithm.
pub enum DigestHasher {
    Md5(md5::Context),
    Sha256(Sha256),
}

impl DigestHasher {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        match algorithm {
            DigestAlgorithm::Md5 => Self::Md5(md5::Context::new()),
            DigestAlgorithm::Sha256 => Self::Sha256(Sha256::new()),
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::Md5(h) => h.consume(data),
            Self::Sha256(h) => h.update(data),
        }
    }

    /// Consumes the hasher and returns the upper-case hex digest.
    pub fn finalize_hex(self) -> String {
        match self {
            Self::Md5(h) => hex::encode_upper(h.compute().0),
            Self::Sha256(h) => hex::encode_upper(h.finalize()),
        }
    }
}

/// Digest of an in-memory buffer.
pub fn digest_bytes(algorithm: DigestAlgorithm, data: &[u8]) -> String {
    let mut hasher = DigestHasher::new(algorithm);
    hasher.update(data);
    hasher.finalize_hex()
}

/// Digest of a file's contents, propagating read errors.
pub fn try_file_digest(path: &Path, algorithm: DigestAlgorithm) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = DigestHasher::new(algorithm);
    let mut buf = [0u8; READ_BLOCK];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize_hex())
}

/// MD5 digest of a file, or an empty string if it cannot be read.
pub fn file_digest(path: &Path) -> String {
    file_digest_with(path, DigestAlgorithm::Md5)
}

/// Like [`file_digest`] with an explicit algorithm. Failures are logged only.
pub fn file_digest_with(path: &Path, algorithm: DigestAlgorithm) -> String {
    match try_file_digest(path, algorithm) {
        Ok(digest) => digest,
        Err(e) => {
            tracing::warn!(path = %path.display(), %algorithm, "digest failed: {e}");
            String::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn md5_known_vector() {
        assert_eq!(
            digest_bytes(DigestAlgorithm::Md5, b"abc"),
            "900150983CD24FB0D6963F7D28E17F72"
        );
    }

    #[test]
    fn sha256_known_vector() {
        assert_eq!(
            digest_bytes(DigestAlgorithm::Sha256, b""),
            "E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855"
        );
    }

    #[test]
    fn file_digest_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let data: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &data).unwrap();

        let first = file_digest(&path);
        let second = file_digest(&path);
        assert_eq!(first, second);
        assert_eq!(first, digest_bytes(DigestAlgorithm::Md5, &data));
        assert_eq!(first.len(), 32);
    }

    #[test]
    fn one_changed_byte_changes_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("payload.bin");
        let mut data = vec![0x5Au8; 10_000];
        std::fs::write(&path, &data).unwrap();
        let before = file_digest_with(&path, DigestAlgorithm::Sha256);

        data[9_000] ^= 0x01;
        std::fs::write(&path, &data).unwrap();
        let after = file_digest_with(&path, DigestAlgorithm::Sha256);

        assert_ne!(before, after);
    }

    #[test]
    fn missing_file_yields_empty_string() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(file_digest(&dir.path().join("absent")), "");
        assert!(try_file_digest(&dir.path().join("absent"), DigestAlgorithm::Md5).is_err());
    }

    #[test]
    fn algorithm_parsing() {
        assert_eq!("MD5".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Md5);
        assert_eq!(
            "sha-256".parse::<DigestAlgorithm>().unwrap(),
            DigestAlgorithm::Sha256
        );
        assert!("crc32".parse::<DigestAlgorithm>().is_err());
        assert_eq!(DigestAlgorithm::default().to_string(), "md5");
    }
}
