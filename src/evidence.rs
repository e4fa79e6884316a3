//! Evidence file storage.
//!
//! Uploaded evidence is streamed to disk and hashed in the same pass; the
//! hex SHA-256 digest is kept on the evidence record so the stored bytes can
//! be checked later.

use std::fs::{self, File};
use std::io::{self, BufReader, Read, Write};
use std::path::{Path, PathBuf};

use chrono::Utc;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::types::ClaimId;

const CHUNK: usize = 4096;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEvidence {
    pub path: String,
    pub sha256: String,
    pub size: u64,
}

pub trait EvidenceStore: Send + Sync {
    /// Persist `reader` for `claim_id` and return where it went plus its digest.
    fn store(
        &self,
        claim_id: ClaimId,
        file_name: &str,
        reader: &mut dyn Read,
    ) -> Result<StoredEvidence>;

    /// True if the bytes at `path` still hash to `sha256`. A missing file is
    /// reported as `false`, not as an error.
    fn verify(&self, path: &str, sha256: &str) -> Result<bool>;
}

/// Hex SHA-256 of everything `reader` yields.
pub fn sha256_hex(reader: &mut dyn Read) -> io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; CHUNK];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Stores evidence under `<root>/<claim_id>/<timestamp>_<file name>`.
#[derive(Debug, Clone)]
pub struct FsEvidenceStore {
    root: PathBuf,
}

impl FsEvidenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsEvidenceStore { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn safe_name(file_name: &str) -> String {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("evidence");
        format!("{}_{}", Utc::now().format("%Y%m%d%H%M%S%f"), base).replace(' ', "_")
    }
}

impl EvidenceStore for FsEvidenceStore {
    fn store(
        &self,
        claim_id: ClaimId,
        file_name: &str,
        reader: &mut dyn Read,
    ) -> Result<StoredEvidence> {
        let dir = self.root.join(claim_id.to_string());
        fs::create_dir_all(&dir)?;
        let path = dir.join(Self::safe_name(file_name));

        let mut out = File::create(&path)?;
        let mut hasher = Sha256::new();
        let mut buf = [0u8; CHUNK];
        let mut size = 0u64;
        loop {
            let n = reader.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
            out.write_all(&buf[..n])?;
            size += n as u64;
        }
        out.flush()?;

        Ok(StoredEvidence {
            path: path.to_string_lossy().into_owned(),
            sha256: hex::encode(hasher.finalize()),
            size,
        })
    }

    fn verify(&self, path: &str, sha256: &str) -> Result<bool> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let digest = sha256_hex(&mut BufReader::new(file))?;
        Ok(digest.eq_ignore_ascii_case(sha256))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn digest_of_known_input() {
        let digest = sha256_hex(&mut Cursor::new(b"abc")).unwrap();
        assert_eq!(
            digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn stored_file_lands_under_claim_directory_and_verifies() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path());
        let stored = store
            .store(ClaimId(7), "invoice march.pdf", &mut Cursor::new(vec![1u8; 10_000]))
            .unwrap();

        assert_eq!(stored.size, 10_000);
        let path = Path::new(&stored.path);
        assert_eq!(path.parent().unwrap(), dir.path().join("7"));
        assert!(path.file_name().unwrap().to_str().unwrap().ends_with("_invoice_march.pdf"));
        assert!(store.verify(&stored.path, &stored.sha256).unwrap());
    }

    #[test]
    fn tampered_file_fails_verification() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path());
        let stored = store.store(ClaimId(1), "a.txt", &mut Cursor::new(b"original")).unwrap();
        fs::write(&stored.path, b"altered").unwrap();
        assert!(!store.verify(&stored.path, &stored.sha256).unwrap());
    }

    #[test]
    fn missing_file_is_unverified_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path());
        let missing = dir.path().join("gone.bin");
        assert!(!store.verify(missing.to_str().unwrap(), "00").unwrap());
    }

    #[test]
    fn directory_components_in_upload_names_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsEvidenceStore::new(dir.path());
        let stored = store.store(ClaimId(2), "../../etc/passwd", &mut Cursor::new(b"x")).unwrap();
        assert_eq!(Path::new(&stored.path).parent().unwrap(), dir.path().join("2"));
    }
}
