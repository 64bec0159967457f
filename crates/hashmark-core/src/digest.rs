//! Digest algorithms for checksum manifests.
//!
//! Maps a manifest's extension suffix to its digest algorithm and computes
//! file digests in chunks so large files never sit in memory whole.

use anyhow::{Context, Result};
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use std::fs::File;
use std::io::Read;
use std::path::Path;

const BUF_SIZE: usize = 64 * 1024;

/// Digest algorithm named by a manifest extension (`.sha256sum` -> Sha256).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Md5,
    Sha1,
    Sha256,
    Sha512,
}

impl Algorithm {
    /// Resolve a manifest extension (with or without the leading dot) to an
    /// algorithm: strip the dot and the trailing `sum`, look the core token
    /// up in the fixed table. `None` means "skip this manifest, do not
    /// validate" rather than an error.
    pub fn from_manifest_ext(ext: &str) -> Option<Algorithm> {
        let core = ext.trim_start_matches('.').strip_suffix("sum")?;
        match core {
            "md5" => Some(Algorithm::Md5),
            "sha1" => Some(Algorithm::Sha1),
            "sha256" => Some(Algorithm::Sha256),
            "sha512" => Some(Algorithm::Sha512),
            _ => None,
        }
    }

    /// Resolve from a manifest path (e.g. `a.txt.sha256sum`).
    pub fn from_manifest_path(path: &Path) -> Option<Algorithm> {
        let ext = path.extension()?.to_str()?;
        Algorithm::from_manifest_ext(ext)
    }

    /// Core token as it appears in manifest extensions.
    pub fn name(&self) -> &'static str {
        match self {
            Algorithm::Md5 => "md5",
            Algorithm::Sha1 => "sha1",
            Algorithm::Sha256 => "sha256",
            Algorithm::Sha512 => "sha512",
        }
    }

    /// Compute the file's digest and return it as lowercase hex.
    /// Reads in chunks to keep memory use bounded; suitable for large files.
    pub fn digest_path(&self, path: &Path) -> Result<String> {
        match self {
            Algorithm::Md5 => hash_file::<Md5>(path),
            Algorithm::Sha1 => hash_file::<Sha1>(path),
            Algorithm::Sha256 => hash_file::<Sha256>(path),
            Algorithm::Sha512 => hash_file::<Sha512>(path),
        }
    }
}

fn hash_file<D: Digest>(path: &Path) -> Result<String> {
    let mut f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut hasher = D::new();
    let mut buf = [0u8; BUF_SIZE];
    loop {
        let n = f
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn resolves_supported_extensions() {
        assert_eq!(Algorithm::from_manifest_ext(".md5sum"), Some(Algorithm::Md5));
        assert_eq!(Algorithm::from_manifest_ext(".sha1sum"), Some(Algorithm::Sha1));
        assert_eq!(
            Algorithm::from_manifest_ext(".sha256sum"),
            Some(Algorithm::Sha256)
        );
        assert_eq!(
            Algorithm::from_manifest_ext(".sha512sum"),
            Some(Algorithm::Sha512)
        );
        // Path::extension never includes the dot.
        assert_eq!(
            Algorithm::from_manifest_ext("sha256sum"),
            Some(Algorithm::Sha256)
        );
    }

    #[test]
    fn unknown_extensions_resolve_to_none() {
        assert_eq!(Algorithm::from_manifest_ext(".foosum"), None);
        assert_eq!(Algorithm::from_manifest_ext(".sha384sum"), None);
        assert_eq!(Algorithm::from_manifest_ext(".sum"), None);
        assert_eq!(Algorithm::from_manifest_ext(".md5"), None);
        assert_eq!(Algorithm::from_manifest_ext(""), None);
    }

    #[test]
    fn resolves_from_manifest_path() {
        assert_eq!(
            Algorithm::from_manifest_path(Path::new("/data/a.txt.sha256sum")),
            Some(Algorithm::Sha256)
        );
        assert_eq!(
            Algorithm::from_manifest_path(Path::new("/data/a.txt")),
            None
        );
    }

    #[test]
    fn sha256_of_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        let digest = Algorithm::Sha256.digest_path(f.path()).unwrap();
        assert_eq!(
            digest,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn known_digests_of_hello() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello").unwrap();
        f.flush().unwrap();

        assert_eq!(
            Algorithm::Md5.digest_path(f.path()).unwrap(),
            "5d41402abc4b2a76b9719d911017c592"
        );
        assert_eq!(
            Algorithm::Sha1.digest_path(f.path()).unwrap(),
            "aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d"
        );
        assert_eq!(
            Algorithm::Sha256.digest_path(f.path()).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert_eq!(
            Algorithm::Sha512.digest_path(f.path()).unwrap(),
            "9b71d224bd62f3785d96d46ad3ea3d73319bfbc2890caadae2dff72519673ca72323c3d99ba5c11d7c7acc6e14b8c5da0c4663475c2e5c3adef46f73bcdec043"
        );
    }

    #[test]
    fn digest_of_missing_file_is_err() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("missing.bin");
        assert!(Algorithm::Sha256.digest_path(&gone).is_err());
    }
}
