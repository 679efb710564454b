use std::io::Read as _;
use std::path::Path;

use sha2::{Digest, Sha256};
use zip::ZipArchive;

use crate::models::Checksum;
use crate::utils::{UpdateError, UpdateResult};

/// Buffer size for streaming the digest computation.
const HASH_BUF_SIZE: usize = 8192;

/// Archive entry every artifact must carry.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Validate a downloaded artifact before it may be installed.
///
/// Two mandatory checks: the recomputed SHA-256 digest must match the
/// descriptor's checksum byte for byte, and the artifact must open as an
/// archive containing a manifest and at least one executable entry. On
/// any failure the file is deleted so a rejected artifact is never
/// left around for a later step to promote.
pub fn verify(artifact_path: &Path, expected: &Checksum) -> UpdateResult<()> {
    match run_checks(artifact_path, expected) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(artifact_path);
            log::warn!(
                "Artifact {} failed verification and was discarded: {}",
                artifact_path.display(),
                e
            );
            Err(e)
        }
    }
}

fn run_checks(path: &Path, expected: &Checksum) -> UpdateResult<()> {
    let actual = compute_sha256(path)?;
    if !expected.matches(&actual) {
        return Err(UpdateError::ChecksumMismatch {
            expected: expected.digest.clone(),
            actual,
        });
    }
    validate_structure(path)
}

fn compute_sha256(path: &Path) -> UpdateResult<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_BUF_SIZE];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

fn validate_structure(path: &Path) -> UpdateResult<()> {
    let file = std::fs::File::open(path)?;
    let mut archive = ZipArchive::new(file)
        .map_err(|e| UpdateError::CorruptArtifact(format!("not a readable archive: {}", e)))?;

    let mut has_manifest = false;
    let mut has_executable = false;

    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| UpdateError::CorruptArtifact(format!("unreadable entry: {}", e)))?;
        let name = entry.name().to_string();
        if name == MANIFEST_ENTRY {
            has_manifest = true;
        }
        if is_executable_entry(&name, entry.unix_mode()) {
            has_executable = true;
        }
    }

    if !has_manifest {
        return Err(UpdateError::CorruptArtifact(format!(
            "archive is missing {}",
            MANIFEST_ENTRY
        )));
    }
    if !has_executable {
        return Err(UpdateError::CorruptArtifact(
            "archive contains no executable entry".to_string(),
        ));
    }

    Ok(())
}

fn is_executable_entry(name: &str, unix_mode: Option<u32>) -> bool {
    if name.ends_with('/') {
        return false;
    }
    if unix_mode.map(|m| m & 0o111 != 0).unwrap_or(false) {
        return true;
    }
    name.to_lowercase().ends_with(".exe")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;
    use zip::write::SimpleFileOptions;

    fn write_artifact(path: &Path, with_manifest: bool, with_executable: bool) {
        let file = std::fs::File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let plain = SimpleFileOptions::default();

        if with_manifest {
            writer.start_file(MANIFEST_ENTRY, plain).unwrap();
            writer
                .write_all(br#"{"name":"tradepost","version":"2.1.0"}"#)
                .unwrap();
        }
        if with_executable {
            let exec = SimpleFileOptions::default().unix_permissions(0o755);
            writer.start_file("bin/tradepost", exec).unwrap();
            writer.write_all(b"#!/bin/sh\necho tradepost\n").unwrap();
        }
        writer.start_file("README.txt", plain).unwrap();
        writer.write_all(b"readme\n").unwrap();
        writer.finish().unwrap();
    }

    fn checksum_of(path: &Path) -> Checksum {
        let digest = compute_sha256(path).unwrap();
        Checksum::parse(&format!("sha256:{}", digest)).unwrap()
    }

    #[test]
    fn accepts_well_formed_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("update.zip");
        write_artifact(&artifact, true, true);

        verify(&artifact, &checksum_of(&artifact)).unwrap();
        assert!(artifact.exists());
    }

    #[test]
    fn checksum_mismatch_fails_closed_and_discards() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("update.zip");
        write_artifact(&artifact, true, true);

        let wrong = Checksum::parse(&format!("sha256:{}", "0".repeat(64))).unwrap();
        let err = verify(&artifact, &wrong).unwrap_err();
        assert!(matches!(err, UpdateError::ChecksumMismatch { .. }));
        assert!(!artifact.exists());
    }

    #[test]
    fn missing_manifest_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("update.zip");
        write_artifact(&artifact, false, true);

        let err = verify(&artifact, &checksum_of(&artifact)).unwrap_err();
        assert!(matches!(err, UpdateError::CorruptArtifact(_)));
        assert!(!artifact.exists());
    }

    #[test]
    fn missing_executable_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("update.zip");
        write_artifact(&artifact, true, false);

        let err = verify(&artifact, &checksum_of(&artifact)).unwrap_err();
        assert!(matches!(err, UpdateError::CorruptArtifact(_)));
    }

    #[test]
    fn non_archive_is_corrupt_even_with_matching_checksum() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = dir.path().join("update.zip");
        std::fs::write(&artifact, b"definitely not a zip").unwrap();

        let err = verify(&artifact, &checksum_of(&artifact)).unwrap_err();
        assert!(matches!(err, UpdateError::CorruptArtifact(_)));
        assert!(!artifact.exists());
    }

    #[test]
    fn windows_style_executables_count() {
        assert!(is_executable_entry("bin/tradepost.exe", None));
        assert!(is_executable_entry("tool", Some(0o755)));
        assert!(!is_executable_entry("doc/readme.txt", Some(0o644)));
        assert!(!is_executable_entry("bin/", Some(0o755)));
    }
}
