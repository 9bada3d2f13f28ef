// Per-marker reference FASTA lookup in the local hg38 directory.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_REFERENCE_DIR: &str = "hg38";
const REFERENCE_DIR_ENV: &str = "MSIWEB_REFERENCE_DIR";

const REFERENCE_EXTENSIONS: [&str; 2] = [".fa", ".fasta"];

#[derive(Debug, Clone)]
pub enum ReferenceError {
    DirectoryMissing { directory: PathBuf },
    NotFound { marker: String, directory: PathBuf },
}

impl fmt::Display for ReferenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DirectoryMissing { directory } => write!(
                f,
                "Reference directory not found: {}. Make sure the hg38 folder is available or set {}",
                directory.display(),
                REFERENCE_DIR_ENV
            ),
            Self::NotFound { marker, directory } => write!(
                f,
                "No reference FASTA found in {} for marker '{marker}'",
                directory.display()
            ),
        }
    }
}

impl std::error::Error for ReferenceError {}

/// The reference directory: environment override, or `hg38/` next to the
/// process working directory.
pub fn reference_dir() -> PathBuf {
    std::env::var(REFERENCE_DIR_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_REFERENCE_DIR))
}

/// Locate the reference FASTA for a marker by case-insensitive substring
/// match of the marker id against `.fa`/`.fasta` file names in `directory`.
/// Candidates are checked in name order so repeated lookups are stable.
pub fn reference_for_marker_in(
    directory: &Path,
    marker: &str,
) -> Result<PathBuf, ReferenceError> {
    if !directory.is_dir() {
        return Err(ReferenceError::DirectoryMissing {
            directory: directory.to_path_buf(),
        });
    }

    let marker_lower = marker.to_lowercase();
    let mut names: Vec<String> = fs::read_dir(directory)
        .map_err(|_| ReferenceError::DirectoryMissing {
            directory: directory.to_path_buf(),
        })?
        .flatten()
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort_unstable();

    for name in names {
        let lower = name.to_lowercase();
        if REFERENCE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
            && lower.contains(&marker_lower)
        {
            return Ok(directory.join(name));
        }
    }

    Err(ReferenceError::NotFound {
        marker: marker.to_string(),
        directory: directory.to_path_buf(),
    })
}

/// As [`reference_for_marker_in`], against the default reference directory.
pub fn reference_for_marker(marker: &str) -> Result<PathBuf, ReferenceError> {
    reference_for_marker_in(&reference_dir(), marker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_finds_reference_case_insensitive() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("bat25_chr4.FA"), ">chr4\nT\n").unwrap();
        fs::write(td.path().join("BAT26_chr2.fasta"), ">chr2\nA\n").unwrap();

        let path = reference_for_marker_in(td.path(), "BAT25").unwrap();
        assert_eq!(path.file_name().unwrap(), "bat25_chr4.FA");
        let path = reference_for_marker_in(td.path(), "bat26").unwrap();
        assert_eq!(path.file_name().unwrap(), "BAT26_chr2.fasta");
    }

    #[test]
    fn test_ignores_non_sequence_files() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("BAT25_notes.txt"), "not a reference").unwrap();
        fs::write(td.path().join("BAT25.fa.fai"), "index").unwrap();

        let err = reference_for_marker_in(td.path(), "BAT25").unwrap_err();
        assert!(matches!(err, ReferenceError::NotFound { .. }));
    }

    #[test]
    fn test_missing_directory() {
        let td = tempdir().unwrap();
        let gone = td.path().join("no_such_dir");
        let err = reference_for_marker_in(&gone, "BAT25").unwrap_err();
        assert!(matches!(err, ReferenceError::DirectoryMissing { .. }));
    }

    #[test]
    fn test_stable_choice_across_candidates() {
        let td = tempdir().unwrap();
        fs::write(td.path().join("z_BAT25.fa"), ">z\n").unwrap();
        fs::write(td.path().join("a_BAT25.fa"), ">a\n").unwrap();

        let path = reference_for_marker_in(td.path(), "BAT25").unwrap();
        assert_eq!(path.file_name().unwrap(), "a_BAT25.fa");
    }
}
