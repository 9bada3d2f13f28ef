// Workspace artifact inventory: full recursive rescan, never incremental.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".svg"];

/// One file found in a workspace: absolute path, path relative to the
/// workspace root (bare name for root-level files), and bare file name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    pub path: String,
    pub relpath: String,
    pub name: String,
}

impl ArtifactFile {
    /// Previewable plot outputs (pileup plots, histograms) are selected by
    /// extension, as the form layer embeds them inline.
    pub fn is_image(&self) -> bool {
        let lower = self.name.to_ascii_lowercase();
        IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
    }
}

/// Inventory every regular file under `root`, sorted by relative path.
///
/// This is a full rescan: calling it again after an additional analyzer
/// invocation returns the complete current inventory, a superset of the
/// previous one as long as nothing deleted files externally. A missing or
/// unreadable root yields an empty inventory.
pub fn scan(root: &Path) -> Vec<ArtifactFile> {
    let mut files = Vec::new();
    walk(root, root, &mut files);
    files.sort_by(|a, b| a.relpath.cmp(&b.relpath));
    files
}

fn walk(dir: &Path, root: &Path, out: &mut Vec<ArtifactFile>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, root, out);
        } else if path.is_file() {
            let relpath = path
                .strip_prefix(root)
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| path.to_string_lossy().into_owned());
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            out.push(ArtifactFile {
                path: path.to_string_lossy().into_owned(),
                relpath,
                name,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_scan_records_relative_paths() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::write(root.join("summary.tsv"), "x").unwrap();
        fs::create_dir_all(root.join("fastq")).unwrap();
        fs::write(root.join("fastq").join("S_1.fastq"), "@r\n").unwrap();

        let files = scan(root);
        assert_eq!(files.len(), 2);

        // Sorted by relpath; root-level files carry the bare name.
        assert_eq!(files[0].relpath, format!("fastq{}S_1.fastq", std::path::MAIN_SEPARATOR));
        assert_eq!(files[0].name, "S_1.fastq");
        assert_eq!(files[1].relpath, "summary.tsv");
        assert_eq!(files[1].name, "summary.tsv");
        assert!(files[1].path.ends_with("summary.tsv"));
    }

    #[test]
    fn test_rescan_is_superset() {
        let td = tempdir().unwrap();
        let root = td.path();
        fs::write(root.join("results.txt"), "run").unwrap();
        let before = scan(root);

        fs::write(root.join("pileup_plot.svg"), "<svg/>").unwrap();
        let after = scan(root);

        assert!(after.len() > before.len());
        for file in &before {
            assert!(after.contains(file));
        }
    }

    #[test]
    fn test_scan_missing_root_is_empty() {
        let td = tempdir().unwrap();
        let gone = td.path().join("never_created");
        assert!(scan(&gone).is_empty());
    }

    #[test]
    fn test_is_image() {
        let make = |name: &str| ArtifactFile {
            path: format!("/w/{name}"),
            relpath: name.to_string(),
            name: name.to_string(),
        };
        assert!(make("plot.svg").is_image());
        assert!(make("PLOT.PNG").is_image());
        assert!(make("hist.jpeg").is_image());
        assert!(!make("summary.tsv").is_image());
        assert!(!make("reads.fastq").is_image());
    }
}
