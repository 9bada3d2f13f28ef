use crate::manifest::{ManifestError, RUNTIME_MANIFEST_FILE, RuntimeConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of every per-run directory, as created under the system temp dir.
pub const WORKSPACE_PREFIX: &str = "msianalyzer_";

/// Input subfolder inside a workspace root.
pub const FASTQ_SUBDIR: &str = "fastq";

/// One uploaded read file, already received and validated by the form layer.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// An isolated per-run directory. Each run gets a brand-new one; abandoned
/// workspaces are left on disk for external temp cleanup, never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    /// Create a fresh, uniquely named workspace with its `fastq/` subfolder.
    /// The directory is kept on disk; dropping the Workspace value does not
    /// delete it.
    pub fn create() -> Result<Self, String> {
        let dir = tempfile::Builder::new()
            .prefix(WORKSPACE_PREFIX)
            .tempdir()
            .map_err(|e| format!("Could not create workspace directory: {e}"))?;
        let root = dir.keep();
        fs::create_dir_all(root.join(FASTQ_SUBDIR)).map_err(|e| {
            format!(
                "Could not create input subfolder in workspace '{}': {e}",
                root.display()
            )
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn fastq_dir(&self) -> PathBuf {
        self.root.join(FASTQ_SUBDIR)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(RUNTIME_MANIFEST_FILE)
    }

    /// Write each uploaded file into the input subfolder under its original
    /// base name. Returns the absolute paths in input order.
    pub fn persist_inputs(&self, files: &[UploadedFile]) -> Result<Vec<PathBuf>, String> {
        let fastq_dir = self.fastq_dir();
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            // Uploads carry plain file names; keep only the final path
            // component in case a client sent a full path.
            let name = Path::new(&file.name)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| file.name.clone());
            let path = fastq_dir.join(&name);
            fs::write(&path, &file.bytes).map_err(|e| {
                format!("Could not save uploaded file '{}': {e}", path.display())
            })?;
            paths.push(path);
        }
        Ok(paths)
    }

    /// Serialize the runtime manifest to its well-known file name in the
    /// workspace root, overwriting any previous manifest.
    pub fn persist_config(&self, config: &RuntimeConfig) -> Result<PathBuf, ManifestError> {
        let path = self.manifest_path();
        config.save_to_path(&path)?;
        Ok(path)
    }
}
