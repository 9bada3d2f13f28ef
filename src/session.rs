//! Run orchestration: one [`RunSession`] owns the active workspace and the
//! result of the most recent analyzer run. The caller owns the session and
//! passes it into every operation; there is no process-global run state.

use crate::MARKERS;
use crate::analyzer::{
    self, AnalyzerError, PILEUP_TIMEOUT_SECS, RUN_MARKER_TIMEOUT_SECS, RunMarkerOptions,
};
use crate::artifacts::{self, ArtifactFile};
use crate::manifest::{ManifestError, build_runtime_config};
use crate::reference::{self, ReferenceError};
use crate::workspace::{UploadedFile, Workspace};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunErrorCode {
    UnknownMarker,
    NoInput,
    ToolNotFound,
    Timeout,
    ReferenceNotFound,
    Io,
    Internal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunError {
    pub code: RunErrorCode,
    pub message: String,
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl Error for RunError {}

impl From<ManifestError> for RunError {
    fn from(err: ManifestError) -> Self {
        let code = match err {
            ManifestError::UnknownMarker { .. } => RunErrorCode::UnknownMarker,
            ManifestError::Io { .. } => RunErrorCode::Io,
            ManifestError::Serde { .. } => RunErrorCode::Internal,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

impl From<AnalyzerError> for RunError {
    fn from(err: AnalyzerError) -> Self {
        let code = match err {
            AnalyzerError::ToolNotFound { .. } => RunErrorCode::ToolNotFound,
            AnalyzerError::Timeout { .. } => RunErrorCode::Timeout,
            AnalyzerError::Io { .. } => RunErrorCode::Io,
        };
        Self {
            code,
            message: err.to_string(),
        }
    }
}

impl From<ReferenceError> for RunError {
    fn from(err: ReferenceError) -> Self {
        Self {
            code: RunErrorCode::ReferenceNotFound,
            message: err.to_string(),
        }
    }
}

/// Everything the form layer collects for one primary analysis run.
/// Numeric defaults mirror the form defaults; range limits are the form's
/// responsibility.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub marker: String,
    pub files: Vec<UploadedFile>,
    pub min_similarity: f64,
    pub anchor_units: u32,
    pub run_tests: bool,
    pub skip_variant_summary: bool,
    pub threads: u32,
    pub group_map_text: String,
}

impl RunRequest {
    pub fn new(marker: impl Into<String>, files: Vec<UploadedFile>) -> Self {
        Self {
            marker: marker.into(),
            files,
            min_similarity: 0.85,
            anchor_units: 3,
            run_tests: false,
            skip_variant_summary: false,
            threads: 1,
            group_map_text: String::new(),
        }
    }
}

/// Result of the primary run. Only `files` is ever refreshed afterwards,
/// by rescanning the workspace after a pileup invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub command: Vec<String>,
    pub files: Vec<ArtifactFile>,
    pub fastq_paths: Vec<String>,
    pub marker: String,
}

impl RunResult {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Result of one secondary pileup invocation. The stored [`RunResult`] is
/// untouched apart from its refreshed artifact inventory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PileupReport {
    pub fastq_path: String,
    pub reference_path: String,
    pub command: Vec<String>,
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

impl PileupReport {
    pub fn succeeded(&self) -> bool {
        self.exit_code == 0
    }
}

/// Session state for one user: at most one active workspace and run result.
/// Serializable so shells can persist it between process invocations.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RunSession {
    workspace: Option<Workspace>,
    result: Option<RunResult>,
    analyzer_bin: Option<String>,
    reference_dir: Option<PathBuf>,
}

impl RunSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load_from_path(path: &Path) -> Result<Self, RunError> {
        let text = std::fs::read_to_string(path).map_err(|e| RunError {
            code: RunErrorCode::Io,
            message: format!("Could not read session file '{}': {e}", path.display()),
        })?;
        serde_json::from_str(&text).map_err(|e| RunError {
            code: RunErrorCode::Internal,
            message: format!("Could not parse session JSON '{}': {e}", path.display()),
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), RunError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| RunError {
            code: RunErrorCode::Internal,
            message: format!("Could not serialize session: {e}"),
        })?;
        std::fs::write(path, text).map_err(|e| RunError {
            code: RunErrorCode::Io,
            message: format!("Could not write session file '{}': {e}", path.display()),
        })
    }

    /// Session-scoped analyzer executable override, on top of the
    /// process-wide environment default.
    pub fn set_analyzer_bin(&mut self, bin: Option<String>) {
        self.analyzer_bin = bin;
    }

    /// Session-scoped reference directory override.
    pub fn set_reference_dir(&mut self, dir: Option<PathBuf>) {
        self.reference_dir = dir;
    }

    pub fn result(&self) -> Option<&RunResult> {
        self.result.as_ref()
    }

    pub fn workspace_root(&self) -> Option<&Path> {
        self.workspace.as_ref().map(Workspace::root)
    }

    /// Run the primary analysis: synthesize the runtime manifest, persist
    /// inputs and manifest into a fresh workspace, invoke
    /// `msianalyzer run-marker`, and inventory the produced files.
    ///
    /// Any previous workspace and result are discarded up front (the old
    /// directory stays on disk for external temp cleanup). On
    /// ToolNotFound/Timeout the run aborts with no stored result; the
    /// workspace and whatever was already written remain inspectable. A
    /// nonzero analyzer exit is a normal, fully populated result.
    pub fn run_analysis(&mut self, request: &RunRequest) -> Result<RunResult, RunError> {
        // Reject an unknown marker before anything is written.
        if !MARKERS.contains(&request.marker) {
            return Err(ManifestError::UnknownMarker {
                marker: request.marker.clone(),
            }
            .into());
        }
        if request.files.is_empty() {
            return Err(RunError {
                code: RunErrorCode::NoInput,
                message: "No FASTQ files were provided. Upload at least one FASTQ file."
                    .to_string(),
            });
        }

        // A new run discards the previous workspace and result references;
        // the old directory stays behind for external temp cleanup.
        self.result = None;
        self.workspace = None;

        let workspace = Workspace::create().map_err(|message| RunError {
            code: RunErrorCode::Io,
            message,
        })?;
        // Referenced immediately so every later failure leaves the prepared
        // workspace inspectable.
        self.workspace = Some(workspace.clone());

        let fastq_paths = workspace
            .persist_inputs(&request.files)
            .map_err(|message| RunError {
                code: RunErrorCode::Io,
                message,
            })?;
        if fastq_paths.is_empty() {
            return Err(RunError {
                code: RunErrorCode::NoInput,
                message: "No FASTQ files were saved. Re-upload the FASTQ files.".to_string(),
            });
        }
        let fastq_path_strings: Vec<String> = fastq_paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();

        let config = build_runtime_config(
            &request.marker,
            &fastq_path_strings,
            request.min_similarity,
            request.anchor_units,
            &request.group_map_text,
        )?;
        let manifest_path = workspace.persist_config(&config)?;

        let options = RunMarkerOptions {
            run_tests: request.run_tests,
            skip_variant_summary: request.skip_variant_summary,
            threads: request.threads,
        };
        let command = analyzer::run_marker_command(&request.marker, &manifest_path, &options);

        let workspace_root = workspace.root().to_path_buf();
        let outcome = analyzer::invoke(
            &self.analyzer_bin(),
            &command,
            &workspace_root,
            Duration::from_secs(RUN_MARKER_TIMEOUT_SECS),
        )?;

        let files = artifacts::scan(&workspace_root);
        let result = RunResult {
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code: outcome.exit_code,
            command,
            files,
            fastq_paths: fastq_path_strings,
            marker: request.marker.clone(),
        };
        self.result = Some(result.clone());
        Ok(result)
    }

    /// Run `msianalyzer pileup` for one of the stored run's FASTQ files,
    /// selected by file name, inside the same workspace. The artifact
    /// inventory is refreshed after every completed invocation, nonzero exit
    /// included; the rest of the stored result is untouched.
    pub fn run_pileup(&mut self, fastq_name: &str) -> Result<PileupReport, RunError> {
        let Some(workspace) = self.workspace.as_ref() else {
            return Err(RunError {
                code: RunErrorCode::NoInput,
                message: "No working directory found. Run the main analysis first.".to_string(),
            });
        };
        if !workspace.root().is_dir() {
            return Err(RunError {
                code: RunErrorCode::NoInput,
                message: format!(
                    "Working directory is gone: {}. Run the main analysis again.",
                    workspace.root().display()
                ),
            });
        }
        let Some(result) = self.result.as_ref() else {
            return Err(RunError {
                code: RunErrorCode::NoInput,
                message: "No stored run result. Run the main analysis first.".to_string(),
            });
        };

        let fastq_path = result
            .fastq_paths
            .iter()
            .find(|p| {
                Path::new(p)
                    .file_name()
                    .map(|n| n == fastq_name)
                    .unwrap_or(false)
            })
            .cloned()
            .ok_or_else(|| RunError {
                code: RunErrorCode::NoInput,
                message: format!(
                    "Selected FASTQ '{fastq_name}' is not part of the stored run"
                ),
            })?;
        if !Path::new(&fastq_path).is_file() {
            return Err(RunError {
                code: RunErrorCode::NoInput,
                message: format!("FASTQ file not found on disk for pileup: {fastq_path}"),
            });
        }

        // The marker stored with the run wins over whatever the form shows.
        let reference_path = match self.reference_dir.as_ref() {
            Some(dir) => reference::reference_for_marker_in(dir, &result.marker)?,
            None => reference::reference_for_marker(&result.marker)?,
        };

        let command = analyzer::pileup_command(Path::new(&fastq_path), &reference_path);
        let workspace_root = workspace.root().to_path_buf();
        let outcome = analyzer::invoke(
            &self.analyzer_bin(),
            &command,
            &workspace_root,
            Duration::from_secs(PILEUP_TIMEOUT_SECS),
        )?;

        self.refresh_artifacts();
        Ok(PileupReport {
            fastq_path,
            reference_path: reference_path.to_string_lossy().into_owned(),
            command,
            stdout: outcome.stdout,
            stderr: outcome.stderr,
            exit_code: outcome.exit_code,
        })
    }

    /// Rescan the active workspace into the stored result's inventory.
    /// The scan is full, not incremental: files from earlier invocations stay
    /// listed alongside anything new. No-op without an active run.
    pub fn refresh_artifacts(&mut self) {
        let Some(workspace) = self.workspace.as_ref() else {
            return;
        };
        let Some(result) = self.result.as_mut() else {
            return;
        };
        if !workspace.root().is_dir() {
            return;
        }
        result.files = artifacts::scan(workspace.root());
    }

    /// Drop the workspace reference and stored result. The directory itself
    /// is left to external temp cleanup.
    pub fn reset(&mut self) {
        self.workspace = None;
        self.result = None;
    }

    fn analyzer_bin(&self) -> String {
        self.analyzer_bin
            .clone()
            .unwrap_or_else(analyzer::analyzer_executable)
    }
}
