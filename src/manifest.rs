use crate::MARKERS;
use crate::identity::{GroupMap, build_group_map, parse_overrides};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;
use std::path::Path;

/// File name of the runtime manifest inside a workspace root.
pub const RUNTIME_MANIFEST_FILE: &str = "manifest_runtime.json";

/// Per-marker section of the runtime manifest handed to `msianalyzer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRuntime {
    pub seq1: String,
    pub seq2: String,
    pub motif: String,
    pub group_map: GroupMap,
    pub fastq_files: Vec<String>,
}

/// The full runtime manifest. Built fresh per run, written once, never
/// mutated afterwards. The top-level `fastq_files` mirrors the per-marker
/// list; `msianalyzer` reads both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    pub markers: BTreeMap<String, MarkerRuntime>,
    pub min_similarity: f64,
    pub anchor_units: u32,
    pub fastq_files: Vec<String>,
}

#[derive(Debug, Clone)]
pub enum ManifestError {
    UnknownMarker { marker: String },
    Io { message: String },
    Serde { message: String },
}

impl fmt::Display for ManifestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownMarker { marker } => {
                write!(f, "Marker '{marker}' is not defined in the marker catalog")
            }
            Self::Io { message } => write!(f, "{message}"),
            Self::Serde { message } => write!(f, "{message}"),
        }
    }
}

impl Error for ManifestError {}

/// Build the runtime manifest for one marker run.
///
/// Pure: same inputs, same manifest. The unknown-marker check happens here,
/// before any caller gets a chance to touch the filesystem or spawn the
/// analyzer. Numeric parameters are taken as given; their range limits are
/// enforced by the form layer, not here.
pub fn build_runtime_config(
    marker_id: &str,
    fastq_paths: &[String],
    min_similarity: f64,
    anchor_units: u32,
    override_text: &str,
) -> Result<RuntimeConfig, ManifestError> {
    let Some(definition) = MARKERS.get(marker_id) else {
        return Err(ManifestError::UnknownMarker {
            marker: marker_id.to_string(),
        });
    };

    let overrides = parse_overrides(override_text);
    let group_map = build_group_map(fastq_paths, &overrides);

    let mut markers = BTreeMap::new();
    markers.insert(
        marker_id.to_string(),
        MarkerRuntime {
            seq1: definition.seq1.clone(),
            seq2: definition.seq2.clone(),
            motif: definition.motif.clone(),
            group_map,
            fastq_files: fastq_paths.to_vec(),
        },
    );

    Ok(RuntimeConfig {
        markers,
        min_similarity,
        anchor_units,
        fastq_files: fastq_paths.to_vec(),
    })
}

impl RuntimeConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path).map_err(|e| ManifestError::Io {
            message: format!("Could not read manifest '{}': {e}", path.display()),
        })?;
        serde_json::from_str(&text).map_err(|e| ManifestError::Serde {
            message: format!("Could not parse manifest '{}': {e}", path.display()),
        })
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), ManifestError> {
        let text = serde_json::to_string_pretty(self).map_err(|e| ManifestError::Serde {
            message: format!("Could not serialize manifest: {e}"),
        })?;
        std::fs::write(path, text).map_err(|e| ManifestError::Io {
            message: format!("Could not write manifest '{}': {e}", path.display()),
        })
    }
}
