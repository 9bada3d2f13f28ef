use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const BUILTIN_MARKERS_JSON: &str = include_str!("../assets/markers.json");

/// One Bethesda-panel marker: primer pair flanking the repeat, plus the
/// repeat motif itself. Passed through verbatim into the runtime manifest.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerDefinition {
    pub seq1: String,
    pub seq2: String,
    pub motif: String,
}

#[derive(Clone, Debug)]
pub struct Markers(HashMap<String, MarkerDefinition>);

impl Markers {
    fn new(json_text: &str) -> Result<Self> {
        let res: serde_json::Value = serde_json::from_str(json_text)?;
        let map = res
            .as_object()
            .ok_or(anyhow!("Marker file is not a JSON object"))?;
        let mut ret = HashMap::new();
        for (id, row) in map.iter() {
            let def: MarkerDefinition = serde_json::from_value(row.to_owned())
                .map_err(|_| anyhow!("Bad marker definition for '{id}': {row}"))?;
            if def.seq1.is_empty() || def.seq2.is_empty() || def.motif.is_empty() {
                return Err(anyhow!("Marker '{id}' has an empty primer or motif"));
            }
            ret.insert(id.to_owned(), def);
        }
        if ret.is_empty() {
            return Err(anyhow!("Marker file contains no markers"));
        }
        Ok(Self(ret))
    }

    pub fn get(&self, id: &str) -> Option<&MarkerDefinition> {
        self.0.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    pub fn names_sorted(&self) -> Vec<String> {
        let mut names = self.0.keys().cloned().collect::<Vec<_>>();
        names.sort_unstable();
        names
    }
}

impl Default for Markers {
    fn default() -> Self {
        Self::new(BUILTIN_MARKERS_JSON).expect("Invalid builtin marker catalog")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_catalog() {
        let markers = Markers::default();
        assert_eq!(
            markers.names_sorted(),
            vec!["BAT25", "BAT26", "D17S250", "D2S123", "D5S346"]
        );
        let bat25 = markers.get("BAT25").unwrap();
        assert_eq!(bat25.seq1, "TCGCCTCCAAGAATGTAA");
        assert_eq!(bat25.seq2, "ACTATGGCTCTAAAATGCTCTGT");
        assert_eq!(bat25.motif, "T");
    }

    #[test]
    fn test_unknown_marker_is_none() {
        let markers = Markers::default();
        assert!(markers.get("BAT99").is_none());
        assert!(!markers.contains("BAT99"));
        assert!(markers.contains("D5S346"));
    }

    #[test]
    fn test_rejects_bad_catalog() {
        assert!(Markers::new("[]").is_err());
        assert!(Markers::new(r#"{"X": {"seq1": "A", "seq2": "C"}}"#).is_err());
        assert!(
            Markers::new(r#"{"X": {"seq1": "", "seq2": "C", "motif": "T"}}"#).is_err()
        );
    }
}
