//! JSON dataset manifests.
//!
//! One entry per audio segment, keyed by the segment's filename stem:
//!
//! ```json
//! {
//!     "seg_001": { "wav": "/data/eval/seg_001.wav", "label": "Canonical" }
//! }
//! ```
//!
//! Labels are raw annotation strings; empty means not yet annotated. Wav
//! paths may carry a `{data_root}` placeholder resolved at load time, so a
//! manifest can move between machines with the audio tree.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// A single manifest entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Path to the WAV file; may contain a `{data_root}` placeholder.
    pub wav: String,
    /// Raw annotation string; empty when unannotated.
    #[serde(default)]
    pub label: String,
}

/// Dataset manifest: example id (filename stem) to entry, in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    pub entries: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    /// Builds a manifest from a directory of `.wav` files or a single file.
    ///
    /// Entries get absolute paths and empty label placeholders for manual
    /// annotation. Non-wav files in a directory are skipped; a non-wav
    /// direct argument is an error.
    pub fn generate(audio: impl AsRef<Path>) -> Result<Self> {
        let audio = audio.as_ref();
        let mut entries = BTreeMap::new();
        if audio.is_dir() {
            for dir_entry in std::fs::read_dir(audio)? {
                let path = dir_entry?.path();
                if path.extension().and_then(|e| e.to_str()) == Some("wav") {
                    insert_segment(&mut entries, &path)?;
                }
            }
        } else if audio.extension().and_then(|e| e.to_str()) == Some("wav") {
            insert_segment(&mut entries, audio)?;
        } else {
            return Err(Error::Manifest(format!(
                "{}: expected a .wav file or a directory containing them",
                audio.display()
            )));
        }
        Ok(Self { entries })
    }

    /// Loads a manifest from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Loads a manifest, resolving `{data_root}` placeholders in wav paths.
    pub fn load_with_root(path: impl AsRef<Path>, data_root: &str) -> Result<Self> {
        let mut manifest = Self::load(path)?;
        for entry in manifest.entries.values_mut() {
            entry.wav = entry.wav.replace("{data_root}", data_root);
        }
        Ok(manifest)
    }

    /// Writes the manifest as pretty-printed JSON, creating parent dirs.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn insert_segment(entries: &mut BTreeMap<String, ManifestEntry>, path: &Path) -> Result<()> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| {
            Error::Manifest(format!("{}: file name is not valid UTF-8", path.display()))
        })?;
    let wav = std::fs::canonicalize(path)?;
    entries.insert(
        stem.to_string(),
        ManifestEntry {
            wav: wav.to_string_lossy().into_owned(),
            label: String::new(),
        },
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b_seg.wav"), b"").unwrap();
        std::fs::write(dir.path().join("a_seg.wav"), b"").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let manifest = Manifest::generate(dir.path()).unwrap();
        assert_eq!(manifest.len(), 2);
        let ids: Vec<&String> = manifest.entries.keys().collect();
        assert_eq!(ids, ["a_seg", "b_seg"]);
        for entry in manifest.entries.values() {
            assert!(Path::new(&entry.wav).is_absolute());
            assert!(entry.label.is_empty());
        }
    }

    #[test]
    fn test_generate_single_file() {
        let dir = tempfile::tempdir().unwrap();
        let wav = dir.path().join("only.wav");
        std::fs::write(&wav, b"").unwrap();
        let manifest = Manifest::generate(&wav).unwrap();
        assert_eq!(manifest.len(), 1);
        assert!(manifest.entries.contains_key("only"));
    }

    #[test]
    fn test_generate_rejects_non_wav() {
        let dir = tempfile::tempdir().unwrap();
        let txt = dir.path().join("notes.txt");
        std::fs::write(&txt, b"").unwrap();
        assert!(Manifest::generate(&txt).is_err());
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("manifest.json");

        let mut manifest = Manifest::default();
        manifest.entries.insert(
            "seg_001".into(),
            ManifestEntry {
                wav: "/data/seg_001.wav".into(),
                label: "Crying".into(),
            },
        );
        manifest.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded, manifest);
    }

    #[test]
    fn test_load_with_root_resolves_placeholder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        let mut manifest = Manifest::default();
        manifest.entries.insert(
            "seg_001".into(),
            ManifestEntry {
                wav: "{data_root}/seg_001.wav".into(),
                label: String::new(),
            },
        );
        manifest.save(&path).unwrap();

        let loaded = Manifest::load_with_root(&path, "/mnt/audio").unwrap();
        assert_eq!(loaded.entries["seg_001"].wav, "/mnt/audio/seg_001.wav");
    }
}
