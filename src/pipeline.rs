//! Explicit data preparation pipeline.
//!
//! Manifest entries flow through a short directed pipeline of named
//! stages. Every stage declares the field it reads and the field it
//! writes, so the wiring is validated up front rather than implied by
//! registration order; running a stage whose input nobody produced is a
//! construction error, not a runtime surprise.

use std::collections::BTreeMap;

use crate::audio;
use crate::config::AudioConfig;
use crate::error::{Error, Result};
use crate::label::{LabelPolicy, VocalizationLabel};
use crate::manifest::Manifest;

/// A value carried between pipeline stages.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// A raw string field (paths, annotation strings).
    Text(String),
    /// A prepared mono signal.
    Signal(Vec<f32>),
    /// An optional class target.
    Target(Option<VocalizationLabel>),
}

/// One example moving through the pipeline.
#[derive(Debug, Clone)]
pub struct Example {
    pub id: String,
    fields: BTreeMap<&'static str, FieldValue>,
}

impl Example {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            fields: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, field: &'static str, value: FieldValue) {
        self.fields.insert(field, value);
    }

    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Text content of a field.
    pub fn text(&self, field: &str) -> Result<&str> {
        match self.fields.get(field) {
            Some(FieldValue::Text(s)) => Ok(s),
            Some(_) => Err(self.wrong_type(field, "text")),
            None => Err(self.missing(field)),
        }
    }

    /// Signal content of a field.
    pub fn signal(&self, field: &str) -> Result<&[f32]> {
        match self.fields.get(field) {
            Some(FieldValue::Signal(s)) => Ok(s),
            Some(_) => Err(self.wrong_type(field, "signal")),
            None => Err(self.missing(field)),
        }
    }

    /// Target content of a field.
    pub fn target(&self, field: &str) -> Result<Option<VocalizationLabel>> {
        match self.fields.get(field) {
            Some(FieldValue::Target(t)) => Ok(*t),
            Some(_) => Err(self.wrong_type(field, "target")),
            None => Err(self.missing(field)),
        }
    }

    fn missing(&self, field: &str) -> Error {
        Error::Pipeline(format!("example '{}': missing field '{field}'", self.id))
    }

    fn wrong_type(&self, field: &str, wanted: &str) -> Error {
        Error::Pipeline(format!(
            "example '{}': field '{field}' is not a {wanted} field",
            self.id
        ))
    }
}

/// A named pipeline stage with one declared input and one output field.
pub trait Stage {
    fn name(&self) -> &'static str;
    /// Field this stage reads.
    fn takes(&self) -> &'static str;
    /// Field this stage writes.
    fn provides(&self) -> &'static str;
    fn apply(&self, example: &mut Example) -> Result<()>;
}

/// An ordered pipeline of stages with validated field wiring.
pub struct DataPipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl std::fmt::Debug for DataPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.stages.iter().map(|s| s.name()).collect();
        f.debug_struct("DataPipeline").field("stages", &names).finish()
    }
}

impl DataPipeline {
    /// Builds a pipeline, checking that every stage's input comes from
    /// the initial fields or an earlier stage and that no stage
    /// overwrites an existing field.
    pub fn new(stages: Vec<Box<dyn Stage>>, initial_fields: &[&str]) -> Result<Self> {
        let mut available: Vec<&str> = initial_fields.to_vec();
        for stage in &stages {
            if !available.contains(&stage.takes()) {
                return Err(Error::Pipeline(format!(
                    "stage '{}' needs field '{}', but only {:?} are available",
                    stage.name(),
                    stage.takes(),
                    available
                )));
            }
            if available.contains(&stage.provides()) {
                return Err(Error::Pipeline(format!(
                    "stage '{}' would overwrite field '{}'",
                    stage.name(),
                    stage.provides()
                )));
            }
            available.push(stage.provides());
        }
        Ok(Self { stages })
    }

    /// Applies the stages in order.
    pub fn run(&self, mut example: Example) -> Result<Example> {
        for stage in &self.stages {
            stage.apply(&mut example)?;
        }
        Ok(example)
    }
}

/// "wav" → "signal": decodes, mixes down, validates the rate, pads.
pub struct AudioStage {
    config: AudioConfig,
}

impl AudioStage {
    pub fn new(config: AudioConfig) -> Self {
        Self { config }
    }
}

impl Stage for AudioStage {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn takes(&self) -> &'static str {
        "wav"
    }

    fn provides(&self) -> &'static str {
        "signal"
    }

    fn apply(&self, example: &mut Example) -> Result<()> {
        let path = example.text("wav")?.to_string();
        let signal =
            audio::load_signal(&path, self.config.sample_rate, self.config.min_samples())?;
        example.insert("signal", FieldValue::Signal(signal));
        Ok(())
    }
}

/// "label" → "target": parses the annotation under the label policy.
pub struct LabelStage {
    policy: LabelPolicy,
}

impl LabelStage {
    pub fn new(policy: LabelPolicy) -> Self {
        Self { policy }
    }
}

impl Stage for LabelStage {
    fn name(&self) -> &'static str {
        "label"
    }

    fn takes(&self) -> &'static str {
        "label"
    }

    fn provides(&self) -> &'static str {
        "target"
    }

    fn apply(&self, example: &mut Example) -> Result<()> {
        let raw = example.text("label")?.to_string();
        let target = self.policy.parse(&example.id, &raw)?;
        example.insert("target", FieldValue::Target(target));
        Ok(())
    }
}

/// A fully prepared example, ready for batching.
#[derive(Debug, Clone)]
pub struct PreparedExample {
    pub id: String,
    pub signal: Vec<f32>,
    pub target: Option<VocalizationLabel>,
}

/// The standard preparation pipeline: audio loading plus label encoding.
pub fn standard_pipeline(audio: AudioConfig, policy: LabelPolicy) -> Result<DataPipeline> {
    DataPipeline::new(
        vec![
            Box::new(AudioStage::new(audio)),
            Box::new(LabelStage::new(policy)),
        ],
        &["wav", "label"],
    )
}

/// Runs every manifest entry through the pipeline, in manifest order.
pub fn prepare(manifest: &Manifest, pipeline: &DataPipeline) -> Result<Vec<PreparedExample>> {
    let mut prepared = Vec::with_capacity(manifest.len());
    for (id, entry) in &manifest.entries {
        let mut example = Example::new(id.clone());
        example.insert("wav", FieldValue::Text(entry.wav.clone()));
        example.insert("label", FieldValue::Text(entry.label.clone()));
        let example = pipeline.run(example)?;

        let signal = example.signal("signal")?.to_vec();
        let target = example.target("target")?;
        prepared.push(PreparedExample {
            id: example.id,
            signal,
            target,
        });
    }
    Ok(prepared)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::write_wav;
    use crate::manifest::ManifestEntry;

    struct RenameStage {
        from: &'static str,
        to: &'static str,
    }

    impl Stage for RenameStage {
        fn name(&self) -> &'static str {
            "rename"
        }

        fn takes(&self) -> &'static str {
            self.from
        }

        fn provides(&self) -> &'static str {
            self.to
        }

        fn apply(&self, example: &mut Example) -> Result<()> {
            let value = example.text(self.from)?.to_string();
            example.insert(self.to, FieldValue::Text(value));
            Ok(())
        }
    }

    #[test]
    fn test_pipeline_rejects_unprovided_input() {
        let err = DataPipeline::new(
            vec![Box::new(LabelStage::new(LabelPolicy::Strict))],
            &["wav"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("needs field 'label'"));
    }

    #[test]
    fn test_pipeline_rejects_overwrites() {
        let err = DataPipeline::new(
            vec![Box::new(RenameStage {
                from: "wav",
                to: "wav",
            })],
            &["wav"],
        )
        .unwrap_err();
        assert!(err.to_string().contains("overwrite"));
    }

    #[test]
    fn test_pipeline_accepts_chained_stages() {
        let pipeline = DataPipeline::new(
            vec![
                Box::new(RenameStage {
                    from: "wav",
                    to: "copy",
                }),
                Box::new(RenameStage {
                    from: "copy",
                    to: "copy2",
                }),
            ],
            &["wav"],
        )
        .unwrap();

        let mut example = Example::new("x");
        example.insert("wav", FieldValue::Text("path".into()));
        let out = pipeline.run(example).unwrap();
        assert_eq!(out.text("copy2").unwrap(), "path");
    }

    #[test]
    fn test_field_type_errors_name_the_example() {
        let mut example = Example::new("seg_007");
        example.insert("signal", FieldValue::Signal(vec![0.0]));
        let err = example.text("signal").unwrap_err();
        assert!(err.to_string().contains("seg_007"));
        assert!(example.text("absent").is_err());
    }

    #[test]
    fn test_prepare_runs_audio_and_labels() {
        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("seg_001.wav");
        write_wav(&wav_path, &[0.1f32; 200], 16000, 1).unwrap();

        let mut manifest = Manifest::default();
        manifest.entries.insert(
            "seg_001".into(),
            ManifestEntry {
                wav: wav_path.to_string_lossy().into_owned(),
                label: "Crying".into(),
            },
        );

        let pipeline = standard_pipeline(AudioConfig::default(), LabelPolicy::Strict).unwrap();
        let prepared = prepare(&manifest, &pipeline).unwrap();
        assert_eq!(prepared.len(), 1);
        assert_eq!(prepared[0].id, "seg_001");
        // Short clip is padded to the minimum duration.
        assert_eq!(prepared[0].signal.len(), 1120);
        assert_eq!(prepared[0].target, Some(VocalizationLabel::Crying));
    }

    #[test]
    fn test_prepare_applies_label_policy() {
        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("seg_002.wav");
        write_wav(&wav_path, &[0.1f32; 200], 16000, 1).unwrap();

        let mut manifest = Manifest::default();
        manifest.entries.insert(
            "seg_002".into(),
            ManifestEntry {
                wav: wav_path.to_string_lossy().into_owned(),
                label: "Screaming".into(),
            },
        );

        let strict = standard_pipeline(AudioConfig::default(), LabelPolicy::Strict).unwrap();
        assert!(prepare(&manifest, &strict).is_err());

        let coerce =
            standard_pipeline(AudioConfig::default(), LabelPolicy::CoerceToJunk).unwrap();
        let prepared = prepare(&manifest, &coerce).unwrap();
        assert_eq!(prepared[0].target, Some(VocalizationLabel::Junk));
    }

    #[test]
    fn test_prepare_keeps_unlabeled_examples() {
        let dir = tempfile::tempdir().unwrap();
        let wav_path = dir.path().join("seg_003.wav");
        write_wav(&wav_path, &[0.1f32; 200], 16000, 1).unwrap();

        let mut manifest = Manifest::default();
        manifest.entries.insert(
            "seg_003".into(),
            ManifestEntry {
                wav: wav_path.to_string_lossy().into_owned(),
                label: String::new(),
            },
        );

        let pipeline = standard_pipeline(AudioConfig::default(), LabelPolicy::Strict).unwrap();
        let prepared = prepare(&manifest, &pipeline).unwrap();
        assert_eq!(prepared[0].target, None);
    }
}
