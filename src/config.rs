//! Configuration for vocalization classification experiments.
//!
//! Defaults follow the wav2vec2-large conventions of the upstream encoder
//! (25 hidden-state layers, 1024-dim features).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::label::LabelPolicy;

/// Order of pooling and layer weighting in the fusion engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStrategy {
    /// Masked-mean each layer over time, then weight across layers.
    MeanThenWeight,
    /// Weight across layers per frame, then masked-mean over time.
    WeightThenMean,
}

/// How the pooled encoder stream and the ASR stream are merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FusionMode {
    /// Concatenate along the feature axis, encoder features first.
    Concat,
    /// Convex blend `(1 - factor) * encoder + factor * asr`.
    Blend,
}

fn default_num_encoder_layers() -> usize {
    25
}

fn default_encoder_dim() -> usize {
    1024
}

fn default_asr_dim() -> usize {
    1024
}

fn default_dnn_neurons() -> usize {
    512
}

fn default_pool_strategy() -> PoolStrategy {
    PoolStrategy::MeanThenWeight
}

fn default_fusion() -> FusionMode {
    FusionMode::Concat
}

fn default_blend_factor() -> f32 {
    0.5
}

/// Classifier dimensions and fusion behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Encoder layers fed to the layer weighting (embedding layer included).
    #[serde(default = "default_num_encoder_layers")]
    pub num_encoder_layers: usize,
    /// Feature dimension of each encoder layer output.
    #[serde(default = "default_encoder_dim")]
    pub encoder_dim: usize,
    /// Feature dimension of the ASR embedding.
    #[serde(default = "default_asr_dim")]
    pub asr_dim: usize,
    /// Hidden units in the classifier head.
    #[serde(default = "default_dnn_neurons")]
    pub dnn_neurons: usize,
    #[serde(default = "default_pool_strategy")]
    pub pool_strategy: PoolStrategy,
    #[serde(default = "default_fusion")]
    pub fusion: FusionMode,
    /// Blend weight of the ASR stream; only used by [`FusionMode::Blend`].
    #[serde(default = "default_blend_factor")]
    pub blend_factor: f32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            num_encoder_layers: default_num_encoder_layers(),
            encoder_dim: default_encoder_dim(),
            asr_dim: default_asr_dim(),
            dnn_neurons: default_dnn_neurons(),
            pool_strategy: default_pool_strategy(),
            fusion: default_fusion(),
            blend_factor: default_blend_factor(),
        }
    }
}

impl ModelConfig {
    /// Input width of the classifier head after fusion.
    pub fn fused_dim(&self) -> usize {
        match self.fusion {
            FusionMode::Concat => self.encoder_dim + self.asr_dim,
            FusionMode::Blend => self.encoder_dim,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.num_encoder_layers == 0 {
            return Err(Error::Config("num_encoder_layers must be nonzero".into()));
        }
        if self.encoder_dim == 0 || self.asr_dim == 0 || self.dnn_neurons == 0 {
            return Err(Error::Config("feature and hidden dims must be nonzero".into()));
        }
        if self.fusion == FusionMode::Blend {
            if self.encoder_dim != self.asr_dim {
                return Err(Error::Config(format!(
                    "blend fusion needs matching dims, got encoder {} vs asr {}",
                    self.encoder_dim, self.asr_dim
                )));
            }
            if !(0.0..=1.0).contains(&self.blend_factor) {
                return Err(Error::Config(format!(
                    "blend_factor must be in [0, 1], got {}",
                    self.blend_factor
                )));
            }
        }
        Ok(())
    }
}

fn default_sample_rate() -> u32 {
    16000
}

fn default_min_duration_s() -> f32 {
    0.07
}

/// Input signal contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Required sample rate; files at other rates are rejected.
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    /// Clips shorter than this are zero-padded at the tail.
    #[serde(default = "default_min_duration_s")]
    pub min_duration_s: f32,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
            min_duration_s: default_min_duration_s(),
        }
    }
}

impl AudioConfig {
    /// Minimum clip length in samples (truncating, like the upstream pipeline).
    pub fn min_samples(&self) -> usize {
        (self.sample_rate as f32 * self.min_duration_s) as usize
    }

    pub fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be nonzero".into()));
        }
        if self.min_duration_s < 0.0 {
            return Err(Error::Config("min_duration_s must not be negative".into()));
        }
        Ok(())
    }
}

/// Top-level experiment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub label_policy: LabelPolicy,
}

impl ExperimentConfig {
    /// Loads and validates a JSON config file. Missing fields take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.model.validate()?;
        self.audio.validate()
    }
}
