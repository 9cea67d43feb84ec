//! Classifier head, prediction decoding, and the assembled model.

use std::path::Path;

use candle_core::{D, DType, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder, VarMap};

use crate::config::{FusionMode, ModelConfig, PoolStrategy};
use crate::error::{Error, Result};
use crate::label::{NUM_CLASSES, VocalizationLabel};
use crate::model::features::EncoderFeatures;
use crate::model::fusion::fuse;
use crate::model::pooling::{LayerWeighting, pool_over_time};

/// Two-layer projection head: fused features → hidden (ReLU) → class logits.
#[derive(Debug, Clone)]
pub struct ClassifierHead {
    dnn: Linear,
    out: Linear,
}

impl ClassifierHead {
    /// Builds from stored weights under `vb` (keys "dnn", "out").
    pub fn new(input_dim: usize, hidden_dim: usize, vb: VarBuilder) -> Result<Self> {
        let dnn = candle_nn::linear(input_dim, hidden_dim, vb.pp("dnn"))?;
        let out = candle_nn::linear(hidden_dim, NUM_CLASSES, vb.pp("out"))?;
        Ok(Self { dnn, out })
    }

    /// Input: [B, F]. Output: raw class logits [B, 5].
    pub fn forward(&self, fused: &Tensor) -> Result<Tensor> {
        let hidden = self.dnn.forward(fused)?.relu()?;
        Ok(self.out.forward(&hidden)?)
    }
}

/// A decoded class decision for one example.
#[derive(Debug, Clone)]
pub struct Decoded {
    pub label: VocalizationLabel,
    pub logits: Vec<f32>,
    pub probabilities: Vec<f32>,
}

/// Softmax and argmax over a batch of logits.
///
/// Ties break toward the lowest class index; the scan uses a strictly
/// greater comparison instead of relying on any backend argmax ordering.
pub fn decode_logits(logits: &Tensor) -> Result<Vec<Decoded>> {
    let (_batch, classes) = logits.dims2()?;
    if classes != NUM_CLASSES {
        return Err(Error::Shape(format!(
            "expected {NUM_CLASSES} class logits, got {classes}"
        )));
    }

    let probabilities = candle_nn::ops::softmax(logits, D::Minus1)?;
    let logit_rows = logits.to_vec2::<f32>()?;
    let prob_rows = probabilities.to_vec2::<f32>()?;

    let mut decoded = Vec::with_capacity(logit_rows.len());
    for (logit_row, prob_row) in logit_rows.into_iter().zip(prob_rows) {
        let mut best = 0;
        for (i, &p) in prob_row.iter().enumerate() {
            if p > prob_row[best] {
                best = i;
            }
        }
        decoded.push(Decoded {
            label: VocalizationLabel::ALL[best],
            logits: logit_row,
            probabilities: prob_row,
        });
    }
    Ok(decoded)
}

/// The assembled vocalization classifier.
///
/// Owns the trainable pieces (layer weighting and projection head) along
/// with the pooling and fusion behavior. Encoder outputs come in as
/// [`EncoderFeatures`]; everything here allocates fresh tensors and never
/// mutates its inputs.
#[derive(Debug, Clone)]
pub struct VocalIdModel {
    weighting: LayerWeighting,
    head: ClassifierHead,
    pool_strategy: PoolStrategy,
    fusion: FusionMode,
    blend_factor: f32,
}

impl VocalIdModel {
    /// Builds from weights under `vb` (prefixes "layer_weighting", "head").
    pub fn new(config: &ModelConfig, vb: VarBuilder) -> Result<Self> {
        config.validate()?;
        let weighting =
            LayerWeighting::new(config.num_encoder_layers, vb.pp("layer_weighting"))?;
        let head = ClassifierHead::new(config.fused_dim(), config.dnn_neurons, vb.pp("head"))?;
        Ok(Self {
            weighting,
            head,
            pool_strategy: config.pool_strategy,
            fusion: config.fusion,
            blend_factor: config.blend_factor,
        })
    }

    /// Loads trained weights from a safetensors file.
    pub fn load(path: impl AsRef<Path>, config: &ModelConfig, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        tracing::info!("loading classifier weights from {}", path.display());
        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[path], DType::F32, device)
                .map_err(|e| Error::WeightLoad(format!("classifier weights: {e}")))?
        };
        Self::new(config, vb)
    }

    /// Fresh parameters: uniform layer weights, randomly initialized head.
    ///
    /// Smoke runs and fixtures work without a trained checkpoint; the
    /// predictions are meaningless but every shape and code path is real.
    pub fn init_untrained(config: &ModelConfig, device: &Device) -> Result<Self> {
        config.validate()?;
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let weighting = LayerWeighting::uniform(config.num_encoder_layers, device)?;
        let head = ClassifierHead::new(config.fused_dim(), config.dnn_neurons, vb.pp("head"))?;
        Ok(Self {
            weighting,
            head,
            pool_strategy: config.pool_strategy,
            fusion: config.fusion,
            blend_factor: config.blend_factor,
        })
    }

    /// Encoder features → class logits [B, 5].
    pub fn forward(&self, features: &EncoderFeatures) -> Result<Tensor> {
        let pooled = pool_over_time(
            &features.layer_outputs,
            &features.lengths,
            self.pool_strategy,
            &self.weighting,
        )?;
        let fused = fuse(&pooled, &features.asr, self.fusion, self.blend_factor)?;
        self.head.forward(&fused)
    }

    /// Forward pass plus decoding, one [`Decoded`] per example.
    pub fn predict(&self, features: &EncoderFeatures) -> Result<Vec<Decoded>> {
        let logits = self.forward(features)?;
        decode_logits(&logits)
    }
}
