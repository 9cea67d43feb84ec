//! Encoder feature access.
//!
//! The pretrained acoustic encoder and the ASR embedding model are
//! external collaborators; the classifier only consumes their outputs.
//! [`FeatureSource`] is that seam. [`PrecomputedFeatures`] is the shipped
//! implementation: per-example tensors exported once into a safetensors
//! file, so evaluation runs without the upstream models loaded.

use std::collections::HashMap;
use std::path::Path;

use candle_core::{Device, Tensor};

use crate::error::{Error, Result};

/// A right-padded batch of prepared signals.
#[derive(Debug, Clone)]
pub struct SignalBatch {
    /// Example ids, one per row.
    pub ids: Vec<String>,
    /// Signals, [B, S], zero padded to the longest clip in the batch.
    pub signals: Tensor,
    /// Valid samples per row, before padding.
    pub sample_lengths: Vec<usize>,
}

impl SignalBatch {
    /// Collates per-example signals into one padded tensor.
    pub fn collate(ids: Vec<String>, signals: &[Vec<f32>], device: &Device) -> Result<Self> {
        if ids.len() != signals.len() {
            return Err(Error::Shape(format!(
                "got {} ids for {} signals",
                ids.len(),
                signals.len()
            )));
        }
        if signals.is_empty() {
            return Err(Error::Shape("cannot collate an empty batch".into()));
        }

        let sample_lengths: Vec<usize> = signals.iter().map(Vec::len).collect();
        let max_len = sample_lengths.iter().copied().max().unwrap_or(0);
        let mut flat = vec![0f32; signals.len() * max_len];
        for (row, signal) in signals.iter().enumerate() {
            flat[row * max_len..row * max_len + signal.len()].copy_from_slice(signal);
        }
        let signals = Tensor::from_vec(flat, (ids.len(), max_len), device)?;

        Ok(Self {
            ids,
            signals,
            sample_lengths,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Per-batch encoder outputs consumed by the pooling engine.
#[derive(Debug, Clone)]
pub struct EncoderFeatures {
    /// One [B, T, D] tensor per encoder layer.
    pub layer_outputs: Vec<Tensor>,
    /// Valid frames per example within the padded T axis.
    pub lengths: Vec<usize>,
    /// ASR embedding, [B, Da].
    pub asr: Tensor,
}

/// Supplies encoder features for a batch of signals.
///
/// An implementation may run a live encoder over `batch.signals` or look
/// features up by example id; the classifier does not care which.
pub trait FeatureSource {
    fn extract(&self, batch: &SignalBatch) -> Result<EncoderFeatures>;
}

/// Feature store exported ahead of evaluation.
///
/// For every example id the safetensors file holds `"{id}.hidden"` with
/// shape [L, T, D] (all encoder layers, valid frames only) and
/// `"{id}.asr"` with shape [Da].
#[derive(Debug)]
pub struct PrecomputedFeatures {
    tensors: HashMap<String, Tensor>,
}

impl PrecomputedFeatures {
    pub fn load(path: impl AsRef<Path>, device: &Device) -> Result<Self> {
        let path = path.as_ref();
        let tensors = candle_core::safetensors::load(path, device)?;
        tracing::info!(
            "loaded {} tensors from feature store {}",
            tensors.len(),
            path.display()
        );
        Ok(Self { tensors })
    }

    fn lookup(&self, id: &str, suffix: &str) -> Result<&Tensor> {
        self.tensors
            .get(&format!("{id}.{suffix}"))
            .ok_or_else(|| Error::Features(format!("no '{suffix}' tensor stored for example '{id}'")))
    }
}

impl FeatureSource for PrecomputedFeatures {
    fn extract(&self, batch: &SignalBatch) -> Result<EncoderFeatures> {
        if batch.is_empty() {
            return Err(Error::Features("cannot extract features for an empty batch".into()));
        }

        let mut hidden = Vec::with_capacity(batch.len());
        let mut asr_rows = Vec::with_capacity(batch.len());
        let mut lengths = Vec::with_capacity(batch.len());
        let mut layout: Option<(usize, usize, usize)> = None;

        for id in &batch.ids {
            let h = self.lookup(id, "hidden")?;
            let (num_layers, frames, dim) = h.dims3().map_err(|_| {
                Error::Features(format!(
                    "example '{id}': hidden tensor must be [layers, frames, dim]"
                ))
            })?;
            let a = self.lookup(id, "asr")?;
            let asr_dim = a.dims1().map_err(|_| {
                Error::Features(format!("example '{id}': asr tensor must be one-dimensional"))
            })?;

            match layout {
                None => layout = Some((num_layers, dim, asr_dim)),
                Some((l, d, ad)) => {
                    if (num_layers, dim, asr_dim) != (l, d, ad) {
                        return Err(Error::Features(format!(
                            "example '{id}': stored shapes [{num_layers}, _, {dim}]/[{asr_dim}] \
                             do not match the batch layout [{l}, _, {d}]/[{ad}]"
                        )));
                    }
                }
            }

            lengths.push(frames);
            hidden.push(h.clone());
            asr_rows.push(a.clone());
        }

        // Right-pad every example to the longest frame count, then slice
        // the stack back into per-layer [B, T, D] tensors.
        let t_max = lengths.iter().copied().max().unwrap_or(0);
        let mut padded = Vec::with_capacity(hidden.len());
        for (h, &frames) in hidden.iter().zip(&lengths) {
            let (num_layers, _, dim) = h.dims3()?;
            if frames < t_max {
                let pad = Tensor::zeros((num_layers, t_max - frames, dim), h.dtype(), h.device())?;
                padded.push(Tensor::cat(&[h, &pad], 1)?);
            } else {
                padded.push(h.clone());
            }
        }
        let stacked = Tensor::stack(&padded, 0)?; // [B, L, T, D]

        let num_layers = stacked.dim(1)?;
        let mut layer_outputs = Vec::with_capacity(num_layers);
        for l in 0..num_layers {
            layer_outputs.push(stacked.narrow(1, l, 1)?.squeeze(1)?);
        }

        Ok(EncoderFeatures {
            layer_outputs,
            lengths,
            asr: Tensor::stack(&asr_rows, 0)?,
        })
    }
}
