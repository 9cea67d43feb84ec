//! Length-masked temporal pooling and learned layer weighting.

use candle_core::{D, Device, Tensor};
use candle_nn::{Linear, Module, VarBuilder};

use crate::config::PoolStrategy;
use crate::error::{Error, Result};

/// Mean over the valid time extent of each sequence in a padded batch.
///
/// Input: [B, T, D] plus per-example valid lengths in frames.
/// Output: [B, D].
///
/// Positions at or beyond an example's length never contribute and the
/// divisor is the true length, so the result is invariant to whatever the
/// padding holds. Lengths beyond T clamp to T; a zero length is a domain
/// error.
pub fn masked_mean_pool(x: &Tensor, lengths: &[usize]) -> Result<Tensor> {
    let (batch, frames, _dim) = x.dims3()?;
    if lengths.len() != batch {
        return Err(Error::Shape(format!(
            "got {} lengths for a batch of {batch}",
            lengths.len()
        )));
    }
    if let Some(i) = lengths.iter().position(|&l| l == 0) {
        return Err(Error::Pool(format!(
            "cannot pool zero-length sequence at batch index {i}"
        )));
    }

    let device = x.device();
    let mut mask = vec![0f32; batch * frames];
    let mut counts = vec![0f32; batch];
    for (b, &len) in lengths.iter().enumerate() {
        let len = len.min(frames);
        mask[b * frames..b * frames + len].fill(1.0);
        counts[b] = len as f32;
    }
    let mask = Tensor::from_vec(mask, (batch, frames), device)?
        .to_dtype(x.dtype())?
        .unsqueeze(2)?
        .broadcast_as(x.shape())?;
    let counts = Tensor::from_vec(counts, (batch, 1), device)?.to_dtype(x.dtype())?;

    let summed = x.broadcast_mul(&mask)?.sum(1)?;
    Ok(summed.broadcast_div(&counts)?)
}

/// Learned scalar combination across encoder layers.
///
/// A bias-free linear map over the trailing layer axis: [..., L] → [...].
#[derive(Debug, Clone)]
pub struct LayerWeighting {
    proj: Linear,
    num_layers: usize,
}

impl LayerWeighting {
    /// Builds from stored weights under `vb` (key "weight", shape [1, L]).
    pub fn new(num_layers: usize, vb: VarBuilder) -> Result<Self> {
        let proj = candle_nn::linear_no_bias(num_layers, 1, vb)?;
        Ok(Self { proj, num_layers })
    }

    /// Uniform weighting: every layer contributes 1/L.
    pub fn uniform(num_layers: usize, device: &Device) -> Result<Self> {
        if num_layers == 0 {
            return Err(Error::Config("layer weighting needs at least one layer".into()));
        }
        let weight = Tensor::full(1.0 / num_layers as f32, (1, num_layers), device)?;
        Ok(Self {
            proj: Linear::new(weight, None),
            num_layers,
        })
    }

    /// Builds from explicit per-layer weights.
    pub fn from_weights(weights: &[f32], device: &Device) -> Result<Self> {
        if weights.is_empty() {
            return Err(Error::Config("layer weighting needs at least one layer".into()));
        }
        let weight = Tensor::from_vec(weights.to_vec(), (1, weights.len()), device)?;
        Ok(Self {
            proj: Linear::new(weight, None),
            num_layers: weights.len(),
        })
    }

    pub fn num_layers(&self) -> usize {
        self.num_layers
    }

    /// Collapses the trailing layer axis: [..., L] → [...].
    pub fn forward(&self, x: &Tensor) -> Result<Tensor> {
        Ok(self.proj.forward(x)?.squeeze(D::Minus1)?)
    }
}

/// Pools multi-layer encoder outputs down to one vector per example.
///
/// `layers` holds one [B, T, D] tensor per encoder layer. The strategies
/// differ only in whether the temporal mean runs before or after the
/// cross-layer weighting; both produce [B, D] and leave their inputs
/// untouched.
pub fn pool_over_time(
    layers: &[Tensor],
    lengths: &[usize],
    strategy: PoolStrategy,
    weighting: &LayerWeighting,
) -> Result<Tensor> {
    if layers.is_empty() {
        return Err(Error::Pool("no encoder layers to pool".into()));
    }
    if layers.len() != weighting.num_layers() {
        return Err(Error::Shape(format!(
            "layer weighting expects {} layers, got {}",
            weighting.num_layers(),
            layers.len()
        )));
    }

    match strategy {
        PoolStrategy::MeanThenWeight => {
            let pooled = layers
                .iter()
                .map(|layer| masked_mean_pool(layer, lengths))
                .collect::<Result<Vec<_>>>()?;
            // [B, D, L]
            let stacked = Tensor::stack(&pooled, 2)?;
            weighting.forward(&stacked)
        }
        PoolStrategy::WeightThenMean => {
            // [B, T, D, L]
            let stacked = Tensor::stack(layers, 3)?;
            let weighted = weighting.forward(&stacked)?;
            masked_mean_pool(&weighted, lengths)
        }
    }
}
