//! Feature-stream fusion.

use candle_core::Tensor;

use crate::config::FusionMode;
use crate::error::{Error, Result};

/// Merges the pooled encoder stream with the ASR embedding stream.
///
/// Input: `pooled` [B, De] and `asr` [B, Da].
///
/// `Concat` yields [B, De + Da] with the encoder features first. `Blend`
/// computes `(1 - blend_factor) * pooled + blend_factor * asr`, which
/// requires De == Da; `blend_factor` must lie in [0, 1] and is ignored by
/// `Concat`.
pub fn fuse(pooled: &Tensor, asr: &Tensor, mode: FusionMode, blend_factor: f32) -> Result<Tensor> {
    let (batch_p, dim_p) = pooled.dims2()?;
    let (batch_a, dim_a) = asr.dims2()?;
    if batch_p != batch_a {
        return Err(Error::Shape(format!(
            "fusion batch mismatch: encoder {batch_p} vs asr {batch_a}"
        )));
    }

    match mode {
        FusionMode::Concat => Ok(Tensor::cat(&[pooled, asr], 1)?),
        FusionMode::Blend => {
            if dim_p != dim_a {
                return Err(Error::Shape(format!(
                    "blend fusion needs matching dims, got encoder {dim_p} vs asr {dim_a}"
                )));
            }
            if !(0.0..=1.0).contains(&blend_factor) {
                return Err(Error::Config(format!(
                    "blend_factor must be in [0, 1], got {blend_factor}"
                )));
            }
            let encoder_part = (pooled * (1.0 - blend_factor) as f64)?;
            let asr_part = (asr * blend_factor as f64)?;
            Ok((encoder_part + asr_part)?)
        }
    }
}
