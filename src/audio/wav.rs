//! WAV file I/O and signal preparation.

use crate::error::Error;
use crate::Result;
use std::path::Path;

/// Read a WAV file, return (samples, sample_rate, num_channels).
///
/// Samples are interleaved f32 in [-1, 1].
pub fn read_wav(path: impl AsRef<Path>) -> Result<(Vec<f32>, u32, u16)> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let sample_rate = spec.sample_rate;
    let channels = spec.channels;

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let max_val = (1u32 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok((samples, sample_rate, channels))
}

/// Write interleaved f32 samples as a WAV file.
pub fn write_wav(
    path: impl AsRef<Path>,
    samples: &[f32],
    sample_rate: u32,
    num_channels: u16,
) -> Result<()> {
    let spec = hound::WavSpec {
        channels: num_channels,
        sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for &s in samples {
        writer.write_sample(s)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Average interleaved channels down to a mono signal.
pub fn mixdown_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    let channels = channels as usize;
    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Zero-pad the tail of a signal up to `min_len` samples.
///
/// Very short clips would otherwise fall below the encoder's minimum
/// receptive field; signals already long enough pass through unchanged.
pub fn pad_to_min_samples(mut samples: Vec<f32>, min_len: usize) -> Vec<f32> {
    if samples.len() < min_len {
        samples.resize(min_len, 0.0);
    }
    samples
}

/// Load a clip as a mono signal at the required sample rate.
///
/// Files at a different sample rate are rejected; this crate does no
/// resampling, so inputs must be converted upstream.
pub fn load_signal(
    path: impl AsRef<Path>,
    expected_sample_rate: u32,
    min_samples: usize,
) -> Result<Vec<f32>> {
    let path = path.as_ref();
    let (samples, sample_rate, channels) = read_wav(path)?;
    if sample_rate != expected_sample_rate {
        return Err(Error::Audio(format!(
            "{}: sample rate {sample_rate} does not match the required {expected_sample_rate}, resample the file first",
            path.display()
        )));
    }
    let mono = mixdown_mono(&samples, channels);
    Ok(pad_to_min_samples(mono, min_samples))
}
