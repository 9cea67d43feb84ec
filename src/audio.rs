//! Audio signal preparation.
//!
//! WAV decoding plus the input contract of the classification pipeline:
//! mono mixdown, sample-rate validation, and minimum-duration padding.

mod wav;

pub use wav::{load_signal, mixdown_mono, pad_to_min_samples, read_wav, write_wav};
