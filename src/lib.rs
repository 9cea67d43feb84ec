//! Infant vocalization type classification in pure Rust.
//!
//! A candle-based experiment layer for scoring short audio segments into
//! five vocalization classes (Junk, Non-Canonical, Canonical, Laughing,
//! Crying). The pretrained acoustic encoder and the ASR embedding model
//! stay behind a trait seam; their outputs are consumed from a
//! precomputed safetensors store, so evaluation runs without them loaded.
//!
//! ## Architecture
//!
//! A manifest of annotated segments flows through preparation, feature
//! lookup, and the classifier:
//!
//! ```text
//! manifest (JSON) → data pipeline (wav → signal, label → target)
//!                        ↓
//!        encoder features (layer outputs + ASR embedding)
//!                        ↓
//!        pool over time (length-masked mean × layer weighting)
//!                        ↓
//!        fuse with ASR stream (concat | blend)
//!                        ↓
//!        classifier head → softmax / argmax
//!                        ↓
//!        predictions.csv + classification report
//! ```
//!
//! ## Modules
//!
//! - [`audio`] — WAV I/O, mono mixdown, minimum-duration padding
//! - [`manifest`] — JSON manifests keyed by segment id
//! - [`pipeline`] — explicit staged data preparation
//! - [`model`] — pooling, fusion, feature seam, classifier
//! - [`eval`] — evaluation driver, metrics, CSV prediction sink
//! - [`label`] — the fixed class vocabulary and label policy
//! - [`config`] — experiment configuration

pub mod audio;
pub mod config;
pub mod eval;
pub mod label;
pub mod manifest;
pub mod model;
pub mod pipeline;

mod error;

pub use error::{Error, Result};
