//! Model components for vocalization classification.
//!
//! ## Components
//!
//! - [`pooling`] — length-masked temporal pooling and learned layer weighting
//! - [`fusion`] — merging the pooled encoder stream with the ASR stream
//! - [`features`] — the encoder collaborator seam and the precomputed store
//! - [`classifier`] — projection head, decoding, and the assembled model

pub mod classifier;
pub mod features;
pub mod fusion;
pub mod pooling;

pub use classifier::{ClassifierHead, Decoded, VocalIdModel, decode_logits};
pub use features::{EncoderFeatures, FeatureSource, PrecomputedFeatures, SignalBatch};
pub use fusion::fuse;
pub use pooling::{LayerWeighting, masked_mean_pool, pool_over_time};
