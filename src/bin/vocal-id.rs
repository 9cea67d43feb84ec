//! Vocalization classification CLI — score a test split.
//!
//! Evaluates every example in a JSON manifest: audio is decoded and
//! validated, encoder features come from a precomputed safetensors store,
//! and trained classifier weights are optional (smoke runs fall back to
//! fresh untrained parameters).
//!
//! # Output
//!
//! Writes per-example predictions to `<output-dir>/predictions.csv` and
//! logs the classification report. Also prints a one-line JSON summary to
//! stdout on success:
//!
//! ```json
//! {"predictions":"eval-out/predictions.csv","examples":42,"accuracy":0.81,"macro_f1":0.72,"uar":0.70}
//! ```
//!
//! Exit code 0 on success, non-zero on error.

use clap::Parser;
use vocal_id_rs::{
    config::ExperimentConfig,
    eval::{evaluate, write_predictions_csv},
    label::LabelPolicy,
    manifest::Manifest,
    model::classifier::VocalIdModel,
    model::features::PrecomputedFeatures,
    pipeline::{prepare, standard_pipeline},
};

#[derive(Parser, Debug)]
#[command(
    name = "vocal-id",
    about = "Vocalization type classification over a test split",
    long_about = "Score every example in a JSON manifest. Audio is decoded and validated \n\
                  against the 16kHz mono contract, encoder features are looked up in a \n\
                  precomputed safetensors store, and predictions land in \n\
                  <output-dir>/predictions.csv with a logged classification report."
)]
struct Args {
    /// JSON manifest of the split to score.
    #[arg(long, short = 'm')]
    manifest: String,

    /// Safetensors feature store holding "{id}.hidden" and "{id}.asr".
    #[arg(long, short = 'f')]
    features: String,

    /// Trained classifier weights (safetensors).
    /// Omit to run with fresh untrained parameters.
    #[arg(long, short = 'w')]
    weights: Option<String>,

    /// Experiment config JSON. Omit for defaults.
    #[arg(long, short = 'c')]
    config: Option<String>,

    /// Replacement for "{data_root}" placeholders in manifest wav paths.
    #[arg(long)]
    data_root: Option<String>,

    /// Directory for predictions.csv.
    #[arg(long, short = 'o', default_value = "eval-out")]
    output_dir: String,

    /// Examples per forward pass.
    #[arg(long, short = 'b', default_value_t = 8)]
    batch_size: usize,

    /// Coerce unknown annotation strings to Junk (with a warning)
    /// instead of failing.
    #[arg(long)]
    coerce_unknown_labels: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    if args.batch_size == 0 {
        anyhow::bail!("batch-size must be at least 1");
    }

    let mut config = match &args.config {
        Some(path) => ExperimentConfig::load(path)
            .map_err(|e| anyhow::anyhow!("failed to load config: {e}"))?,
        None => ExperimentConfig::default(),
    };
    if args.coerce_unknown_labels {
        config.label_policy = LabelPolicy::CoerceToJunk;
    }

    let manifest = match &args.data_root {
        Some(root) => Manifest::load_with_root(&args.manifest, root),
        None => Manifest::load(&args.manifest),
    }
    .map_err(|e| anyhow::anyhow!("failed to load manifest: {e}"))?;

    if manifest.is_empty() {
        anyhow::bail!("manifest {} has no entries", args.manifest);
    }

    let device = candle_core::Device::cuda_if_available(0)?;
    tracing::info!("Using device: {:?}", device);

    let model = match &args.weights {
        Some(path) => VocalIdModel::load(path, &config.model, &device)
            .map_err(|e| anyhow::anyhow!("failed to load model: {e}"))?,
        None => {
            tracing::warn!("no --weights given, scoring with untrained parameters");
            VocalIdModel::init_untrained(&config.model, &device)?
        }
    };

    let features = PrecomputedFeatures::load(&args.features, &device)
        .map_err(|e| anyhow::anyhow!("failed to load feature store: {e}"))?;

    tracing::info!("Preparing {} examples...", manifest.len());
    let pipeline = standard_pipeline(config.audio.clone(), config.label_policy)?;
    let examples = prepare(&manifest, &pipeline)?;

    let outcome = evaluate(&model, &features, &examples, args.batch_size, &device)
        .map_err(|e| anyhow::anyhow!("evaluation failed: {e}"))?;

    tracing::info!("{}", outcome.report);
    for stats in &outcome.report.per_class {
        tracing::info!(
            "  {:<13} support {:>4}  precision {:.4}  recall {:.4}  F1 {:.4}",
            stats.label.name(),
            stats.support,
            stats.precision,
            stats.recall,
            stats.f1
        );
    }

    let csv_path = std::path::Path::new(&args.output_dir).join("predictions.csv");
    write_predictions_csv(&outcome.predictions, &csv_path)
        .map_err(|e| anyhow::anyhow!("failed to write predictions: {e}"))?;
    tracing::info!("Predictions written to {}", csv_path.display());

    // Print machine-readable summary to stdout for the caller
    println!(
        r#"{{"predictions":"{path}","examples":{n},"accuracy":{acc:.6},"macro_f1":{f1:.6},"uar":{uar:.6}}}"#,
        path = csv_path.display(),
        n = outcome.predictions.len(),
        acc = outcome.report.accuracy,
        f1 = outcome.report.macro_f1,
        uar = outcome.report.uar,
    );

    Ok(())
}
