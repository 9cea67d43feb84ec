//! Manifest generation CLI — prepare a JSON manifest for annotation.
//!
//! Scans a directory of WAV segments (or takes a single file) and writes
//! one manifest entry per segment, keyed by filename stem, with an empty
//! label field to fill in during annotation.
//!
//! # Output
//!
//! Writes the manifest JSON to --output and prints a one-line JSON
//! summary to stdout on success:
//!
//! ```json
//! {"path":"data/eval.json","entries":42}
//! ```
//!
//! Exit code 0 on success, non-zero on error.

use clap::Parser;
use vocal_id_rs::manifest::Manifest;

#[derive(Parser, Debug)]
#[command(
    name = "gen-manifest",
    about = "Generate a JSON manifest from WAV segments",
    long_about = "Scan a directory of .wav segments (or take a single file) and write a \n\
                  JSON manifest keyed by filename stem, with absolute wav paths and empty \n\
                  label placeholders ready for annotation."
)]
struct Args {
    /// A .wav file or a directory containing .wav segments.
    #[arg(long, short = 'a')]
    audio: String,

    /// Output manifest path (parent directories are created).
    #[arg(long, short = 'o')]
    output: String,
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

    let manifest = Manifest::generate(&args.audio)
        .map_err(|e| anyhow::anyhow!("failed to scan audio: {e}"))?;
    if manifest.is_empty() {
        tracing::warn!("no .wav segments found under {}", args.audio);
    }
    for id in manifest.entries.keys() {
        tracing::debug!("segment {id}");
    }

    manifest
        .save(&args.output)
        .map_err(|e| anyhow::anyhow!("failed to write manifest: {e}"))?;
    tracing::info!("Wrote {} entries to {}", manifest.len(), args.output);

    // Print machine-readable summary to stdout for the caller
    println!(
        r#"{{"path":"{path}","entries":{n}}}"#,
        path = args.output,
        n = manifest.len(),
    );

    Ok(())
}
