//! Evaluation driver, metrics, and the prediction sink.

use std::fmt;
use std::path::Path;

use candle_core::Device;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::label::{NUM_CLASSES, VocalizationLabel};
use crate::model::classifier::{Decoded, VocalIdModel};
use crate::model::features::{FeatureSource, SignalBatch};
use crate::pipeline::PreparedExample;

/// One scored example.
#[derive(Debug, Clone)]
pub struct ClassPrediction {
    pub id: String,
    pub predicted: VocalizationLabel,
    pub true_label: Option<VocalizationLabel>,
    pub logits: Vec<f32>,
    pub probabilities: Vec<f32>,
}

/// Collects predictions and the confusion matrix as evaluation runs.
///
/// A plain value owned by the driver; unlabeled examples are counted but
/// never enter the confusion matrix.
#[derive(Debug, Default)]
pub struct EvalAccumulator {
    predictions: Vec<ClassPrediction>,
    /// confusion[true][predicted]
    confusion: [[usize; NUM_CLASSES]; NUM_CLASSES],
    unlabeled: usize,
}

impl EvalAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one decoded example.
    pub fn record(&mut self, id: &str, true_label: Option<VocalizationLabel>, decoded: Decoded) {
        match true_label {
            Some(t) => self.confusion[t.as_index()][decoded.label.as_index()] += 1,
            None => self.unlabeled += 1,
        }
        self.predictions.push(ClassPrediction {
            id: id.to_string(),
            predicted: decoded.label,
            true_label,
            logits: decoded.logits,
            probabilities: decoded.probabilities,
        });
    }

    pub fn len(&self) -> usize {
        self.predictions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predictions.is_empty()
    }

    /// Closes accumulation and derives the report.
    pub fn finish(self) -> EvalOutcome {
        let report = ClassReport::from_confusion(&self.confusion, self.unlabeled);
        EvalOutcome {
            predictions: self.predictions,
            report,
        }
    }
}

/// Per-class precision, recall, and F1.
#[derive(Debug, Clone, Serialize)]
pub struct ClassStats {
    pub label: VocalizationLabel,
    pub support: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Classification report over the labeled portion of a split.
///
/// Macro F1 and UAR (unweighted average recall) average over classes with
/// nonzero support, so a split missing a class does not read as failing
/// on it. The error rates are the complements tracked by the experiment
/// logs: `1 - macro F1`, `1 - UAR`, and `1 - (macro F1 + UAR) / 2`.
#[derive(Debug, Clone, Serialize)]
pub struct ClassReport {
    pub per_class: Vec<ClassStats>,
    pub labeled: usize,
    pub unlabeled: usize,
    pub accuracy: f64,
    pub macro_f1: f64,
    pub uar: f64,
    pub error_rate_f1: f64,
    pub error_rate_uar: f64,
    pub error_rate_f1_uar: f64,
}

impl ClassReport {
    pub fn from_confusion(
        confusion: &[[usize; NUM_CLASSES]; NUM_CLASSES],
        unlabeled: usize,
    ) -> Self {
        let mut labeled = 0usize;
        let mut correct = 0usize;
        for (t, row) in confusion.iter().enumerate() {
            for (p, &count) in row.iter().enumerate() {
                labeled += count;
                if t == p {
                    correct += count;
                }
            }
        }

        let mut per_class = Vec::with_capacity(NUM_CLASSES);
        let mut macro_f1 = 0.0;
        let mut uar = 0.0;
        let mut supported = 0usize;
        for c in 0..NUM_CLASSES {
            let support: usize = confusion[c].iter().sum();
            let true_pos = confusion[c][c];
            let predicted: usize = (0..NUM_CLASSES).map(|t| confusion[t][c]).sum();
            let precision = if predicted > 0 {
                true_pos as f64 / predicted as f64
            } else {
                0.0
            };
            let recall = if support > 0 {
                true_pos as f64 / support as f64
            } else {
                0.0
            };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            if support > 0 {
                supported += 1;
                macro_f1 += f1;
                uar += recall;
            }
            per_class.push(ClassStats {
                label: VocalizationLabel::ALL[c],
                support,
                precision,
                recall,
                f1,
            });
        }
        if supported > 0 {
            macro_f1 /= supported as f64;
            uar /= supported as f64;
        }
        let accuracy = if labeled > 0 {
            correct as f64 / labeled as f64
        } else {
            0.0
        };

        Self {
            per_class,
            labeled,
            unlabeled,
            accuracy,
            macro_f1,
            uar,
            error_rate_f1: 1.0 - macro_f1,
            error_rate_uar: 1.0 - uar,
            error_rate_f1_uar: 1.0 - 0.5 * (macro_f1 + uar),
        }
    }
}

impl fmt::Display for ClassReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "accuracy {:.4}, macro F1 {:.4}, UAR {:.4} over {} labeled examples ({} unlabeled)",
            self.accuracy, self.macro_f1, self.uar, self.labeled, self.unlabeled
        )
    }
}

/// Outcome of an evaluation run.
#[derive(Debug)]
pub struct EvalOutcome {
    pub predictions: Vec<ClassPrediction>,
    pub report: ClassReport,
}

/// Runs the model over a prepared split, strictly batch by batch.
pub fn evaluate(
    model: &VocalIdModel,
    source: &dyn FeatureSource,
    examples: &[PreparedExample],
    batch_size: usize,
    device: &Device,
) -> Result<EvalOutcome> {
    if batch_size == 0 {
        return Err(Error::Config("batch_size must be nonzero".into()));
    }
    if examples.is_empty() {
        return Err(Error::Config("nothing to evaluate: the split is empty".into()));
    }

    let mut accumulator = EvalAccumulator::new();
    for chunk in examples.chunks(batch_size) {
        let ids: Vec<String> = chunk.iter().map(|e| e.id.clone()).collect();
        let signals: Vec<Vec<f32>> = chunk.iter().map(|e| e.signal.clone()).collect();
        let batch = SignalBatch::collate(ids, &signals, device)?;

        let features = source.extract(&batch)?;
        let decoded = model.predict(&features)?;
        if decoded.len() != chunk.len() {
            return Err(Error::Shape(format!(
                "model returned {} predictions for a batch of {}",
                decoded.len(),
                chunk.len()
            )));
        }
        for (example, d) in chunk.iter().zip(decoded) {
            accumulator.record(&example.id, example.target, d);
        }
        tracing::debug!("evaluated batch of {}", chunk.len());
    }

    tracing::info!("evaluated {} examples", accumulator.len());
    Ok(accumulator.finish())
}

/// Writes per-example predictions as CSV.
///
/// Columns: `id`, `predicted_label` (class index), `prediction_class_name`,
/// `logits`, `probabilities`; the two vector columns are bracketed lists
/// in a single field each.
pub fn write_predictions_csv(
    predictions: &[ClassPrediction],
    path: impl AsRef<Path>,
) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record([
        "id",
        "predicted_label",
        "prediction_class_name",
        "logits",
        "probabilities",
    ])?;
    for p in predictions {
        let predicted_index = p.predicted.as_index().to_string();
        let logits = format_values(&p.logits);
        let probabilities = format_values(&p.probabilities);
        writer.write_record([
            p.id.as_str(),
            predicted_index.as_str(),
            p.predicted.name(),
            logits.as_str(),
            probabilities.as_str(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

fn format_values(values: &[f32]) -> String {
    let inner: Vec<String> = values.iter().map(|v| v.to_string()).collect();
    format!("[{}]", inner.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ModelConfig;
    use crate::model::features::EncoderFeatures;
    use candle_core::{DType, Tensor};
    use candle_nn::VarBuilder;

    fn decoded(label: VocalizationLabel) -> Decoded {
        let mut probabilities = vec![0.1; NUM_CLASSES];
        probabilities[label.as_index()] = 0.6;
        Decoded {
            label,
            logits: vec![0.0; NUM_CLASSES],
            probabilities,
        }
    }

    #[test]
    fn test_report_matches_hand_computed_confusion() {
        let mut confusion = [[0usize; NUM_CLASSES]; NUM_CLASSES];
        confusion[0] = [3, 0, 1, 0, 0];
        confusion[2] = [0, 0, 4, 0, 0];
        confusion[4] = [1, 0, 0, 0, 1];
        let report = ClassReport::from_confusion(&confusion, 2);

        assert_eq!(report.labeled, 10);
        assert_eq!(report.unlabeled, 2);
        assert!((report.accuracy - 0.8).abs() < 1e-9);

        // Junk: 3/4 both ways. Canonical: precision 4/5, recall 1.
        // Crying: precision 1, recall 1/2.
        assert!((report.per_class[0].f1 - 0.75).abs() < 1e-9);
        assert!((report.per_class[2].precision - 0.8).abs() < 1e-9);
        assert!((report.per_class[2].recall - 1.0).abs() < 1e-9);
        assert!((report.per_class[4].recall - 0.5).abs() < 1e-9);
        assert_eq!(report.per_class[1].support, 0);

        // Averages run over the three supported classes.
        let expected_macro_f1 = (0.75 + 8.0 / 9.0 + 2.0 / 3.0) / 3.0;
        assert!((report.macro_f1 - expected_macro_f1).abs() < 1e-9);
        assert!((report.uar - 0.75).abs() < 1e-9);
        assert!((report.error_rate_f1 - (1.0 - expected_macro_f1)).abs() < 1e-9);
        assert!((report.error_rate_uar - 0.25).abs() < 1e-9);
        let expected_combined = 1.0 - 0.5 * (expected_macro_f1 + 0.75);
        assert!((report.error_rate_f1_uar - expected_combined).abs() < 1e-9);
    }

    #[test]
    fn test_accumulator_keeps_unlabeled_out_of_the_confusion() {
        let mut acc = EvalAccumulator::new();
        acc.record("a", Some(VocalizationLabel::Crying), decoded(VocalizationLabel::Crying));
        acc.record("b", None, decoded(VocalizationLabel::Junk));
        assert_eq!(acc.len(), 2);

        let outcome = acc.finish();
        assert_eq!(outcome.predictions.len(), 2);
        assert_eq!(outcome.report.labeled, 1);
        assert_eq!(outcome.report.unlabeled, 1);
        assert!((outcome.report.accuracy - 1.0).abs() < 1e-9);
    }

    struct OnesSource {
        layers: usize,
        dim: usize,
        asr_dim: usize,
    }

    impl FeatureSource for OnesSource {
        fn extract(&self, batch: &SignalBatch) -> Result<EncoderFeatures> {
            let b = batch.len();
            let device = Device::Cpu;
            let layer_outputs = (0..self.layers)
                .map(|_| Tensor::ones((b, 4, self.dim), DType::F32, &device))
                .collect::<candle_core::Result<Vec<_>>>()?;
            Ok(EncoderFeatures {
                layer_outputs,
                lengths: vec![4; b],
                asr: Tensor::zeros((b, self.asr_dim), DType::F32, &device)?,
            })
        }
    }

    fn prepared(id: &str, target: Option<VocalizationLabel>) -> PreparedExample {
        PreparedExample {
            id: id.to_string(),
            signal: vec![0.0; 1120],
            target,
        }
    }

    #[test]
    fn test_evaluate_scores_every_example() {
        let config = ModelConfig {
            num_encoder_layers: 2,
            encoder_dim: 4,
            asr_dim: 4,
            dnn_neurons: 8,
            ..ModelConfig::default()
        };
        // Zero weights decode everything to Junk, which makes the
        // confusion matrix fully predictable.
        let vb = VarBuilder::zeros(DType::F32, &Device::Cpu);
        let model = VocalIdModel::new(&config, vb).unwrap();
        let source = OnesSource {
            layers: 2,
            dim: 4,
            asr_dim: 4,
        };
        let examples = vec![
            prepared("a", Some(VocalizationLabel::Junk)),
            prepared("b", Some(VocalizationLabel::Canonical)),
            prepared("c", None),
        ];

        let outcome = evaluate(&model, &source, &examples, 2, &Device::Cpu).unwrap();
        assert_eq!(outcome.predictions.len(), 3);
        assert!(
            outcome
                .predictions
                .iter()
                .all(|p| p.predicted == VocalizationLabel::Junk)
        );
        assert_eq!(outcome.report.labeled, 2);
        assert_eq!(outcome.report.unlabeled, 1);
        assert!((outcome.report.accuracy - 0.5).abs() < 1e-9);
        // Supported classes are Junk (recall 1) and Canonical (recall 0).
        assert!((outcome.report.uar - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_evaluate_rejects_degenerate_inputs() {
        let config = ModelConfig {
            num_encoder_layers: 1,
            encoder_dim: 2,
            asr_dim: 2,
            dnn_neurons: 2,
            ..ModelConfig::default()
        };
        let model = VocalIdModel::init_untrained(&config, &Device::Cpu).unwrap();
        let source = OnesSource {
            layers: 1,
            dim: 2,
            asr_dim: 2,
        };
        let examples = vec![prepared("a", None)];
        assert!(evaluate(&model, &source, &examples, 0, &Device::Cpu).is_err());
        assert!(evaluate(&model, &source, &[], 4, &Device::Cpu).is_err());
    }

    #[test]
    fn test_predictions_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("predictions.csv");
        let predictions = vec![
            ClassPrediction {
                id: "seg_001".into(),
                predicted: VocalizationLabel::Canonical,
                true_label: Some(VocalizationLabel::Canonical),
                logits: vec![0.5, -1.0, 2.0, 0.0, 0.25],
                probabilities: vec![0.1, 0.05, 0.6, 0.05, 0.2],
            },
            ClassPrediction {
                id: "seg_002".into(),
                predicted: VocalizationLabel::Junk,
                true_label: None,
                logits: vec![1.0; NUM_CLASSES],
                probabilities: vec![0.2; NUM_CLASSES],
            },
        ];
        write_predictions_csv(&predictions, &path).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        assert_eq!(
            reader.headers().unwrap(),
            &csv::StringRecord::from(vec![
                "id",
                "predicted_label",
                "prediction_class_name",
                "logits",
                "probabilities",
            ])
        );
        let rows: Vec<csv::StringRecord> =
            reader.records().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "seg_001");
        assert_eq!(&rows[0][1], "2");
        assert_eq!(&rows[0][2], "Canonical");
        assert_eq!(&rows[0][4], "[0.1, 0.05, 0.6, 0.05, 0.2]");
        assert_eq!(&rows[1][2], "Junk");
    }
}
