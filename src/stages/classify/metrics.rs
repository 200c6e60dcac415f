//! Accuracy, per-class precision/recall/F1, and their macro averages

use serde::Serialize;

/// Scores for one class.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// Number of instances whose true label is this class
    pub support: usize,
}

/// Scores across all classes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OverallMetrics {
    pub accuracy: f64,
    pub macro_precision: f64,
    pub macro_recall: f64,
    pub macro_f1: f64,
    pub evaluated: usize,
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    if precision + recall == 0.0 {
        0.0
    } else {
        2.0 * precision * recall / (precision + recall)
    }
}

/// Fraction of predictions that hit.
pub fn accuracy(truth: &[usize], predicted: &[usize]) -> f64 {
    let hits = truth.iter().zip(predicted).filter(|(t, p)| t == p).count();
    ratio(hits, truth.len())
}

/// Per-class scores over `labels` (indexed by class) plus macro averages.
pub fn score(labels: &[String], truth: &[usize], predicted: &[usize]) -> (Vec<ClassMetrics>, OverallMetrics) {
    let per_class: Vec<ClassMetrics> = labels
        .iter()
        .enumerate()
        .map(|(class, label)| {
            let mut tp = 0;
            let mut fp = 0;
            let mut fn_ = 0;
            for (&t, &p) in truth.iter().zip(predicted) {
                match (t == class, p == class) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            ClassMetrics {
                label: label.clone(),
                precision,
                recall,
                f1: harmonic_mean(precision, recall),
                support: tp + fn_,
            }
        })
        .collect();

    let n = per_class.len().max(1) as f64;
    let overall = OverallMetrics {
        accuracy: accuracy(truth, predicted),
        macro_precision: per_class.iter().map(|m| m.precision).sum::<f64>() / n,
        macro_recall: per_class.iter().map(|m| m.recall).sum::<f64>() / n,
        macro_f1: per_class.iter().map(|m| m.f1).sum::<f64>() / n,
        evaluated: truth.len(),
    };

    (per_class, overall)
}
