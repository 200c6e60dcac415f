//! Evaluation report rendering

use std::fmt;
use std::fs;
use std::io::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::metrics::{ClassMetrics, OverallMetrics};
use crate::config::{ClassifierKind, ReportFormat};
use crate::error::{GenreError, Result};

/// How the predictions were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EvaluationMode {
    CrossValidation { folds: usize },
    Holdout { test_split: f64 },
}

/// One evaluated instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Prediction {
    pub identifier: String,
    pub true_label: String,
    pub predicted_label: String,
    /// Fold that held this instance out, under cross-validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fold: Option<usize>,
}

impl Prediction {
    pub fn is_correct(&self) -> bool {
        self.true_label == self.predicted_label
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub generated_at: DateTime<Utc>,
    pub classifier: ClassifierKind,
    pub mode: EvaluationMode,
    pub random_seed: u64,
    pub feature_count: usize,
    pub predictions: Vec<Prediction>,
    pub per_class: Vec<ClassMetrics>,
    pub overall: OverallMetrics,
    /// Accuracy on the training rows (hold-out only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub train_accuracy: Option<f64>,
}

impl fmt::Display for EvaluationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvaluationMode::CrossValidation { folds } => write!(f, "{}-fold cross-validation", folds),
            EvaluationMode::Holdout { test_split } => {
                write!(f, "hold-out ({:.0}% test)", test_split * 100.0)
            }
        }
    }
}

impl EvaluationReport {
    pub fn class_metrics(&self, label: &str) -> Option<&ClassMetrics> {
        self.per_class.iter().find(|m| m.label == label)
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Text => Ok(self.render_text()),
            ReportFormat::Json => Ok(serde_json::to_string_pretty(self)? + "\n"),
        }
    }

    pub fn render_text(&self) -> String {
        self.to_string()
    }

    /// Write to `path`, or standard output when there is none.
    pub fn write(&self, format: ReportFormat, path: Option<&Path>) -> Result<()> {
        let rendered = self.render(format)?;
        match path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|e| GenreError::io(parent, e))?;
                }
                fs::write(path, rendered).map_err(|e| GenreError::io(path, e))
            }
            None => {
                let stdout = std::io::stdout();
                let mut handle = stdout.lock();
                handle.write_all(rendered.as_bytes())?;
                handle.flush()?;
                Ok(())
            }
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Genre Classification Report ===")?;
        writeln!(f, "Generated: {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
        writeln!(f, "Classifier: {}", self.classifier)?;
        writeln!(f, "Evaluation: {}", self.mode)?;
        writeln!(f, "Seed: {}", self.random_seed)?;
        writeln!(f, "Features: {}", self.feature_count)?;
        writeln!(f)?;

        writeln!(f, "Predictions ({}):", self.predictions.len())?;
        for p in &self.predictions {
            let marker = if p.is_correct() { " " } else { "x" };
            let fold = p.fold.map(|n| format!(" [fold {}]", n + 1)).unwrap_or_default();
            writeln!(
                f,
                "  {} {:<24} true={:<16} predicted={}{}",
                marker, p.identifier, p.true_label, p.predicted_label, fold
            )?;
        }
        writeln!(f)?;

        writeln!(f, "{:<20} {:>9} {:>9} {:>9} {:>8}", "class", "precision", "recall", "f1", "support")?;
        writeln!(f, "{:-<59}", "")?;
        for m in &self.per_class {
            writeln!(
                f,
                "{:<20} {:>9.3} {:>9.3} {:>9.3} {:>8}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f, "{:-<59}", "")?;
        writeln!(
            f,
            "{:<20} {:>9.3} {:>9.3} {:>9.3} {:>8}",
            "macro avg",
            self.overall.macro_precision,
            self.overall.macro_recall,
            self.overall.macro_f1,
            self.overall.evaluated
        )?;
        writeln!(f)?;

        if let Some(train) = self.train_accuracy {
            writeln!(f, "Train accuracy: {:.3}", train)?;
        }
        writeln!(f, "Test accuracy: {:.3}", self.overall.accuracy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn report(mode: EvaluationMode) -> EvaluationReport {
        EvaluationReport {
            generated_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            classifier: ClassifierKind::Knn,
            mode,
            random_seed: 7,
            feature_count: 2,
            predictions: vec![
                Prediction {
                    identifier: "a01".to_string(),
                    true_label: "music".to_string(),
                    predicted_label: "music".to_string(),
                    fold: Some(0),
                },
                Prediction {
                    identifier: "a02".to_string(),
                    true_label: "speech".to_string(),
                    predicted_label: "music".to_string(),
                    fold: Some(1),
                },
            ],
            per_class: vec![ClassMetrics {
                label: "music".to_string(),
                precision: 0.5,
                recall: 1.0,
                f1: 2.0 / 3.0,
                support: 1,
            }],
            overall: OverallMetrics {
                accuracy: 0.5,
                macro_precision: 0.25,
                macro_recall: 0.5,
                macro_f1: 1.0 / 3.0,
                evaluated: 2,
            },
            train_accuracy: None,
        }
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(
            EvaluationMode::CrossValidation { folds: 5 }.to_string(),
            "5-fold cross-validation"
        );
        assert_eq!(
            EvaluationMode::Holdout { test_split: 0.25 }.to_string(),
            "hold-out (25% test)"
        );
    }

    #[test]
    fn test_text_lines() {
        let text = report(EvaluationMode::CrossValidation { folds: 2 }).render_text();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "=== Genre Classification Report ===");
        assert_eq!(lines[1], "Generated: 2024-05-01 12:00:00 UTC");
        assert_eq!(lines[3], "Evaluation: 2-fold cross-validation");
        assert!(lines.iter().any(|l| l.starts_with("  x a02") && l.ends_with("[fold 2]")));
        assert_eq!(lines.last(), Some(&"Test accuracy: 0.500"));
        assert!(!text.contains("Train accuracy"));
    }

    #[test]
    fn test_json_has_mode_tag() {
        let json = report(EvaluationMode::Holdout { test_split: 0.25 })
            .render(ReportFormat::Json)
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["mode"]["kind"], "holdout");
        assert_eq!(value["predictions"][1]["fold"], 1);
        assert!(value.get("train_accuracy").is_none());
    }
}
