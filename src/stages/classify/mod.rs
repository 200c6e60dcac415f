//! Classification stage
//!
//! Joins the compiled matrix with the label index, evaluates the configured
//! classifier by stratified cross-validation or a stratified hold-out split,
//! and produces an [`EvaluationReport`].

mod matrix;
mod metrics;
mod model;
mod report;
mod split;

pub use matrix::{join, load_feature_vectors, load_labels, load_matrix, FeatureMatrix, FeatureVector};
pub use metrics::{accuracy, score, ClassMetrics, OverallMetrics};
pub use model::{Standardizer, TrainedModel};
pub use report::{EvaluationMode, EvaluationReport, Prediction};
pub use split::{stratified_folds, stratified_holdout};

use std::collections::BTreeSet;
use std::path::Path;

use chrono::Utc;
use log::{debug, info};

use crate::config::EvaluationConfig;
use crate::error::{GenreError, Result};

/// Feature vectors with their labels encoded as class indices.
struct Encoded {
    labels: Vec<String>,
    x: Vec<Vec<f64>>,
    y: Vec<usize>,
    identifiers: Vec<String>,
}

impl Encoded {
    fn new(vectors: Vec<FeatureVector>) -> Result<Self> {
        let labels: Vec<String> = vectors
            .iter()
            .map(|v| v.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if labels.len() < 2 {
            return Err(GenreError::InvalidConfig {
                reason: format!(
                    "classification needs at least 2 distinct labels, found {}",
                    labels.len()
                ),
            });
        }

        let mut x = Vec::with_capacity(vectors.len());
        let mut y = Vec::with_capacity(vectors.len());
        let mut identifiers = Vec::with_capacity(vectors.len());
        for vector in vectors {
            // Labels were collected from these same vectors.
            let class = labels.binary_search(&vector.label).unwrap_or_default();
            x.push(vector.values);
            y.push(class);
            identifiers.push(vector.identifier);
        }

        Ok(Self {
            labels,
            x,
            y,
            identifiers,
        })
    }

    fn rows(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<usize>) {
        indices
            .iter()
            .map(|&i| (self.x[i].clone(), self.y[i]))
            .unzip()
    }

    fn prediction(&self, index: usize, predicted: usize, fold: Option<usize>) -> Prediction {
        Prediction {
            identifier: self.identifiers[index].clone(),
            true_label: self.labels[self.y[index]].clone(),
            predicted_label: self.labels[predicted].clone(),
            fold,
        }
    }
}

/// Stage that evaluates a classifier on the compiled bag-of-words matrix.
pub struct ClassificationStage {
    config: EvaluationConfig,
}

impl ClassificationStage {
    pub fn new(config: EvaluationConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &EvaluationConfig {
        &self.config
    }

    /// Evaluate and write the report where the config says.
    pub fn run(&self, matrix: &Path, labels: &Path) -> Result<EvaluationReport> {
        let report = self.evaluate(matrix, labels)?;
        report.write(self.config.report_format, self.config.report_path.as_deref())?;
        if let Some(path) = &self.config.report_path {
            info!("Wrote report to {}", path.display());
        }
        Ok(report)
    }

    /// Load the matrix and labels and evaluate without writing anything.
    pub fn evaluate(&self, matrix: &Path, labels: &Path) -> Result<EvaluationReport> {
        self.config.validate()?;
        if !matrix.is_file() {
            return Err(GenreError::MissingFile {
                path: matrix.to_path_buf(),
            });
        }

        let vectors = load_feature_vectors(matrix, labels)?;
        self.evaluate_vectors(vectors)
    }

    /// Evaluate already joined feature vectors.
    pub fn evaluate_vectors(&self, vectors: Vec<FeatureVector>) -> Result<EvaluationReport> {
        self.config.validate()?;
        let feature_count = vectors.first().map_or(0, |v| v.values.len());
        let data = Encoded::new(vectors)?;
        info!(
            "Evaluating {} on {} instances, {} features, {} classes",
            self.config.classifier,
            data.y.len(),
            feature_count,
            data.labels.len()
        );

        let (mode, predictions, truth, predicted, train_accuracy) = if self.config.uses_cross_validation() {
            let (predictions, truth, predicted) = self.cross_validate(&data)?;
            (
                EvaluationMode::CrossValidation {
                    folds: self.config.cv_folds,
                },
                predictions,
                truth,
                predicted,
                None,
            )
        } else {
            let (predictions, truth, predicted, train) = self.holdout(&data)?;
            (
                EvaluationMode::Holdout {
                    test_split: self.config.test_split,
                },
                predictions,
                truth,
                predicted,
                Some(train),
            )
        };

        let (per_class, overall) = score(&data.labels, &truth, &predicted);
        info!(
            "Accuracy {:.3}, macro F1 {:.3}",
            overall.accuracy, overall.macro_f1
        );

        Ok(EvaluationReport {
            generated_at: Utc::now(),
            classifier: self.config.classifier,
            mode,
            random_seed: self.config.random_seed,
            feature_count,
            predictions,
            per_class,
            overall,
            train_accuracy,
        })
    }

    fn fit(&self, data: &Encoded, train: &[usize]) -> Result<TrainedModel> {
        let (x, y) = data.rows(train);
        let distinct: BTreeSet<usize> = y.iter().copied().collect();
        if distinct.len() < 2 {
            return Err(GenreError::Classifier {
                reason: format!(
                    "training partition of {} instances holds a single class",
                    train.len()
                ),
            });
        }
        TrainedModel::fit(self.config.classifier, self.config.random_seed, &x, &y)
    }

    fn cross_validate(&self, data: &Encoded) -> Result<(Vec<Prediction>, Vec<usize>, Vec<usize>)> {
        let folds = self.config.cv_folds;
        let assignment = stratified_folds(&data.y, folds, self.config.random_seed)?;
        let mut predicted = vec![0; data.y.len()];
        let mut predictions: Vec<Option<Prediction>> = vec![None; data.y.len()];

        for fold in 0..folds {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..data.y.len()).partition(|&i| assignment[i] == fold);
            debug!("Fold {}: {} train, {} test", fold + 1, train.len(), test.len());

            let model = self.fit(data, &train)?;
            let (x_test, _) = data.rows(&test);
            for (&index, class) in test.iter().zip(model.predict(&x_test)?) {
                predicted[index] = class;
                predictions[index] = Some(data.prediction(index, class, Some(fold)));
            }
        }

        Ok((
            predictions.into_iter().flatten().collect(),
            data.y.clone(),
            predicted,
        ))
    }

    fn holdout(&self, data: &Encoded) -> Result<(Vec<Prediction>, Vec<usize>, Vec<usize>, f64)> {
        let (train, test) = stratified_holdout(&data.y, self.config.test_split, self.config.random_seed)?;
        debug!("Hold-out: {} train, {} test", train.len(), test.len());

        let model = self.fit(data, &train)?;
        let (x_train, y_train) = data.rows(&train);
        let train_accuracy = accuracy(&y_train, &model.predict(&x_train)?);

        let (x_test, y_test) = data.rows(&test);
        let predicted = model.predict(&x_test)?;
        let predictions = test
            .iter()
            .zip(&predicted)
            .map(|(&index, &class)| data.prediction(index, class, None))
            .collect();

        info!("Train accuracy {:.3}", train_accuracy);
        Ok((predictions, y_test, predicted, train_accuracy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClassifierKind, ReportFormat};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    fn vectors(per_class: usize) -> Vec<FeatureVector> {
        let mut out = Vec::new();
        for i in 0..per_class {
            let jitter = i as f64 * 0.1;
            out.push(FeatureVector {
                identifier: format!("m{:02}", i),
                values: vec![4.0 + jitter, 0.5, 1.0 - jitter],
                label: "music".to_string(),
            });
            out.push(FeatureVector {
                identifier: format!("s{:02}", i),
                values: vec![0.5, 4.0 + jitter, 1.0 + jitter],
                label: "speech".to_string(),
            });
        }
        out
    }

    #[test]
    fn test_cross_validation_predicts_everything_once() {
        let stage = ClassificationStage::new(EvaluationConfig {
            cv_folds: 4,
            ..Default::default()
        });
        let report = stage.evaluate_vectors(vectors(6)).unwrap();

        assert_eq!(report.predictions.len(), 12);
        let ids: BTreeSet<&str> = report.predictions.iter().map(|p| p.identifier.as_str()).collect();
        assert_eq!(ids.len(), 12);
        assert!(report.predictions.iter().all(|p| p.fold.is_some()));
        assert_eq!(report.train_accuracy, None);
        assert!(report.overall.accuracy > 0.9);
    }

    #[test]
    fn test_holdout_reports_train_accuracy() {
        let stage = ClassificationStage::new(EvaluationConfig {
            classifier: ClassifierKind::Knn,
            ..Default::default()
        });
        let report = stage.evaluate_vectors(vectors(8)).unwrap();

        // 8 per class at 25% test: 6 train, 2 test per class
        assert_eq!(report.predictions.len(), 4);
        assert!(report.train_accuracy.is_some());
        assert_eq!(report.class_metrics("speech").map(|m| m.support), Some(2));
    }

    #[test]
    fn test_single_label_rejected() {
        let only_music: Vec<FeatureVector> = vectors(4)
            .into_iter()
            .filter(|v| v.label == "music")
            .collect();
        let err = ClassificationStage::new(EvaluationConfig::default())
            .evaluate_vectors(only_music)
            .unwrap_err();
        assert!(matches!(err, GenreError::InvalidConfig { .. }));
    }

    #[test]
    fn test_same_seed_same_report() {
        let stage = ClassificationStage::new(EvaluationConfig {
            cv_folds: 3,
            classifier: ClassifierKind::RandomForest,
            ..Default::default()
        });
        let a = stage.evaluate_vectors(vectors(6)).unwrap();
        let b = stage.evaluate_vectors(vectors(6)).unwrap();
        assert_eq!(a.predictions, b.predictions);
    }

    #[test]
    fn test_missing_matrix() {
        let dir = tempdir().unwrap();
        let labels = dir.path().join("labels.csv");
        fs::write(&labels, "a;music\n").unwrap();

        let err = ClassificationStage::new(EvaluationConfig::default())
            .evaluate(&dir.path().join("xbow.arff"), &labels)
            .unwrap_err();
        assert!(matches!(err, GenreError::MissingFile { .. }));
    }

    #[test]
    fn test_run_writes_json_report() {
        let dir = tempdir().unwrap();
        let matrix = dir.path().join("xbow.csv");
        let labels = dir.path().join("labels.csv");
        let report_path = dir.path().join("reports/eval.json");

        let mut matrix_text = String::new();
        let mut label_text = String::from("name;class\n");
        for v in vectors(4) {
            let values: Vec<String> = v.values.iter().map(|x| x.to_string()).collect();
            matrix_text.push_str(&format!("{},{}\n", v.identifier, values.join(",")));
            label_text.push_str(&format!("{};{}\n", v.identifier, v.label));
        }
        fs::write(&matrix, matrix_text).unwrap();
        fs::write(&labels, label_text).unwrap();

        let stage = ClassificationStage::new(EvaluationConfig {
            cv_folds: 2,
            report_format: ReportFormat::Json,
            report_path: Some(report_path.clone()),
            ..Default::default()
        });
        stage.run(&matrix, &labels).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&report_path).unwrap()).unwrap();
        assert_eq!(json["predictions"].as_array().map(Vec::len), Some(8));
        assert_eq!(json["mode"]["kind"], "cross-validation");
        assert_eq!(json["classifier"], "logistic");
    }

    #[test]
    fn test_text_report_sections() {
        let stage = ClassificationStage::new(EvaluationConfig::default());
        let text = stage
            .evaluate_vectors(vectors(4))
            .unwrap()
            .render_text();
        assert!(text.contains("Classifier: logistic"));
        assert!(text.contains("macro avg"));
        assert!(text.contains("Train accuracy"));
        assert!(text.contains("Test accuracy"));
    }
}
