//! Classifier wrappers around smartcore
//!
//! Features are standardized with statistics from the training rows only,
//! then handed to the selected smartcore estimator.

use smartcore::ensemble::random_forest_classifier::{
    RandomForestClassifier, RandomForestClassifierParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::linear::logistic_regression::{LogisticRegression, LogisticRegressionParameters};
use smartcore::metrics::distance::euclidian::Euclidian;
use smartcore::neighbors::knn_classifier::{KNNClassifier, KNNClassifierParameters};

use crate::config::ClassifierKind;
use crate::error::{GenreError, Result};

const KNN_NEIGHBOURS: usize = 3;

type Matrix = DenseMatrix<f64>;

/// Per-column z-score scaling.
#[derive(Debug, Clone, PartialEq)]
pub struct Standardizer {
    means: Vec<f64>,
    scales: Vec<f64>,
}

impl Standardizer {
    pub fn fit(rows: &[Vec<f64>]) -> Self {
        let width = rows.first().map_or(0, |r| r.len());
        let n = rows.len().max(1) as f64;

        let mut means = vec![0.0; width];
        for row in rows {
            for (m, v) in means.iter_mut().zip(row) {
                *m += v / n;
            }
        }

        let mut scales = vec![0.0; width];
        for row in rows {
            for ((s, v), m) in scales.iter_mut().zip(row).zip(&means) {
                *s += (v - m).powi(2) / n;
            }
        }
        // Constant columns stay centred but unscaled.
        for s in &mut scales {
            *s = if *s > f64::EPSILON { s.sqrt() } else { 1.0 };
        }

        Self { means, scales }
    }

    pub fn transform(&self, rows: &[Vec<f64>]) -> Vec<Vec<f64>> {
        rows.iter()
            .map(|row| {
                row.iter()
                    .zip(self.means.iter().zip(&self.scales))
                    .map(|(v, (m, s))| (v - m) / s)
                    .collect()
            })
            .collect()
    }
}

enum Estimator {
    Logistic(LogisticRegression<f64, i32, Matrix, Vec<i32>>),
    RandomForest(RandomForestClassifier<f64, i32, Matrix, Vec<i32>>),
    Knn(KNNClassifier<f64, i32, Matrix, Vec<i32>, Euclidian<f64>>),
}

/// A fitted classifier.
pub struct TrainedModel {
    scaler: Standardizer,
    estimator: Estimator,
}

impl TrainedModel {
    /// Fit `kind` on rows `x` with class indices `y`.
    pub fn fit(kind: ClassifierKind, seed: u64, x: &[Vec<f64>], y: &[usize]) -> Result<Self> {
        if x.is_empty() || x.len() != y.len() {
            return Err(GenreError::Classifier {
                reason: format!("{} rows but {} targets", x.len(), y.len()),
            });
        }

        let scaler = Standardizer::fit(x);
        let matrix = to_matrix(&scaler.transform(x));
        let targets: Vec<i32> = y.iter().map(|&c| c as i32).collect();

        let estimator = match kind {
            ClassifierKind::Logistic => Estimator::Logistic(
                LogisticRegression::fit(&matrix, &targets, LogisticRegressionParameters::default())
                    .map_err(classifier_error)?,
            ),
            ClassifierKind::RandomForest => {
                // smartcore seeds every tree alike; let each tree see all features.
                let params = RandomForestClassifierParameters {
                    m: Some(x[0].len()),
                    seed,
                    ..Default::default()
                };
                Estimator::RandomForest(
                    RandomForestClassifier::fit(&matrix, &targets, params)
                        .map_err(classifier_error)?,
                )
            }
            ClassifierKind::Knn => {
                let k = KNN_NEIGHBOURS.min(x.len());
                Estimator::Knn(
                    KNNClassifier::fit(&matrix, &targets, KNNClassifierParameters::default().with_k(k))
                        .map_err(classifier_error)?,
                )
            }
        };

        Ok(Self { scaler, estimator })
    }

    /// Predicted class index per row.
    pub fn predict(&self, x: &[Vec<f64>]) -> Result<Vec<usize>> {
        if x.is_empty() {
            return Ok(Vec::new());
        }
        let matrix = to_matrix(&self.scaler.transform(x));
        let predicted = match &self.estimator {
            Estimator::Logistic(model) => model.predict(&matrix),
            Estimator::RandomForest(model) => model.predict(&matrix),
            Estimator::Knn(model) => model.predict(&matrix),
        }
        .map_err(classifier_error)?;

        predicted
            .into_iter()
            .map(|c| {
                usize::try_from(c).map_err(|_| GenreError::Classifier {
                    reason: format!("predicted unknown class {}", c),
                })
            })
            .collect()
    }
}

fn to_matrix(rows: &[Vec<f64>]) -> Matrix {
    DenseMatrix::from_2d_vec(&rows.to_vec())
}

fn classifier_error(e: smartcore::error::Failed) -> GenreError {
    GenreError::Classifier {
        reason: e.to_string(),
    }
}
