//! Pipeline configuration
//!
//! Every stage takes its settings from an explicit struct here rather than
//! from process-wide state. The CLI fills these in from flags and
//! environment variables.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::{GenreError, Result};

/// Sampling rate the extractor configs expect.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Codebook size handed to openXBOW.
pub const DEFAULT_CODEBOOK_SIZE: usize = 500;

/// Seed used when none is given.
pub const DEFAULT_SEED: u64 = 440;

/// Locations of the external binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolPaths {
    /// openSMILE's `SMILExtract` binary
    pub smilextract: PathBuf,
    /// openSMILE descriptor config (e.g. `ComParE_2016.conf`)
    pub opensmile_config: PathBuf,
    /// Java runtime used to launch openXBOW
    pub java: PathBuf,
    /// `openXBOW.jar`
    pub openxbow_jar: PathBuf,
    /// SoX, used to unpack `.sph` containers
    pub sox: PathBuf,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            smilextract: PathBuf::from("SMILExtract"),
            opensmile_config: PathBuf::from("config/openSMILE/ComParE_2016.conf"),
            java: PathBuf::from("java"),
            openxbow_jar: PathBuf::from("lib/openXBOW.jar"),
            sox: PathBuf::from("sox"),
        }
    }
}

/// Settings for the transfer stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Convert `.sph` sources with SoX instead of copying them verbatim
    pub convert_sph: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self { convert_sph: true }
    }
}

/// Settings for the extraction stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Number of concurrent extractor processes
    pub workers: usize,
    /// Sample rate the wavs are expected to have
    pub expected_sample_rate: u32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        let workers = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            workers,
            expected_sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

/// Settings for the bag-of-words stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BagConfig {
    pub codebook_size: usize,
    /// JVM heap request, e.g. `12G`
    pub memory: Option<String>,
}

impl Default for BagConfig {
    fn default() -> Self {
        Self {
            codebook_size: DEFAULT_CODEBOOK_SIZE,
            memory: Some("12G".to_string()),
        }
    }
}

/// Which classifier the evaluation fits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ClassifierKind {
    /// Multinomial logistic regression
    #[default]
    Logistic,
    /// Random forest, seeded from the evaluation seed
    RandomForest,
    /// k-nearest neighbours with k = 3
    Knn,
}

impl ClassifierKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Logistic => "logistic",
            Self::RandomForest => "random-forest",
            Self::Knn => "knn",
        }
    }
}

impl std::fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output format of the evaluation report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

/// Settings for the classification stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Number of cross-validation folds; below 2 means hold-out evaluation
    pub cv_folds: usize,
    /// Fraction of each class held out for testing in hold-out mode
    pub test_split: f64,
    pub classifier: ClassifierKind,
    pub random_seed: u64,
    pub report_format: ReportFormat,
    /// Report destination; standard output when absent
    pub report_path: Option<PathBuf>,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            cv_folds: 0,
            test_split: 0.25,
            classifier: ClassifierKind::default(),
            random_seed: DEFAULT_SEED,
            report_format: ReportFormat::default(),
            report_path: None,
        }
    }
}

impl EvaluationConfig {
    /// Whether k-fold cross-validation is requested.
    pub fn uses_cross_validation(&self) -> bool {
        self.cv_folds >= 2
    }

    /// Reject option combinations the evaluator cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.cv_folds == 1 {
            return Err(GenreError::InvalidConfig {
                reason: "cv_folds must be 0 (hold-out) or at least 2".to_string(),
            });
        }
        if !self.uses_cross_validation() && !(self.test_split > 0.0 && self.test_split < 1.0) {
            return Err(GenreError::InvalidConfig {
                reason: format!("test_split must lie in (0, 1), got {}", self.test_split),
            });
        }
        Ok(())
    }
}

/// Everything a pipeline run needs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// ELAR source directories (`-t`)
    pub sources: Vec<PathBuf>,
    /// Directory of renamed wavs (`-t`, `-e`)
    pub wavs: Option<PathBuf>,
    /// Directory for compiled artifacts (`-e`, `-x`, `-c`)
    pub compiled: Option<PathBuf>,
    pub tools: ToolPaths,
    pub transfer: TransferConfig,
    pub extraction: ExtractionConfig,
    pub bag: BagConfig,
    pub evaluation: EvaluationConfig,
}

impl PipelineConfig {
    /// Layout of the compiled directory, if one was given.
    pub fn compiled_layout(&self) -> Option<CompiledLayout> {
        self.compiled.as_deref().map(CompiledLayout::new)
    }
}

/// Well-known file names inside the compiled directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledLayout {
    root: PathBuf,
}

impl CompiledLayout {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// One LLD file per recording lives here.
    pub fn lld_dir(&self) -> PathBuf {
        self.root.join("llds")
    }

    pub fn label_file(&self) -> PathBuf {
        self.root.join("labels.csv")
    }

    pub fn matrix_file(&self) -> PathBuf {
        self.root.join("xbow.arff")
    }

    pub fn codebook_file(&self) -> PathBuf {
        self.root.join("codebook")
    }
}
