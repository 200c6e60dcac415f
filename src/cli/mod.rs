//! CLI Module
//!
//! Command-line interface for the genre pipeline. Actions are short flags
//! that combine (`-texc`); every other option feeds [`PipelineConfig`].

mod logging;

use clap::Parser;
use std::path::PathBuf;

use crate::config::{
    BagConfig, ClassifierKind, EvaluationConfig, ExtractionConfig, PipelineConfig, ReportFormat,
    ToolPaths, TransferConfig, DEFAULT_CODEBOOK_SIZE, DEFAULT_SAMPLE_RATE, DEFAULT_SEED,
};
use crate::pipeline::Actions;

pub use logging::{logger, LogTee};

/// Genre classification pipeline: transfer, extract, compile, classify
#[derive(Parser, Debug)]
#[command(name = "genre")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Transfer ELAR recordings into the wav directory
    #[arg(short = 't', long = "transfer")]
    pub transfer: bool,

    /// Extract low-level descriptors from the wav directory
    #[arg(short = 'e', long = "extract")]
    pub extract: bool,

    /// Compile descriptors into a bag-of-words matrix
    #[arg(short = 'x', long = "compile")]
    pub compile: bool,

    /// Evaluate a classifier on the compiled matrix
    #[arg(short = 'c', long = "classify")]
    pub classify: bool,

    /// ELAR source directory (repeatable)
    #[arg(short = 'i', long = "source", value_name = "DIR")]
    pub sources: Vec<PathBuf>,

    /// Directory of renamed wavs
    #[arg(short, long, value_name = "DIR")]
    pub wavs: Option<PathBuf>,

    /// Directory for descriptors, labels, codebook and matrix
    #[arg(short = 'o', long, value_name = "DIR")]
    pub compiled: Option<PathBuf>,

    /// openSMILE SMILExtract binary
    #[arg(long, env = "GENRE_SMILEXTRACT", value_name = "PATH")]
    pub smilextract: Option<PathBuf>,

    /// openSMILE descriptor config
    #[arg(long, env = "GENRE_OPENSMILE_CONFIG", value_name = "PATH")]
    pub opensmile_config: Option<PathBuf>,

    /// Java runtime used for openXBOW
    #[arg(long, env = "GENRE_JAVA", value_name = "PATH")]
    pub java: Option<PathBuf>,

    /// openXBOW jar
    #[arg(long, env = "GENRE_OPENXBOW_JAR", value_name = "PATH")]
    pub openxbow_jar: Option<PathBuf>,

    /// SoX binary for .sph conversion
    #[arg(long, env = "GENRE_SOX", value_name = "PATH")]
    pub sox: Option<PathBuf>,

    /// Copy .sph files as they are instead of converting them to wav
    #[arg(long)]
    pub no_convert: bool,

    /// JVM heap for openXBOW (empty to leave the JVM default)
    #[arg(short, long, default_value = "12G")]
    pub memory: String,

    /// Number of codebook words
    #[arg(long, default_value_t = DEFAULT_CODEBOOK_SIZE)]
    pub codebook_size: usize,

    /// Concurrent extractor processes [default: available cores]
    #[arg(long)]
    pub workers: Option<usize>,

    /// Sample rate the wavs are expected to have
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    pub sample_rate: u32,

    /// Cross-validation folds; 0 evaluates on a hold-out split
    #[arg(long, default_value_t = 0)]
    pub cv_folds: usize,

    /// Fraction of each class held out for testing
    #[arg(long, default_value_t = 0.25)]
    pub test_split: f64,

    #[arg(long, value_enum, default_value_t = ClassifierKind::Logistic)]
    pub classifier: ClassifierKind,

    /// Seed for splits and seeded classifiers
    #[arg(long, default_value_t = DEFAULT_SEED)]
    pub seed: u64,

    /// Write the report here instead of standard output
    #[arg(long, value_name = "PATH")]
    pub report: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub report_format: ReportFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Also write log output to this file
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,

    /// Print the effective configuration as JSON and exit
    #[arg(long)]
    pub print_config: bool,
}

impl Cli {
    pub fn actions(&self) -> Actions {
        Actions {
            transfer: self.transfer,
            extract: self.extract,
            compile: self.compile,
            classify: self.classify,
        }
    }

    /// Build the pipeline configuration, falling back to defaults for
    /// anything not given.
    pub fn to_config(&self) -> PipelineConfig {
        let defaults = ToolPaths::default();
        let tools = ToolPaths {
            smilextract: self.smilextract.clone().unwrap_or(defaults.smilextract),
            opensmile_config: self
                .opensmile_config
                .clone()
                .unwrap_or(defaults.opensmile_config),
            java: self.java.clone().unwrap_or(defaults.java),
            openxbow_jar: self.openxbow_jar.clone().unwrap_or(defaults.openxbow_jar),
            sox: self.sox.clone().unwrap_or(defaults.sox),
        };

        let extraction_defaults = ExtractionConfig::default();
        let memory = Some(self.memory.trim().to_string()).filter(|m| !m.is_empty());

        PipelineConfig {
            sources: self.sources.clone(),
            wavs: self.wavs.clone(),
            compiled: self.compiled.clone(),
            tools,
            transfer: TransferConfig {
                convert_sph: !self.no_convert,
            },
            extraction: ExtractionConfig {
                workers: self.workers.unwrap_or(extraction_defaults.workers),
                expected_sample_rate: self.sample_rate,
            },
            bag: BagConfig {
                codebook_size: self.codebook_size,
                memory,
            },
            evaluation: EvaluationConfig {
                cv_folds: self.cv_folds,
                test_split: self.test_split,
                classifier: self.classifier,
                random_seed: self.seed,
                report_format: self.report_format,
                report_path: self.report.clone(),
            },
        }
    }
}
