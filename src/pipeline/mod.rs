//! Pipeline orchestration
//!
//! Runs the requested stages in their fixed order:
//! transfer, extract, compile, classify. The orchestrator is a small linear
//! state machine; any stage error moves it to [`PipelineState::Failed`] and
//! stops the run. Outputs written before the failure stay on disk.

use std::fmt;
use std::path::{Path, PathBuf};

use log::{error, info};

use crate::config::{CompiledLayout, PipelineConfig};
use crate::dataset::{resolve_all, LayoutMode};
use crate::error::{GenreError, Result};
use crate::stages::{
    AudioTransferStage, BagCompilationStage, BagInputs, ClassificationStage, EvaluationReport,
    ExtractionSummary, FeatureExtractionStage, TransferSummary,
};
use crate::tools::ToolRunner;

/// Which stages to run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Actions {
    pub transfer: bool,
    pub extract: bool,
    pub compile: bool,
    pub classify: bool,
}

impl Actions {
    pub fn all() -> Self {
        Self {
            transfer: true,
            extract: true,
            compile: true,
            classify: true,
        }
    }

    pub fn any(&self) -> bool {
        self.transfer || self.extract || self.compile || self.classify
    }
}

/// Where the orchestrator is in a run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PipelineState {
    #[default]
    Idle,
    Transferring,
    Extracting,
    Compiling,
    Classifying,
    Done,
    Failed {
        stage: &'static str,
        message: String,
    },
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed { .. })
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineState::Idle => write!(f, "Idle"),
            PipelineState::Transferring => write!(f, "Transferring"),
            PipelineState::Extracting => write!(f, "Extracting"),
            PipelineState::Compiling => write!(f, "Compiling"),
            PipelineState::Classifying => write!(f, "Classifying"),
            PipelineState::Done => write!(f, "Done"),
            PipelineState::Failed { stage, .. } => write!(f, "Failed ({})", stage),
        }
    }
}

/// What each stage that ran produced.
#[derive(Debug, Default)]
pub struct PipelineOutcome {
    pub transfer: Option<TransferSummary>,
    pub extraction: Option<ExtractionSummary>,
    pub matrix: Option<PathBuf>,
    pub report: Option<EvaluationReport>,
}

/// Check that every requested action has its companion arguments.
pub fn validate_actions(actions: &Actions, config: &PipelineConfig) -> Result<()> {
    if !actions.any() {
        return Err(GenreError::NoAction);
    }
    if actions.transfer {
        required(config.wavs.as_deref(), 't', "--wavs")?;
        if config.sources.is_empty() {
            return Err(GenreError::MissingArgument {
                action: 't',
                argument: "at least one --source",
            });
        }
    }
    if actions.extract {
        required(config.wavs.as_deref(), 'e', "--wavs")?;
        required(config.compiled.as_deref(), 'e', "--compiled")?;
    }
    if actions.compile {
        required(config.compiled.as_deref(), 'x', "--compiled")?;
        if config.bag.codebook_size == 0 {
            return Err(GenreError::InvalidConfig {
                reason: "--codebook-size must be positive".to_string(),
            });
        }
    }
    if actions.classify {
        required(config.compiled.as_deref(), 'c', "--compiled")?;
        config.evaluation.validate()?;
    }
    Ok(())
}

fn required<'p>(value: Option<&'p Path>, action: char, argument: &'static str) -> Result<&'p Path> {
    value.ok_or(GenreError::MissingArgument { action, argument })
}

/// Drives the stages for one invocation.
pub struct Orchestrator<'a> {
    config: PipelineConfig,
    runner: &'a dyn ToolRunner,
    state: PipelineState,
    history: Vec<PipelineState>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: PipelineConfig, runner: &'a dyn ToolRunner) -> Self {
        Self {
            config,
            runner,
            state: PipelineState::Idle,
            history: vec![PipelineState::Idle],
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Every state visited so far, starting with `Idle`.
    pub fn history(&self) -> &[PipelineState] {
        &self.history
    }

    /// Run the requested stages in order.
    ///
    /// Arguments are validated before anything touches the filesystem.
    pub fn run(&mut self, actions: Actions) -> Result<PipelineOutcome> {
        validate_actions(&actions, &self.config)?;

        let mut outcome = PipelineOutcome::default();

        if actions.transfer {
            outcome.transfer = Some(self.stage(PipelineState::Transferring, "transfer", transfer)?);
        }
        if actions.extract {
            outcome.extraction = Some(self.stage(PipelineState::Extracting, "extract", extract)?);
        }
        if actions.compile {
            outcome.matrix = Some(self.stage(PipelineState::Compiling, "compile", compile)?);
        }
        if actions.classify {
            outcome.report = Some(self.stage(PipelineState::Classifying, "classify", classify)?);
        }

        self.transition(PipelineState::Done);
        Ok(outcome)
    }

    fn stage<T>(
        &mut self,
        state: PipelineState,
        name: &'static str,
        body: fn(&PipelineConfig, &dyn ToolRunner) -> Result<T>,
    ) -> Result<T> {
        self.transition(state);
        match body(&self.config, self.runner) {
            Ok(value) => Ok(value),
            Err(e) => {
                error!("{} stage failed: {}", name, e);
                self.transition(PipelineState::Failed {
                    stage: name,
                    message: e.to_string(),
                });
                Err(GenreError::StageFailed {
                    stage: name,
                    source: Box::new(e),
                })
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        info!("Pipeline: {} -> {}", self.state, next);
        self.history.push(next.clone());
        self.state = next;
    }
}

// ============================================================================
// Stage bodies
// ============================================================================

fn layout(config: &PipelineConfig, action: char) -> Result<CompiledLayout> {
    config.compiled_layout().ok_or(GenreError::MissingArgument {
        action,
        argument: "--compiled",
    })
}

fn transfer(config: &PipelineConfig, runner: &dyn ToolRunner) -> Result<TransferSummary> {
    let wavs = required(config.wavs.as_deref(), 't', "--wavs")?;
    let manifest = resolve_all(&config.sources, LayoutMode::Elar)?;
    info!(
        "Resolved {} recordings from {} source(s)",
        manifest.len(),
        config.sources.len()
    );

    let summary = AudioTransferStage::new(runner, &config.tools, &config.transfer).run(&manifest, wavs)?;
    info!(
        "Transfer: {} copied, {} converted, {} already present",
        summary.copied, summary.converted, summary.skipped
    );
    Ok(summary)
}

fn extract(config: &PipelineConfig, runner: &dyn ToolRunner) -> Result<ExtractionSummary> {
    let wavs = required(config.wavs.as_deref(), 'e', "--wavs")?;
    let layout = layout(config, 'e')?;
    FeatureExtractionStage::new(runner, &config.tools, &config.extraction).run(
        wavs,
        &layout.lld_dir(),
        &layout.label_file(),
    )
}

fn compile(config: &PipelineConfig, runner: &dyn ToolRunner) -> Result<PathBuf> {
    let layout = layout(config, 'x')?;
    let inputs = BagInputs {
        lld_dir: layout.lld_dir(),
        label_file: layout.label_file(),
        matrix: layout.matrix_file(),
        codebook: layout.codebook_file(),
    };
    BagCompilationStage::new(runner, &config.tools, &config.bag).run(&inputs)
}

fn classify(config: &PipelineConfig, _runner: &dyn ToolRunner) -> Result<EvaluationReport> {
    let layout = layout(config, 'c')?;
    let matrix = layout.matrix_file();
    if !matrix.is_file() {
        return Err(GenreError::MissingFile { path: matrix });
    }
    ClassificationStage::new(config.evaluation.clone()).run(&matrix, &layout.label_file())
}
