//! Error handling for the genre pipeline
//!
//! Every stage reports through [`GenreError`]; the orchestrator wraps a
//! stage's error in [`GenreError::StageFailed`] before it reaches the CLI.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, GenreError>;

/// Main error type for pipeline operations
#[derive(Error, Debug)]
pub enum GenreError {
    // Dataset Errors
    #[error("File not found: {path}")]
    MissingFile { path: PathBuf },

    #[error("Bad file name {path}: {reason}")]
    NamingConvention { path: PathBuf, reason: String },

    #[error("Duplicate identifier in manifest: {identifier}")]
    DuplicateIdentifier { identifier: String },

    // I/O Errors
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    IoBare(#[from] std::io::Error),

    // External Tool Errors
    #[error("{tool} exited with {status}: {stderr}")]
    ExternalTool {
        tool: String,
        status: String,
        stderr: String,
    },

    #[error("Could not launch {tool}: {source}")]
    ToolLaunch {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    // Classification Errors
    #[error(
        "Matrix and labels disagree: {} only in matrix {:?}, {} only in labels {:?}",
        only_in_matrix.len(),
        only_in_matrix,
        only_in_labels.len(),
        only_in_labels
    )]
    DataMismatch {
        only_in_matrix: Vec<String>,
        only_in_labels: Vec<String>,
    },

    #[error("Identifier {identifier} appears more than once in {path}")]
    DuplicateRow { path: PathBuf, identifier: String },

    #[error("Invalid matrix {path} at line {line}: {reason}")]
    InvalidMatrix {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    #[error("Classifier error: {reason}")]
    Classifier { reason: String },

    // Parsing Errors
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Configuration Errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("-{action} requires {argument}")]
    MissingArgument {
        action: char,
        argument: &'static str,
    },

    #[error("At least one action (-t, -e, -x, -c) must be specified")]
    NoAction,

    // Pipeline Errors
    #[error("{stage} stage failed: {source}")]
    StageFailed {
        stage: &'static str,
        #[source]
        source: Box<GenreError>,
    },
}

impl GenreError {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        GenreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Get the error code for this error type
    pub fn error_code(&self) -> &'static str {
        match self {
            GenreError::MissingFile { .. } => "MISSING_FILE",
            GenreError::NamingConvention { .. } => "NAMING_CONVENTION",
            GenreError::DuplicateIdentifier { .. } => "DUPLICATE_IDENTIFIER",
            GenreError::Io { .. } | GenreError::IoBare(_) => "IO_ERROR",
            GenreError::ExternalTool { .. } => "EXTERNAL_TOOL",
            GenreError::ToolLaunch { .. } => "TOOL_LAUNCH",
            GenreError::DataMismatch { .. } | GenreError::DuplicateRow { .. } => "DATA_MISMATCH",
            GenreError::InvalidMatrix { .. } => "INVALID_MATRIX",
            GenreError::Classifier { .. } => "CLASSIFIER",
            GenreError::Csv(_) => "CSV_ERROR",
            GenreError::Serialization(_) => "SERIALIZATION_ERROR",
            GenreError::InvalidConfig { .. } => "INVALID_CONFIG",
            GenreError::MissingArgument { .. } => "MISSING_ARGUMENT",
            GenreError::NoAction => "NO_ACTION",
            GenreError::StageFailed { source, .. } => source.error_code(),
        }
    }

    /// The innermost error, looking through stage wrappers.
    pub fn root(&self) -> &GenreError {
        match self {
            GenreError::StageFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Get recovery suggestions for this error
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self.root() {
            GenreError::MissingFile { .. } => vec![
                "Check that the path is correct",
                "Run the earlier actions (-t, -e, -x) to produce missing intermediate files",
            ],
            GenreError::NamingConvention { .. } => vec![
                "Rename the file to {identifier}__{label}.wav",
                "Identifiers and labels must not contain a double underscore",
            ],
            GenreError::DuplicateIdentifier { .. } => vec![
                "Two recordings resolve to the same identifier",
                "Rename one of them or pass the sources separately",
            ],
            GenreError::ExternalTool { .. } => vec![
                "Inspect the captured stderr above",
                "Partial outputs were left in place for inspection",
            ],
            GenreError::ToolLaunch { .. } => vec![
                "Check that the tool is installed and on PATH",
                "Set the tool path with the matching --flag or GENRE_* variable",
            ],
            GenreError::DataMismatch { .. } | GenreError::DuplicateRow { .. } => vec![
                "The matrix and label index came from different runs",
                "Re-run -e and -x to rebuild both from the same wavs",
            ],
            GenreError::MissingArgument { .. } | GenreError::NoAction => {
                vec!["Run with --help to see which arguments each action needs"]
            }
            _ => vec![],
        }
    }
}
