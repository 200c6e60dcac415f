//! Pipeline stages
//!
//! Each stage is a self-contained struct built from its slice of the
//! configuration. Stages that call external tools borrow a [`ToolRunner`].
//!
//! [`ToolRunner`]: crate::tools::ToolRunner

pub mod classify;
pub mod compile;
pub mod extract;
pub mod transfer;

pub use classify::{ClassificationStage, EvaluationReport};
pub use compile::{BagCompilationStage, BagInputs};
pub use extract::{ExtractionSummary, FeatureExtractionStage};
pub use transfer::{AudioTransferStage, TransferSummary};
