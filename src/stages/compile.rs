//! Bag-of-words compilation
//!
//! openXBOW runs once over the whole LLD directory: the codebook has to be
//! learned from every recording at once, so there is no per-file split.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;

use crate::config::{BagConfig, ToolPaths};
use crate::error::{GenreError, Result};
use crate::stages::extract::lld_files;
use crate::tools::{OpenXbow, ToolRunner, XbowJob};

/// Paths one compilation reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BagInputs {
    pub lld_dir: PathBuf,
    pub label_file: PathBuf,
    pub matrix: PathBuf,
    pub codebook: PathBuf,
}

pub struct BagCompilationStage<'a> {
    runner: &'a dyn ToolRunner,
    xbow: OpenXbow,
    codebook_size: usize,
}

impl<'a> BagCompilationStage<'a> {
    pub fn new(runner: &'a dyn ToolRunner, tools: &ToolPaths, config: &BagConfig) -> Self {
        Self {
            runner,
            xbow: OpenXbow::new(&tools.java, &tools.openxbow_jar).with_memory(config.memory.clone()),
            codebook_size: config.codebook_size,
        }
    }

    /// Compile all LLDs into one matrix, learning a fresh codebook.
    pub fn run(&self, inputs: &BagInputs) -> Result<PathBuf> {
        if self.codebook_size == 0 {
            return Err(GenreError::InvalidConfig {
                reason: "codebook size must be positive".to_string(),
            });
        }

        let lld_count = count_llds(&inputs.lld_dir)?;
        if !inputs.label_file.is_file() {
            return Err(GenreError::MissingFile {
                path: inputs.label_file.clone(),
            });
        }

        info!(
            "Learning a {}-word codebook over {} LLD files",
            self.codebook_size, lld_count
        );

        if let Some(parent) = inputs.matrix.parent() {
            fs::create_dir_all(parent).map_err(|e| GenreError::io(parent, e))?;
        }

        let job = XbowJob {
            lld_dir: &inputs.lld_dir,
            labels: &inputs.label_file,
            matrix: &inputs.matrix,
            codebook: &inputs.codebook,
            codebook_size: self.codebook_size,
        };
        self.xbow.compile(self.runner, &job)?;

        info!("Bag of words written to {}", inputs.matrix.display());
        Ok(inputs.matrix.clone())
    }
}

/// Number of `.csv` files in the LLD directory; zero is an error.
fn count_llds(lld_dir: &Path) -> Result<usize> {
    if !lld_dir.is_dir() {
        return Err(GenreError::MissingFile {
            path: lld_dir.to_path_buf(),
        });
    }

    let count = lld_files(lld_dir)?.len();
    if count == 0 {
        return Err(GenreError::MissingFile {
            path: lld_dir.join("*.csv"),
        });
    }
    Ok(count)
}
