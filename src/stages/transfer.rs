//! Audio transfer
//!
//! Copies every recording of a manifest into a working directory under its
//! flat name, `{identifier}__{label}.wav`. Files already present are left
//! alone so the stage can be re-run after a partial failure.

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::config::{ToolPaths, TransferConfig};
use crate::dataset::{has_extension, Manifest};
use crate::error::{GenreError, Result};
use crate::tools::{Sox, ToolRunner};

/// Counts of what one transfer run did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    pub copied: usize,
    pub converted: usize,
    pub skipped: usize,
}

impl TransferSummary {
    pub fn total(&self) -> usize {
        self.copied + self.converted + self.skipped
    }
}

/// Copies (or converts) manifest audio into a destination directory.
pub struct AudioTransferStage<'a> {
    runner: &'a dyn ToolRunner,
    sox: Option<Sox>,
}

impl<'a> AudioTransferStage<'a> {
    pub fn new(runner: &'a dyn ToolRunner, tools: &ToolPaths, config: &TransferConfig) -> Self {
        let sox = config.convert_sph.then(|| Sox::new(&tools.sox));
        Self { runner, sox }
    }

    pub fn run(&self, manifest: &Manifest, dest: &Path) -> Result<TransferSummary> {
        fs::create_dir_all(dest).map_err(|e| GenreError::io(dest, e))?;

        let mut summary = TransferSummary::default();

        for instance in manifest {
            let target = dest.join(instance.flat_file_name());
            if target.exists() {
                warn!("{} already exists; skipping", target.display());
                summary.skipped += 1;
                continue;
            }

            let source = instance.audio_path();
            match &self.sox {
                Some(sox) if has_extension(source, "sph") => {
                    sox.convert(self.runner, source, &target)?;
                    summary.converted += 1;
                }
                _ => {
                    info!("Copying {} to {}", source.display(), target.display());
                    fs::copy(source, &target).map_err(|e| GenreError::io(source, e))?;
                    summary.copied += 1;
                }
            }
        }

        info!(
            "Transfer finished: {} copied, {} converted, {} skipped",
            summary.copied, summary.converted, summary.skipped
        );

        Ok(summary)
    }
}
