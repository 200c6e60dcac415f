//! Low-level descriptor extraction
//!
//! Runs openSMILE once per wav on a bounded worker pool. Each invocation
//! writes its own `{identifier}.csv`, so workers never share output. The
//! label index is written once all extractions have succeeded.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, error, info, warn};
use rayon::prelude::*;
use walkdir::WalkDir;

use crate::config::{ExtractionConfig, ToolPaths};
use crate::dataset::{has_extension, resolve_flat, Manifest};
use crate::error::{GenreError, Result};
use crate::tools::{OpenSmile, ToolRunner};

/// Header of the label index, in openXBOW's label-file convention.
pub const LABEL_HEADER: [&str; 2] = ["name", "class"];
pub const LABEL_DELIMITER: u8 = b';';

/// Where one extraction run put its outputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    pub lld_dir: PathBuf,
    pub label_file: PathBuf,
    pub processed: usize,
}

pub struct FeatureExtractionStage<'a> {
    runner: &'a dyn ToolRunner,
    smile: OpenSmile,
    config: ExtractionConfig,
}

impl<'a> FeatureExtractionStage<'a> {
    pub fn new(runner: &'a dyn ToolRunner, tools: &ToolPaths, config: &ExtractionConfig) -> Self {
        Self {
            runner,
            smile: OpenSmile::new(&tools.smilextract, &tools.opensmile_config),
            config: config.clone(),
        }
    }

    /// Extract every wav in `wav_dir` into `lld_dir` and write `label_file`.
    pub fn run(&self, wav_dir: &Path, lld_dir: &Path, label_file: &Path) -> Result<ExtractionSummary> {
        let manifest = resolve_flat(wav_dir)?;
        if manifest.is_empty() {
            return Err(GenreError::MissingFile {
                path: wav_dir.join("*.wav"),
            });
        }

        fs::create_dir_all(lld_dir).map_err(|e| GenreError::io(lld_dir, e))?;
        remove_stale_llds(lld_dir, &manifest)?;

        let workers = self.config.workers.max(1);
        info!(
            "Extracting LLDs for {} wavs with {} workers",
            manifest.len(),
            workers
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|e| GenreError::InvalidConfig {
                reason: format!("could not start {} extraction workers: {}", workers, e),
            })?;

        let start = Instant::now();
        let results: Vec<Result<()>> = pool.install(|| {
            manifest
                .instances()
                .par_iter()
                .map(|instance| {
                    self.check_wav_header(instance.audio_path());
                    let output = lld_path(lld_dir, instance.identifier());
                    self.smile
                        .extract(self.runner, instance.audio_path(), &output, instance.identifier())
                })
                .collect()
        });

        let failures = results.iter().filter(|r| r.is_err()).count();
        if let Some(err) = results.into_iter().find_map(|r| r.err()) {
            error!("{} of {} extractions failed", failures, manifest.len());
            return Err(err);
        }

        write_label_index(&manifest, label_file)?;

        info!(
            "Extracted {} LLD files in {:.1}s",
            manifest.len(),
            start.elapsed().as_secs_f64()
        );

        Ok(ExtractionSummary {
            lld_dir: lld_dir.to_path_buf(),
            label_file: label_file.to_path_buf(),
            processed: manifest.len(),
        })
    }

    /// Warn about wavs the extractor config is not tuned for.
    fn check_wav_header(&self, path: &Path) {
        match hound::WavReader::open(path) {
            Ok(reader) => {
                let spec = reader.spec();
                let seconds = reader.duration() as f64 / spec.sample_rate.max(1) as f64;
                debug!(
                    "{}: {} Hz, {} channel(s), {:.1}s",
                    path.display(),
                    spec.sample_rate,
                    spec.channels,
                    seconds
                );
                if spec.sample_rate != self.config.expected_sample_rate {
                    warn!(
                        "{} is sampled at {} Hz, expected {} Hz",
                        path.display(),
                        spec.sample_rate,
                        self.config.expected_sample_rate
                    );
                }
            }
            Err(e) => warn!("{}: unreadable wav header ({})", path.display(), e),
        }
    }
}

/// `{lld_dir}/{identifier}.csv`
pub fn lld_path(lld_dir: &Path, identifier: &str) -> PathBuf {
    lld_dir.join(format!("{}.csv", identifier))
}

/// Descriptor files directly inside `lld_dir`, sorted by path.
pub fn lld_files(lld_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(lld_dir).min_depth(1).max_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| GenreError::io(lld_dir, e.into()))?;
        if entry.file_type().is_file() && has_extension(entry.path(), "csv") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

/// Delete descriptors left by earlier runs for wavs no longer present.
fn remove_stale_llds(lld_dir: &Path, manifest: &Manifest) -> Result<usize> {
    let mut removed = 0;
    for path in lld_files(lld_dir)? {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        if manifest.get(stem).is_none() {
            warn!("Removing stale descriptor file {}", path.display());
            fs::remove_file(&path).map_err(|e| GenreError::io(&path, e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Write `identifier;label` lines, sorted by identifier, under a header.
pub fn write_label_index(manifest: &Manifest, label_file: &Path) -> Result<()> {
    if let Some(parent) = label_file.parent() {
        fs::create_dir_all(parent).map_err(|e| GenreError::io(parent, e))?;
    }

    let mut writer = csv::WriterBuilder::new()
        .delimiter(LABEL_DELIMITER)
        .from_path(label_file)?;
    writer.write_record(LABEL_HEADER)?;
    for (identifier, label) in manifest.labelled_identifiers() {
        writer.write_record([identifier.as_str(), label.as_str()])?;
    }
    writer.flush().map_err(|e| GenreError::io(label_file, e))?;

    debug!("Wrote label index {}", label_file.display());
    Ok(())
}
