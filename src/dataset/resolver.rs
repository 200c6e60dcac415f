//! Dataset layout resolution
//!
//! Two layouts are understood:
//!
//! - **ELAR**: a directory `<Name>/` holding `<Name>_ELAR_Directory.csv`
//!   and a `Bundles/` tree. Each manifest row names a bundle (column 1), an
//!   audio file inside it (column 3) and a genre label (column 5).
//! - **Flat**: a directory of `{identifier}__{label}.wav` files, as written
//!   by the transfer stage.
//!
//! Resolution only reads the filesystem.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use walkdir::WalkDir;

use super::instance::{Instance, Manifest, NAME_DELIMITER, WAV_EXTENSION};
use crate::error::{GenreError, Result};

/// Column positions inside an ELAR manifest row.
const TITLE_COL: usize = 0;
const AUDIO_COL: usize = 2;
const LABEL_COL: usize = 4;

const BUNDLES_DIR: &str = "Bundles";
const ELAR_MANIFEST_SUFFIX: &str = "_ELAR_Directory.csv";
const SPHERE_EXTENSION: &str = "sph";
const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

/// How a dataset directory is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayoutMode {
    Elar,
    Flat,
}

/// Resolve one dataset directory into a manifest.
pub fn resolve(root: &Path, mode: LayoutMode) -> Result<Manifest> {
    match mode {
        LayoutMode::Elar => resolve_elar(root),
        LayoutMode::Flat => resolve_flat(root),
    }
}

/// Resolve several directories into one manifest.
pub fn resolve_all(roots: &[PathBuf], mode: LayoutMode) -> Result<Manifest> {
    let manifests = roots
        .iter()
        .map(|root| resolve(root, mode))
        .collect::<Result<Vec<_>>>()?;
    Manifest::merge(manifests)
}

/// Resolve an ELAR archive directory.
pub fn resolve_elar(root: &Path) -> Result<Manifest> {
    let source_name = source_name(root)?;
    let manifest_path = root.join(format!("{}{}", source_name, ELAR_MANIFEST_SUFFIX));
    if !manifest_path.is_file() {
        return Err(GenreError::MissingFile {
            path: manifest_path,
        });
    }

    info!("Processing {}", manifest_path.display());

    let raw = fs::read(&manifest_path).map_err(|e| GenreError::io(&manifest_path, e))?;
    let bytes = raw.strip_prefix(UTF8_BOM).unwrap_or(raw.as_slice());
    let delimiter = sniff_delimiter(bytes);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(bytes);

    let bundles_dir = root.join(BUNDLES_DIR);
    let mut instances = Vec::new();

    for (index, record) in reader.byte_records().enumerate() {
        let record = record?;
        let row_number = index + 1;
        let field = |col: usize| -> String {
            record
                .get(col)
                .map(|f| String::from_utf8_lossy(f).trim().to_string())
                .unwrap_or_default()
        };

        if record.len() <= LABEL_COL {
            warn!(
                "{}:{}: expected at least {} columns, found {}; skipping",
                manifest_path.display(),
                row_number,
                LABEL_COL + 1,
                record.len()
            );
            continue;
        }

        let title = field(TITLE_COL);
        let audio = field(AUDIO_COL);
        let label = normalize_label(&field(LABEL_COL));

        let has_file_name = Path::new(&audio).extension().is_some();
        if index == 0 && !has_file_name {
            debug!(
                "{}:{}: '{}' is not a file name; treating row as a header",
                manifest_path.display(),
                row_number,
                audio
            );
            continue;
        }
        if title.is_empty() || label.is_empty() || !has_file_name {
            warn!(
                "{}:{}: empty title, file name or label; skipping",
                manifest_path.display(),
                row_number
            );
            continue;
        }

        let audio_path = locate_audio(&bundles_dir.join(&title), &audio)?;
        let stem = Path::new(&audio)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let identifier = elar_identifier(&source_name, &title, &stem);

        instances.push(Instance::new(identifier, audio_path, label)?.with_recording_title(title));
    }

    info!(
        "Finished processing {} ({} recordings)",
        manifest_path.display(),
        instances.len()
    );

    Manifest::new(instances)
}

/// Resolve a directory of `{identifier}__{label}.wav` files.
pub fn resolve_flat(dir: &Path) -> Result<Manifest> {
    if !dir.is_dir() {
        return Err(GenreError::MissingFile {
            path: dir.to_path_buf(),
        });
    }

    let mut instances = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| GenreError::io(dir, e.into()))?;
        if !entry.file_type().is_file() || !has_extension(entry.path(), WAV_EXTENSION) {
            continue;
        }
        let (identifier, label) = parse_flat_name(entry.path())?;
        instances.push(Instance::new(identifier, entry.path(), label)?);
    }

    instances.sort_by(|a, b| a.identifier().cmp(b.identifier()));
    debug!("Found {} wavs in {}", instances.len(), dir.display());

    Manifest::new(instances)
}

/// Split `{identifier}__{label}.wav` into its identifier and label.
pub fn parse_flat_name(path: &Path) -> Result<(String, String)> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| GenreError::NamingConvention {
            path: path.to_path_buf(),
            reason: "file name is not valid UTF-8".to_string(),
        })?;

    let (identifier, label) =
        stem.split_once(NAME_DELIMITER)
            .ok_or_else(|| GenreError::NamingConvention {
                path: path.to_path_buf(),
                reason: format!("expected identifier{}label", NAME_DELIMITER),
            })?;

    if identifier.is_empty() || label.is_empty() || label.contains(NAME_DELIMITER) {
        return Err(GenreError::NamingConvention {
            path: path.to_path_buf(),
            reason: format!(
                "expected exactly one '{}' between a non-empty identifier and label",
                NAME_DELIMITER
            ),
        });
    }

    Ok((identifier.to_string(), label.to_string()))
}

/// Turn an ELAR genre cell into a label.
///
/// `"Narrative - story"` becomes `Narrative`; `"Song text"` becomes
/// `Song-text`. Non-breaking spaces count as spaces.
pub fn normalize_label(raw: &str) -> String {
    let spaced = raw.replace('\u{a0}', " ");
    let head = spaced.split(" - ").next().unwrap_or("");
    head.trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .replace(NAME_DELIMITER, "_")
}

/// Stable identifier for an ELAR recording.
pub fn elar_identifier(source: &str, title: &str, stem: &str) -> String {
    [source, title, stem]
        .iter()
        .map(|part| sanitize(part))
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Keep `[A-Za-z0-9-]`, map everything else to `-`, squeeze runs.
fn sanitize(part: &str) -> String {
    let mut out = String::with_capacity(part.len());
    for c in part.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '-' };
        if c == '-' && (out.is_empty() || out.ends_with('-')) {
            continue;
        }
        out.push(c);
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

fn source_name(root: &Path) -> Result<String> {
    let canonical = fs::canonicalize(root).map_err(|_| GenreError::MissingFile {
        path: root.to_path_buf(),
    })?;
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| GenreError::InvalidConfig {
            reason: format!("{} has no directory name", root.display()),
        })
}

/// The referenced file, or its `.sph` sibling.
fn locate_audio(bundle_dir: &Path, audio: &str) -> Result<PathBuf> {
    let referenced = bundle_dir.join(audio);
    if referenced.is_file() {
        return Ok(referenced);
    }

    let sphere = referenced.with_extension(SPHERE_EXTENSION);
    if sphere.is_file() {
        debug!("Using {} for {}", sphere.display(), referenced.display());
        return Ok(sphere);
    }

    Err(GenreError::MissingFile { path: referenced })
}

/// Pick the delimiter that occurs most on the first line.
pub(crate) fn sniff_delimiter(bytes: &[u8]) -> u8 {
    let first_line = bytes.split(|&b| b == b'\n').next().unwrap_or_default();
    [b',', b';', b'\t']
        .into_iter()
        .max_by_key(|d| first_line.iter().filter(|&&b| b == *d).count())
        .filter(|d| first_line.contains(d))
        .unwrap_or(b',')
}

pub(crate) fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}
