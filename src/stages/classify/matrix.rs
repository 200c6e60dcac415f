//! Loading the compiled matrix and the label index
//!
//! openXBOW writes ARFF by default and CSV when asked; both are accepted.
//! Which columns are features comes from the ARFF `@attribute` declarations
//! or the CSV header: the first column is the identifier, numeric columns
//! are features, and anything else (the embedded class attribute) is
//! ignored. Labels always come from the label index so that a disagreement
//! between the two files is caught rather than papered over.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::Serialize;

use crate::dataset::sniff_delimiter;
use crate::error::{GenreError, Result};

/// ARFF attribute types that hold features.
const NUMERIC_TYPES: [&str; 3] = ["numeric", "real", "integer"];

/// CSV header names of a class column.
const CLASS_COLUMNS: [&str; 2] = ["class", "label"];

/// One compiled recording, ready for the classifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureVector {
    pub identifier: String,
    pub values: Vec<f64>,
    pub label: String,
}

/// Rows of the compiled matrix, in file order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub rows: Vec<(String, Vec<f64>)>,
    pub width: usize,
}

impl FeatureMatrix {
    pub fn identifiers(&self) -> BTreeSet<&str> {
        self.rows.iter().map(|(id, _)| id.as_str()).collect()
    }
}

/// Role of one matrix column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Identifier,
    Feature,
    Ignored,
}

/// Where the data rows start and how to read them.
struct Body<'t> {
    text: &'t str,
    /// Lines before `text` in the file
    line_offset: usize,
    delimiter: u8,
    quote: u8,
    /// Declared up front (ARFF) or taken from the first row (CSV)
    columns: Option<Vec<Column>>,
}

/// Parse an ARFF or CSV matrix.
pub fn load_matrix(path: &Path) -> Result<FeatureMatrix> {
    if !path.is_file() {
        return Err(GenreError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let raw = fs::read(path).map_err(|e| GenreError::io(path, e))?;
    let text = String::from_utf8_lossy(&raw);
    parse_matrix(path, &text)
}

fn parse_matrix(path: &Path, text: &str) -> Result<FeatureMatrix> {
    let body = if is_arff(path, text) {
        arff_body(path, text)?
    } else {
        Body {
            text,
            line_offset: 0,
            delimiter: sniff_delimiter(text.as_bytes()),
            quote: b'"',
            columns: None,
        }
    };
    read_rows(path, body)
}

/// Column roles from the `@attribute` lines, and the text after `@data`.
fn arff_body<'t>(path: &Path, text: &'t str) -> Result<Body<'t>> {
    let mut columns = Vec::new();
    let mut consumed = 0;

    for (index, line) in text.split_inclusive('\n').enumerate() {
        consumed += line.len();
        let trimmed = line.trim();
        let lower = trimmed.to_ascii_lowercase();

        if lower.starts_with("@attribute") {
            let kind = attribute_type(&trimmed["@attribute".len()..]);
            columns.push(if columns.is_empty() {
                Column::Identifier
            } else if NUMERIC_TYPES.iter().any(|t| kind.starts_with(t)) {
                Column::Feature
            } else {
                Column::Ignored
            });
        } else if lower.starts_with("@data") {
            if columns.is_empty() {
                return Err(invalid(path, index + 1, "no @attribute declarations"));
            }
            return Ok(Body {
                text: &text[consumed..],
                line_offset: index + 1,
                delimiter: b',',
                quote: b'\'',
                columns: Some(columns),
            });
        }
    }

    Err(invalid(path, 0, "no @data section"))
}

/// Lower-cased type of an `@attribute <name> <type>` declaration.
fn attribute_type(declaration: &str) -> String {
    let rest = declaration.trim();
    let after_name = match rest.chars().next() {
        Some(quote @ ('\'' | '"')) => rest[1..].find(quote).map_or("", |end| &rest[end + 2..]),
        _ => rest.find(char::is_whitespace).map_or("", |end| &rest[end..]),
    };
    after_name.trim().to_ascii_lowercase()
}

/// Roles named by a CSV header row.
fn header_columns(header: &csv::StringRecord) -> Vec<Column> {
    header
        .iter()
        .enumerate()
        .map(|(i, name)| match i {
            0 => Column::Identifier,
            _ if CLASS_COLUMNS.iter().any(|c| name.eq_ignore_ascii_case(c)) => Column::Ignored,
            _ => Column::Feature,
        })
        .collect()
}

fn read_rows(path: &Path, body: Body<'_>) -> Result<FeatureMatrix> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(body.delimiter)
        .quote(body.quote)
        .comment(Some(b'%'))
        .trim(csv::Trim::All)
        .from_reader(body.text.as_bytes());

    let mut columns = body.columns;
    let mut rows: Vec<(String, Vec<f64>)> = Vec::new();
    let mut seen = HashSet::new();

    for record in reader.records() {
        let record = record?;
        let line_no = body.line_offset + record.position().map_or(0, |p| p.line() as usize);

        if columns.is_none() {
            let is_header = record.get(1).map_or(false, |f| parse_value(f).is_none());
            columns = Some(if is_header {
                header_columns(&record)
            } else {
                (0..record.len())
                    .map(|i| if i == 0 { Column::Identifier } else { Column::Feature })
                    .collect()
            });
            if is_header {
                debug!("{}: skipping header row", path.display());
                continue;
            }
        }
        let row_columns = columns.as_deref().unwrap_or_default();

        let (identifier, values) = parse_row(path, line_no, row_columns, &record)?;
        if !seen.insert(identifier.clone()) {
            return Err(GenreError::DuplicateRow {
                path: path.to_path_buf(),
                identifier,
            });
        }
        rows.push((identifier, values));
    }

    let width = columns
        .as_deref()
        .map_or(0, |c| c.iter().filter(|&&c| c == Column::Feature).count());
    if rows.is_empty() {
        return Err(invalid(path, 0, "no data rows"));
    }
    if width == 0 {
        return Err(invalid(path, 0, "rows carry no features"));
    }

    debug!("Loaded {} x {} matrix from {}", rows.len(), width, path.display());
    Ok(FeatureMatrix { rows, width })
}

fn parse_row(
    path: &Path,
    line_no: usize,
    columns: &[Column],
    record: &csv::StringRecord,
) -> Result<(String, Vec<f64>)> {
    if record.get(0).map_or(false, |f| f.starts_with('{')) {
        return Err(invalid(path, line_no, "sparse ARFF rows are not supported"));
    }
    if record.len() != columns.len() {
        return Err(invalid(
            path,
            line_no,
            &format!("expected {} fields, found {}", columns.len(), record.len()),
        ));
    }

    let mut identifier = String::new();
    let mut values = Vec::with_capacity(columns.len());
    for (column, field) in columns.iter().zip(record.iter()) {
        match column {
            Column::Identifier => identifier = field.to_string(),
            Column::Feature => values.push(parse_value(field).ok_or_else(|| {
                invalid(path, line_no, &format!("'{}' is not a number", field))
            })?),
            Column::Ignored => {}
        }
    }

    if identifier.is_empty() {
        return Err(invalid(path, line_no, "empty identifier"));
    }
    Ok((identifier, values))
}

fn parse_value(field: &str) -> Option<f64> {
    field.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Read the `identifier;label` index written by the extraction stage.
pub fn load_labels(path: &Path) -> Result<BTreeMap<String, String>> {
    if !path.is_file() {
        return Err(GenreError::MissingFile {
            path: path.to_path_buf(),
        });
    }
    let raw = fs::read(path).map_err(|e| GenreError::io(path, e))?;
    let text = String::from_utf8_lossy(&raw);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(sniff_delimiter(text.as_bytes()))
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());

    let mut labels = BTreeMap::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let identifier = record.get(0).unwrap_or("");
        let label = record.get(1).unwrap_or("");

        if index == 0 && identifier.eq_ignore_ascii_case("name") {
            continue;
        }
        if identifier.is_empty() && label.is_empty() {
            continue;
        }
        if identifier.is_empty() || label.is_empty() {
            return Err(invalid(path, index + 1, "expected identifier and label"));
        }
        if labels
            .insert(identifier.to_string(), label.to_string())
            .is_some()
        {
            return Err(GenreError::DuplicateRow {
                path: path.to_path_buf(),
                identifier: identifier.to_string(),
            });
        }
    }
    Ok(labels)
}

/// Pair matrix rows with labels; the identifier sets must match exactly.
pub fn join(matrix: FeatureMatrix, labels: &BTreeMap<String, String>) -> Result<Vec<FeatureVector>> {
    let in_matrix = matrix.identifiers();
    let in_labels: BTreeSet<&str> = labels.keys().map(String::as_str).collect();

    if in_matrix != in_labels {
        return Err(GenreError::DataMismatch {
            only_in_matrix: in_matrix
                .difference(&in_labels)
                .map(|s| s.to_string())
                .collect(),
            only_in_labels: in_labels
                .difference(&in_matrix)
                .map(|s| s.to_string())
                .collect(),
        });
    }

    Ok(matrix
        .rows
        .into_iter()
        .map(|(identifier, values)| {
            let label = labels[&identifier].clone();
            FeatureVector {
                identifier,
                values,
                label,
            }
        })
        .collect())
}

/// Load both files and join them.
pub fn load_feature_vectors(matrix: &Path, labels: &Path) -> Result<Vec<FeatureVector>> {
    let labels = load_labels(labels)?;
    join(load_matrix(matrix)?, &labels)
}

fn is_arff(path: &Path, text: &str) -> bool {
    let by_extension = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("arff"))
        .unwrap_or(false);
    by_extension
        || text
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty() && !l.starts_with('%'))
            .map_or(false, |l| l.starts_with('@'))
}

fn invalid(path: &Path, line: usize, reason: &str) -> GenreError {
    GenreError::InvalidMatrix {
        path: PathBuf::from(path),
        line,
        reason: reason.to_string(),
    }
}
