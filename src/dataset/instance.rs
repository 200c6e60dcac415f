//! Instances and manifests
//!
//! An [`Instance`] is one labelled recording. A [`Manifest`] is the ordered
//! set of instances for a run, keyed by identifier.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{GenreError, Result};

/// Separator between identifier and label in flat file names.
pub const NAME_DELIMITER: &str = "__";

/// Extension of every file the transfer stage writes.
pub const WAV_EXTENSION: &str = "wav";

/// One labelled recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    identifier: String,
    audio_path: PathBuf,
    label: String,
    recording_title: Option<String>,
}

impl Instance {
    /// Create an instance, checking that the identifier and label can
    /// survive a trip through a flat file name.
    pub fn new(
        identifier: impl Into<String>,
        audio_path: impl Into<PathBuf>,
        label: impl Into<String>,
    ) -> Result<Self> {
        let identifier = identifier.into();
        let label = label.into();
        let audio_path = audio_path.into();

        check_name_part(&audio_path, "identifier", &identifier)?;
        check_name_part(&audio_path, "label", &label)?;

        Ok(Self {
            identifier,
            audio_path,
            label,
            recording_title: None,
        })
    }

    pub fn with_recording_title(mut self, title: impl Into<String>) -> Self {
        self.recording_title = Some(title.into());
        self
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn audio_path(&self) -> &Path {
        &self.audio_path
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn recording_title(&self) -> Option<&str> {
        self.recording_title.as_deref()
    }

    /// `{identifier}__{label}.wav`
    pub fn flat_file_name(&self) -> String {
        format!(
            "{}{}{}.{}",
            self.identifier, NAME_DELIMITER, self.label, WAV_EXTENSION
        )
    }
}

fn check_name_part(path: &Path, what: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(GenreError::NamingConvention {
            path: path.to_path_buf(),
            reason: format!("empty {}", what),
        });
    }
    if value.contains(NAME_DELIMITER) {
        return Err(GenreError::NamingConvention {
            path: path.to_path_buf(),
            reason: format!("{} '{}' contains '{}'", what, value, NAME_DELIMITER),
        });
    }
    if value.contains(|c| c == '/' || c == '\\') {
        return Err(GenreError::NamingConvention {
            path: path.to_path_buf(),
            reason: format!("{} '{}' contains a path separator", what, value),
        });
    }
    Ok(())
}

/// Ordered collection of instances with unique identifiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    instances: Vec<Instance>,
}

impl Manifest {
    /// Build a manifest; fails on the first repeated identifier.
    pub fn new(instances: Vec<Instance>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(instances.len());
        for instance in &instances {
            if !seen.insert(instance.identifier()) {
                return Err(GenreError::DuplicateIdentifier {
                    identifier: instance.identifier().to_string(),
                });
            }
        }
        Ok(Self { instances })
    }

    /// Concatenate manifests, keeping identifiers unique across all of them.
    pub fn merge(manifests: impl IntoIterator<Item = Manifest>) -> Result<Self> {
        let instances = manifests
            .into_iter()
            .flat_map(|m| m.instances)
            .collect();
        Self::new(instances)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Instance> {
        self.instances.iter()
    }

    pub fn instances(&self) -> &[Instance] {
        &self.instances
    }

    pub fn get(&self, identifier: &str) -> Option<&Instance> {
        self.instances.iter().find(|i| i.identifier() == identifier)
    }

    /// `(identifier, label)` pairs, sorted by identifier.
    pub fn labelled_identifiers(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .instances
            .iter()
            .map(|i| (i.identifier().to_string(), i.label().to_string()))
            .collect();
        pairs.sort();
        pairs
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a Instance;
    type IntoIter = std::slice::Iter<'a, Instance>;

    fn into_iter(self) -> Self::IntoIter {
        self.instances.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn instance(id: &str, label: &str) -> Instance {
        Instance::new(id, format!("/audio/{}.wav", id), label).unwrap()
    }

    #[test]
    fn test_flat_file_name() {
        let inst = instance("a01", "music");
        assert_eq!(inst.flat_file_name(), "a01__music.wav");
    }

    #[test]
    fn test_identifier_with_delimiter_rejected() {
        let err = Instance::new("a__01", "/x.wav", "music").unwrap_err();
        assert!(matches!(err, GenreError::NamingConvention { .. }));
    }

    #[test]
    fn test_empty_label_rejected() {
        assert!(Instance::new("a01", "/x.wav", "").is_err());
    }

    #[test]
    fn test_duplicate_identifiers_fail() {
        let err = Manifest::new(vec![
            instance("a01", "music"),
            instance("a02", "speech"),
            instance("a01", "speech"),
        ])
        .unwrap_err();
        match err {
            GenreError::DuplicateIdentifier { identifier } => assert_eq!(identifier, "a01"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_merge_detects_cross_manifest_duplicates() {
        let a = Manifest::new(vec![instance("x", "music")]).unwrap();
        let b = Manifest::new(vec![instance("x", "speech")]).unwrap();
        assert!(Manifest::merge([a, b]).is_err());
    }

    #[test]
    fn test_labelled_identifiers_sorted() {
        let manifest =
            Manifest::new(vec![instance("b", "speech"), instance("a", "music")]).unwrap();
        assert_eq!(
            manifest.labelled_identifiers(),
            vec![
                ("a".to_string(), "music".to_string()),
                ("b".to_string(), "speech".to_string())
            ]
        );
    }
}
