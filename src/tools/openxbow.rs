//! openXBOW bag-of-words compilation
//!
//! openXBOW runs on the JVM, so the program is `java` and the jar is an
//! argument.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::info;

use super::{ArgList, ToolRunner};
use crate::error::{GenreError, Result};

const TOOL_NAME: &str = "openXBOW";

/// Inputs and outputs of one openXBOW run.
#[derive(Debug, Clone)]
pub struct XbowJob<'a> {
    pub lld_dir: &'a Path,
    pub labels: &'a Path,
    pub matrix: &'a Path,
    pub codebook: &'a Path,
    pub codebook_size: usize,
}

/// `java -jar openXBOW.jar` invocation.
#[derive(Debug, Clone)]
pub struct OpenXbow {
    java: PathBuf,
    jar: PathBuf,
    memory: Option<String>,
}

impl OpenXbow {
    pub fn new(java: impl Into<PathBuf>, jar: impl Into<PathBuf>) -> Self {
        Self {
            java: java.into(),
            jar: jar.into(),
            memory: None,
        }
    }

    /// Heap request passed as `-Xmx`.
    pub fn with_memory(mut self, memory: Option<String>) -> Self {
        self.memory = memory.filter(|m| !m.is_empty());
        self
    }

    pub fn args(&self, job: &XbowJob<'_>) -> Vec<OsString> {
        let mut args = ArgList::new();
        if let Some(memory) = &self.memory {
            args = args.arg(format!("-Xmx{}", memory));
        }
        args = args
            .pair("-jar", &self.jar)
            .pair("-i", job.lld_dir)
            .pair("-l", job.labels)
            .pair("-o", job.matrix)
            .pair("-B", job.codebook)
            .pair("-size", job.codebook_size.to_string());

        args.arg("-standardizeInput")
            .arg("-writeName")
            .arg("-log")
            .into_vec()
    }

    /// Run openXBOW; the matrix file must exist afterwards.
    pub fn compile(&self, runner: &dyn ToolRunner, job: &XbowJob<'_>) -> Result<()> {
        info!(
            "Compiling bag of words from {} into {}",
            job.lld_dir.display(),
            job.matrix.display()
        );

        runner.run(&self.java, &self.args(job))?.check(TOOL_NAME)?;

        if !job.matrix.is_file() {
            return Err(GenreError::MissingFile {
                path: job.matrix.to_path_buf(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::flag_value;
    use std::ffi::OsStr;

    fn job<'a>() -> XbowJob<'a> {
        XbowJob {
            lld_dir: Path::new("/c/llds"),
            labels: Path::new("/c/labels.csv"),
            matrix: Path::new("/c/xbow.arff"),
            codebook: Path::new("/c/codebook"),
            codebook_size: 250,
        }
    }

    #[test]
    fn test_learns_codebook() {
        let xbow = OpenXbow::new("java", "/lib/openXBOW.jar").with_memory(Some("12G".into()));
        let args = xbow.args(&job());

        assert_eq!(args[0], OsString::from("-Xmx12G"));
        assert_eq!(flag_value(&args, "-jar"), Some(OsStr::new("/lib/openXBOW.jar")));
        assert_eq!(flag_value(&args, "-i"), Some(OsStr::new("/c/llds")));
        assert_eq!(flag_value(&args, "-B"), Some(OsStr::new("/c/codebook")));
        assert_eq!(flag_value(&args, "-size"), Some(OsStr::new("250")));
        assert!(args.iter().any(|a| a == "-standardizeInput"));
        assert!(args.iter().any(|a| a == "-writeName"));
    }

    #[test]
    fn test_empty_memory_dropped() {
        let xbow = OpenXbow::new("java", "openXBOW.jar").with_memory(Some(String::new()));
        assert_eq!(xbow.args(&job())[0], OsString::from("-jar"));
    }
}
