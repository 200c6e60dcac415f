//! SoX conversion of `.sph` containers into 16-bit wav

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use log::info;

use super::{ArgList, ToolRunner};
use crate::error::{GenreError, Result};

const TOOL_NAME: &str = "sox";

#[derive(Debug, Clone)]
pub struct Sox {
    binary: PathBuf,
}

impl Sox {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        ArgList::new()
            .arg(input)
            .pair("-t", "wav")
            .pair("-b", "16")
            .arg(output)
            .into_vec()
    }

    pub fn convert(&self, runner: &dyn ToolRunner, input: &Path, output: &Path) -> Result<()> {
        info!("Converting {} to {}", input.display(), output.display());

        runner.run(&self.binary, &self.args(input, output))?.check(TOOL_NAME)?;

        if !output.is_file() {
            return Err(GenreError::MissingFile {
                path: output.to_path_buf(),
            });
        }
        Ok(())
    }
}
