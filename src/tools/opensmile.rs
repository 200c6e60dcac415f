//! openSMILE low-level descriptor extraction

use std::path::{Path, PathBuf};

use log::debug;

use super::{ArgList, ToolRunner};
use crate::error::{GenreError, Result};

const TOOL_NAME: &str = "SMILExtract";

/// One LLD CSV per input, with frame timestamps and a header row.
const CSV_OPTIONS: [(&str, &str); 3] = [
    ("-appendcsvlld", "0"),
    ("-timestampcsvlld", "1"),
    ("-headercsvlld", "1"),
];

/// `SMILExtract` invocation.
#[derive(Debug, Clone)]
pub struct OpenSmile {
    binary: PathBuf,
    config: PathBuf,
}

impl OpenSmile {
    pub fn new(binary: impl Into<PathBuf>, config: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            config: config.into(),
        }
    }

    /// Arguments for extracting `input` into `output`.
    pub fn args(&self, input: &Path, output: &Path, instance_name: &str) -> Vec<std::ffi::OsString> {
        let mut args = ArgList::new()
            .pair("-C", &self.config)
            .pair("-I", input)
            .pair("-instname", instance_name)
            .pair("-lldcsvoutput", output);
        for (flag, value) in CSV_OPTIONS {
            args = args.pair(flag, value);
        }
        args.into_vec()
    }

    /// Extract descriptors for one wav; the output file must exist afterwards.
    pub fn extract(
        &self,
        runner: &dyn ToolRunner,
        input: &Path,
        output: &Path,
        instance_name: &str,
    ) -> Result<()> {
        debug!("Compiling {} to LLDs", input.display());

        runner
            .run(&self.binary, &self.args(input, output, instance_name))?
            .check(TOOL_NAME)?;

        if !output.is_file() {
            return Err(GenreError::MissingFile {
                path: output.to_path_buf(),
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

    #[test]
    fn test_args_carry_paths() {
        let smile = OpenSmile::new("SMILExtract", "/conf/ComParE_2016.conf");
        let args = smile.args(Path::new("/w/a01__music.wav"), Path::new("/o/a01.csv"), "a01");

        assert_eq!(flag_value(&args, "-C"), Some(OsStr::new("/conf/ComParE_2016.conf")));
        assert_eq!(flag_value(&args, "-I"), Some(OsStr::new("/w/a01__music.wav")));
        assert_eq!(flag_value(&args, "-lldcsvoutput"), Some(OsStr::new("/o/a01.csv")));
        assert_eq!(flag_value(&args, "-instname"), Some(OsStr::new("a01")));
        assert_eq!(flag_value(&args, "-appendcsvlld"), Some(OsStr::new("0")));
    }
}
