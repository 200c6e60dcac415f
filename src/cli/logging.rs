//! Logging setup
//!
//! Log lines always go to stderr. With `--log-file` they are also copied
//! into the file, with millisecond timestamps.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use env_logger::{Builder, Env, Target};

use crate::error::{GenreError, Result};

/// Writes every buffer to stderr and to a second sink.
pub struct LogTee<W: Write> {
    file: W,
}

impl<W: Write> LogTee<W> {
    pub fn new(file: W) -> Self {
        Self { file }
    }

    pub fn into_inner(self) -> W {
        self.file
    }
}

impl<W: Write> Write for LogTee<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Build the logger for a run. `RUST_LOG` overrides the default level.
pub fn logger(verbose: bool, log_file: Option<&Path>) -> Result<Builder> {
    let level = if verbose { "debug" } else { "info" };
    let mut builder = Builder::from_env(Env::default().default_filter_or(level));

    if let Some(path) = log_file {
        let file = File::create(path).map_err(|e| GenreError::io(path, e))?;
        builder.target(Target::Pipe(Box::new(LogTee::new(file))));
        builder.format_timestamp_millis();
    }

    Ok(builder)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_tee_writes_through_to_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("run.log");

        let mut tee = LogTee::new(File::create(&path).unwrap());
        writeln!(tee, "INFO first").unwrap();
        writeln!(tee, "WARN second").unwrap();
        tee.flush().unwrap();
        drop(tee.into_inner());

        assert_eq!(fs::read_to_string(&path).unwrap(), "INFO first\nWARN second\n");
    }

    #[test]
    fn test_tee_reports_full_length() {
        let mut tee = LogTee::new(Vec::new());
        assert_eq!(tee.write(b"abc").unwrap(), 3);
        assert_eq!(tee.into_inner(), b"abc".to_vec());
    }

    #[test]
    fn test_logger_creates_log_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("genre.log");

        logger(false, Some(&path)).unwrap();
        assert!(path.is_file());
    }

    #[test]
    fn test_logger_rejects_unwritable_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing").join("genre.log");

        assert!(matches!(logger(true, Some(&path)), Err(GenreError::Io { .. })));
    }
}
