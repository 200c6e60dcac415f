//! External tool dispatch
//!
//! This module provides:
//! - `ToolRunner` trait, the seam every subprocess call goes through
//! - `ProcessRunner`, the `std::process::Command` implementation
//! - Invocation builders for openSMILE, openXBOW and SoX
//!
//! Builders only assemble argument lists and check exit status and output
//! files; what the tools compute is their own business.

mod opensmile;
mod openxbow;
mod sox;

pub use opensmile::OpenSmile;
pub use openxbow::{OpenXbow, XbowJob};
pub use sox::Sox;

use std::ffi::{OsStr, OsString};
use std::path::Path;
use std::process::{Command, Stdio};

use log::debug;

use crate::error::{GenreError, Result};

/// What a finished tool invocation left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code; `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success() -> Self {
        Self {
            exit_code: Some(0),
            ..Default::default()
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code: Some(exit_code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Turn a non-zero exit into [`GenreError::ExternalTool`].
    pub fn check(self, tool: &str) -> Result<Self> {
        if self.succeeded() {
            return Ok(self);
        }
        let status = match self.exit_code {
            Some(code) => format!("exit code {}", code),
            None => "signal".to_string(),
        };
        Err(GenreError::ExternalTool {
            tool: tool.to_string(),
            status,
            stderr: self.stderr.trim().to_string(),
        })
    }
}

/// Runs an external program to completion.
///
/// Implementations must be shareable across the extraction worker pool.
pub trait ToolRunner: Send + Sync {
    fn run(&self, program: &Path, args: &[OsString]) -> Result<ToolOutput>;
}

/// Spawns real processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl ToolRunner for ProcessRunner {
    fn run(&self, program: &Path, args: &[OsString]) -> Result<ToolOutput> {
        debug!("Running {} {:?}", program.display(), args);

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| GenreError::ToolLaunch {
                tool: program.display().to_string(),
                source,
            })?;

        Ok(ToolOutput {
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Small helper for building `OsString` argument lists.
#[derive(Debug, Default)]
pub(crate) struct ArgList(Vec<OsString>);

impl ArgList {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.0.push(arg.as_ref().to_os_string());
        self
    }

    pub(crate) fn pair(self, flag: &str, value: impl AsRef<OsStr>) -> Self {
        self.arg(flag).arg(value)
    }

    pub(crate) fn into_vec(self) -> Vec<OsString> {
        self.0
    }
}

/// Value following `flag` in an argument list.
pub fn flag_value<'a>(args: &'a [OsString], flag: &str) -> Option<&'a OsStr> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .map(|a| a.as_os_str())
}
