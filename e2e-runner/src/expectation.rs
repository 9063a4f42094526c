// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Expectations for a test case's compile and run stages.
//!
//! The compile stage is judged by [`CompileStatusPolicy`], a pure function of the test case name.
//! The run stage is judged by an [`Expectation`] loaded from optional side files next to a
//! file-form test case's source.

use crate::{
    config::ExpectationConfig,
    errors::{ExpectationLoadError, ExpectationWriteError},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::io;

/// The expected outcome of a test case's run stage.
///
/// Each channel is independently present or absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Expectation {
    /// The expected exit code of the executable.
    pub return_code: Option<i32>,

    /// The expected stdout of the executable, trimmed.
    pub stdout: Option<String>,
}

impl Expectation {
    /// Returns an expectation with no channels configured.
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns true if no channel is configured.
    pub fn is_empty(&self) -> bool {
        self.return_code.is_none() && self.stdout.is_none()
    }
}

/// The side file paths holding a source file's expectations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExpectationPaths {
    /// The expected return code file.
    pub return_code: Utf8PathBuf,

    /// The expected stdout file.
    pub stdout: Utf8PathBuf,
}

/// Loads and writes [`Expectation`] side files.
#[derive(Clone, Debug)]
pub struct ExpectationLoader {
    return_code_suffix: String,
    stdout_suffix: String,
}

impl ExpectationLoader {
    /// Creates a new loader from the expectation configuration.
    pub fn new(config: &ExpectationConfig) -> Self {
        Self {
            return_code_suffix: config.return_code_suffix.clone(),
            stdout_suffix: config.stdout_suffix.clone(),
        }
    }

    /// Returns the side file paths for a source file: its extension is replaced with each suffix.
    pub fn side_paths(&self, source: &Utf8Path) -> ExpectationPaths {
        ExpectationPaths {
            return_code: source.with_extension(&self.return_code_suffix),
            stdout: source.with_extension(&self.stdout_suffix),
        }
    }

    /// Returns true if `path` looks like an expectation side file.
    pub fn is_side_file(&self, path: &Utf8Path) -> bool {
        path.extension()
            .is_some_and(|ext| ext == self.return_code_suffix || ext == self.stdout_suffix)
    }

    /// Loads the expectation for a source file. Missing side files leave their channel unset.
    pub fn load(&self, source: &Utf8Path) -> Result<Expectation, ExpectationLoadError> {
        let paths = self.side_paths(source);

        let return_code = match read_trimmed(&paths.return_code)? {
            Some(contents) => match contents.parse::<i32>() {
                Ok(code) => Some(code),
                Err(error) => {
                    return Err(ExpectationLoadError::InvalidReturnCode {
                        path: paths.return_code,
                        contents,
                        error,
                    });
                }
            },
            None => None,
        };
        let stdout = read_trimmed(&paths.stdout)?;

        Ok(Expectation {
            return_code,
            stdout,
        })
    }

    /// Records the observed exit code and stdout of a run as the source file's expectation.
    ///
    /// Stdout is written verbatim, the exit code as a decimal integer.
    pub fn write(
        &self,
        source: &Utf8Path,
        return_code: i32,
        stdout: &[u8],
    ) -> Result<ExpectationPaths, ExpectationWriteError> {
        let paths = self.side_paths(source);
        write_file(&paths.stdout, stdout)?;
        write_file(&paths.return_code, return_code.to_string().as_bytes())?;
        Ok(paths)
    }
}

fn read_trimmed(path: &Utf8Path) -> Result<Option<String>, ExpectationLoadError> {
    match std::fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).trim().to_owned())),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(ExpectationLoadError::Read {
            path: path.to_owned(),
            error,
        }),
    }
}

fn write_file(path: &Utf8Path, contents: &[u8]) -> Result<(), ExpectationWriteError> {
    std::fs::write(path, contents).map_err(|error| ExpectationWriteError {
        path: path.to_owned(),
        error,
    })
}

/// Decides the compiler exit code a test case must produce, from its name alone.
///
/// Names containing the reject marker must be rejected with the reject status; every other test
/// case must compile successfully.
#[derive(Clone, Debug)]
pub struct CompileStatusPolicy {
    reject_marker: String,
    reject_status: i32,
}

impl CompileStatusPolicy {
    /// Creates a new policy from the expectation configuration.
    pub fn new(config: &ExpectationConfig) -> Self {
        Self {
            reject_marker: config.reject_marker.clone(),
            reject_status: config.reject_status,
        }
    }

    /// Returns the expected compiler exit code for a test case name.
    pub fn expected_status(&self, name: &str) -> i32 {
        if name.contains(&self.reject_marker) {
            self.reject_status
        } else {
            0
        }
    }
}
