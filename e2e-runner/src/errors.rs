// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by the e2e runner.
//!
//! Failures of an individual test case (a compile mismatch, a failing assembler, a wrong exit
//! code) are not errors: they are recorded as
//! [`PipelineOutcome::Failed`](crate::runner::PipelineOutcome::Failed). The errors here are the
//! harness-level problems that prevent a run from being set up or reported.

use crate::runner::TestState;
use camino::Utf8PathBuf;
use config::ConfigError;
use std::{fmt, num::ParseIntError, path::PathBuf};
use thiserror::Error;

/// An error that occurred while parsing the config.
#[derive(Debug, Error)]
#[error("failed to parse e2e config at `{config_file}`")]
#[non_exhaustive]
pub struct ConfigParseError {
    config_file: Utf8PathBuf,
    #[source]
    kind: ConfigParseErrorKind,
}

impl ConfigParseError {
    pub(crate) fn new(config_file: impl Into<Utf8PathBuf>, kind: ConfigParseErrorKind) -> Self {
        Self {
            config_file: config_file.into(),
            kind,
        }
    }

    /// Returns the config file for this error.
    pub fn config_file(&self) -> &Utf8PathBuf {
        &self.config_file
    }

    /// Returns the kind of error this is.
    pub fn kind(&self) -> &ConfigParseErrorKind {
        &self.kind
    }
}

/// The kind of error that occurred while parsing a config.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigParseErrorKind {
    /// An error occurred while building the config.
    #[error(transparent)]
    BuildError(Box<ConfigError>),

    /// An error occurred while deserializing the config.
    #[error(transparent)]
    DeserializeError(Box<serde_path_to_error::Error<ConfigError>>),

    /// The `default` profile was missing a key that every other profile falls back to.
    #[error("default profile is missing required key `{key}`")]
    MissingDefaultKey {
        /// The missing key.
        key: &'static str,
    },
}

/// An error which indicates that a profile was requested but not known.
#[derive(Clone, Debug, Error)]
#[error("profile `{profile}` not found (known profiles: {})", .all_profiles.join(", "))]
pub struct ProfileNotFound {
    profile: String,
    all_profiles: Vec<String>,
}

impl ProfileNotFound {
    pub(crate) fn new(
        profile: impl Into<String>,
        all_profiles: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let mut all_profiles: Vec<_> = all_profiles.into_iter().map(|s| s.into()).collect();
        all_profiles.sort_unstable();
        Self {
            profile: profile.into(),
            all_profiles,
        }
    }
}

/// An error that occurred while reading a source file into a
/// [`SourceSet`](crate::source_set::SourceSet).
#[derive(Debug, Error)]
#[error("failed to read source file `{path}`")]
pub struct SourceLoadError {
    /// The source file that could not be read.
    pub path: Utf8PathBuf,

    /// The underlying error.
    #[source]
    pub error: std::io::Error,
}

/// An error that occurred while loading expectation side files.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ExpectationLoadError {
    /// A side file exists but couldn't be read.
    #[error("failed to read expectation file `{path}`")]
    Read {
        /// The side file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The expected return code file doesn't contain an integer.
    #[error("expected return code file `{path}` does not contain an integer: `{contents}`")]
    InvalidReturnCode {
        /// The side file.
        path: Utf8PathBuf,

        /// The trimmed contents of the file.
        contents: String,

        /// The underlying error.
        #[source]
        error: ParseIntError,
    },
}

/// An error that occurred while writing expectation side files.
#[derive(Debug, Error)]
#[error("failed to write expectation file `{path}`")]
pub struct ExpectationWriteError {
    /// The side file.
    pub path: Utf8PathBuf,

    /// The underlying error.
    #[source]
    pub error: std::io::Error,
}

/// An error that occurred while operating on an [`OutputStore`](crate::output_store::OutputStore).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OutputStoreError {
    /// The store directory couldn't be created.
    #[error("failed to create output store directory `{dir}`")]
    CreateDir {
        /// The store directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// The store directory couldn't be cleared.
    #[error("failed to clear output store directory `{dir}`")]
    Reset {
        /// The store directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A captured output stream couldn't be written.
    #[error("failed to write captured output to `{path}`")]
    WriteCapture {
        /// The capture file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// An artifact couldn't be moved into the store.
    #[error("failed to move artifact `{from}` to `{to}`")]
    MoveArtifact {
        /// The artifact's original location.
        from: Utf8PathBuf,

        /// The artifact's destination inside the store.
        to: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A stale artifact couldn't be removed.
    #[error("failed to remove stale artifact `{path}`")]
    RemoveArtifact {
        /// The artifact.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// Walking a directory for artifacts failed.
    #[error("failed to list artifacts in `{dir}`")]
    ListArtifacts {
        /// The directory being walked.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: walkdir::Error,
    },

    /// An artifact path wasn't valid UTF-8.
    #[error("artifact path `{}` is not valid UTF-8", .path.display())]
    NonUtf8Path {
        /// The path.
        path: PathBuf,
    },
}

/// An error that occurred while discovering test cases.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum DiscoveryError {
    /// The test directory doesn't exist or isn't a directory.
    #[error("test directory `{dir}` is not a directory")]
    TestDirNotFound {
        /// The test directory.
        dir: Utf8PathBuf,
    },

    /// The test directory couldn't be listed.
    #[error("failed to read test directory `{dir}`")]
    ReadTestDir {
        /// The test directory.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// Walking a directory for source files failed.
    #[error("failed to gather source files under `{dir}`")]
    Walk {
        /// The directory being walked.
        dir: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: walkdir::Error,
    },

    /// A path found during discovery wasn't valid UTF-8.
    #[error("path `{}` is not valid UTF-8", .path.display())]
    NonUtf8Path {
        /// The path.
        path: PathBuf,
    },

    /// A support library file couldn't be read.
    #[error("failed to load support library")]
    SupportLibrary {
        /// The underlying error.
        #[source]
        error: SourceLoadError,
    },
}

/// An error that occurred while reading a grading report.
#[derive(Debug, Error)]
#[error("failed to read grading report `{path}`")]
pub struct GradingReportReadError {
    /// The report file.
    pub path: Utf8PathBuf,

    /// The underlying error.
    #[source]
    pub error: std::io::Error,
}

/// A [`TestState`] transition that would move a test case backwards or re-enter a state.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("invalid test state transition from {from} to {to}")]
pub struct InvalidStateTransition {
    /// The current state.
    pub from: TestState,

    /// The requested state.
    pub to: TestState,
}

/// An error that occurs while writing an event.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WriteEventError {
    /// An error occurred while writing the event to the provided output.
    #[error("error writing to output")]
    Io(#[source] std::io::Error),

    /// An error occurred while operating on the file system.
    #[error("error operating on path {file}")]
    Fs {
        /// The file being operated on.
        file: Utf8PathBuf,

        /// The underlying IO error.
        #[source]
        error: std::io::Error,
    },

    /// An error occurred while producing JUnit XML.
    #[error("error writing JUnit output to {file}")]
    Junit {
        /// The output file.
        file: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: quick_junit::SerializeError,
    },
}

impl From<std::io::Error> for WriteEventError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error)
    }
}

/// Displays an error along with its chain of sources, one per line.
pub struct DisplayErrorChain<E>(E);

impl<E: std::error::Error> DisplayErrorChain<E> {
    /// Creates a new display wrapper around the error.
    pub fn new(error: E) -> Self {
        Self(error)
    }
}

impl<E: std::error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)?;
        let mut source = self.0.source();
        while let Some(error) = source {
            write!(f, "\n  caused by: {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
