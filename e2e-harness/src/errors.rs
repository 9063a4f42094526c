// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::NO_HEADING_TARGET;
use camino::Utf8PathBuf;
use e2e_metadata::E2eExitCode;
use e2e_runner::errors::*;
use owo_colors::{OwoColorize, Stream};
use std::error::Error;
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

// The #[error()] strings are placeholders: errors are meant to be printed with display_to_stderr,
// which colorizes them.

/// An error occurred in a program that the harness ran, not in the harness itself.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed {
        #[source]
        error: std::io::Error,
    },
    #[error("workspace root is not valid UTF-8")]
    WorkspaceRootInvalidUtf8 { path: std::path::PathBuf },
    #[error("config parse error")]
    ConfigParseError {
        #[from]
        err: ConfigParseError,
    },
    #[error("profile not found")]
    ProfileNotFound {
        #[from]
        err: ProfileNotFound,
    },
    #[error("test discovery failed")]
    DiscoveryError {
        #[from]
        err: DiscoveryError,
    },
    #[error("failed to read grading report")]
    GradingReportRead {
        #[from]
        err: GradingReportReadError,
    },
    #[error("failed to write event to output")]
    WriteEventError {
        #[from]
        err: WriteEventError,
    },
    #[error("failed to write to output")]
    WriteError {
        #[source]
        err: std::io::Error,
    },
    #[error("test run failed")]
    TestRunFailed,
}

impl ExpectedError {
    pub(crate) fn write_error(err: std::io::Error) -> Self {
        Self::WriteError { err }
    }

    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::WorkspaceRootInvalidUtf8 { .. }
            | Self::ConfigParseError { .. }
            | Self::ProfileNotFound { .. } => E2eExitCode::SETUP_ERROR,
            Self::DiscoveryError { .. } => E2eExitCode::DISCOVERY_FAILED,
            Self::GradingReportRead { .. } => E2eExitCode::REPORT_READ_FAILED,
            Self::WriteEventError { .. } | Self::WriteError { .. } => {
                E2eExitCode::WRITE_OUTPUT_ERROR
            }
            Self::TestRunFailed => E2eExitCode::TEST_RUN_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self) {
        let mut next_error = match self {
            Self::CurrentDirFailed { error } => {
                error!("could not determine the current directory");
                Some(error as &dyn Error)
            }
            Self::WorkspaceRootInvalidUtf8 { path } => {
                error!(
                    "workspace root `{}` is not valid UTF-8",
                    path.display()
                        .if_supports_color(Stream::Stderr, |x| x.bold())
                );
                None
            }
            Self::ConfigParseError { err } => {
                error!(
                    "failed to parse config file `{}`",
                    err.config_file()
                        .if_supports_color(Stream::Stderr, |x| x.bold())
                );
                Some(err.kind() as &dyn Error)
            }
            Self::ProfileNotFound { err } => {
                error!("{}", err);
                err.source()
            }
            Self::DiscoveryError { err } => {
                error!("{}", err);
                err.source()
            }
            Self::GradingReportRead { err } => {
                error!(
                    "failed to read grading report `{}`",
                    err.path.if_supports_color(Stream::Stderr, |x| x.bold())
                );
                Some(&err.error as &dyn Error)
            }
            Self::WriteEventError { err } => {
                error!("failed to write event to output");
                Some(err as &dyn Error)
            }
            Self::WriteError { err } => {
                error!("failed to write to output");
                Some(err as &dyn Error)
            }
            Self::TestRunFailed => {
                error!("test run failed");
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

/// Converts a path to UTF-8, mapping failures to [`ExpectedError::WorkspaceRootInvalidUtf8`].
pub(crate) fn utf8_path(path: std::path::PathBuf) -> Result<Utf8PathBuf> {
    Utf8PathBuf::from_path_buf(path).map_err(|path| ExpectedError::WorkspaceRootInvalidUtf8 { path })
}
