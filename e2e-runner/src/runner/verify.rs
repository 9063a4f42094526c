// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{expectation::Expectation, helpers::DisplayExitCode};
use std::fmt;

/// The verdict of checking a run against an [`Expectation`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Verdict {
    /// Every configured channel matched.
    Passed,

    /// At least one configured channel didn't match.
    Failed(VerifyFailure),

    /// No channel was configured, so nothing was checked.
    NoCheck,
}

/// The channels that didn't match during verification. At least one field is set.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifyFailure {
    /// Set if the exit code didn't match.
    pub return_code: Option<ReturnCodeMismatch>,

    /// Set if stdout didn't match.
    pub stdout: Option<StdoutMismatch>,
}

/// An exit code mismatch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReturnCodeMismatch {
    /// The expected exit code.
    pub expected: i32,

    /// The actual exit code, or `None` if the executable was terminated by a signal.
    pub actual: Option<i32>,
}

/// A stdout mismatch. Both sides are trimmed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StdoutMismatch {
    /// The expected stdout.
    pub expected: String,

    /// The actual stdout.
    pub actual: String,
}

impl fmt::Display for VerifyFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.return_code, &self.stdout) {
            (Some(code), Some(_)) => write!(
                f,
                "exit code {} (expected {}) and stdout did not match",
                DisplayExitCode(code.actual),
                code.expected
            ),
            (Some(code), None) => write!(
                f,
                "exit code {} (expected {})",
                DisplayExitCode(code.actual),
                code.expected
            ),
            (None, Some(_)) => write!(f, "stdout did not match"),
            (None, None) => write!(f, "no mismatch"),
        }
    }
}

/// Checks the observed exit code and stdout of a run against an expectation.
///
/// Each configured channel is checked independently. Every configured channel has to match for
/// the run to pass, and if no channel is configured there's no verdict.
pub fn verify(expectation: &Expectation, exit_code: Option<i32>, stdout: &str) -> Verdict {
    if expectation.is_empty() {
        return Verdict::NoCheck;
    }

    let return_code = expectation.return_code.and_then(|expected| {
        (exit_code != Some(expected)).then_some(ReturnCodeMismatch {
            expected,
            actual: exit_code,
        })
    });

    let stdout = expectation.stdout.as_deref().and_then(|expected| {
        let actual = stdout.trim();
        (actual != expected.trim()).then(|| StdoutMismatch {
            expected: expected.trim().to_owned(),
            actual: actual.to_owned(),
        })
    });

    if return_code.is_none() && stdout.is_none() {
        Verdict::Passed
    } else {
        Verdict::Failed(VerifyFailure {
            return_code,
            stdout,
        })
    }
}
