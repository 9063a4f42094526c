// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! General support code for e2e-runner.

use std::fmt;

/// Utilities for pluralizing various words based on count or plurality.
pub mod plural {
    /// Returns "were" if `plural` is true, otherwise "was".
    pub fn were_plural_if(plural: bool) -> &'static str {
        if plural { "were" } else { "was" }
    }

    /// Returns "test case" if `count` is 1, otherwise "test cases".
    pub fn test_cases_str(count: usize) -> &'static str {
        if count == 1 { "test case" } else { "test cases" }
    }

    /// Returns "file" if `count` is 1, otherwise "files".
    pub fn files_str(count: usize) -> &'static str {
        if count == 1 { "file" } else { "files" }
    }

    /// Returns "line" if `count` is 1, otherwise "lines".
    pub fn lines_str(count: usize) -> &'static str {
        if count == 1 { "line" } else { "lines" }
    }

    /// Returns "record" if `count` is 1, otherwise "records".
    pub fn records_str(count: usize) -> &'static str {
        if count == 1 { "record" } else { "records" }
    }
}

/// Displays an optional process exit code. `None` means the process was terminated by a signal
/// or killed after a timeout.
#[derive(Clone, Copy, Debug)]
pub struct DisplayExitCode(pub Option<i32>);

impl fmt::Display for DisplayExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(code) => write!(f, "{code}"),
            None => write!(f, "<none>"),
        }
    }
}

/// Removes a trailing `\n` or `\r\n` from captured output, for single-line display.
pub(crate) fn trim_trailing_newline(s: &str) -> &str {
    s.strip_suffix('\n')
        .map(|s| s.strip_suffix('\r').unwrap_or(s))
        .unwrap_or(s)
}
