// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

/// Documented exit codes for `e2e-harness` failures.
///
/// `e2e-harness` runs may fail for a variety of reasons. This structure documents the exit codes
/// that may occur in case of expected failures.
///
/// Unknown/unexpected failures will always result in exit code 1.
pub enum E2eExitCode {}

impl E2eExitCode {
    /// No errors occurred and the harness exited normally.
    pub const OK: i32 = 0;

    /// No test cases were selected to run, but no other errors occurred.
    pub const NO_TESTS_RUN: i32 = 4;

    /// A user issue happened while setting up a harness invocation, e.g. an invalid config file
    /// or an unknown profile.
    pub const SETUP_ERROR: i32 = 96;

    /// One or more test cases failed.
    pub const TEST_RUN_FAILED: i32 = 100;

    /// Discovering test cases in the test directory produced an error.
    pub const DISCOVERY_FAILED: i32 = 104;

    /// Reading a grading report produced an error.
    pub const REPORT_READ_FAILED: i32 = 105;

    /// Writing data to stdout, stderr or a report file produced an error.
    pub const WRITE_OUTPUT_ERROR: i32 = 110;
}
