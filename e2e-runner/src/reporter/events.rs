// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    discovery::{TestCase, TestList},
    runner::{PipelineMode, PipelineRun, RunStats, StageResult},
    test_filter::MismatchReason,
};
use chrono::{DateTime, Local};
use std::time::Duration;

/// A test event.
///
/// Events are produced by a [`TestRunner`](crate::runner::TestRunner) and consumed by a
/// [`TestReporter`](super::TestReporter).
#[derive(Clone, Debug)]
pub enum TestEvent<'a> {
    /// The test run started.
    RunStarted {
        /// The list of test cases that will be run.
        test_list: &'a TestList,

        /// Whether the run verifies or records expectations.
        mode: PipelineMode,

        /// The number of test cases that will actually be run.
        run_count: usize,
    },

    /// A test case started running.
    TestStarted {
        /// The test case that was started.
        test_case: &'a TestCase,
    },

    /// An invocation within a test case's pipeline finished.
    StageFinished {
        /// The test case the invocation belongs to.
        test_case: &'a TestCase,

        /// The result of the invocation.
        result: StageResult,
    },

    /// A test case finished running.
    TestFinished {
        /// The test case that finished.
        test_case: &'a TestCase,

        /// The completed pipeline.
        run: PipelineRun,
    },

    /// A test case was skipped.
    TestSkipped {
        /// The test case that was skipped.
        test_case: &'a TestCase,

        /// The reason this test case was skipped.
        reason: MismatchReason,
    },

    /// A cancellation notice was received. No further test cases will be started.
    RunBeginCancel {
        /// The reason this run was canceled.
        reason: CancelReason,
    },

    /// The test run finished.
    RunFinished {
        /// The time at which the run was started.
        start_time: DateTime<Local>,

        /// The amount of time it took for the test cases to run.
        elapsed: Duration,

        /// Statistics for the run.
        run_stats: RunStats,
    },
}

/// The reason why a test run is being canceled.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum CancelReason {
    /// A test case failed and fail-fast is enabled.
    TestFailure,

    /// An error occurred while reporting results.
    ReportError,
}
