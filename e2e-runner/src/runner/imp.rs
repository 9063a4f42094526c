// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Pipeline, PipelineMode, PipelineOutcome, PipelineRun, PipelineSettings, StageResult};
use crate::{
    config::{HarnessConfig, HarnessProfile},
    discovery::{TestCase, TestCaseKind, TestList, TestListEntry},
    reporter::{CancelReason, TestEvent},
    test_filter::{FilterMatch, MismatchReason},
    time::{StopwatchStart, stopwatch},
};
use camino::Utf8PathBuf;
use std::{convert::Infallible, marker::PhantomData};
use tracing::debug;

/// Test runner options.
#[derive(Debug, Default)]
pub struct TestRunnerBuilder {
    fail_fast: Option<bool>,
    mode: PipelineMode,
}

impl TestRunnerBuilder {
    /// Sets fail-fast, overriding the profile.
    pub fn set_fail_fast(&mut self, fail_fast: bool) -> &mut Self {
        self.fail_fast = Some(fail_fast);
        self
    }

    /// Sets whether test cases are verified or their expectations recorded.
    pub fn set_mode(&mut self, mode: PipelineMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Creates a new test runner.
    pub fn build<'a>(
        &self,
        test_list: &'a TestList,
        config: &HarnessConfig,
        profile: &HarnessProfile<'_>,
    ) -> TestRunner<'a> {
        let mut settings = PipelineSettings::new(config, profile);
        settings.set_mode(self.mode);

        TestRunner {
            test_list,
            settings,
            store_root: profile.store_root().to_owned(),
            profile_name: profile.name().to_owned(),
            fail_fast: self.fail_fast.unwrap_or_else(|| profile.fail_fast()),
        }
    }
}

/// Context for running test cases.
///
/// Test cases are run one after the other. Each test case owns a distinct output store.
#[derive(Debug)]
pub struct TestRunner<'a> {
    test_list: &'a TestList,
    settings: PipelineSettings,
    store_root: Utf8PathBuf,
    profile_name: String,
    fail_fast: bool,
}

impl<'a> TestRunner<'a> {
    /// Executes the listed test cases.
    ///
    /// The callback is called with the results of each test case.
    pub fn execute<F>(&self, mut callback: F) -> RunStats
    where
        F: FnMut(TestEvent<'a>),
    {
        let res = self.try_execute::<Infallible, _>(|test_event| {
            callback(test_event);
            Ok(())
        });
        match res {
            Ok(run_stats) => run_stats,
            Err(never) => match never {},
        }
    }

    /// Executes the listed test cases.
    ///
    /// Accepts a callback that is called with the results of each test case. If the callback
    /// returns an error, no further test cases are started and the error is returned.
    pub fn try_execute<E, F>(&self, callback: F) -> Result<RunStats, E>
    where
        F: FnMut(TestEvent<'a>) -> Result<(), E>,
    {
        let run_count = self
            .test_list
            .iter()
            .filter(|entry| self.skip_reason(entry).is_none())
            .count();
        let mut ctx = CallbackContext::new(callback, run_count);

        // Send the initial event.
        ctx.run_started(self.test_list, self.settings.mode())?;

        // Stores the first error that occurred. This error is propagated up.
        let mut first_error = None;

        for entry in self.test_list.iter() {
            if let Some(reason) = ctx.cancel_state {
                debug!("run canceled ({reason:?}), not starting {}", entry.test_case.name());
                break;
            }

            let res = match self.skip_reason(entry) {
                Some(reason) => ctx.test_skipped(&entry.test_case, reason),
                None => self.run_test(&entry.test_case, &mut ctx),
            };
            if let Err(err) = res {
                first_error = Some(err);
                // Ignore errors that happen during error cancellation.
                let _ = ctx.begin_cancel(CancelReason::ReportError);
                break;
            }
        }

        if let Err(err) = ctx.run_finished() {
            first_error.get_or_insert(err);
        }

        match first_error {
            None => Ok(ctx.run_stats),
            Some(err) => Err(err),
        }
    }

    // ---
    // Helper methods
    // ---

    fn skip_reason(&self, entry: &TestListEntry) -> Option<MismatchReason> {
        match entry.filter_match {
            FilterMatch::Mismatch { reason } => Some(reason),
            FilterMatch::Matches
                if self.settings.mode() == PipelineMode::Record
                    && entry.test_case.kind() == TestCaseKind::Directory =>
            {
                Some(MismatchReason::NoExpectations)
            }
            FilterMatch::Matches => None,
        }
    }

    fn run_test<E, F>(
        &self,
        test_case: &'a TestCase,
        ctx: &mut CallbackContext<F, E>,
    ) -> Result<(), E>
    where
        F: FnMut(TestEvent<'a>) -> Result<(), E>,
    {
        ctx.test_started(test_case)?;

        let store = test_case.output_store(&self.store_root, &self.profile_name);
        let pipeline = Pipeline::new(test_case, &self.settings, store);
        let run = pipeline.run(|result| ctx.stage_finished(test_case, result))?;

        let failed = run.outcome.is_failure();
        ctx.test_finished(test_case, run)?;
        if failed && self.fail_fast {
            ctx.begin_cancel(CancelReason::TestFailure)?;
        }
        Ok(())
    }
}

/// Statistics for a test run.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
pub struct RunStats {
    /// The total number of test cases that were expected to be run at the beginning.
    ///
    /// If the test run is canceled, this will be more than `finished_count`.
    pub initial_run_count: usize,

    /// The total number of test cases that finished running.
    pub finished_count: usize,

    /// The number of test cases that passed.
    pub passed: usize,

    /// The number of test cases that failed.
    pub failed: usize,

    /// The number of test cases that ran to completion with nothing to check.
    pub no_check: usize,

    /// The number of test cases whose expectations were recorded.
    pub recorded: usize,

    /// The number of test cases that were skipped.
    pub skipped: usize,
}

impl RunStats {
    /// Returns true if this run is considered a success.
    ///
    /// A run can be marked as failed if any of the following are true:
    /// * the run was canceled: the initial run count is greater than the final run count
    /// * any test cases failed
    pub fn is_success(&self) -> bool {
        if self.initial_run_count > self.finished_count {
            return false;
        }
        !self.any_failed()
    }

    /// Returns true if any test cases failed.
    pub fn any_failed(&self) -> bool {
        self.failed > 0
    }

    fn on_test_finished(&mut self, run: &PipelineRun) {
        self.finished_count += 1;
        match run.outcome {
            PipelineOutcome::Passed => self.passed += 1,
            PipelineOutcome::Failed(_) => self.failed += 1,
            PipelineOutcome::NoCheck => self.no_check += 1,
            PipelineOutcome::Recorded(_) => self.recorded += 1,
        }
    }
}

struct CallbackContext<F, E> {
    callback: F,
    stopwatch: StopwatchStart,
    run_stats: RunStats,
    cancel_state: Option<CancelReason>,
    phantom: PhantomData<E>,
}

impl<'a, F, E> CallbackContext<F, E>
where
    F: FnMut(TestEvent<'a>) -> Result<(), E>,
{
    fn new(callback: F, initial_run_count: usize) -> Self {
        Self {
            callback,
            stopwatch: stopwatch(),
            run_stats: RunStats {
                initial_run_count,
                ..RunStats::default()
            },
            cancel_state: None,
            phantom: PhantomData,
        }
    }

    fn run_started(&mut self, test_list: &'a TestList, mode: PipelineMode) -> Result<(), E> {
        (self.callback)(TestEvent::RunStarted {
            test_list,
            mode,
            run_count: self.run_stats.initial_run_count,
        })
    }

    fn test_started(&mut self, test_case: &'a TestCase) -> Result<(), E> {
        (self.callback)(TestEvent::TestStarted { test_case })
    }

    fn stage_finished(&mut self, test_case: &'a TestCase, result: &StageResult) -> Result<(), E> {
        (self.callback)(TestEvent::StageFinished {
            test_case,
            result: result.clone(),
        })
    }

    fn test_finished(&mut self, test_case: &'a TestCase, run: PipelineRun) -> Result<(), E> {
        self.run_stats.on_test_finished(&run);
        (self.callback)(TestEvent::TestFinished { test_case, run })
    }

    fn test_skipped(&mut self, test_case: &'a TestCase, reason: MismatchReason) -> Result<(), E> {
        self.run_stats.skipped += 1;
        (self.callback)(TestEvent::TestSkipped { test_case, reason })
    }

    fn begin_cancel(&mut self, reason: CancelReason) -> Result<(), E> {
        if self.cancel_state < Some(reason) {
            self.cancel_state = Some(reason);
        }
        (self.callback)(TestEvent::RunBeginCancel { reason })
    }

    fn run_finished(&mut self) -> Result<(), E> {
        let end = self.stopwatch.end();
        (self.callback)(TestEvent::RunFinished {
            start_time: end.start_time,
            elapsed: end.duration,
            run_stats: self.run_stats,
        })
    }
}
