// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Code to generate JUnit XML reports from test events.

use super::TestEvent;
use crate::{
    config::JunitConfig,
    discovery::TestCaseKind,
    errors::WriteEventError,
    runner::{FailureReason, PipelineOutcome, PipelineRun, Stage},
};
use itertools::Itertools;
use quick_junit::{NonSuccessKind, Report, TestCase, TestCaseStatus, TestSuite};
use std::{collections::BTreeMap, fs::File};

#[derive(Clone, Debug)]
pub(super) struct MetadataJunit<'cfg> {
    config: JunitConfig<'cfg>,
    test_suites: BTreeMap<TestCaseKind, TestSuite>,
}

impl<'cfg> MetadataJunit<'cfg> {
    pub(super) fn new(config: JunitConfig<'cfg>) -> Self {
        Self {
            config,
            test_suites: BTreeMap::new(),
        }
    }

    pub(super) fn write_event(&mut self, event: &TestEvent<'_>) -> Result<(), WriteEventError> {
        match event {
            TestEvent::RunStarted { .. }
            | TestEvent::TestStarted { .. }
            | TestEvent::StageFinished { .. }
            | TestEvent::RunBeginCancel { .. } => {}
            TestEvent::TestFinished { test_case, run } => {
                let testcase_status = match &run.outcome {
                    PipelineOutcome::Passed | PipelineOutcome::Recorded(_) => {
                        TestCaseStatus::success()
                    }
                    PipelineOutcome::NoCheck => {
                        let mut status = TestCaseStatus::skipped();
                        status.set_message("no check specified");
                        status
                    }
                    PipelineOutcome::Failed(reason) => {
                        let (kind, ty) = non_success_kind_and_type(reason);
                        let mut status = TestCaseStatus::non_success(kind);
                        status.set_type(ty).set_message(reason.to_string());
                        status
                    }
                };

                let mut testcase = TestCase::new(test_case.name(), testcase_status);
                testcase
                    .set_classname(test_case.kind().to_string())
                    .set_timestamp(run.start_time)
                    .set_time(run.time_taken);

                if run.outcome.is_failure() && self.config.store_failure_output() {
                    set_output(&mut testcase, run);
                }

                let kind = test_case.kind();
                self.test_suites
                    .entry(kind)
                    .or_insert_with(|| TestSuite::new(suite_name(kind)))
                    .add_test_case(testcase);
            }
            TestEvent::TestSkipped { .. } => {
                // Filtered-out test cases aren't reported, so reports from runs with different
                // filters can be aggregated.
            }
            TestEvent::RunFinished {
                start_time,
                elapsed,
                ..
            } => {
                // Write out the report to the given file.
                let mut report = Report::new(self.config.report_name());
                report
                    .set_timestamp(*start_time)
                    .set_time(*elapsed)
                    .add_test_suites(std::mem::take(&mut self.test_suites).into_values());

                let junit_path = self.config.path();
                if let Some(junit_dir) = junit_path.parent() {
                    std::fs::create_dir_all(junit_dir).map_err(|error| WriteEventError::Fs {
                        file: junit_dir.to_owned(),
                        error,
                    })?;
                }

                let f = File::create(junit_path).map_err(|error| WriteEventError::Fs {
                    file: junit_path.to_owned(),
                    error,
                })?;
                report
                    .serialize(f)
                    .map_err(|error| WriteEventError::Junit {
                        file: junit_path.to_owned(),
                        error,
                    })?;
            }
        }

        Ok(())
    }
}

fn suite_name(kind: TestCaseKind) -> &'static str {
    match kind {
        TestCaseKind::File => "file-tests",
        TestCaseKind::Directory => "directory-tests",
    }
}

fn non_success_kind_and_type(reason: &FailureReason) -> (NonSuccessKind, String) {
    match reason {
        FailureReason::CompileMismatch { expected, actual } => (
            NonSuccessKind::Failure,
            match actual {
                Some(actual) => format!("compile exit code {actual}, expected {expected}"),
                None => format!("compile abort, expected exit code {expected}"),
            },
        ),
        FailureReason::ToolchainFailure { stage, .. } => {
            (NonSuccessKind::Failure, format!("{stage} failure"))
        }
        FailureReason::Timeout { stage, .. } => {
            (NonSuccessKind::Failure, format!("{stage} timeout"))
        }
        FailureReason::Verify(failure) => {
            let channels = [
                failure.return_code.as_ref().map(|_| "exit code"),
                failure.stdout.as_ref().map(|_| "stdout"),
            ];
            (
                NonSuccessKind::Failure,
                format!("{} mismatch", channels.into_iter().flatten().join(" and ")),
            )
        }
        FailureReason::RunTerminated => (NonSuccessKind::Failure, "run abort".to_owned()),
        FailureReason::ExecFail { .. } => (NonSuccessKind::Error, "execution failure".to_owned()),
        FailureReason::Store(_) => (NonSuccessKind::Error, "output store error".to_owned()),
        FailureReason::Record(_) => (NonSuccessKind::Error, "record error".to_owned()),
    }
}

/// Stores the output of the run stage if it ran, otherwise of the last invocation.
fn set_output(testcase: &mut TestCase, run: &PipelineRun) {
    let result = run
        .stages
        .iter()
        .rev()
        .find(|result| result.stage == Stage::Run)
        .or(run.stages.last());
    if let Some(result) = result {
        testcase
            .set_system_out_lossy(&result.stdout)
            .set_system_err_lossy(&result.stderr);
    }
}
