// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Human-readable output of test events.

use super::{CancelReason, TestEvent};
use crate::{
    discovery::{TestCase, TestList},
    helpers::{DisplayExitCode, plural, trim_trailing_newline},
    runner::{
        FailureReason, PipelineMode, PipelineOutcome, PipelineRun, RunStats, Stage, StageResult,
    },
    test_filter::MismatchReason,
};
use owo_colors::{OwoColorize, Style};
use std::{io, io::Write, time::Duration};
use swrite::{SWrite, swrite};

#[derive(Debug)]
pub(super) struct DisplayReporter {
    verbose: bool,
    styles: Box<Styles>,
}

impl DisplayReporter {
    pub(super) fn new(verbose: bool, colorize: bool) -> Self {
        let mut styles: Box<Styles> = Box::default();
        if colorize {
            styles.colorize();
        }
        Self { verbose, styles }
    }

    pub(super) fn write_event(
        &self,
        event: &TestEvent<'_>,
        mut writer: impl Write,
    ) -> io::Result<()> {
        match event {
            TestEvent::RunStarted {
                test_list,
                mode,
                run_count,
            } => self.write_run_started(test_list, *mode, *run_count, &mut writer)?,
            TestEvent::TestStarted { test_case } => {
                if self.verbose {
                    write!(writer, "{:>12} ", "START".style(self.styles.pass))?;
                    // same spacing as [   0.034s]
                    write!(writer, "[         ] ")?;
                    self.write_test_case(test_case, &mut writer)?;
                    writeln!(writer)?;
                }
            }
            TestEvent::StageFinished { test_case, result } => {
                if self.verbose {
                    self.write_stage_line(test_case, result, &mut writer)?;
                }
            }
            TestEvent::TestFinished { test_case, run } => {
                self.write_status_line(test_case, run, &mut writer)?;
                if let PipelineOutcome::Failed(reason) = &run.outcome {
                    self.write_failure_details(test_case, run, reason, &mut writer)?;
                }
            }
            TestEvent::TestSkipped { test_case, reason } => {
                if self.verbose || *reason != MismatchReason::String {
                    write!(writer, "{:>12} ", "SKIP".style(self.styles.skip))?;
                    write!(writer, "[         ] ")?;
                    self.write_test_case(test_case, &mut writer)?;
                    writeln!(writer, ": {reason}")?;
                }
            }
            TestEvent::RunBeginCancel { reason } => {
                write!(writer, "{:>12} ", "Canceling".style(self.styles.fail))?;
                let reason_str = match reason {
                    CancelReason::TestFailure => "test failure",
                    CancelReason::ReportError => "reporting error",
                };
                writeln!(
                    writer,
                    "due to {}, no further test cases will be started",
                    reason_str.style(self.styles.count)
                )?;
            }
            TestEvent::RunFinished {
                elapsed, run_stats, ..
            } => self.write_summary(*elapsed, run_stats, &mut writer)?,
        }

        Ok(())
    }

    // ---
    // Helper methods
    // ---

    fn write_run_started(
        &self,
        test_list: &TestList,
        mode: PipelineMode,
        run_count: usize,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let verb = match mode {
            PipelineMode::Verify => "Starting",
            PipelineMode::Record => "Recording",
        };
        write!(writer, "{:>12} ", verb.style(self.styles.pass))?;
        write!(
            writer,
            "{} {}",
            run_count.style(self.styles.count),
            plural::test_cases_str(run_count),
        )?;

        let skip_count = test_list.test_count() - run_count;
        if skip_count > 0 {
            write!(writer, " ({} skipped)", skip_count.style(self.styles.count))?;
        }

        writeln!(writer)
    }

    fn write_stage_line(
        &self,
        test_case: &TestCase,
        result: &StageResult,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let status = result.stage.to_string().to_uppercase();
        let style = if result.timed_out {
            self.styles.fail
        } else {
            self.styles.stage
        };
        write!(writer, "{:>12} ", status.style(style))?;
        self.write_duration(result.time_taken, &mut writer)?;
        self.write_test_case(test_case, &mut writer)?;
        writeln!(writer)?;

        let mut detail = format!("exit code {}", DisplayExitCode(result.exit_code));
        if result.timed_out {
            swrite!(detail, ", timed out");
        }
        if !result.artifacts.is_empty() {
            swrite!(
                detail,
                ", {} {}",
                result.artifacts.len(),
                if result.artifacts.len() == 1 {
                    "artifact"
                } else {
                    "artifacts"
                }
            );
        }
        writeln!(
            writer,
            "{:>12} {} ({detail})",
            "",
            result.command_line()
        )
    }

    fn write_status_line(
        &self,
        test_case: &TestCase,
        run: &PipelineRun,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let (status, style) = match &run.outcome {
            PipelineOutcome::Passed => ("PASS", self.styles.pass),
            PipelineOutcome::Failed(FailureReason::Timeout { .. }) => {
                ("TIMEOUT", self.styles.fail)
            }
            PipelineOutcome::Failed(FailureReason::ExecFail { .. }) => {
                ("EXECFAIL", self.styles.fail)
            }
            PipelineOutcome::Failed(_) => ("FAIL", self.styles.fail),
            PipelineOutcome::NoCheck => ("NO CHECK", self.styles.skip),
            PipelineOutcome::Recorded(_) => ("RECORDED", self.styles.pass),
        };
        write!(writer, "{:>12} ", status.style(style))?;
        self.write_duration(run.time_taken, &mut writer)?;
        self.write_test_case(test_case, &mut writer)?;
        writeln!(writer)
    }

    fn write_failure_details(
        &self,
        test_case: &TestCase,
        run: &PipelineRun,
        reason: &FailureReason,
        mut writer: impl Write,
    ) -> io::Result<()> {
        writeln!(writer, "{:>12} {reason}", "")?;

        match reason {
            FailureReason::Verify(failure) => {
                if let Some(stdout) = &failure.stdout {
                    self.write_output_block(
                        "EXPECTED STDOUT",
                        test_case,
                        None,
                        &stdout.expected,
                        &mut writer,
                    )?;
                    self.write_output_block(
                        "ACTUAL STDOUT",
                        test_case,
                        None,
                        &stdout.actual,
                        &mut writer,
                    )?;
                }
            }
            FailureReason::Store(_) | FailureReason::Record(_) => {}
            _ => {
                // Show the output of the invocation that failed.
                let failed = run
                    .stages
                    .iter()
                    .rev()
                    .find(|result| Some(result.stage) == reason.stage() && !result.is_success())
                    .or(run.stages.last());
                if let Some(result) = failed {
                    let stdout = String::from_utf8_lossy(&result.stdout);
                    let stderr = String::from_utf8_lossy(&result.stderr);
                    self.write_output_block(
                        "STDOUT",
                        test_case,
                        Some(result.stage),
                        &stdout,
                        &mut writer,
                    )?;
                    self.write_output_block(
                        "STDERR",
                        test_case,
                        Some(result.stage),
                        &stderr,
                        &mut writer,
                    )?;
                }
            }
        }

        if !run.captures.is_empty() {
            writeln!(
                writer,
                "{:>12} {}",
                "",
                "captured output:".style(self.styles.count)
            )?;
            for (stage, paths) in &run.captures {
                writeln!(writer, "{:>14}{stage} stdout: {}", "", paths.stdout)?;
                writeln!(writer, "{:>14}{stage} stderr: {}", "", paths.stderr)?;
            }
        }
        writeln!(writer)
    }

    fn write_output_block(
        &self,
        header: &str,
        test_case: &TestCase,
        stage: Option<Stage>,
        output: &str,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let mut header = format!("--- {header}: {}", test_case.name());
        if let Some(stage) = stage {
            swrite!(header, " ({stage})");
        }
        swrite!(header, " ---");
        writeln!(writer, "\n{}", header.style(self.styles.fail))?;

        let output = trim_trailing_newline(output);
        if !output.is_empty() {
            writeln!(writer, "{}", output.style(self.styles.fail_output))?;
        }
        Ok(())
    }

    fn write_summary(
        &self,
        elapsed: Duration,
        run_stats: &RunStats,
        mut writer: impl Write,
    ) -> io::Result<()> {
        let summary_style = if run_stats.is_success() {
            self.styles.pass
        } else {
            self.styles.fail
        };
        write!(writer, "{:>12} ", "Summary".style(summary_style))?;
        self.write_duration(elapsed, &mut writer)?;

        write!(writer, "{}", run_stats.finished_count.style(self.styles.count))?;
        if run_stats.finished_count != run_stats.initial_run_count {
            write!(
                writer,
                "/{}",
                run_stats.initial_run_count.style(self.styles.count)
            )?;
        }
        write!(
            writer,
            " {} run: ",
            plural::test_cases_str(run_stats.initial_run_count)
        )?;

        write!(
            writer,
            "{} {}",
            run_stats.passed.style(self.styles.count),
            "passed".style(self.styles.pass)
        )?;
        if run_stats.failed > 0 {
            write!(
                writer,
                ", {} {}",
                run_stats.failed.style(self.styles.count),
                "failed".style(self.styles.fail)
            )?;
        }
        if run_stats.recorded > 0 {
            write!(
                writer,
                ", {} {}",
                run_stats.recorded.style(self.styles.count),
                "recorded".style(self.styles.pass)
            )?;
        }
        if run_stats.no_check > 0 {
            write!(
                writer,
                ", {} {}",
                run_stats.no_check.style(self.styles.count),
                "with no check".style(self.styles.skip)
            )?;
        }
        writeln!(
            writer,
            ", {} {}",
            run_stats.skipped.style(self.styles.count),
            "skipped".style(self.styles.skip)
        )
    }

    fn write_duration(&self, duration: Duration, mut writer: impl Write) -> io::Result<()> {
        // * > means right-align.
        // * 8 is the number of characters to pad to.
        // * .3 means print three digits after the decimal point.
        write!(writer, "[{:>8.3}s] ", duration.as_secs_f64())
    }

    fn write_test_case(&self, test_case: &TestCase, mut writer: impl Write) -> io::Result<()> {
        write!(writer, "{}", test_case.name().style(self.styles.name))
    }
}

#[derive(Debug, Default)]
struct Styles {
    count: Style,
    pass: Style,
    fail: Style,
    fail_output: Style,
    skip: Style,
    stage: Style,
    name: Style,
}

impl Styles {
    fn colorize(&mut self) {
        self.count = Style::new().bold();
        self.pass = Style::new().green().bold();
        self.fail = Style::new().red().bold();
        self.fail_output = Style::new().magenta();
        self.skip = Style::new().yellow().bold();
        self.stage = Style::new().blue().bold();
        self.name = Style::new().bold();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        discovery::{SupportLibrary, TestCaseKind},
        expectation::Expectation,
        output_store::CapturePaths,
        runner::{StdoutMismatch, TestState, VerifyFailure},
        source_set::SourceSet,
        test_filter::TestFilter,
    };
    use bytes::Bytes;
    use chrono::Local;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn test_case(name: &str) -> TestCase {
        TestCase::new(
            name,
            TestCaseKind::File,
            format!("tests/codegen/{name}"),
            SourceSet::default(),
            Arc::new(SupportLibrary::empty()),
            Expectation::none(),
        )
    }

    fn pipeline_run(outcome: PipelineOutcome, stages: Vec<StageResult>) -> PipelineRun {
        PipelineRun {
            state: if outcome.is_failure() {
                TestState::Failed
            } else {
                TestState::Passed
            },
            outcome,
            stages,
            captures: Vec::new(),
            store_dir: "target/e2e/default/Foo".into(),
            start_time: Local::now(),
            time_taken: Duration::from_millis(1250),
        }
    }

    fn stage_result(stage: Stage, exit_code: Option<i32>, stderr: &'static str) -> StageResult {
        StageResult {
            stage,
            program: "./joosc".to_owned(),
            args: vec!["Foo.java".to_owned()],
            exit_code,
            timed_out: false,
            stdout: Bytes::new(),
            stderr: Bytes::from_static(stderr.as_bytes()),
            artifacts: Vec::new(),
            start_time: Local::now(),
            time_taken: Duration::from_millis(500),
        }
    }

    fn render(reporter: &DisplayReporter, event: TestEvent<'_>) -> String {
        let mut out = Vec::new();
        reporter.write_event(&event, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn run_started() {
        let test_list = TestList::new(
            vec![test_case("A.java"), test_case("B.java")],
            &TestFilter::new(["A"]),
        );
        let reporter = DisplayReporter::new(false, false);
        let out = render(
            &reporter,
            TestEvent::RunStarted {
                test_list: &test_list,
                mode: PipelineMode::Verify,
                run_count: 1,
            },
        );
        assert_eq!(out, "    Starting 1 test case (1 skipped)\n");
    }

    #[test]
    fn pass_line() {
        let test_case = test_case("Foo.java");
        let reporter = DisplayReporter::new(false, false);
        let out = render(
            &reporter,
            TestEvent::TestFinished {
                test_case: &test_case,
                run: pipeline_run(PipelineOutcome::Passed, Vec::new()),
            },
        );
        assert_eq!(out, "        PASS [   1.250s] Foo.java\n");
    }

    #[test]
    fn compile_failure_shows_output() {
        let test_case = test_case("Foo.java");
        let reporter = DisplayReporter::new(false, false);
        let mut run = pipeline_run(
            PipelineOutcome::Failed(FailureReason::CompileMismatch {
                expected: 0,
                actual: Some(1),
            }),
            vec![stage_result(Stage::Compile, Some(1), "syntax error\n")],
        );
        run.captures.push((
            Stage::Compile,
            CapturePaths {
                stdout: "store/compile_stdout".into(),
                stderr: "store/compile_stderr".into(),
            },
        ));

        let out = render(
            &reporter,
            TestEvent::TestFinished {
                test_case: &test_case,
                run,
            },
        );
        assert_eq!(
            out,
            "        FAIL [   1.250s] Foo.java\n             \
             compiler exited with 1, expected 0\n\
             \n--- STDOUT: Foo.java (compile) ---\n\
             \n--- STDERR: Foo.java (compile) ---\n\
             syntax error\n             \
             captured output:\n              \
             compile stdout: store/compile_stdout\n              \
             compile stderr: store/compile_stderr\n\
             \n"
        );
    }

    #[test]
    fn stdout_mismatch_shows_both_sides() {
        let test_case = test_case("Foo.java");
        let reporter = DisplayReporter::new(false, false);
        let run = pipeline_run(
            PipelineOutcome::Failed(FailureReason::Verify(VerifyFailure {
                return_code: None,
                stdout: Some(StdoutMismatch {
                    expected: "hello".to_owned(),
                    actual: "goodbye".to_owned(),
                }),
            })),
            Vec::new(),
        );

        let out = render(
            &reporter,
            TestEvent::TestFinished {
                test_case: &test_case,
                run,
            },
        );
        assert!(out.contains("run did not match: stdout did not match"), "{out}");
        assert!(
            out.contains("--- EXPECTED STDOUT: Foo.java ---\nhello\n"),
            "{out}"
        );
        assert!(
            out.contains("--- ACTUAL STDOUT: Foo.java ---\ngoodbye\n"),
            "{out}"
        );
    }

    #[test]
    fn skips_are_quiet_unless_verbose() {
        let test_case = test_case("Foo.java");
        let quiet = DisplayReporter::new(false, false);
        let event = TestEvent::TestSkipped {
            test_case: &test_case,
            reason: MismatchReason::String,
        };
        assert_eq!(render(&quiet, event.clone()), "");

        let verbose = DisplayReporter::new(true, false);
        assert_eq!(
            render(&verbose, event),
            "        SKIP [         ] Foo.java: does not match the provided patterns\n"
        );

        let out = render(
            &quiet,
            TestEvent::TestSkipped {
                test_case: &test_case,
                reason: MismatchReason::NoExpectations,
            },
        );
        assert!(out.contains("directory test cases are not recorded"), "{out}");
    }

    #[test]
    fn summary() {
        let reporter = DisplayReporter::new(false, false);
        let out = render(
            &reporter,
            TestEvent::RunFinished {
                start_time: Local::now(),
                elapsed: Duration::from_secs(2),
                run_stats: RunStats {
                    initial_run_count: 5,
                    finished_count: 4,
                    passed: 2,
                    failed: 1,
                    no_check: 1,
                    recorded: 0,
                    skipped: 3,
                },
            },
        );
        assert_eq!(
            out,
            "     Summary [   2.000s] 4/5 test cases run: 2 passed, 1 failed, 1 with no check, 3 skipped\n"
        );
    }

    #[test]
    fn cancel_line() {
        let reporter = DisplayReporter::new(false, false);
        let out = render(
            &reporter,
            TestEvent::RunBeginCancel {
                reason: CancelReason::TestFailure,
            },
        );
        assert_eq!(
            out,
            "   Canceling due to test failure, no further test cases will be started\n"
        );
    }
}
