// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{Stage, StageResult, TestState, ToolInvocation, Verdict, VerifyFailure, verify};
use crate::{
    config::{HarnessConfig, HarnessProfile, ToolchainConfig},
    discovery::{TestCase, TestCaseKind},
    errors::{DisplayErrorChain, ExpectationWriteError, OutputStoreError},
    expectation::{CompileStatusPolicy, Expectation, ExpectationLoader},
    helpers::DisplayExitCode,
    output_store::{CapturePaths, OutputStore},
    time::stopwatch,
};
use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use std::{fmt, io, sync::Arc, time::Duration};
use tracing::{error, info, warn};

/// What the pipeline does with the run stage's output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PipelineMode {
    /// Verify the output against the test case's expectation.
    #[default]
    Verify,

    /// Write the output to the test case's expectation side files instead of verifying it.
    Record,
}

/// Settings shared by every pipeline in a run.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    workspace_root: Utf8PathBuf,
    toolchain: ToolchainConfig,
    compiler_output_dir: Utf8PathBuf,
    assembly_extension: String,
    object_extension: String,
    compile_policy: CompileStatusPolicy,
    expectation_loader: ExpectationLoader,
    stage_timeout: Option<Duration>,
    mode: PipelineMode,
}

impl PipelineSettings {
    /// Creates pipeline settings from the config and the profile in use.
    pub fn new(config: &HarnessConfig, profile: &HarnessProfile<'_>) -> Self {
        Self {
            workspace_root: config.workspace_root().to_owned(),
            toolchain: config.toolchain().clone(),
            compiler_output_dir: config.compiler_output_dir(),
            assembly_extension: config.layout().assembly_extension.clone(),
            object_extension: config.layout().object_extension.clone(),
            compile_policy: CompileStatusPolicy::new(config.expectations()),
            expectation_loader: ExpectationLoader::new(config.expectations()),
            stage_timeout: profile.stage_timeout(),
            mode: PipelineMode::Verify,
        }
    }

    /// Sets the pipeline mode.
    pub fn set_mode(&mut self, mode: PipelineMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Returns the pipeline mode.
    pub fn mode(&self) -> PipelineMode {
        self.mode
    }
}

/// The outcome of running a pipeline.
#[derive(Clone, Debug)]
pub enum PipelineOutcome {
    /// The compile stage matched the expected status, and either the compiler rejected the
    /// program as expected or every configured run check matched.
    Passed,

    /// A stage or a check failed.
    Failed(FailureReason),

    /// Every stage succeeded, but the test case has no expectation to check against.
    NoCheck,

    /// Every stage succeeded and the run's output was written as the new expectation.
    Recorded(Expectation),
}

impl PipelineOutcome {
    /// Returns true if this outcome is a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, PipelineOutcome::Failed(_))
    }

    /// Returns the failure reason, if any.
    pub fn failure_reason(&self) -> Option<&FailureReason> {
        match self {
            PipelineOutcome::Failed(reason) => Some(reason),
            _ => None,
        }
    }

    fn store_failure(error: OutputStoreError) -> Self {
        PipelineOutcome::Failed(FailureReason::Store(Arc::new(error)))
    }
}

/// Why a pipeline failed.
#[derive(Clone, Debug)]
#[non_exhaustive]
pub enum FailureReason {
    /// The compiler's exit code didn't match the expected status. No later stage was run.
    CompileMismatch {
        /// The expected exit code.
        expected: i32,

        /// The actual exit code, or `None` if the compiler was terminated by a signal.
        actual: Option<i32>,
    },

    /// The assembler or the linker exited with a non-zero code.
    ToolchainFailure {
        /// The failing stage.
        stage: Stage,

        /// The artifact being assembled, for the assemble stage.
        artifact: Option<Utf8PathBuf>,

        /// The exit code, or `None` if the process was terminated by a signal.
        exit_code: Option<i32>,
    },

    /// A process ran for longer than the stage timeout and was killed.
    Timeout {
        /// The stage that timed out.
        stage: Stage,

        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// A process couldn't be started.
    ExecFail {
        /// The stage whose process couldn't be started.
        stage: Stage,

        /// The program.
        program: String,

        /// The underlying error.
        error: Arc<io::Error>,
    },

    /// The run stage's output didn't match the expectation.
    Verify(VerifyFailure),

    /// The executable was terminated without an exit code, so there's nothing to record.
    RunTerminated,

    /// Operating on the output store failed.
    Store(Arc<OutputStoreError>),

    /// Writing the new expectation failed.
    Record(Arc<ExpectationWriteError>),
}

impl FailureReason {
    /// Returns the stage this failure is attributed to, if any.
    pub fn stage(&self) -> Option<Stage> {
        match self {
            FailureReason::CompileMismatch { .. } => Some(Stage::Compile),
            FailureReason::ToolchainFailure { stage, .. }
            | FailureReason::Timeout { stage, .. }
            | FailureReason::ExecFail { stage, .. } => Some(*stage),
            FailureReason::Verify(_) | FailureReason::RunTerminated => Some(Stage::Run),
            FailureReason::Store(_) | FailureReason::Record(_) => None,
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::CompileMismatch { expected, actual } => write!(
                f,
                "compiler exited with {}, expected {expected}",
                DisplayExitCode(*actual)
            ),
            FailureReason::ToolchainFailure {
                stage,
                artifact: Some(artifact),
                exit_code,
            } => write!(
                f,
                "{stage} failed for {artifact} with exit code {}",
                DisplayExitCode(*exit_code)
            ),
            FailureReason::ToolchainFailure {
                stage,
                artifact: None,
                exit_code,
            } => write!(f, "{stage} failed with exit code {}", DisplayExitCode(*exit_code)),
            FailureReason::Timeout { stage, timeout } => {
                write!(f, "{stage} timed out after {:.3}s", timeout.as_secs_f64())
            }
            FailureReason::ExecFail {
                stage,
                program,
                error,
            } => write!(f, "failed to execute `{program}` for {stage}: {error}"),
            FailureReason::Verify(failure) => write!(f, "run did not match: {failure}"),
            FailureReason::RunTerminated => {
                write!(f, "executable was terminated without an exit code")
            }
            FailureReason::Store(error) => write!(f, "{}", DisplayErrorChain::new(&**error)),
            FailureReason::Record(error) => write!(f, "{}", DisplayErrorChain::new(&**error)),
        }
    }
}

/// The result of running a [`Pipeline`] to completion.
#[derive(Clone, Debug)]
pub struct PipelineRun {
    /// The outcome.
    pub outcome: PipelineOutcome,

    /// The final state of the test case. Stays [`TestState::Running`] if there was nothing to
    /// check.
    pub state: TestState,

    /// Every invocation that was run, in order.
    pub stages: Vec<StageResult>,

    /// The captured output persisted to the output store.
    pub captures: Vec<(Stage, CapturePaths)>,

    /// The output store directory.
    pub store_dir: Utf8PathBuf,

    /// The time at which the pipeline started.
    pub start_time: DateTime<Local>,

    /// How long the pipeline took.
    pub time_taken: Duration,
}

/// The compile, assemble, link and run stages for one test case, followed by verification.
///
/// Stages run strictly in order. A compile stage whose exit code doesn't match the expected status
/// ends the pipeline, as does any assembler or linker failure.
#[derive(Debug)]
pub struct Pipeline<'a> {
    test_case: &'a TestCase,
    settings: &'a PipelineSettings,
    store: OutputStore,
    state: TestState,
    stages: Vec<StageResult>,
    captures: Vec<(Stage, CapturePaths)>,
}

impl<'a> Pipeline<'a> {
    /// Creates a new pipeline for a test case, in the [`TestState::NotRun`] state.
    pub fn new(test_case: &'a TestCase, settings: &'a PipelineSettings, store: OutputStore) -> Self {
        Self {
            test_case,
            settings,
            store,
            state: TestState::NotRun,
            stages: Vec::new(),
            captures: Vec::new(),
        }
    }

    /// Returns the current state.
    pub fn state(&self) -> TestState {
        self.state
    }

    /// Runs every stage, calling `on_stage` after each invocation finishes.
    ///
    /// If `on_stage` returns an error, the pipeline stops and the error is returned.
    pub fn run<E, F>(mut self, mut on_stage: F) -> Result<PipelineRun, E>
    where
        F: FnMut(&StageResult) -> Result<(), E>,
    {
        let stopwatch = stopwatch();
        self.advance(TestState::Running);

        let outcome = self.run_stages(&mut on_stage)?;
        match &outcome {
            PipelineOutcome::Passed | PipelineOutcome::Recorded(_) => {
                self.advance(TestState::Passed)
            }
            PipelineOutcome::Failed(_) => self.advance(TestState::Failed),
            PipelineOutcome::NoCheck => {}
        }

        let end = stopwatch.end();
        Ok(PipelineRun {
            outcome,
            state: self.state,
            stages: self.stages,
            captures: self.captures,
            store_dir: self.store.root().to_owned(),
            start_time: end.start_time,
            time_taken: end.duration,
        })
    }

    fn run_stages<E, F>(&mut self, on_stage: &mut F) -> Result<PipelineOutcome, E>
    where
        F: FnMut(&StageResult) -> Result<(), E>,
    {
        let settings = self.settings;
        let test_case = self.test_case;
        let name = test_case.name();

        if let Err(error) = self.prepare() {
            return Ok(PipelineOutcome::store_failure(error));
        }

        // Compile.
        if test_case.sources().entry().is_none() {
            warn!("{name}: no entry file found, compiling without one");
        }
        let expected = settings.compile_policy.expected_status(name);
        let mut compile = match self.invoke(
            Stage::Compile,
            &settings.toolchain.compiler,
            test_case.compiler_args(),
        ) {
            Ok(result) => result,
            Err(reason) => return Ok(PipelineOutcome::Failed(reason)),
        };
        info!(
            "{name}: compiler exited with {} (expected {expected})",
            DisplayExitCode(compile.exit_code)
        );
        if let Err(error) = self.write_captures(&compile) {
            return Ok(PipelineOutcome::store_failure(error));
        }
        if compile.timed_out {
            self.report(compile, on_stage)?;
            return Ok(PipelineOutcome::Failed(self.timeout(Stage::Compile)));
        }
        let actual = compile.exit_code;
        if actual != Some(expected) {
            self.report(compile, on_stage)?;
            return Ok(PipelineOutcome::Failed(FailureReason::CompileMismatch {
                expected,
                actual,
            }));
        }
        if expected != 0 {
            // The compiler rejected the program as required, so there's nothing to assemble.
            self.report(compile, on_stage)?;
            return Ok(PipelineOutcome::Passed);
        }
        let collected = self
            .store
            .collect_artifacts(&settings.compiler_output_dir, &settings.assembly_extension);
        match collected {
            Ok(artifacts) => compile.artifacts = artifacts,
            Err(error) => {
                self.report(compile, on_stage)?;
                return Ok(PipelineOutcome::store_failure(error));
            }
        }
        self.report(compile, on_stage)?;

        // Assemble.
        let sources = match self.store.artifacts(&settings.assembly_extension) {
            Ok(sources) => sources,
            Err(error) => return Ok(PipelineOutcome::store_failure(error)),
        };
        let mut first_failure = None;
        for source in sources {
            let args = settings
                .toolchain
                .assembler_args
                .iter()
                .cloned()
                .chain([source.to_string()]);
            let mut assemble = match self.invoke(Stage::Assemble, &settings.toolchain.assembler, args)
            {
                Ok(result) => result,
                Err(reason) => return Ok(PipelineOutcome::Failed(reason)),
            };
            if assemble.timed_out {
                self.report(assemble, on_stage)?;
                return Ok(PipelineOutcome::Failed(self.timeout(Stage::Assemble)));
            }
            if assemble.is_success() {
                assemble.artifacts = vec![source.with_extension(&settings.object_extension)];
            } else {
                error!(
                    "{name}: assembler exited with {} for {source}",
                    DisplayExitCode(assemble.exit_code)
                );
                if let Err(error) = self.write_captures(&assemble) {
                    return Ok(PipelineOutcome::store_failure(error));
                }
                first_failure.get_or_insert(FailureReason::ToolchainFailure {
                    stage: Stage::Assemble,
                    artifact: Some(source),
                    exit_code: assemble.exit_code,
                });
            }
            self.report(assemble, on_stage)?;
        }
        if let Some(reason) = first_failure {
            return Ok(PipelineOutcome::Failed(reason));
        }

        // Link.
        let objects = match self.store.artifacts(&settings.object_extension) {
            Ok(objects) => objects,
            Err(error) => return Ok(PipelineOutcome::store_failure(error)),
        };
        let executable = self.store.root().join(&settings.toolchain.executable_name);
        let args = settings
            .toolchain
            .linker_args
            .iter()
            .cloned()
            .chain(["-o".to_owned(), executable.to_string()])
            .chain(objects.iter().map(|object| object.to_string()));
        let mut link = match self.invoke(Stage::Link, &settings.toolchain.linker, args) {
            Ok(result) => result,
            Err(reason) => return Ok(PipelineOutcome::Failed(reason)),
        };
        if link.timed_out {
            self.report(link, on_stage)?;
            return Ok(PipelineOutcome::Failed(self.timeout(Stage::Link)));
        }
        if !link.is_success() {
            error!(
                "{name}: linker exited with {}",
                DisplayExitCode(link.exit_code)
            );
            if let Err(error) = self.write_captures(&link) {
                return Ok(PipelineOutcome::store_failure(error));
            }
            let exit_code = link.exit_code;
            self.report(link, on_stage)?;
            return Ok(PipelineOutcome::Failed(FailureReason::ToolchainFailure {
                stage: Stage::Link,
                artifact: None,
                exit_code,
            }));
        }
        link.artifacts = vec![executable.clone()];
        self.report(link, on_stage)?;

        // Run.
        let run = match self.invoke(Stage::Run, executable.as_str(), Vec::<String>::new()) {
            Ok(result) => result,
            Err(reason) => return Ok(PipelineOutcome::Failed(reason)),
        };
        info!("{name}: return code {}", DisplayExitCode(run.exit_code));
        if let Err(error) = self.write_captures(&run) {
            return Ok(PipelineOutcome::store_failure(error));
        }
        if run.timed_out {
            self.report(run, on_stage)?;
            return Ok(PipelineOutcome::Failed(self.timeout(Stage::Run)));
        }

        // Verify, or record.
        let outcome = match settings.mode {
            PipelineMode::Verify => {
                let stdout = String::from_utf8_lossy(&run.stdout);
                match verify(test_case.expectation(), run.exit_code, &stdout) {
                    Verdict::Passed => PipelineOutcome::Passed,
                    Verdict::Failed(failure) => {
                        PipelineOutcome::Failed(FailureReason::Verify(failure))
                    }
                    Verdict::NoCheck => {
                        info!("{name}: no check specified");
                        PipelineOutcome::NoCheck
                    }
                }
            }
            PipelineMode::Record => self.record(&run),
        };
        self.report(run, on_stage)?;

        Ok(outcome)
    }

    fn prepare(&self) -> Result<(), OutputStoreError> {
        self.store.reset()?;
        self.store.remove_stale_artifacts(
            &self.settings.compiler_output_dir,
            &self.settings.assembly_extension,
        )?;
        Ok(())
    }

    fn invoke<I>(&self, stage: Stage, program: &str, args: I) -> Result<StageResult, FailureReason>
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        ToolInvocation::new(stage, program, &self.settings.workspace_root)
            .args(args)
            .timeout(self.settings.stage_timeout)
            .run()
            .map_err(|error| {
                error!("{}: failed to execute `{program}`: {error}", self.test_case.name());
                FailureReason::ExecFail {
                    stage,
                    program: program.to_owned(),
                    error: Arc::new(error),
                }
            })
    }

    fn write_captures(&mut self, result: &StageResult) -> Result<(), OutputStoreError> {
        let paths = self.store.write_captures(
            result.stage,
            result.start_time,
            &result.stdout,
            &result.stderr,
        )?;
        self.captures.push((result.stage, paths));
        Ok(())
    }

    fn record(&self, run: &StageResult) -> PipelineOutcome {
        let test_case = self.test_case;
        if test_case.kind() == TestCaseKind::Directory {
            warn!(
                "{}: directory test cases have no expectations, not recording",
                test_case.name()
            );
            return PipelineOutcome::NoCheck;
        }
        let Some(return_code) = run.exit_code else {
            return PipelineOutcome::Failed(FailureReason::RunTerminated);
        };

        match self
            .settings
            .expectation_loader
            .write(test_case.path(), return_code, &run.stdout)
        {
            Ok(paths) => {
                info!(
                    "{}: recorded expectation to {} and {}",
                    test_case.name(),
                    paths.return_code,
                    paths.stdout
                );
                PipelineOutcome::Recorded(Expectation {
                    return_code: Some(return_code),
                    stdout: Some(String::from_utf8_lossy(&run.stdout).trim().to_owned()),
                })
            }
            Err(error) => PipelineOutcome::Failed(FailureReason::Record(Arc::new(error))),
        }
    }

    fn report<E, F>(&mut self, result: StageResult, on_stage: &mut F) -> Result<(), E>
    where
        F: FnMut(&StageResult) -> Result<(), E>,
    {
        on_stage(&result)?;
        self.stages.push(result);
        Ok(())
    }

    fn timeout(&self, stage: Stage) -> FailureReason {
        FailureReason::Timeout {
            stage,
            timeout: self.settings.stage_timeout.unwrap_or_default(),
        }
    }

    fn advance(&mut self, to: TestState) {
        if let Err(error) = self.state.transition(to) {
            error!("{}: {error}", self.test_case.name());
        }
    }
}

