// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::{
    ExpectedError,
    errors::{Result, utf8_path},
    output::{OutputContext, OutputOpts, OutputWriter, clap_styles},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand};
use e2e_metadata::E2eExitCode;
use e2e_runner::{
    config::HarnessConfig,
    discovery::{TestCaseRegistry, TestList},
    grading::GradingReport,
    helpers::plural,
    reporter::TestReporterBuilder,
    runner::{PipelineMode, TestRunnerBuilder},
    test_filter::TestFilter,
};
use itertools::Itertools;
use owo_colors::{OwoColorize, Style};
use std::io::Write;
use supports_color::Stream;
use tracing::{info, warn};

/// Compile, assemble, link and run test programs against a compiler under test.
#[derive(Debug, Parser)]
#[command(version, styles = clap_styles::style())]
pub struct E2eHarnessApp {
    /// Workspace root [default: current directory]
    ///
    /// Relative paths in the config are resolved against this directory, and every toolchain
    /// process is run from it.
    #[arg(long, global = true, value_name = "DIR", env = "E2E_WORKSPACE_ROOT")]
    workspace_root: Option<Utf8PathBuf>,

    #[clap(flatten)]
    config_opts: ConfigOpts,

    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl E2eHarnessApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app, returning the process exit code on success.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::List { selection } => {
                let base = BaseApp::new(self.workspace_root, &self.config_opts)?;
                let test_list = base.build_test_list(&selection)?;
                let colorize = output.color.should_colorize(Stream::Stdout);
                write_test_list(&test_list, colorize, &mut output_writer.stdout_writer())
                    .map_err(ExpectedError::write_error)?;
                Ok(E2eExitCode::OK)
            }
            Command::Run {
                profile,
                selection,
                runner_opts,
            } => {
                let base = BaseApp::new(self.workspace_root, &self.config_opts)?;
                let mut runner_builder = TestRunnerBuilder::default();
                if let Some(fail_fast) = runner_opts.fail_fast() {
                    runner_builder.set_fail_fast(fail_fast);
                }
                base.exec_run(
                    profile.as_deref(),
                    &selection,
                    runner_builder,
                    output,
                    output_writer,
                )
            }
            Command::Bless { profile, selection } => {
                let base = BaseApp::new(self.workspace_root, &self.config_opts)?;
                let mut runner_builder = TestRunnerBuilder::default();
                runner_builder.set_mode(PipelineMode::Record);
                base.exec_run(
                    profile.as_deref(),
                    &selection,
                    runner_builder,
                    output,
                    output_writer,
                )
            }
            Command::Report {
                show_unparsed,
                file,
            } => {
                let file = absolutize(file)?;
                let report = GradingReport::read(&file)?;
                write_report(&report, show_unparsed, &mut output_writer.stdout_writer())
                    .map_err(ExpectedError::write_error)?;
                Ok(E2eExitCode::OK)
            }
        }
    }
}

#[derive(Debug, Args)]
struct ConfigOpts {
    /// Config file [default: workspace-root/.config/e2e.toml]
    #[arg(long, global = true, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,
}

impl ConfigOpts {
    fn make_config(&self, workspace_root: &Utf8Path) -> Result<HarnessConfig> {
        let config_file = self.config_file.clone().map(absolutize).transpose()?;
        Ok(HarnessConfig::from_sources(
            workspace_root,
            config_file.as_deref(),
        )?)
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List test cases in the test directory
    List {
        #[clap(flatten)]
        selection: TestSelectionOpts,
    },

    /// Run test cases, verifying their exit code and stdout
    Run {
        /// Profile to use
        #[arg(long, short = 'P', env = "E2E_PROFILE")]
        profile: Option<String>,

        #[clap(flatten)]
        selection: TestSelectionOpts,

        #[clap(flatten)]
        runner_opts: TestRunnerOpts,
    },

    /// Run test cases and record their exit code and stdout as expectations
    ///
    /// Only single-file test cases are recorded: directory test cases are skipped.
    Bless {
        /// Profile to use
        #[arg(long, short = 'P', env = "E2E_PROFILE")]
        profile: Option<String>,

        #[clap(flatten)]
        selection: TestSelectionOpts,
    },

    /// Parse a grading report and print the expected verdict for each record
    Report {
        /// Also print the lines that couldn't be parsed
        #[arg(long)]
        show_unparsed: bool,

        /// The grading report to parse
        #[arg(value_name = "FILE")]
        file: Utf8PathBuf,
    },
}

#[derive(Debug, Default, Args)]
#[command(next_help_heading = "FILTER OPTIONS")]
struct TestSelectionOpts {
    /// Test directory [default: from config]
    #[arg(long, value_name = "DIR")]
    test_dir: Option<Utf8PathBuf>,

    /// Test name filters: a test case is selected if its name contains any of them
    #[arg(value_name = "FILTERS", help_heading = None)]
    filters: Vec<String>,
}

/// Test runner options.
#[derive(Debug, Default, Args)]
#[command(next_help_heading = "RUNNER OPTIONS")]
struct TestRunnerOpts {
    /// Cancel the run on the first failure
    #[arg(long, overrides_with = "no_fail_fast")]
    fail_fast: bool,

    /// Run all test cases regardless of failure
    #[arg(long, overrides_with = "fail_fast")]
    no_fail_fast: bool,
}

impl TestRunnerOpts {
    fn fail_fast(&self) -> Option<bool> {
        if self.no_fail_fast {
            Some(false)
        } else if self.fail_fast {
            Some(true)
        } else {
            None
        }
    }
}

#[derive(Debug)]
struct BaseApp {
    config: HarnessConfig,
}

impl BaseApp {
    fn new(workspace_root: Option<Utf8PathBuf>, config_opts: &ConfigOpts) -> Result<Self> {
        let workspace_root = match workspace_root {
            Some(root) => absolutize(root)?,
            None => current_dir()?,
        };
        let config = config_opts.make_config(&workspace_root)?;

        Ok(Self { config })
    }

    fn build_test_list(&self, selection: &TestSelectionOpts) -> Result<TestList> {
        let test_dir = match &selection.test_dir {
            Some(test_dir) => absolutize(test_dir.clone())?,
            None => self.config.test_dir(),
        };

        let registry = TestCaseRegistry::new(&self.config);
        let test_cases = registry.discover(&test_dir)?;
        let filter = TestFilter::new(&selection.filters);

        Ok(TestList::new(test_cases, &filter))
    }

    fn exec_run(
        &self,
        profile_name: Option<&str>,
        selection: &TestSelectionOpts,
        runner_builder: TestRunnerBuilder,
        output: OutputContext,
        output_writer: &mut OutputWriter,
    ) -> Result<i32> {
        let profile = self
            .config
            .profile(profile_name.unwrap_or(HarnessConfig::DEFAULT_PROFILE))?;
        let test_list = self.build_test_list(selection)?;

        let mut reporter = TestReporterBuilder::default()
            .set_colorize(output.color.should_colorize(Stream::Stderr))
            .set_verbose(output.verbose)
            .build(&profile, output_writer.reporter_output());

        let runner = runner_builder.build(&test_list, &self.config, &profile);
        let run_stats = runner.try_execute(|event| reporter.report_event(event))?;

        if !run_stats.is_success() {
            return Err(ExpectedError::TestRunFailed);
        }
        if run_stats.initial_run_count == 0 {
            warn!("no test cases to run");
            return Ok(E2eExitCode::NO_TESTS_RUN);
        }
        Ok(E2eExitCode::OK)
    }
}

fn current_dir() -> Result<Utf8PathBuf> {
    let dir = std::env::current_dir().map_err(|error| ExpectedError::CurrentDirFailed { error })?;
    utf8_path(dir)
}

fn absolutize(path: Utf8PathBuf) -> Result<Utf8PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(current_dir()?.join(path))
    }
}

fn write_test_list(
    test_list: &TestList,
    colorize: bool,
    mut writer: impl Write,
) -> std::io::Result<()> {
    let (name_style, detail_style) = if colorize {
        (Style::new().bold(), Style::new().dimmed())
    } else {
        (Style::new(), Style::new())
    };

    for test_case in test_list.iter_matching() {
        let sources = test_case.sources();
        let file_count = sources.file_count();
        let entry = match sources.entry() {
            Some(entry) => entry.path().to_string(),
            None => "(none)".to_owned(),
        };
        let expectation = test_case.expectation();
        let channels = [
            expectation.return_code.map(|_| "exit code"),
            expectation.stdout.as_ref().map(|_| "stdout"),
        ];
        let channels = channels.into_iter().flatten().join(", ");

        writeln!(writer, "{}", test_case.name().style(name_style))?;
        let details = format!(
            "kind: {}, {file_count} {}, entry: {entry}",
            test_case.kind(),
            plural::files_str(file_count),
        );
        writeln!(writer, "    {}", details.style(detail_style))?;
        let expectations = format!(
            "expectations: {}",
            if channels.is_empty() { "none" } else { &channels }
        );
        writeln!(writer, "    {}", expectations.style(detail_style))?;
    }
    writer.flush()?;

    info!(
        "{} {} listed ({} skipped)",
        test_list.run_count(),
        plural::test_cases_str(test_list.run_count()),
        test_list.skip_count(),
    );
    Ok(())
}

fn write_report(
    report: &GradingReport,
    show_unparsed: bool,
    mut writer: impl Write,
) -> std::io::Result<()> {
    for entry in report.entries() {
        if let Some(record) = entry.record() {
            writeln!(writer, "{} {}", record.name, entry.expected_verdict())?;
        }
    }

    let unparsed: Vec<_> = report.unparsed_lines().collect();
    if !unparsed.is_empty() {
        warn!(
            "{} {} could not be parsed",
            unparsed.len(),
            plural::lines_str(unparsed.len()),
        );
        if show_unparsed {
            for line in &unparsed {
                writeln!(writer, "unparsed: {line}")?;
            }
        }
    }
    writer.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Color;
    use camino_tempfile::{Utf8TempDir, tempdir};
    use indoc::indoc;

    const OUTPUT: OutputContext = OutputContext {
        verbose: false,
        color: Color::Never,
    };

    fn test_output() -> OutputWriter {
        OutputWriter::Test {
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }

    fn stdout_of(writer: &OutputWriter) -> String {
        match writer {
            OutputWriter::Test { stdout, .. } => String::from_utf8_lossy(stdout).into_owned(),
            OutputWriter::Normal => panic!("expected test writer"),
        }
    }

    fn stderr_of(writer: &OutputWriter) -> String {
        match writer {
            OutputWriter::Test { stderr, .. } => String::from_utf8_lossy(stderr).into_owned(),
            OutputWriter::Normal => panic!("expected test writer"),
        }
    }

    fn workspace() -> Utf8TempDir {
        let dir = tempdir().unwrap();
        let test_dir = dir.path().join("tests/codegen");
        std::fs::create_dir_all(test_dir.join("Multi")).unwrap();
        std::fs::write(
            test_dir.join("Simple.java"),
            "public class Simple { public static int test() { return 123; } }",
        )
        .unwrap();
        std::fs::write(test_dir.join("Simple.ret"), "123\n").unwrap();
        std::fs::write(
            test_dir.join("Multi/Main.java"),
            "public class Main { public static int test() { return Helper.x(); } }",
        )
        .unwrap();
        std::fs::write(
            test_dir.join("Multi/Helper.java"),
            "public class Helper { public static int x() { return 1; } }",
        )
        .unwrap();
        dir
    }

    fn exec(dir: &Utf8TempDir, args: &[&str], writer: &mut OutputWriter) -> Result<i32> {
        let app = E2eHarnessApp::try_parse_from(
            ["e2e-harness", "--workspace-root", dir.path().as_str()]
                .into_iter()
                .chain(args.iter().copied()),
        )
        .unwrap();
        app.exec(OUTPUT, writer)
    }

    #[test]
    fn fail_fast_flags_override() {
        let app = E2eHarnessApp::try_parse_from(["e2e-harness", "run", "--fail-fast"]).unwrap();
        let Command::Run { runner_opts, .. } = app.command else {
            panic!("expected run");
        };
        assert_eq!(runner_opts.fail_fast(), Some(true));

        let app = E2eHarnessApp::try_parse_from([
            "e2e-harness",
            "run",
            "--fail-fast",
            "--no-fail-fast",
        ])
        .unwrap();
        let Command::Run { runner_opts, .. } = app.command else {
            panic!("expected run");
        };
        assert_eq!(runner_opts.fail_fast(), Some(false));
    }

    #[test]
    fn list_prints_test_cases() {
        let dir = workspace();
        let mut writer = test_output();
        let code = exec(&dir, &["list"], &mut writer).unwrap();
        assert_eq!(code, E2eExitCode::OK);

        let stdout = stdout_of(&writer);
        assert!(stdout.contains("Multi\n    kind: dir, 2 files, entry: "), "{stdout}");
        assert!(stdout.contains("Multi/Main.java"), "{stdout}");
        assert!(
            stdout.contains("Simple.java\n    kind: file, 1 file, entry: "),
            "{stdout}"
        );
        assert!(stdout.contains("expectations: exit code\n"), "{stdout}");
        assert!(stdout.contains("expectations: none\n"), "{stdout}");
    }

    #[test]
    fn list_applies_filters() {
        let dir = workspace();
        let mut writer = test_output();
        exec(&dir, &["list", "Simple"], &mut writer).unwrap();

        let stdout = stdout_of(&writer);
        assert!(stdout.contains("Simple.java"), "{stdout}");
        assert!(!stdout.contains("Multi"), "{stdout}");
    }

    #[test]
    fn run_with_nothing_selected() {
        let dir = workspace();
        let mut writer = test_output();
        let code = exec(&dir, &["run", "does-not-match"], &mut writer).unwrap();
        assert_eq!(code, E2eExitCode::NO_TESTS_RUN);

        let stderr = stderr_of(&writer);
        assert!(stderr.contains("0 test cases run: 0 passed"), "{stderr}");
    }

    #[test]
    fn missing_test_dir() {
        let dir = workspace();
        let mut writer = test_output();
        let error = exec(&dir, &["list", "--test-dir", "no/such/dir"], &mut writer).unwrap_err();
        assert_eq!(error.process_exit_code(), E2eExitCode::DISCOVERY_FAILED);
    }

    #[test]
    fn unknown_profile() {
        let dir = workspace();
        let mut writer = test_output();
        let error = exec(&dir, &["run", "-P", "nope"], &mut writer).unwrap_err();
        assert!(
            matches!(error, ExpectedError::ProfileNotFound { .. }),
            "{error:?}"
        );
        assert_eq!(error.process_exit_code(), E2eExitCode::SETUP_ERROR);
    }

    #[test]
    fn invalid_config() {
        let dir = workspace();
        std::fs::create_dir_all(dir.path().join(".config")).unwrap();
        std::fs::write(
            dir.path().join(".config/e2e.toml"),
            "[profile.default]\nfail-fast = \"sometimes\"\n",
        )
        .unwrap();
        let mut writer = test_output();
        let error = exec(&dir, &["list"], &mut writer).unwrap_err();
        assert_eq!(error.process_exit_code(), E2eExitCode::SETUP_ERROR);
    }

    #[test]
    fn report_prints_verdicts() {
        let dir = workspace();
        let report = dir.path().join("report.txt");
        std::fs::write(
            &report,
            indoc! {"
                Type No. Outcome Points Name Name Outcome Result
                public 1 FAILED 0 J1_ok J1_ok FAILED x
                Compiler reported error in correct program
                public 2 FAILED 0 Je_bad Je_bad FAILED x
                Compiler failed to detect error
                public 3 PASSED 1 J1_fine J1_fine PASSED ok
                garbage line
            "},
        )
        .unwrap();

        let mut writer = test_output();
        let code = exec(&dir, &["report", "--show-unparsed", report.as_str()], &mut writer).unwrap();
        assert_eq!(code, E2eExitCode::OK);
        assert_eq!(
            stdout_of(&writer),
            indoc! {"
                J1_ok pass
                Je_bad fail
                J1_fine ????
                unparsed: garbage line
            "}
        );
    }

    #[test]
    fn report_missing_file() {
        let dir = workspace();
        let mut writer = test_output();
        let error = exec(
            &dir,
            &["report", dir.path().join("missing.txt").as_str()],
            &mut writer,
        )
        .unwrap_err();
        assert_eq!(error.process_exit_code(), E2eExitCode::REPORT_READ_FAILED);
    }
}
