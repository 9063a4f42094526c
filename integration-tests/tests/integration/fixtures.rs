// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::temp_workspace::TempWorkspace;
use camino::Utf8PathBuf;
use e2e_runner::{
    config::HarnessConfig,
    discovery::{TestCaseRegistry, TestList},
    reporter::TestEvent,
    runner::{PipelineMode, PipelineRun, RunStats, TestRunnerBuilder},
    test_filter::TestFilter,
};
use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt,
    process::{Command, ExitStatus},
};

/// Returns the source of an entry file carrying the given `// fake:` directives.
pub fn entry_source(directives: &[&str]) -> String {
    let mut source = String::from("public class Main {\n    public static int test() { return 0; }\n");
    for directive in directives {
        source.push_str("    // fake: ");
        source.push_str(directive);
        source.push('\n');
    }
    source.push_str("}\n");
    source
}

/// Returns the source of a non-entry file carrying the given `// fake:` directives.
pub fn helper_source(directives: &[&str]) -> String {
    let mut source = String::from("public class Helper {\n");
    for directive in directives {
        source.push_str("    // fake: ");
        source.push_str(directive);
        source.push('\n');
    }
    source.push_str("}\n");
    source
}

/// The result of running a workspace through the library API.
pub struct WorkspaceRun {
    pub run_stats: RunStats,
    pub runs: BTreeMap<String, PipelineRun>,
    pub skipped: Vec<String>,
}

impl WorkspaceRun {
    #[track_caller]
    pub fn get(&self, name: &str) -> &PipelineRun {
        self.runs
            .get(name)
            .unwrap_or_else(|| panic!("no run recorded for {name}: {:?}", self.runs.keys()))
    }
}

pub fn run_workspace(workspace: &TempWorkspace, mode: PipelineMode) -> WorkspaceRun {
    let config = HarnessConfig::from_sources(workspace.root(), None).expect("config is valid");
    let profile = config
        .profile(HarnessConfig::DEFAULT_PROFILE)
        .expect("default profile exists");
    let test_cases = TestCaseRegistry::new(&config)
        .discover(&config.test_dir())
        .expect("test cases discovered");
    let test_list = TestList::new(test_cases, &TestFilter::any());

    let mut builder = TestRunnerBuilder::default();
    builder.set_mode(mode);
    let runner = builder.build(&test_list, &config, &profile);

    let mut runs = BTreeMap::new();
    let mut skipped = Vec::new();
    let run_stats = runner.execute(|event| match event {
        TestEvent::TestFinished { test_case, run } => {
            runs.insert(test_case.name().to_owned(), run);
        }
        TestEvent::TestSkipped { test_case, .. } => {
            skipped.push(test_case.name().to_owned());
        }
        _ => {}
    });

    WorkspaceRun {
        run_stats,
        runs,
        skipped,
    }
}

/// Runs the `e2e-harness` CLI.
#[derive(Clone, Debug)]
pub struct E2eHarnessCli {
    bin: Utf8PathBuf,
    args: Vec<String>,
    unchecked: bool,
}

impl E2eHarnessCli {
    pub fn new(workspace: &TempWorkspace) -> Self {
        Self {
            bin: env!("CARGO_BIN_EXE_e2e-harness-dup").into(),
            args: vec![
                "--workspace-root".to_owned(),
                workspace.root().to_string(),
                "--color".to_owned(),
                "never".to_owned(),
            ],
            unchecked: false,
        }
    }

    pub fn args(&mut self, args: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn unchecked(&mut self, unchecked: bool) -> &mut Self {
        self.unchecked = unchecked;
        self
    }

    pub fn output(&self) -> E2eHarnessOutput {
        let mut command = Command::new(&self.bin);
        command
            .args(&self.args)
            .env_remove("E2E_LOG")
            .env_remove("E2E_PROFILE")
            .env_remove("E2E_VERBOSE")
            .env_remove("E2E_WORKSPACE_ROOT");
        let output = command.output().expect("failed to execute");

        let ret = E2eHarnessOutput {
            command,
            exit_status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        };

        if !self.unchecked && !output.status.success() {
            panic!("command failed:\n\n{ret}");
        }

        ret
    }
}

pub struct E2eHarnessOutput {
    pub command: Command,
    pub exit_status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl E2eHarnessOutput {
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_status.code()
    }

    pub fn stdout_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stdout)
    }

    pub fn stderr_as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.stderr)
    }
}

impl fmt::Display for E2eHarnessOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "command: {:?}\nexit code: {:?}\n\
                   --- stdout ---\n{}\n\n--- stderr ---\n{}\n\n",
            self.command,
            self.exit_status.code(),
            String::from_utf8_lossy(&self.stdout),
            String::from_utf8_lossy(&self.stderr)
        )
    }
}

// Make Debug output the same as Display output, so `.unwrap()` and `.expect()` are nicer.
impl fmt::Debug for E2eHarnessOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
