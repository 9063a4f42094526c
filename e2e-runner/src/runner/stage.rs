// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::time::stopwatch;
use bytes::Bytes;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use std::{fmt, io, thread, time::Duration};
use tracing::debug;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// A stage of the pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Stage {
    /// The compiler turns the test case's sources into assembly.
    Compile,

    /// The assembler turns each assembly artifact into an object file.
    Assemble,

    /// The linker turns the object files into an executable.
    Link,

    /// The executable is run.
    Run,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Compile => write!(f, "compile"),
            Stage::Assemble => write!(f, "assemble"),
            Stage::Link => write!(f, "link"),
            Stage::Run => write!(f, "run"),
        }
    }
}

/// The result of one external invocation.
///
/// Every compiler, assembler, linker and executable invocation produces one of these, so the
/// pipeline inspects all of them the same way.
#[derive(Clone, Debug)]
pub struct StageResult {
    /// The stage this invocation belongs to.
    pub stage: Stage,

    /// The program that was run.
    pub program: String,

    /// The arguments passed to the program.
    pub args: Vec<String>,

    /// The exit code, or `None` if the process was terminated by a signal or killed after a
    /// timeout.
    pub exit_code: Option<i32>,

    /// True if the process was killed because it exceeded the stage timeout.
    pub timed_out: bool,

    /// Captured standard output.
    pub stdout: Bytes,

    /// Captured standard error.
    pub stderr: Bytes,

    /// Artifacts this invocation produced or moved into the output store. Filled in by the
    /// pipeline.
    pub artifacts: Vec<Utf8PathBuf>,

    /// The time at which the process was started.
    pub start_time: DateTime<Local>,

    /// How long the process took to run.
    pub time_taken: Duration,
}

impl StageResult {
    /// Returns true if the process exited with code 0.
    pub fn is_success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Returns the command line, quoted for a POSIX shell.
    pub fn command_line(&self) -> String {
        command_line(&self.program, &self.args)
    }
}

/// A single invocation of an external program.
#[derive(Clone, Debug)]
pub struct ToolInvocation {
    stage: Stage,
    program: String,
    args: Vec<String>,
    cwd: Utf8PathBuf,
    timeout: Option<Duration>,
}

impl ToolInvocation {
    /// Creates a new invocation of `program`, run from `cwd`.
    pub fn new(stage: Stage, program: impl Into<String>, cwd: &Utf8Path) -> Self {
        Self {
            stage,
            program: program.into(),
            args: Vec::new(),
            cwd: cwd.to_owned(),
            timeout: None,
        }
    }

    /// Appends arguments.
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Kills the process if it runs for longer than `timeout`.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Runs the program to completion, capturing its output.
    ///
    /// A non-zero exit is not an error. An error is returned only if the process couldn't be
    /// spawned or waited on.
    pub fn run(self) -> io::Result<StageResult> {
        debug!("{}: {}", self.stage, command_line(&self.program, &self.args));

        let expression = duct::cmd(self.program.as_str(), &self.args)
            .dir(self.cwd.as_std_path())
            .before_spawn(os::set_process_group)
            // Capture stdout and stderr.
            .stdout_capture()
            .stderr_capture()
            .unchecked();

        let stopwatch = stopwatch();
        let handle = expression.start()?;

        let (output, timed_out) = match self.timeout {
            None => (Some(handle.into_output()?), false),
            Some(timeout) => loop {
                if handle.try_wait()?.is_some() {
                    break (Some(handle.into_output()?), false);
                }
                if stopwatch.elapsed() >= timeout {
                    // Wrapper scripts leave children holding the output pipes, so the whole group
                    // has to go before the output can be collected.
                    for pid in handle.pids() {
                        os::kill_process_group(pid);
                    }
                    if let Err(error) = handle.kill() {
                        debug!("{}: failed to kill {}: {error}", self.stage, self.program);
                    }
                    // Keep whatever was captured before the kill, if it can be collected.
                    break (handle.into_output().ok(), true);
                }
                thread::sleep(POLL_INTERVAL);
            },
        };
        let end = stopwatch.end();

        let (exit_code, stdout, stderr) = match output {
            Some(output) if !timed_out => (output.status.code(), output.stdout, output.stderr),
            Some(output) => (None, output.stdout, output.stderr),
            None => (None, Vec::new(), Vec::new()),
        };
        debug!(
            "{}: {} exited with {:?} in {:.3}s",
            self.stage,
            self.program,
            exit_code,
            end.duration.as_secs_f64()
        );

        Ok(StageResult {
            stage: self.stage,
            program: self.program,
            args: self.args,
            exit_code,
            timed_out,
            stdout: Bytes::from(stdout),
            stderr: Bytes::from(stderr),
            artifacts: Vec::new(),
            start_time: end.start_time,
            time_taken: end.duration,
        })
    }
}

fn command_line(program: &str, args: &[String]) -> String {
    shell_words::join(std::iter::once(program).chain(args.iter().map(|arg| arg.as_str())))
}

#[cfg(unix)]
mod os {
    use std::{io, os::unix::process::CommandExt, process::Command};

    /// Makes the process the leader of a new process group.
    pub(super) fn set_process_group(cmd: &mut Command) -> io::Result<()> {
        cmd.process_group(0);
        Ok(())
    }

    /// Sends SIGKILL to the process group led by `pid`.
    pub(super) fn kill_process_group(pid: u32) {
        unsafe {
            libc::kill(-(pid as libc::pid_t), libc::SIGKILL);
        }
    }
}

#[cfg(not(unix))]
mod os {
    use std::{io, process::Command};

    pub(super) fn set_process_group(_cmd: &mut Command) -> io::Result<()> {
        Ok(())
    }

    // Only the direct child is killed here.
    pub(super) fn kill_process_group(_pid: u32) {}
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use camino_tempfile::tempdir;
    use pretty_assertions::assert_eq;

    #[test]
    fn captures_output_and_exit_code() {
        let dir = tempdir().unwrap();
        let result = ToolInvocation::new(Stage::Run, "sh", dir.path())
            .args(["-c", "echo out; echo err >&2; pwd; exit 3"])
            .run()
            .unwrap();

        assert_eq!(result.exit_code, Some(3));
        assert!(!result.timed_out);
        assert!(!result.is_success());
        let stdout = String::from_utf8_lossy(&result.stdout);
        let mut lines = stdout.lines();
        assert_eq!(lines.next(), Some("out"));
        let cwd = lines.next().expect("pwd printed");
        assert!(
            cwd.ends_with(dir.path().file_name().unwrap()),
            "process runs from the given directory (got {cwd})"
        );
        assert_eq!(&result.stderr[..], b"err\n");
        assert_eq!(result.command_line(), "sh -c 'echo out; echo err >&2; pwd; exit 3'");
    }

    #[test]
    fn timeout_kills_process() {
        let dir = tempdir().unwrap();
        let result = ToolInvocation::new(Stage::Compile, "sleep", dir.path())
            .args(["5"])
            .timeout(Some(Duration::from_millis(100)))
            .run()
            .unwrap();

        assert!(result.timed_out);
        assert_eq!(result.exit_code, None);
        assert!(result.time_taken < Duration::from_secs(5));
    }

    #[test]
    fn timeout_kills_wrapped_children() {
        let dir = tempdir().unwrap();
        let start = std::time::Instant::now();
        // The shell forks sleep, which inherits the output pipes.
        let result = ToolInvocation::new(Stage::Compile, "sh", dir.path())
            .args(["-c", "sleep 4; true"])
            .timeout(Some(Duration::from_millis(200)))
            .run()
            .unwrap();
        let wall = start.elapsed();

        assert!(result.timed_out);
        assert_eq!(result.exit_code, None);
        assert!(wall < Duration::from_secs(2), "run returned after {wall:?}");
    }

    #[test]
    fn missing_program_is_an_error() {
        let dir = tempdir().unwrap();
        ToolInvocation::new(Stage::Link, "/nonexistent/e2e-linker", dir.path())
            .run()
            .expect_err("spawning a missing program fails");
    }
}
