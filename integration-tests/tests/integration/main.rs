// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Integration tests
//!
//! These tests run the real pipeline against the fake toolchain binaries in `test-helpers/`. The
//! CLI is exercised through `e2e-harness-dup`, a copy of e2e-harness's main.rs built as part of this
//! crate, since `CARGO_BIN_EXE_*` is only available for binaries of the same package.
//!
//! The fake linker produces shell scripts, so these tests only run on Unix.

#![cfg(unix)]

use e2e_metadata::E2eExitCode;
use e2e_runner::{
    expectation::Expectation,
    runner::{FailureReason, PipelineMode, PipelineOutcome, Stage, TestState},
};
use fixtures::*;
use fs_err as fs;
use indoc::indoc;
use pretty_assertions::assert_eq;
use temp_workspace::TempWorkspace;

mod fixtures;
mod temp_workspace;

fn stages(run: &e2e_runner::runner::PipelineRun) -> Vec<Stage> {
    run.stages.iter().map(|result| result.stage).collect()
}

#[test]
fn test_pipeline_outcomes() {
    let workspace = TempWorkspace::new().unwrap();
    workspace
        .add_file_test(
            "Pass.java",
            &entry_source(&["exit 7", "stdout hello"]),
            Some("7\n"),
            Some("hello\n"),
        )
        .unwrap();
    workspace
        .add_file_test(
            "WrongCode.java",
            &entry_source(&["exit 1"]),
            Some("2"),
            None,
        )
        .unwrap();
    workspace
        .add_file_test(
            "CompileError.java",
            &entry_source(&["compile-exit 1"]),
            None,
            None,
        )
        .unwrap();
    workspace
        .add_file_test(
            "J1e_Rejected.java",
            &entry_source(&["compile-exit 42"]),
            None,
            None,
        )
        .unwrap();
    workspace
        .add_file_test("J1e_Accepted.java", &entry_source(&[]), None, None)
        .unwrap();
    workspace
        .add_file_test(
            "BadAsm.java",
            &entry_source(&["assemble-exit 3"]),
            Some("0"),
            None,
        )
        .unwrap();
    workspace
        .add_file_test(
            "BadLink.java",
            &entry_source(&["link-exit 1"]),
            Some("0"),
            None,
        )
        .unwrap();
    workspace
        .add_file_test("NoExpect.java", &entry_source(&["exit 3"]), None, None)
        .unwrap();
    workspace
        .add_dir_test(
            "Multi",
            &[
                ("Helper.java", &helper_source(&["exit 5"])),
                ("Main.java", &entry_source(&[])),
            ],
        )
        .unwrap();

    let result = run_workspace(&workspace, PipelineMode::Verify);

    let pass = result.get("Pass.java");
    assert!(
        matches!(pass.outcome, PipelineOutcome::Passed),
        "{:?}",
        pass.outcome
    );
    assert_eq!(pass.state, TestState::Passed);
    assert_eq!(
        stages(pass),
        [Stage::Compile, Stage::Assemble, Stage::Link, Stage::Run]
    );
    assert_eq!(pass.store_dir, workspace.store_dir("default", "Pass"));
    assert!(
        pass.store_dir.join("main").is_file(),
        "executable produced in the output store"
    );

    let wrong_code = result.get("WrongCode.java");
    match &wrong_code.outcome {
        PipelineOutcome::Failed(FailureReason::Verify(failure)) => {
            let mismatch = failure.return_code.as_ref().expect("return code mismatch");
            assert_eq!(mismatch.expected, 2);
            assert_eq!(mismatch.actual, Some(1));
            assert!(failure.stdout.is_none(), "stdout isn't checked");
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(wrong_code.state, TestState::Failed);

    // A compile mismatch short-circuits the remaining stages.
    let compile_error = result.get("CompileError.java");
    assert!(
        matches!(
            compile_error.outcome,
            PipelineOutcome::Failed(FailureReason::CompileMismatch {
                expected: 0,
                actual: Some(1),
            })
        ),
        "{:?}",
        compile_error.outcome
    );
    assert_eq!(compile_error.state, TestState::Failed);
    assert_eq!(stages(compile_error), [Stage::Compile]);
    assert!(
        !compile_error.store_dir.join("main").exists(),
        "nothing was linked"
    );
    let captured: Vec<_> = compile_error
        .captures
        .iter()
        .flat_map(|(_, paths)| [paths.stdout.clone(), paths.stderr.clone()])
        .collect();
    assert_eq!(captured.len(), 2, "compile stdout and stderr captured");
    let stderr = fs::read_to_string(&captured[1]).unwrap();
    assert!(stderr.contains("rejecting"), "{stderr}");

    // Reject tests pass when the compiler rejects them with the reject status.
    let rejected = result.get("J1e_Rejected.java");
    assert!(
        matches!(rejected.outcome, PipelineOutcome::Passed),
        "{:?}",
        rejected.outcome
    );
    assert_eq!(stages(rejected), [Stage::Compile]);

    let accepted = result.get("J1e_Accepted.java");
    assert!(
        matches!(
            accepted.outcome,
            PipelineOutcome::Failed(FailureReason::CompileMismatch {
                expected: 42,
                actual: Some(0),
            })
        ),
        "{:?}",
        accepted.outcome
    );

    let bad_asm = result.get("BadAsm.java");
    match &bad_asm.outcome {
        PipelineOutcome::Failed(FailureReason::ToolchainFailure {
            stage,
            artifact,
            exit_code,
        }) => {
            assert_eq!(*stage, Stage::Assemble);
            assert_eq!(
                artifact.as_deref(),
                Some(workspace.store_dir("default", "BadAsm").join("BadAsm.s").as_path())
            );
            assert_eq!(*exit_code, Some(3));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(stages(bad_asm), [Stage::Compile, Stage::Assemble]);

    let bad_link = result.get("BadLink.java");
    assert!(
        matches!(
            bad_link.outcome,
            PipelineOutcome::Failed(FailureReason::ToolchainFailure {
                stage: Stage::Link,
                artifact: None,
                exit_code: Some(1),
            })
        ),
        "{:?}",
        bad_link.outcome
    );
    assert_eq!(
        stages(bad_link),
        [Stage::Compile, Stage::Assemble, Stage::Link]
    );

    let no_expect = result.get("NoExpect.java");
    assert!(
        matches!(no_expect.outcome, PipelineOutcome::NoCheck),
        "{:?}",
        no_expect.outcome
    );

    // Every file of a directory test case is compiled, assembled and linked together.
    let multi = result.get("Multi");
    assert!(
        matches!(multi.outcome, PipelineOutcome::NoCheck),
        "{:?}",
        multi.outcome
    );
    assert_eq!(
        stages(multi),
        [
            Stage::Compile,
            Stage::Assemble,
            Stage::Assemble,
            Stage::Link,
            Stage::Run
        ]
    );
    assert_eq!(multi.stages[4].exit_code, Some(5));

    let stats = result.run_stats;
    assert_eq!(stats.initial_run_count, 9);
    assert_eq!(stats.finished_count, 9);
    assert_eq!(stats.passed, 2);
    assert_eq!(stats.failed, 5);
    assert_eq!(stats.no_check, 2);
    assert!(!stats.is_success());
}

#[test]
fn test_support_library_is_linked() {
    let workspace = TempWorkspace::new().unwrap();
    workspace
        .add_support_file("Runtime.java", "// fake: stdout from runtime\n")
        .unwrap();
    workspace
        .add_file_test(
            "Hello.java",
            &entry_source(&["stdout hello"]),
            Some("0"),
            Some("hello\nfrom runtime"),
        )
        .unwrap();

    let result = run_workspace(&workspace, PipelineMode::Verify);
    let hello = result.get("Hello.java");
    assert!(
        matches!(hello.outcome, PipelineOutcome::Passed),
        "{:?}",
        hello.outcome
    );
    let compile = &hello.stages[0];
    assert!(
        compile.args.last().is_some_and(|arg| arg.ends_with("Runtime.java")),
        "support library passed after the test case's files: {:?}",
        compile.args
    );
}

#[test]
fn test_bless_records_expectations() {
    let workspace = TempWorkspace::new().unwrap();
    let fresh = workspace
        .add_file_test(
            "Fresh.java",
            &entry_source(&["exit 3", "stdout recorded output"]),
            None,
            None,
        )
        .unwrap();
    let broken = workspace
        .add_file_test(
            "Broken.java",
            &entry_source(&["compile-exit 1"]),
            None,
            None,
        )
        .unwrap();
    workspace
        .add_dir_test("Multi", &[("Main.java", &entry_source(&[]))])
        .unwrap();

    let result = run_workspace(&workspace, PipelineMode::Record);
    let recorded = result.get("Fresh.java");
    match &recorded.outcome {
        PipelineOutcome::Recorded(expectation) => assert_eq!(
            expectation,
            &Expectation {
                return_code: Some(3),
                stdout: Some("recorded output".to_owned()),
            }
        ),
        other => panic!("unexpected outcome: {other:?}"),
    }
    assert_eq!(
        fs::read_to_string(fresh.with_extension("ret")).unwrap(),
        "3"
    );
    assert_eq!(
        fs::read_to_string(fresh.with_extension("out")).unwrap(),
        "recorded output\n"
    );

    assert!(result.get("Broken.java").outcome.is_failure());
    assert!(
        !broken.with_extension("ret").exists(),
        "nothing recorded for a failing test case"
    );

    assert_eq!(result.skipped, ["Multi"]);
    assert_eq!(result.run_stats.recorded, 1);
    assert_eq!(result.run_stats.failed, 1);
    assert_eq!(result.run_stats.initial_run_count, 2);

    // The recorded expectations now verify.
    let result = run_workspace(&workspace, PipelineMode::Verify);
    assert!(
        matches!(result.get("Fresh.java").outcome, PipelineOutcome::Passed),
        "{:?}",
        result.get("Fresh.java").outcome
    );
}

#[test]
fn test_cli_run() {
    let workspace = TempWorkspace::new().unwrap();
    workspace
        .add_file_test(
            "Pass.java",
            &entry_source(&["exit 7", "stdout hello"]),
            Some("7"),
            Some("hello"),
        )
        .unwrap();

    let output = E2eHarnessCli::new(&workspace).args(["run"]).output();
    let stderr = output.stderr_as_str();
    assert!(stderr.contains("Starting 1 test case"), "{output}");
    assert!(stderr.contains("PASS ["), "{output}");
    assert!(stderr.contains("1 test case run: 1 passed"), "{output}");

    let junit = fs::read_to_string(workspace.root().join("target/e2e/default/junit.xml")).unwrap();
    assert!(junit.contains(r#"<testcase name="Pass.java""#), "{junit}");

    workspace
        .add_file_test(
            "Fail.java",
            &entry_source(&["exit 1", "stdout goodbye"]),
            Some("1"),
            Some("hello"),
        )
        .unwrap();
    let output = E2eHarnessCli::new(&workspace)
        .args(["run"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(E2eExitCode::TEST_RUN_FAILED),
        "{output}"
    );
    let stderr = output.stderr_as_str();
    assert!(stderr.contains("FAIL ["), "{output}");
    assert!(stderr.contains("EXPECTED STDOUT"), "{output}");
    assert!(stderr.contains("goodbye"), "{output}");
}

#[test]
fn test_cli_fail_fast_profile() {
    let workspace = TempWorkspace::new().unwrap();
    workspace
        .add_file_test("A_Broken.java", &entry_source(&["compile-exit 1"]), None, None)
        .unwrap();
    workspace
        .add_file_test("B_Fine.java", &entry_source(&[]), Some("0"), None)
        .unwrap();

    let output = E2eHarnessCli::new(&workspace)
        .args(["run", "-P", "ci"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(E2eExitCode::TEST_RUN_FAILED),
        "{output}"
    );
    let stderr = output.stderr_as_str();
    assert!(stderr.contains("Canceling due to test failure"), "{output}");
    assert!(!stderr.contains("PASS"), "{output}");

    // --no-fail-fast overrides the profile.
    let output = E2eHarnessCli::new(&workspace)
        .args(["run", "-P", "ci", "--no-fail-fast"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(E2eExitCode::TEST_RUN_FAILED),
        "{output}"
    );
    assert!(output.stderr_as_str().contains("PASS"), "{output}");
}

#[test]
fn test_cli_bless() {
    let workspace = TempWorkspace::new().unwrap();
    let path = workspace
        .add_file_test("Fresh.java", &entry_source(&["exit 9"]), None, None)
        .unwrap();

    let output = E2eHarnessCli::new(&workspace).args(["bless"]).output();
    assert!(output.stderr_as_str().contains("Recording 1 test case"), "{output}");
    assert_eq!(fs::read_to_string(path.with_extension("ret")).unwrap(), "9");

    E2eHarnessCli::new(&workspace).args(["run"]).output();
}

#[test]
fn test_cli_list() {
    let workspace = TempWorkspace::new().unwrap();
    workspace
        .add_file_test("Pass.java", &entry_source(&[]), Some("0"), Some(""))
        .unwrap();

    let output = E2eHarnessCli::new(&workspace).args(["list"]).output();
    let stdout = output.stdout_as_str();
    assert!(stdout.starts_with("Pass.java\n"), "{output}");
    assert!(stdout.contains("expectations: exit code, stdout"), "{output}");
}

#[test]
fn test_cli_setup_errors() {
    let workspace = TempWorkspace::new().unwrap();

    let output = E2eHarnessCli::new(&workspace)
        .args(["run", "-P", "missing"])
        .unchecked(true)
        .output();
    assert_eq!(output.exit_code(), Some(E2eExitCode::SETUP_ERROR), "{output}");
    assert!(
        output.stderr_as_str().contains("profile `missing` not found"),
        "{output}"
    );

    let output = E2eHarnessCli::new(&workspace)
        .args(["run", "--test-dir", workspace.root().join("nope").as_str()])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(E2eExitCode::DISCOVERY_FAILED),
        "{output}"
    );

    let output = E2eHarnessCli::new(&workspace)
        .args(["run"])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(E2eExitCode::NO_TESTS_RUN),
        "{output}"
    );
}

#[test]
fn test_cli_report() {
    let workspace = TempWorkspace::new().unwrap();
    let report = workspace.root().join("report.txt");
    fs::write(
        &report,
        indoc! {"
            Compiler Test Results

            public 1 FAILED 0 J1_correct J1_correct FAILED -
            Compiler reported error in correct program
            secret 2 FAILED 0 Je_wrong Je_wrong FAILED -
            Compiler failed to detect error
            public 3 PASSED 1 J1_fine J1_fine PASSED ok
            truncated line
        "},
    )
    .unwrap();

    let output = E2eHarnessCli::new(&workspace)
        .args(["report", report.as_str()])
        .output();
    assert_eq!(
        output.stdout_as_str(),
        "J1_correct pass\nJe_wrong fail\nJ1_fine ????\n"
    );
    assert!(
        output.stderr_as_str().contains("1 line could not be parsed"),
        "{output}"
    );

    let output = E2eHarnessCli::new(&workspace)
        .args(["report", workspace.root().join("missing.txt").as_str()])
        .unchecked(true)
        .output();
    assert_eq!(
        output.exit_code(),
        Some(E2eExitCode::REPORT_READ_FAILED),
        "{output}"
    );
}
