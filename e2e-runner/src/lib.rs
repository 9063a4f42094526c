// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Core functionality for `e2e-harness`, an end-to-end harness for a compiler toolchain.
//!
//! Each test case is a source file or a directory of source files. The harness feeds a test case,
//! together with a shared support library, through an external compiler, assembler and linker,
//! runs the resulting executable and verifies its exit code and stdout against recorded
//! expectations.
//!
//! The basic flow is:
//!
//! 1. [`discovery::TestCaseRegistry`] builds a [`discovery::TestList`] from the test directory.
//! 2. [`runner::TestRunner`] drives each test case through the [`runner::Pipeline`] in turn,
//!    producing [`reporter::TestEvent`]s.
//! 3. [`reporter::TestReporter`] prints the events and optionally writes a JUnit report.
//!
//! [`grading`] is independent of the above: it parses grading reports produced by an external
//! marking system.

pub mod config;
pub mod discovery;
pub mod errors;
pub mod expectation;
pub mod grading;
pub mod helpers;
pub mod output_store;
pub mod reporter;
pub mod runner;
pub mod source_set;
pub mod test_filter;
mod time;
