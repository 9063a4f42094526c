// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! An end-to-end test harness for compiler toolchains.
//!
//! `e2e-harness` compiles each test case with the compiler under test, assembles and links the
//! output, runs the resulting executable and checks its exit code and stdout. The core logic lives
//! in the `e2e-runner` crate; this crate is the command-line interface.

#![warn(missing_docs)]

mod dispatch;
mod errors;
mod output;

#[doc(hidden)]
pub use dispatch::*;
#[doc(hidden)]
pub use errors::*;
#[doc(hidden)]
pub use output::OutputWriter;
