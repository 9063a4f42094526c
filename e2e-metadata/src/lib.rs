// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

#![warn(missing_docs)]

//! Machine-readable metadata for `e2e-harness`.
//!
//! Currently this only documents the process exit codes, so that scripts wrapping the harness
//! can tell a failing test run apart from a broken setup.

mod exit_codes;

pub use exit_codes::*;
