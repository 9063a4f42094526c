// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The test runner.
//!
//! The main structure in this module is [`TestRunner`], which drives each test case through a
//! [`Pipeline`] in turn.

mod imp;
mod pipeline;
mod stage;
mod state;
mod verify;

pub use imp::*;
pub use pipeline::*;
pub use stage::*;
pub use state::*;
pub use verify::*;
