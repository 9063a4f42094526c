// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Support code for the fake toolchain binaries used by the integration tests.

pub mod directives;
