// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A duplicate of e2e-harness's main.rs, so the integration tests can run the CLI through
//! `CARGO_BIN_EXE_e2e-harness-dup`.

use clap::Parser;
use color_eyre::Result;
use e2e_harness::{E2eHarnessApp, OutputWriter};

fn main() -> Result<()> {
    color_eyre::install()?;

    let opts = E2eHarnessApp::parse();
    let output = opts.init_output();

    match opts.exec(output, &mut OutputWriter::default()) {
        Ok(code) => std::process::exit(code),
        Err(error) => {
            error.display_to_stderr();
            std::process::exit(error.process_exit_code())
        }
    }
}
