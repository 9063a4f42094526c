// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A fake assembler.
//!
//! Invoked as `fake-assembler <flags...> <artifact>`. Copies the artifact to an object file next
//! to it, unless the artifact asks for an `assemble-exit`.

use camino::Utf8PathBuf;
use color_eyre::{Result, eyre::bail};
use fs_err as fs;
use integration_tests::directives::Directives;

fn main() -> Result<()> {
    color_eyre::install()?;

    let Some(source) = std::env::args().skip(1).last().map(Utf8PathBuf::from) else {
        bail!("fake-assembler: no input file");
    };

    let text = fs::read_to_string(&source)?;
    if let Some(code) = Directives::parse(&text).assemble_exit {
        eprintln!("fake-assembler: {source}: error: bad instruction");
        std::process::exit(code);
    }

    fs::write(source.with_extension("o"), text)?;
    Ok(())
}
