// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A fake compiler.
//!
//! Invoked as `fake-compiler <entry> <files...>`. Writes one `<stem>.s` artifact per input file
//! into `output/`, holding that file's directive lines, unless the entry file asks for a
//! `compile-exit`.

use camino::Utf8PathBuf;
use color_eyre::{Result, eyre::bail};
use fs_err as fs;
use integration_tests::directives::{COMPILER_OUTPUT_DIR, Directives, extract_directives};

fn main() -> Result<()> {
    color_eyre::install()?;

    let files: Vec<Utf8PathBuf> = std::env::args().skip(1).map(Utf8PathBuf::from).collect();
    let Some(entry) = files.first() else {
        bail!("fake-compiler: no input files");
    };

    let directives = Directives::parse(&fs::read_to_string(entry)?);
    if let Some(code) = directives.compile_exit {
        println!("fake-compiler: checking {entry}");
        eprintln!("fake-compiler: rejecting {entry} with exit code {code}");
        std::process::exit(code);
    }

    fs::create_dir_all(COMPILER_OUTPUT_DIR)?;
    for file in &files {
        let Some(stem) = file.file_stem() else {
            bail!("fake-compiler: `{file}` has no file name");
        };
        let text = fs::read_to_string(file)?;
        let artifact = Utf8PathBuf::from(COMPILER_OUTPUT_DIR).join(format!("{stem}.s"));
        fs::write(&artifact, extract_directives(&text))?;
    }
    println!("fake-compiler: compiled {} files", files.len());

    Ok(())
}
