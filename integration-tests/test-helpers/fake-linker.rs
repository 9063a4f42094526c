// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A fake linker.
//!
//! Invoked as `fake-linker <flags...> -o <executable> <objects...>`. Merges the directives of all
//! objects into a shell script, unless one of them asks for a `link-exit`.

use camino::Utf8PathBuf;
use color_eyre::{Result, eyre::bail};
use fs_err as fs;
use integration_tests::directives::Directives;

fn main() -> Result<()> {
    color_eyre::install()?;

    let mut executable = None;
    let mut objects = Vec::new();
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "-o" {
            executable = args.next().map(Utf8PathBuf::from);
        } else if !arg.starts_with('-') {
            objects.push(Utf8PathBuf::from(arg));
        }
    }
    let Some(executable) = executable else {
        bail!("fake-linker: no output file specified");
    };

    let mut directives = Directives::default();
    for object in &objects {
        directives.merge(Directives::parse(&fs::read_to_string(object)?));
    }
    if let Some(code) = directives.link_exit {
        eprintln!("fake-linker: undefined reference to `test`");
        std::process::exit(code);
    }

    fs::write(&executable, directives.to_script())?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&executable, std::fs::Permissions::from_mode(0o755))?;
    }
    Ok(())
}
