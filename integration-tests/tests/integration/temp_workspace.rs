// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use camino::{Utf8Path, Utf8PathBuf};
use camino_tempfile::Utf8TempDir;
use color_eyre::Result;
use fs_err as fs;

/// A workspace whose toolchain is the fake compiler, assembler and linker.
pub struct TempWorkspace {
    temp_dir: Utf8TempDir,
}

impl TempWorkspace {
    pub fn new() -> Result<Self> {
        let temp_dir = camino_tempfile::Builder::new()
            .prefix("e2e-harness-")
            .tempdir()?;
        let workspace = Self { temp_dir };

        fs::create_dir_all(workspace.test_dir())?;
        fs::create_dir_all(workspace.root().join(".config"))?;
        fs::write(
            workspace.root().join(".config/e2e.toml"),
            format!(
                r#"
[toolchain]
compiler = '{}'
assembler = '{}'
linker = '{}'

[profile.default.junit]
path = "junit.xml"

[profile.ci]
fail-fast = true
"#,
                env!("CARGO_BIN_EXE_fake-compiler"),
                env!("CARGO_BIN_EXE_fake-assembler"),
                env!("CARGO_BIN_EXE_fake-linker"),
            ),
        )?;

        Ok(workspace)
    }

    pub fn root(&self) -> &Utf8Path {
        self.temp_dir.path()
    }

    pub fn test_dir(&self) -> Utf8PathBuf {
        self.root().join("tests/codegen")
    }

    pub fn support_lib_dir(&self) -> Utf8PathBuf {
        self.root().join("tests/stdlib")
    }

    /// Returns the output store of a test case under the given profile.
    pub fn store_dir(&self, profile: &str, store_name: &str) -> Utf8PathBuf {
        self.root().join("target/e2e").join(profile).join(store_name)
    }

    /// Adds a single-file test case, with optional expectation side files.
    pub fn add_file_test(
        &self,
        file_name: &str,
        source: &str,
        return_code: Option<&str>,
        stdout: Option<&str>,
    ) -> Result<Utf8PathBuf> {
        let path = self.test_dir().join(file_name);
        fs::write(&path, source)?;
        if let Some(return_code) = return_code {
            fs::write(path.with_extension("ret"), return_code)?;
        }
        if let Some(stdout) = stdout {
            fs::write(path.with_extension("out"), stdout)?;
        }
        Ok(path)
    }

    /// Adds a directory test case.
    pub fn add_dir_test(&self, dir_name: &str, files: &[(&str, &str)]) -> Result<Utf8PathBuf> {
        let dir = self.test_dir().join(dir_name);
        fs::create_dir_all(&dir)?;
        for (file_name, source) in files {
            fs::write(dir.join(file_name), source)?;
        }
        Ok(dir)
    }

    /// Adds a file to the support library.
    pub fn add_support_file(&self, file_name: &str, source: &str) -> Result<()> {
        let dir = self.support_lib_dir();
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(file_name), source)?;
        Ok(())
    }
}
