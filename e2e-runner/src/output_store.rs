// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-test-case output directories.
//!
//! Every test case owns one [`OutputStore`] at `<store-root>/<profile>/<name>`. The store holds
//! timestamped captures of process output along with the artifacts produced by the toolchain.

use crate::{errors::OutputStoreError, runner::Stage};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use std::io;
use tracing::debug;
use walkdir::WalkDir;

/// The strftime format used for capture file names. Captures have second-level resolution, so two
/// captures of the same stage within one second overwrite each other.
pub const CAPTURE_TIMESTAMP_FORMAT: &str = "%Y%m%d-%H%M%S";

/// A test case's output directory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutputStore {
    store_root: Utf8PathBuf,
    root: Utf8PathBuf,
}

/// The files a stage's captured output was written to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapturePaths {
    /// The stdout capture.
    pub stdout: Utf8PathBuf,

    /// The stderr capture.
    pub stderr: Utf8PathBuf,
}

impl OutputStore {
    /// Creates a new output store at `<store_root>/<profile>/<name>`. Nothing is created on disk
    /// until [`Self::ensure_dir`] or another operation is called.
    pub fn new(store_root: impl Into<Utf8PathBuf>, profile: &str, name: &str) -> Self {
        let store_root = store_root.into();
        let mut root = store_root.join(profile);
        root.push(name);
        Self { store_root, root }
    }

    /// Returns the root directory of this store.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Creates the store directory if it doesn't exist, returning its path.
    ///
    /// Calling this repeatedly is fine.
    pub fn ensure_dir(&self) -> Result<&Utf8Path, OutputStoreError> {
        std::fs::create_dir_all(&self.root).map_err(|error| OutputStoreError::CreateDir {
            dir: self.root.clone(),
            error,
        })?;
        Ok(&self.root)
    }

    /// Removes everything in the store, leaving an empty directory behind.
    pub fn reset(&self) -> Result<(), OutputStoreError> {
        match std::fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(error) if error.kind() == io::ErrorKind::NotFound => {}
            Err(error) => {
                return Err(OutputStoreError::Reset {
                    dir: self.root.clone(),
                    error,
                });
            }
        }
        self.ensure_dir()?;
        Ok(())
    }

    /// Writes a stage's captured output as `<stage>_<timestamp>_stdout` and
    /// `<stage>_<timestamp>_stderr`.
    pub fn write_captures(
        &self,
        stage: Stage,
        timestamp: DateTime<Local>,
        stdout: &[u8],
        stderr: &[u8],
    ) -> Result<CapturePaths, OutputStoreError> {
        let dir = self.ensure_dir()?;
        let prefix = format!("{stage}_{}", timestamp.format(CAPTURE_TIMESTAMP_FORMAT));

        let paths = CapturePaths {
            stdout: dir.join(format!("{prefix}_stdout")),
            stderr: dir.join(format!("{prefix}_stderr")),
        };
        for (path, contents) in [(&paths.stdout, stdout), (&paths.stderr, stderr)] {
            std::fs::write(path, contents).map_err(|error| OutputStoreError::WriteCapture {
                path: path.clone(),
                error,
            })?;
            debug!("output dumped to {path}");
        }

        Ok(paths)
    }

    /// Moves every file with the given extension under `from_dir` into this store, keeping paths
    /// relative to `from_dir`. Returns the new locations, sorted.
    ///
    /// Output stores that happen to live under `from_dir` are left alone, whichever profile they
    /// belong to.
    pub fn collect_artifacts(
        &self,
        from_dir: &Utf8Path,
        extension: &str,
    ) -> Result<Vec<Utf8PathBuf>, OutputStoreError> {
        let dir = self.ensure_dir()?;
        let mut moved = Vec::new();

        for from in self.find_artifacts(from_dir, extension)? {
            let relative = from.strip_prefix(from_dir).unwrap_or(&from);
            let to = dir.join(relative);
            move_file(&from, &to).map_err(|error| OutputStoreError::MoveArtifact {
                from: from.clone(),
                to: to.clone(),
                error,
            })?;
            debug!("moved artifact {from} to {to}");
            moved.push(to);
        }

        Ok(moved)
    }

    /// Removes every file with the given extension under `dir`, so that artifacts from an earlier
    /// test case can't be collected by a later one.
    pub fn remove_stale_artifacts(
        &self,
        dir: &Utf8Path,
        extension: &str,
    ) -> Result<usize, OutputStoreError> {
        let stale = self.find_artifacts(dir, extension)?;
        for path in &stale {
            std::fs::remove_file(path).map_err(|error| OutputStoreError::RemoveArtifact {
                path: path.clone(),
                error,
            })?;
            debug!("removed stale artifact {path}");
        }
        Ok(stale.len())
    }

    /// Recursively lists the files with the given extension in this store, sorted.
    pub fn artifacts(&self, extension: &str) -> Result<Vec<Utf8PathBuf>, OutputStoreError> {
        let dir = self.ensure_dir()?;
        walk_files(dir, extension, |_| true)
    }

    fn find_artifacts(
        &self,
        dir: &Utf8Path,
        extension: &str,
    ) -> Result<Vec<Utf8PathBuf>, OutputStoreError> {
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        walk_files(dir, extension, |path| path != self.store_root.as_path())
    }
}

fn walk_files(
    dir: &Utf8Path,
    extension: &str,
    mut descend: impl FnMut(&Utf8Path) -> bool,
) -> Result<Vec<Utf8PathBuf>, OutputStoreError> {
    let walker = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            !entry.file_type().is_dir()
                || Utf8Path::from_path(entry.path()).is_none_or(&mut descend)
        });

    let mut files = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|error| OutputStoreError::ListArtifacts {
            dir: dir.to_owned(),
            error,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Utf8PathBuf::try_from(entry.into_path()).map_err(|error| {
            OutputStoreError::NonUtf8Path {
                path: error.into_path_buf(),
            }
        })?;
        if path.extension() == Some(extension) {
            files.push(path);
        }
    }
    Ok(files)
}

fn move_file(from: &Utf8Path, to: &Utf8Path) -> io::Result<()> {
    if let Some(parent) = to.parent() {
        std::fs::create_dir_all(parent)?;
    }
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        // Renaming fails across file systems: fall back to copying.
        Err(_) => {
            std::fs::copy(from, to)?;
            std::fs::remove_file(from)
        }
    }
}
