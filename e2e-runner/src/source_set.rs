// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Source files belonging to a test case, ordered entry file first.
//!
//! The main structure in this module is [`SourceSet`].

use crate::errors::SourceLoadError;
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use std::fmt;
use tracing::warn;

/// A source file read from disk. Immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SourceFile {
    path: Utf8PathBuf,
    content: String,
}

impl SourceFile {
    /// Creates a new source file from a path and its contents.
    pub fn new(path: impl Into<Utf8PathBuf>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
        }
    }

    /// Reads a source file from disk.
    ///
    /// Invalid UTF-8 sequences are replaced, since the contents are only inspected for the entry
    /// marker.
    pub fn load(path: impl Into<Utf8PathBuf>) -> Result<Self, SourceLoadError> {
        let path = path.into();
        match std::fs::read(&path) {
            Ok(bytes) => {
                let content = String::from_utf8_lossy(&bytes).into_owned();
                Ok(Self { path, content })
            }
            Err(error) => Err(SourceLoadError { path, error }),
        }
    }

    /// Returns the path to this file.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the contents of this file.
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// Decides whether a source file is its test case's entry file.
pub trait EntryPredicate {
    /// Returns true if `file` is an entry file.
    fn is_entry(&self, file: &SourceFile) -> bool;
}

impl<F> EntryPredicate for F
where
    F: Fn(&SourceFile) -> bool,
{
    fn is_entry(&self, file: &SourceFile) -> bool {
        self(file)
    }
}

/// An [`EntryPredicate`] that matches files containing a fixed marker string, such as the
/// signature of the method the compiled program starts from.
#[derive(Clone, Debug)]
pub struct EntryMarker {
    marker: String,
}

impl EntryMarker {
    /// Creates a new `EntryMarker`.
    pub fn new(marker: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
        }
    }

    /// Returns the marker string.
    pub fn marker(&self) -> &str {
        &self.marker
    }
}

impl EntryPredicate for EntryMarker {
    fn is_entry(&self, file: &SourceFile) -> bool {
        file.content.contains(&self.marker)
    }
}

/// The ordered source files of one test case.
///
/// Slot 0 always holds the entry file. If no entry file was detected, slot 0 holds a placeholder
/// instead (represented as `None`) and the remaining files keep their scan order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceSet {
    entry: Option<SourceFile>,
    rest: Vec<SourceFile>,
}

impl SourceSet {
    /// Reads every path in order, then orders the files with [`Self::from_files`].
    pub fn load<P>(
        paths: impl IntoIterator<Item = P>,
        predicate: &dyn EntryPredicate,
    ) -> Result<Self, SourceLoadError>
    where
        P: Into<Utf8PathBuf>,
    {
        let files = paths
            .into_iter()
            .map(SourceFile::load)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self::from_files(files, predicate))
    }

    /// Orders already-loaded files, placing the first entry file at slot 0.
    ///
    /// Finding more than one entry file is logged but not fatal: the first one is used, and later
    /// candidates stay among the other files in scan order.
    pub fn from_files(files: Vec<SourceFile>, predicate: &dyn EntryPredicate) -> Self {
        let mut entry = None;
        let mut extra_entries = Vec::new();
        let mut rest = Vec::with_capacity(files.len());

        for file in files {
            if predicate.is_entry(&file) {
                if entry.is_none() {
                    entry = Some(file);
                    continue;
                }
                extra_entries.push(file.path.clone());
            }
            rest.push(file);
        }

        match &entry {
            Some(entry) if !extra_entries.is_empty() => {
                warn!(
                    "found {} entry files, using `{}` (also matched: {})",
                    extra_entries.len() + 1,
                    entry.path,
                    extra_entries.iter().join(", "),
                );
            }
            Some(_) => {}
            None => {
                let first = rest.first().map_or("<no files>", |file| file.path.as_str());
                warn!("no entry file found among sources starting at `{first}`");
            }
        }

        Self { entry, rest }
    }

    /// Returns the entry file, or `None` if slot 0 holds the placeholder.
    pub fn entry(&self) -> Option<&SourceFile> {
        self.entry.as_ref()
    }

    /// Returns every slot in order, starting with slot 0. Slot 0 is `None` for the placeholder.
    pub fn slots(&self) -> impl Iterator<Item = Option<&SourceFile>> + '_ {
        std::iter::once(self.entry.as_ref()).chain(self.rest.iter().map(Some))
    }

    /// Returns the loaded files in order, skipping the placeholder.
    pub fn files(&self) -> impl Iterator<Item = &SourceFile> + '_ {
        self.entry.iter().chain(&self.rest)
    }

    /// Returns the number of loaded files, not counting the placeholder.
    pub fn file_count(&self) -> usize {
        self.entry.iter().len() + self.rest.len()
    }
}

impl fmt::Display for SourceSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => write!(f, "{}", entry.path)?,
            None => write!(f, "<no entry>")?,
        }
        for file in &self.rest {
            write!(f, " {}", file.path)?;
        }
        Ok(())
    }
}
