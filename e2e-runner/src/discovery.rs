// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Discovering test cases in a test directory.
//!
//! Every direct child of the test directory is one test case: a source file is a *file-form* test
//! case, a directory is a *directory-form* test case made of every source file beneath it.

use crate::{
    config::HarnessConfig,
    errors::{DiscoveryError, SourceLoadError},
    expectation::{Expectation, ExpectationLoader},
    output_store::OutputStore,
    source_set::{EntryMarker, EntryPredicate, SourceFile, SourceSet},
    test_filter::{FilterMatch, TestFilter},
};
use camino::{Utf8Path, Utf8PathBuf};
use std::{fmt, sync::Arc};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// The shared source files passed to every compiler invocation, after the test case's own files.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SupportLibrary {
    files: Vec<SourceFile>,
}

impl SupportLibrary {
    /// Creates a support library from already-loaded files.
    pub fn new(files: Vec<SourceFile>) -> Self {
        Self { files }
    }

    /// Returns an empty support library.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns the files in the support library.
    pub fn files(&self) -> &[SourceFile] {
        &self.files
    }

    /// Returns the number of files in the support library.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns true if the support library has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Whether a test case is a single file or a directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TestCaseKind {
    /// A single source file, which may have expectation side files.
    File,

    /// A directory of source files. Never has expectations.
    Directory,
}

impl fmt::Display for TestCaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestCaseKind::File => write!(f, "file"),
            TestCaseKind::Directory => write!(f, "dir"),
        }
    }
}

/// A single test case.
#[derive(Clone, Debug)]
pub struct TestCase {
    name: String,
    kind: TestCaseKind,
    path: Utf8PathBuf,
    sources: SourceSet,
    support_lib: Arc<SupportLibrary>,
    expectation: Expectation,
}

impl TestCase {
    /// Creates a new test case.
    ///
    /// `path` is the source file for file-form test cases and the directory for directory-form
    /// ones. `name` is its file name.
    pub fn new(
        name: impl Into<String>,
        kind: TestCaseKind,
        path: impl Into<Utf8PathBuf>,
        sources: SourceSet,
        support_lib: Arc<SupportLibrary>,
        expectation: Expectation,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
            sources,
            support_lib,
            expectation,
        }
    }

    /// Returns the name of the test case.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the kind of test case.
    pub fn kind(&self) -> TestCaseKind {
        self.kind
    }

    /// Returns the source file or directory this test case was built from.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the test case's own source files.
    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    /// Returns the shared support library.
    pub fn support_lib(&self) -> &SupportLibrary {
        &self.support_lib
    }

    /// Returns the expectation for the run stage.
    pub fn expectation(&self) -> &Expectation {
        &self.expectation
    }

    /// Returns the name of this test case's output store: the name with the source extension
    /// stripped for file-form test cases.
    pub fn store_name(&self) -> &str {
        match self.kind {
            TestCaseKind::File => self
                .path
                .file_stem()
                .unwrap_or(self.name.as_str()),
            TestCaseKind::Directory => &self.name,
        }
    }

    /// Returns the output store for this test case under the given profile.
    pub fn output_store(&self, store_root: &Utf8Path, profile: &str) -> OutputStore {
        OutputStore::new(store_root, profile, self.store_name())
    }

    /// Returns the compiler arguments: the test case's files, entry first, followed by the support
    /// library.
    pub fn compiler_args(&self) -> Vec<String> {
        self.sources
            .files()
            .chain(self.support_lib.files())
            .map(|file| file.path().to_string())
            .collect()
    }
}

/// Builds [`TestCase`]s from a test directory.
pub struct TestCaseRegistry {
    support_lib_dir: Utf8PathBuf,
    source_extension: String,
    entry_predicate: Box<dyn EntryPredicate>,
    expectation_loader: ExpectationLoader,
}

impl TestCaseRegistry {
    /// Creates a new registry, detecting entry files with the configured entry marker.
    pub fn new(config: &HarnessConfig) -> Self {
        Self {
            support_lib_dir: config.support_lib_dir(),
            source_extension: config.layout().source_extension.clone(),
            entry_predicate: Box::new(EntryMarker::new(&config.layout().entry_marker)),
            expectation_loader: ExpectationLoader::new(config.expectations()),
        }
    }

    /// Replaces the entry file predicate.
    pub fn with_entry_predicate(mut self, predicate: impl EntryPredicate + 'static) -> Self {
        self.entry_predicate = Box::new(predicate);
        self
    }

    /// Recursively gathers the support library.
    ///
    /// A missing support library directory is logged and treated as empty.
    pub fn load_support_library(&self) -> Result<SupportLibrary, DiscoveryError> {
        if !self.support_lib_dir.is_dir() {
            warn!(
                "support library directory `{}` not found, compiling without it",
                self.support_lib_dir
            );
            return Ok(SupportLibrary::empty());
        }

        let paths = self.gather_sources(&self.support_lib_dir)?;
        let files = paths
            .into_iter()
            .map(SourceFile::load)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|error| DiscoveryError::SupportLibrary { error })?;
        debug!(
            "loaded {} support library files from {}",
            files.len(),
            self.support_lib_dir
        );
        Ok(SupportLibrary::new(files))
    }

    /// Discovers the test cases directly inside `test_dir`, in directory listing order.
    ///
    /// Entries that can't be turned into a test case are logged and skipped.
    pub fn discover(&self, test_dir: &Utf8Path) -> Result<Vec<TestCase>, DiscoveryError> {
        if !test_dir.is_dir() {
            return Err(DiscoveryError::TestDirNotFound {
                dir: test_dir.to_owned(),
            });
        }
        let support_lib = Arc::new(self.load_support_library()?);

        let read_dir_err = |error| DiscoveryError::ReadTestDir {
            dir: test_dir.to_owned(),
            error,
        };
        let mut test_cases = Vec::new();
        for entry in test_dir.read_dir_utf8().map_err(read_dir_err)? {
            let entry = entry.map_err(read_dir_err)?;
            let path = entry.path();

            let test_case = if path.is_file() {
                if path.extension() == Some(self.source_extension.as_str()) {
                    self.file_test_case(path, &support_lib)
                } else if self.expectation_loader.is_side_file(path) {
                    debug!("skipping expectation file {path}");
                    continue;
                } else {
                    warn!("got unexpected file in test directory: {path}");
                    continue;
                }
            } else if path.is_dir() {
                self.directory_test_case(path, &support_lib)
            } else {
                warn!("got unexpected entry in test directory: {path}");
                continue;
            };

            match test_case {
                Ok(Some(test_case)) => test_cases.push(test_case),
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        "skipping {path}: {}",
                        crate::errors::DisplayErrorChain::new(error)
                    );
                }
            }
        }

        Ok(test_cases)
    }

    fn file_test_case(
        &self,
        path: &Utf8Path,
        support_lib: &Arc<SupportLibrary>,
    ) -> Result<Option<TestCase>, TestCaseLoadError> {
        let sources = SourceSet::load([path], &*self.entry_predicate)?;
        let expectation = self.expectation_loader.load(path)?;
        let name = path.file_name().unwrap_or(path.as_str());

        Ok(Some(TestCase::new(
            name,
            TestCaseKind::File,
            path,
            sources,
            support_lib.clone(),
            expectation,
        )))
    }

    fn directory_test_case(
        &self,
        path: &Utf8Path,
        support_lib: &Arc<SupportLibrary>,
    ) -> Result<Option<TestCase>, TestCaseLoadError> {
        let paths = self.gather_sources(path)?;
        if paths.is_empty() {
            warn!("skipping directory {path}: no .{} files found", self.source_extension);
            return Ok(None);
        }
        let sources = SourceSet::load(paths, &*self.entry_predicate)?;
        let name = path.file_name().unwrap_or(path.as_str());

        Ok(Some(TestCase::new(
            name,
            TestCaseKind::Directory,
            path,
            sources,
            support_lib.clone(),
            Expectation::none(),
        )))
    }

    /// Recursively gathers source files under `dir`, sorted by file name within each directory.
    fn gather_sources(&self, dir: &Utf8Path) -> Result<Vec<Utf8PathBuf>, DiscoveryError> {
        let mut paths = Vec::new();
        for entry in WalkDir::new(dir).sort_by_file_name() {
            let entry = entry.map_err(|error| DiscoveryError::Walk {
                dir: dir.to_owned(),
                error,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = Utf8PathBuf::try_from(entry.into_path()).map_err(|error| {
                DiscoveryError::NonUtf8Path {
                    path: error.into_path_buf(),
                }
            })?;
            if path.extension() == Some(self.source_extension.as_str()) {
                paths.push(path);
            }
        }
        Ok(paths)
    }
}

impl fmt::Debug for TestCaseRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCaseRegistry")
            .field("support_lib_dir", &self.support_lib_dir)
            .field("source_extension", &self.source_extension)
            .finish_non_exhaustive()
    }
}

// Errors that cause a single test case to be skipped during discovery.
#[derive(Debug, thiserror::Error)]
enum TestCaseLoadError {
    #[error(transparent)]
    Source(#[from] SourceLoadError),
    #[error(transparent)]
    Expectation(#[from] crate::errors::ExpectationLoadError),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
}

/// The test cases selected for a run, sorted by name.
#[derive(Clone, Debug)]
pub struct TestList {
    test_cases: Vec<TestListEntry>,
    run_count: usize,
}

/// A test case along with whether it matched the filter.
#[derive(Clone, Debug)]
pub struct TestListEntry {
    /// The test case.
    pub test_case: TestCase,

    /// Whether the test case matched the filter.
    pub filter_match: FilterMatch,
}

impl TestList {
    /// Creates a new test list, sorting the test cases by name and applying the filter.
    pub fn new(mut test_cases: Vec<TestCase>, filter: &TestFilter) -> Self {
        test_cases.sort_by(|a, b| a.name.cmp(&b.name));
        let test_cases: Vec<_> = test_cases
            .into_iter()
            .map(|test_case| {
                let filter_match = filter.filter_match(&test_case.name);
                TestListEntry {
                    test_case,
                    filter_match,
                }
            })
            .collect();
        let run_count = test_cases
            .iter()
            .filter(|entry| entry.filter_match.is_match())
            .count();

        Self {
            test_cases,
            run_count,
        }
    }

    /// Returns an empty test list.
    pub fn empty() -> Self {
        Self {
            test_cases: Vec::new(),
            run_count: 0,
        }
    }

    /// Returns the total number of test cases, including skipped ones.
    pub fn test_count(&self) -> usize {
        self.test_cases.len()
    }

    /// Returns the number of test cases that will be run.
    pub fn run_count(&self) -> usize {
        self.run_count
    }

    /// Returns the number of test cases that will be skipped.
    pub fn skip_count(&self) -> usize {
        self.test_count() - self.run_count
    }

    /// Iterates over all test cases, sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = &TestListEntry> + '_ {
        self.test_cases.iter()
    }

    /// Iterates over the test cases that matched the filter.
    pub fn iter_matching(&self) -> impl Iterator<Item = &TestCase> + '_ {
        self.test_cases
            .iter()
            .filter(|entry| entry.filter_match.is_match())
            .map(|entry| &entry.test_case)
    }
}
