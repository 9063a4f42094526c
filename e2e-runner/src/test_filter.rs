// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filtering test cases based on user-specified name patterns.
//!
//! The main structure in this module is [`TestFilter`].

use std::fmt;

/// Filters test cases by name.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestFilter {
    patterns: Vec<String>,
}

impl TestFilter {
    /// Creates a new filter. A test case matches if its name contains any of the patterns.
    ///
    /// If `patterns` is empty, every test case matches.
    pub fn new(patterns: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            patterns: patterns.into_iter().map(Into::into).collect(),
        }
    }

    /// Returns a filter that matches every test case.
    pub fn any() -> Self {
        Self::default()
    }

    /// Returns whether the given test case name matches this filter.
    pub fn filter_match(&self, name: &str) -> FilterMatch {
        if self.patterns.is_empty()
            || self
                .patterns
                .iter()
                .any(|pattern| name.contains(pattern.as_str()))
        {
            FilterMatch::Matches
        } else {
            FilterMatch::Mismatch {
                reason: MismatchReason::String,
            }
        }
    }
}

/// Whether a test case matched a filter.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterMatch {
    /// The test case matched and will be run.
    Matches,

    /// The test case didn't match and will be skipped.
    Mismatch {
        /// The reason the test case was skipped.
        reason: MismatchReason,
    },
}

impl FilterMatch {
    /// Returns true if the filter matched.
    pub fn is_match(self) -> bool {
        matches!(self, FilterMatch::Matches)
    }
}

/// The reason a test case was skipped.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum MismatchReason {
    /// None of the name patterns matched.
    String,

    /// The test case is a directory, which can't carry expectation side files to record to.
    NoExpectations,
}

impl fmt::Display for MismatchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MismatchReason::String => write!(f, "does not match the provided patterns"),
            MismatchReason::NoExpectations => write!(f, "directory test cases are not recorded"),
        }
    }
}
