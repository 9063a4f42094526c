// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Parsing of grading reports produced by an external marking system.
//!
//! A grading report is line oriented: a header line followed by one record per test, each made
//! up of eight whitespace-separated fields:
//!
//! ```text
//! <type> <number> <outcome> <points> <name> <name> <outcome> <result>
//! ```
//!
//! A record may be followed by a *continuation line*, one of [`FAILURE_MESSAGES`], which replaces
//! the record's result message.
//!
//! Nothing here is used by the test runner.

use crate::errors::GradingReportReadError;
use camino::Utf8Path;
use std::fmt;
use tracing::warn;

/// The lines that continue the previous record instead of starting a new one.
pub const FAILURE_MESSAGES: [&str; 2] = [
    "Compiler failed to detect error",
    "Compiler reported error in correct program",
];

const FIELD_COUNT: usize = 8;

/// A well-formed record from a grading report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GradingRecord {
    /// The kind of test, e.g. `public` or `secret`.
    pub test_type: String,

    /// The test number.
    pub number: String,

    /// The outcome reported by the marking system.
    pub outcome: String,

    /// The points awarded.
    pub points: String,

    /// The test name.
    pub name: String,

    /// The free-text result, possibly replaced by a continuation line.
    pub result_message: String,
}

/// One entry in a grading report: either a parsed record, or a line that didn't match the record
/// grammar.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReportEntry {
    /// A well-formed record.
    Parsed(GradingRecord),

    /// A line with fewer than eight fields, or whose repeated name or outcome didn't match.
    Unparsed {
        /// The line, with surrounding whitespace removed.
        raw_line: String,

        /// A continuation line that followed this entry, if any.
        result_message: Option<String>,
    },
}

impl ReportEntry {
    /// Parses a single non-continuation line.
    pub fn parse_line(line: &str) -> Self {
        let fields: Vec<&str> = line.split_whitespace().take(FIELD_COUNT).collect();
        match fields[..] {
            [test_type, number, outcome, points, name, name2, outcome2, result]
                if name2 == name && outcome2 == outcome =>
            {
                Self::Parsed(GradingRecord {
                    test_type: test_type.to_owned(),
                    number: number.to_owned(),
                    outcome: outcome.to_owned(),
                    points: points.to_owned(),
                    name: name.to_owned(),
                    result_message: result.to_owned(),
                })
            }
            _ => Self::Unparsed {
                raw_line: line.to_owned(),
                result_message: None,
            },
        }
    }

    /// Returns the parsed record, or `None` for an unparsed line.
    pub fn record(&self) -> Option<&GradingRecord> {
        match self {
            Self::Parsed(record) => Some(record),
            Self::Unparsed { .. } => None,
        }
    }

    /// Returns the result message of this entry.
    pub fn result_message(&self) -> Option<&str> {
        match self {
            Self::Parsed(record) => Some(&record.result_message),
            Self::Unparsed { result_message, .. } => result_message.as_deref(),
        }
    }

    /// Returns the verdict the compiler was expected to produce, derived from the result message.
    pub fn expected_verdict(&self) -> ExpectedVerdict {
        ExpectedVerdict::from_result_message(self.result_message())
    }

    fn set_result_message(&mut self, message: &str) {
        match self {
            Self::Parsed(record) => record.result_message = message.to_owned(),
            Self::Unparsed { result_message, .. } => *result_message = Some(message.to_owned()),
        }
    }
}

/// The verdict a test was expected to have, derived from a record's result message.
///
/// The derivation matches case-sensitive substrings of the marking system's messages, so it's only
/// as reliable as those messages are stable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExpectedVerdict {
    /// The program was correct: the compiler should have accepted it.
    Pass,

    /// The program had an error: the compiler should have rejected it.
    Fail,

    /// The result message didn't say.
    Unknown,
}

impl ExpectedVerdict {
    /// Derives the expected verdict from a result message. The first matching rule wins.
    pub fn from_result_message(message: Option<&str>) -> Self {
        match message {
            Some(message) if message.contains("error in correct program") => Self::Pass,
            Some(message) if message.contains("failed to detect error") => Self::Fail,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ExpectedVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pass => write!(f, "pass"),
            Self::Fail => write!(f, "fail"),
            Self::Unknown => write!(f, "????"),
        }
    }
}

/// Incrementally parses the lines of a grading report.
#[derive(Clone, Debug, Default)]
pub struct ReportParser {
    seen_header: bool,
    entries: Vec<ReportEntry>,
    orphan_continuations: usize,
}

impl ReportParser {
    /// Creates a new parser, expecting the header line first.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds one line to the parser. Blank lines are ignored.
    pub fn push_line(&mut self, line: &str) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }
        if !self.seen_header {
            self.seen_header = true;
            return;
        }

        if FAILURE_MESSAGES.contains(&line) {
            match self.entries.last_mut() {
                Some(entry) => entry.set_result_message(line),
                None => {
                    warn!("ignoring continuation line `{line}` with no preceding record");
                    self.orphan_continuations += 1;
                }
            }
            return;
        }

        self.entries.push(ReportEntry::parse_line(line));
    }

    /// Finishes parsing, returning the report.
    pub fn finish(self) -> GradingReport {
        GradingReport {
            entries: self.entries,
            orphan_continuations: self.orphan_continuations,
        }
    }
}

/// A parsed grading report.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GradingReport {
    entries: Vec<ReportEntry>,
    orphan_continuations: usize,
}

impl GradingReport {
    /// Parses a report from its lines.
    pub fn parse<'a>(lines: impl IntoIterator<Item = &'a str>) -> Self {
        let mut parser = ReportParser::new();
        for line in lines {
            parser.push_line(line);
        }
        parser.finish()
    }

    /// Reads and parses a report file.
    pub fn read(path: &Utf8Path) -> Result<Self, GradingReportReadError> {
        let bytes = std::fs::read(path).map_err(|error| GradingReportReadError {
            path: path.to_owned(),
            error,
        })?;
        Ok(Self::parse(String::from_utf8_lossy(&bytes).lines()))
    }

    /// Returns all entries, in report order.
    pub fn entries(&self) -> &[ReportEntry] {
        &self.entries
    }

    /// Returns the parsed records, in report order.
    pub fn records(&self) -> impl Iterator<Item = &GradingRecord> + '_ {
        self.entries.iter().filter_map(ReportEntry::record)
    }

    /// Returns the raw lines of unparsed entries, in report order.
    pub fn unparsed_lines(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().filter_map(|entry| match entry {
            ReportEntry::Parsed(_) => None,
            ReportEntry::Unparsed { raw_line, .. } => Some(raw_line.as_str()),
        })
    }

    /// Returns the number of continuation lines that had no preceding record.
    pub fn orphan_continuations(&self) -> usize {
        self.orphan_continuations
    }
}
