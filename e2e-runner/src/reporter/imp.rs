// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prints out and aggregates test events.
//!
//! The main structure in this module is [`TestReporter`].

use super::{TestEvent, displayer::DisplayReporter, junit::MetadataJunit};
use crate::{config::HarnessProfile, errors::WriteEventError};
use std::io::{self, Write};

/// Standard error destination for the reporter.
///
/// This is usually a terminal, but can be an in-memory buffer for tests.
pub enum ReporterStderr<'a> {
    /// Produce output on the (possibly piped) terminal.
    Terminal,

    /// Write output to a buffer.
    Buffer(&'a mut Vec<u8>),
}

/// Test reporter builder.
#[derive(Debug, Default)]
pub struct TestReporterBuilder {
    should_colorize: bool,
    verbose: bool,
}

impl TestReporterBuilder {
    /// Sets whether the output should be colorized.
    pub fn set_colorize(&mut self, should_colorize: bool) -> &mut Self {
        self.should_colorize = should_colorize;
        self
    }

    /// Sets verbose output. Every stage invocation and every skipped test case is printed.
    pub fn set_verbose(&mut self, verbose: bool) -> &mut Self {
        self.verbose = verbose;
        self
    }

    /// Creates a new test reporter.
    pub fn build<'a>(
        &self,
        profile: &HarnessProfile<'a>,
        output: ReporterStderr<'a>,
    ) -> TestReporter<'a> {
        TestReporter {
            display_reporter: DisplayReporter::new(self.verbose, self.should_colorize),
            junit: profile.junit().map(MetadataJunit::new),
            output,
        }
    }
}

/// Functionality to report test results to stderr and JUnit.
pub struct TestReporter<'a> {
    display_reporter: DisplayReporter,
    junit: Option<MetadataJunit<'a>>,
    output: ReporterStderr<'a>,
}

impl TestReporter<'_> {
    /// Report a test event.
    pub fn report_event(&mut self, event: TestEvent<'_>) -> Result<(), WriteEventError> {
        match &mut self.output {
            ReporterStderr::Terminal => {
                let mut writer = io::stderr().lock();
                self.display_reporter.write_event(&event, &mut writer)?;
                writer.flush()?;
            }
            ReporterStderr::Buffer(buf) => {
                self.display_reporter.write_event(&event, &mut **buf)?;
            }
        }

        if let Some(junit) = &mut self.junit {
            junit.write_event(&event)?;
        }
        Ok(())
    }
}
