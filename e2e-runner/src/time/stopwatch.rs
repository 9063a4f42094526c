// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Stopwatch for tracking how long stages and runs take.
//!
//! Every stage tracks a start time and a duration. For that we use a combination of a
//! `DateTime<Local>` (realtime clock) and an `Instant` (monotonic clock). Once the stopwatch is
//! ended, the elapsed time is reported using the monotonic clock.

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};

pub(crate) fn stopwatch() -> StopwatchStart {
    StopwatchStart::new()
}

/// The start state of a stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchStart {
    start_time: DateTime<Local>,
    instant: Instant,
}

impl StopwatchStart {
    fn new() -> Self {
        Self {
            // These two syscalls will happen imperceptibly close to each other, which is good
            // enough for our purposes.
            start_time: Local::now(),
            instant: Instant::now(),
        }
    }

    pub(crate) fn elapsed(&self) -> Duration {
        self.instant.elapsed()
    }

    pub(crate) fn end(&self) -> StopwatchEnd {
        StopwatchEnd {
            start_time: self.start_time,
            duration: self.instant.elapsed(),
        }
    }
}

/// The end state of a stopwatch.
#[derive(Clone, Debug)]
pub(crate) struct StopwatchEnd {
    pub(crate) start_time: DateTime<Local>,
    pub(crate) duration: Duration,
}
