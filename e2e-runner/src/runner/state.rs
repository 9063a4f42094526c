// Copyright (c) The e2e-harness Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::errors::InvalidStateTransition;
use std::fmt;

/// The state of a test case within a run.
///
/// States only move forward: `NotRun -> Running -> {Passed, Failed}`. `Passed` and `Failed` are
/// terminal for the rest of the run.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TestState {
    /// The test case hasn't started yet.
    #[default]
    NotRun,

    /// The pipeline is running. A test case whose run stage had no expectations to check stays in
    /// this state.
    Running,

    /// All configured checks matched.
    Passed,

    /// A stage or a check failed.
    Failed,
}

impl TestState {
    /// Moves to `to`, or returns an error if that would move backwards or re-enter a state.
    pub fn transition(&mut self, to: TestState) -> Result<(), InvalidStateTransition> {
        let valid = matches!(
            (*self, to),
            (TestState::NotRun, TestState::Running)
                | (TestState::Running, TestState::Passed)
                | (TestState::Running, TestState::Failed)
        );
        if valid {
            *self = to;
            Ok(())
        } else {
            Err(InvalidStateTransition { from: *self, to })
        }
    }

    /// Returns true if no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, TestState::Passed | TestState::Failed)
    }
}

impl fmt::Display for TestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TestState::NotRun => write!(f, "not run"),
            TestState::Running => write!(f, "running"),
            TestState::Passed => write!(f, "passed"),
            TestState::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn forward_transitions() {
        let mut state = TestState::default();
        assert_eq!(state, TestState::NotRun);
        state.transition(TestState::Running).unwrap();
        state.transition(TestState::Failed).unwrap();
        assert!(state.is_terminal());
    }

    #[test_case(TestState::NotRun, TestState::Passed; "skipping running")]
    #[test_case(TestState::Running, TestState::Running; "re-entering running")]
    #[test_case(TestState::Passed, TestState::Failed; "leaving passed")]
    #[test_case(TestState::Failed, TestState::NotRun; "backwards")]
    fn invalid_transitions(from: TestState, to: TestState) {
        let mut state = from;
        let error = state.transition(to).unwrap_err();
        assert_eq!(error, InvalidStateTransition { from, to });
        assert_eq!(state, from, "state is unchanged");
    }
}
