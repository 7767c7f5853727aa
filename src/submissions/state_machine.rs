use serde::{Deserialize, Serialize};
use statig::prelude::*;

use super::types::SubmissionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionEvent {
    Submit,
    Withdraw,
}

impl SubmissionEvent {
    pub fn name(self) -> &'static str {
        match self {
            SubmissionEvent::Submit => "submit",
            SubmissionEvent::Withdraw => "withdraw",
        }
    }
}

/// Guarded lifecycle of a single submission.
///
/// Draft is the only state with outgoing transitions. Submitting additionally
/// requires that validation reported no open issues.
#[derive(Debug, Default)]
pub struct SubmissionLifecycle {
    pub submission_id: i64,
    pub open_issues: usize,
}

impl SubmissionLifecycle {
    pub fn new(submission_id: i64, open_issues: usize) -> Self {
        Self {
            submission_id,
            open_issues,
        }
    }
}

#[state_machine(initial = "State::draft()")]
impl SubmissionLifecycle {
    #[state]
    fn draft(&mut self, event: &SubmissionEvent) -> Outcome<State> {
        match event {
            SubmissionEvent::Submit => {
                if self.open_issues > 0 {
                    tracing::info!(
                        submission.id = self.submission_id,
                        open_issues = self.open_issues,
                        "Submission not ready, staying in draft"
                    );
                    return Handled;
                }
                tracing::debug!(submission.id = self.submission_id, "Draft -> Submitted");
                Transition(State::submitted())
            }
            SubmissionEvent::Withdraw => {
                tracing::debug!(submission.id = self.submission_id, "Draft -> Cancelled");
                Transition(State::cancelled())
            }
        }
    }

    #[state]
    fn submitted(&mut self, event: &SubmissionEvent) -> Outcome<State> {
        tracing::warn!(
            submission.id = self.submission_id,
            event = event.name(),
            "Submission already submitted, ignoring event"
        );
        Handled
    }

    #[state]
    fn cancelled(&mut self, event: &SubmissionEvent) -> Outcome<State> {
        tracing::warn!(
            submission.id = self.submission_id,
            event = event.name(),
            "Submission already cancelled, ignoring event"
        );
        Handled
    }
}

fn persisted_state(state: &State) -> SubmissionState {
    match state {
        State::Draft { .. } => SubmissionState::Draft,
        State::Submitted { .. } => SubmissionState::Submitted,
        State::Cancelled { .. } => SubmissionState::Cancelled,
    }
}

/// Runs `event` through the lifecycle of a submission currently in
/// `current`, returning the state it moves to.
///
/// `None` means the event is rejected: either the submission is already
/// final or submitting was attempted with open issues.
pub fn next_state(
    submission_id: i64,
    current: SubmissionState,
    open_issues: usize,
    event: SubmissionEvent,
) -> Option<SubmissionState> {
    if current.is_final() {
        tracing::debug!(
            submission.id = submission_id,
            status = %current,
            event = event.name(),
            "Final submissions accept no transitions"
        );
        return None;
    }

    let mut sm = SubmissionLifecycle::new(submission_id, open_issues).state_machine();
    sm.handle(&event);

    match persisted_state(sm.state()) {
        SubmissionState::Draft => None,
        next => Some(next),
    }
}
