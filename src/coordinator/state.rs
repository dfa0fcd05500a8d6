//! Job lifecycle.

use std::fmt;

use crate::error::JobError;

/// Lifecycle of one coordinator job.
///
/// # State Machine
///
/// ```text
/// Idle -> Distributing -> Dispatching -> Relaying -> Completed
/// any non-terminal state -> Aborted
/// Completed, Aborted -> (terminal, no transitions)
/// ```
///
/// # Examples
///
/// ```
/// use pla_compose::coordinator::JobState;
///
/// assert!(JobState::Idle.can_transition_to(JobState::Distributing));
/// assert!(JobState::Dispatching.can_transition_to(JobState::Aborted));
/// assert!(!JobState::Idle.can_transition_to(JobState::Relaying));
/// assert!(!JobState::Completed.can_transition_to(JobState::Aborted));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Nothing started yet.
    #[default]
    Idle,
    /// Scheduling and compiling.
    Distributing,
    /// Sending programs and modules to workers.
    Dispatching,
    /// Relay tasks are forwarding frames.
    Relaying,
    /// All relays finished (terminal).
    Completed,
    /// The job failed (terminal).
    Aborted,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Distributing => write!(f, "distributing"),
            Self::Dispatching => write!(f, "dispatching"),
            Self::Relaying => write!(f, "relaying"),
            Self::Completed => write!(f, "completed"),
            Self::Aborted => write!(f, "aborted"),
        }
    }
}

impl JobState {
    /// Returns `true` for `Completed` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Returns `true` if moving to `next` is allowed.
    pub fn can_transition_to(self, next: Self) -> bool {
        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (Self::Idle, Self::Distributing)
                | (Self::Distributing, Self::Dispatching)
                | (Self::Dispatching, Self::Relaying)
                | (Self::Relaying, Self::Completed)
                | (_, Self::Aborted)
        )
    }

    /// Like [`can_transition_to`](Self::can_transition_to) but returns the
    /// rejection as an error.
    pub fn validate_transition(self, next: Self) -> Result<(), JobError> {
        if self.can_transition_to(next) {
            Ok(())
        } else {
            Err(JobError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }
}
