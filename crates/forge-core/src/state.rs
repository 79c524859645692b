//! Gate state machine for one gated stage

use crate::error::StateError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    /// No artifact yet
    Pending,
    Generating,
    Reviewing,
    /// Terminal: the artifact cleared the threshold
    Accepted,
    /// Rejected with iterations left; the verdict becomes feedback
    Regenerating,
    /// Terminal: out of iterations, the last artifact is accepted degraded
    Exhausted,
}

impl GateState {
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Exhausted)
    }
}

/// Validates a gate transition
///
/// # Errors
/// [`StateError::IllegalTransition`] when `to` is not reachable from `from`.
pub fn validate_transition(from: GateState, to: GateState) -> Result<(), StateError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(StateError::IllegalTransition { from, to })
    }
}

#[must_use]
pub fn allowed_transitions(from: GateState) -> &'static [GateState] {
    use GateState::*;
    match from {
        Pending | Regenerating => &[Generating],
        Generating => &[Reviewing],
        Reviewing => &[Accepted, Regenerating, Exhausted],
        Accepted | Exhausted => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [GateState; 6] = [
        GateState::Pending,
        GateState::Generating,
        GateState::Reviewing,
        GateState::Accepted,
        GateState::Regenerating,
        GateState::Exhausted,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        for state in ALL {
            assert_eq!(state.is_terminal(), allowed_transitions(state).is_empty(), "{state:?}");
        }
    }

    #[test]
    fn review_cannot_be_skipped() {
        assert!(validate_transition(GateState::Generating, GateState::Accepted).is_err());
        assert!(validate_transition(GateState::Regenerating, GateState::Reviewing).is_err());
        assert_eq!(
            validate_transition(GateState::Pending, GateState::Reviewing),
            Err(StateError::IllegalTransition {
                from: GateState::Pending,
                to: GateState::Reviewing
            })
        );
    }

    #[test]
    fn regeneration_cycle_is_legal() {
        let cycle = [
            GateState::Pending,
            GateState::Generating,
            GateState::Reviewing,
            GateState::Regenerating,
            GateState::Generating,
            GateState::Reviewing,
            GateState::Exhausted,
        ];
        for pair in cycle.windows(2) {
            assert!(validate_transition(pair[0], pair[1]).is_ok(), "{pair:?}");
        }
    }
}
