//! Per-request pipeline state machine.
//!
//! Every analysis request walks this graph. Backend failure is not an error
//! terminal: it routes through `FallbackExtracting` and still reaches `Done`.
//!
//! ```text
//! Compiling → Invoking → Extracting ─────────┐
//!                 │                          ├─► Aggregating → Done
//!                 └─► FallbackExtracting ────┘
//!
//! any non-terminal → Failed   (unconfigured cloud backend)
//! ```

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    /// Building the prompt.
    Compiling,
    /// Waiting on the backend.
    Invoking,
    /// Parsing backend text.
    Extracting,
    /// Parsing the fallback text after a backend failure.
    FallbackExtracting,
    /// Enrichment, scoring and tracker update.
    Aggregating,
    /// Result returned (terminal).
    Done,
    /// Request aborted (terminal).
    Failed,
}

impl RequestState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compiling => write!(f, "Compiling"),
            Self::Invoking => write!(f, "Invoking"),
            Self::Extracting => write!(f, "Extracting"),
            Self::FallbackExtracting => write!(f, "FallbackExtracting"),
            Self::Aggregating => write!(f, "Aggregating"),
            Self::Done => write!(f, "Done"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

fn is_legal_transition(from: RequestState, to: RequestState) -> bool {
    use RequestState::*;

    if to == Failed && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Compiling, Invoking)
            | (Invoking, Extracting)
            | (Invoking, FallbackExtracting)
            | (Extracting, Aggregating)
            | (FallbackExtracting, Aggregating)
            | (Aggregating, Done)
    )
}

/// A single recorded state transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: RequestState,
    pub to: RequestState,
    /// Milliseconds since the state machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: RequestState,
    pub to: RequestState,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal state transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalTransition {}

/// Current state plus the full transition log of one request.
pub struct RequestStateMachine {
    current: RequestState,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl RequestStateMachine {
    /// Start at `Compiling`.
    pub fn new() -> Self {
        Self {
            current: RequestState::Compiling,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn current(&self) -> RequestState {
        self.current
    }

    pub fn advance(
        &mut self,
        to: RequestState,
        reason: Option<&str>,
    ) -> Result<(), IllegalTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalTransition {
                from: self.current,
                to,
            });
        }

        tracing::debug!(from = %self.current, to = %to, "request state transition");

        self.transitions.push(TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.created_at.elapsed().as_millis() as u64,
            reason: reason.map(String::from),
        });
        self.current = to;
        Ok(())
    }

    /// Transition to `Failed` from any non-terminal state.
    pub fn fail(&mut self, reason: &str) -> Result<(), IllegalTransition> {
        self.advance(RequestState::Failed, Some(reason))
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    pub fn transitions(&self) -> &[TransitionRecord] {
        &self.transitions
    }

    /// One-line history, e.g. `Compiling → Invoking → Extracting → ... (12ms)`.
    pub fn summary(&self) -> String {
        let mut states = vec![RequestState::Compiling.to_string()];
        states.extend(self.transitions.iter().map(|t| t.to.to_string()));
        format!(
            "{} ({}ms)",
            states.join(" → "),
            self.created_at.elapsed().as_millis()
        )
    }
}

impl Default for RequestStateMachine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_path() {
        let mut sm = RequestStateMachine::new();
        sm.advance(RequestState::Invoking, None).unwrap();
        sm.advance(RequestState::Extracting, None).unwrap();
        sm.advance(RequestState::Aggregating, None).unwrap();
        sm.advance(RequestState::Done, None).unwrap();
        assert!(sm.is_terminal());
        assert_eq!(sm.transitions().len(), 4);
        assert!(sm
            .summary()
            .starts_with("Compiling → Invoking → Extracting → Aggregating → Done"));
    }

    #[test]
    fn fallback_path_reaches_done() {
        let mut sm = RequestStateMachine::new();
        sm.advance(RequestState::Invoking, None).unwrap();
        sm.advance(RequestState::FallbackExtracting, Some("timed out"))
            .unwrap();
        sm.advance(RequestState::Aggregating, None).unwrap();
        sm.advance(RequestState::Done, None).unwrap();
        assert_eq!(sm.current(), RequestState::Done);
        assert_eq!(sm.transitions()[1].reason.as_deref(), Some("timed out"));
    }

    #[test]
    fn failure_from_any_non_terminal_state() {
        for state in [
            RequestState::Compiling,
            RequestState::Invoking,
            RequestState::Extracting,
            RequestState::FallbackExtracting,
            RequestState::Aggregating,
        ] {
            let mut sm = RequestStateMachine {
                current: state,
                created_at: Instant::now(),
                transitions: Vec::new(),
            };
            assert!(sm.fail("no credentials").is_ok());
            assert_eq!(sm.current(), RequestState::Failed);
        }
    }

    #[test]
    fn terminal_states_are_final() {
        let mut sm = RequestStateMachine::new();
        sm.fail("boom").unwrap();
        let err = sm.advance(RequestState::Invoking, None).unwrap_err();
        assert_eq!(err.from, RequestState::Failed);
        assert!(sm.fail("again").is_err());
    }

    #[test]
    fn cannot_skip_extraction() {
        let mut sm = RequestStateMachine::new();
        sm.advance(RequestState::Invoking, None).unwrap();
        let err = sm.advance(RequestState::Aggregating, None).unwrap_err();
        assert_eq!(
            err,
            IllegalTransition {
                from: RequestState::Invoking,
                to: RequestState::Aggregating,
            }
        );
        assert_eq!(sm.current(), RequestState::Invoking);
    }
}
