//! Lifecycle shared by every strategy run:
//! `dispatched -> synthesizing -> (refining | integrating) -> complete | failed`.

use crate::research::strategy::Strategy;
use crate::types::{AppError, Result};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResearchPhase {
    Dispatched,
    Synthesizing,
    Refining,
    Integrating,
    Complete,
    Failed,
}

impl ResearchPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResearchPhase::Complete | ResearchPhase::Failed)
    }

    pub fn can_transition_to(&self, next: ResearchPhase) -> bool {
        use ResearchPhase::*;
        matches!(
            (self, next),
            (Dispatched, Synthesizing)
                | (Synthesizing, Refining)
                | (Synthesizing, Integrating)
                | (Synthesizing, Complete)
                | (Synthesizing, Failed)
                | (Refining, Complete)
                | (Refining, Failed)
                | (Integrating, Complete)
                | (Integrating, Failed)
        )
    }
}

impl fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResearchPhase::Dispatched => "dispatched",
            ResearchPhase::Synthesizing => "synthesizing",
            ResearchPhase::Refining => "refining",
            ResearchPhase::Integrating => "integrating",
            ResearchPhase::Complete => "complete",
            ResearchPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Tracks one run's phase and logs each transition.
#[derive(Debug)]
pub struct PhaseTracker {
    strategy: Strategy,
    phase: ResearchPhase,
}

impl PhaseTracker {
    pub fn new(strategy: Strategy) -> Self {
        tracing::debug!(strategy = %strategy, phase = %ResearchPhase::Dispatched, "Research run started");
        Self {
            strategy,
            phase: ResearchPhase::Dispatched,
        }
    }

    pub fn phase(&self) -> ResearchPhase {
        self.phase
    }

    pub fn advance(&mut self, next: ResearchPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(AppError::Internal(format!(
                "invalid research phase transition {} -> {}",
                self.phase, next
            )));
        }
        tracing::debug!(strategy = %self.strategy, from = %self.phase, to = %next, "Research phase");
        self.phase = next;
        Ok(())
    }

    /// Record a fatal failure and hand the error back for propagation.
    pub fn fail(&mut self, error: AppError) -> AppError {
        if !self.phase.is_terminal() {
            tracing::warn!(strategy = %self.strategy, phase = %self.phase, error = %error, "Research run failed");
            self.phase = ResearchPhase::Failed;
        }
        error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deep_path() {
        let mut tracker = PhaseTracker::new(Strategy::Deep);
        tracker.advance(ResearchPhase::Synthesizing).unwrap();
        tracker.advance(ResearchPhase::Refining).unwrap();
        tracker.advance(ResearchPhase::Complete).unwrap();
        assert!(tracker.phase().is_terminal());
    }

    #[test]
    fn test_failed_is_unreachable_before_synthesis() {
        assert!(!ResearchPhase::Dispatched.can_transition_to(ResearchPhase::Failed));
        assert!(!ResearchPhase::Complete.can_transition_to(ResearchPhase::Synthesizing));
        let mut tracker = PhaseTracker::new(Strategy::Basic);
        assert!(tracker.advance(ResearchPhase::Complete).is_err());
    }

    #[test]
    fn test_fail_marks_terminal() {
        let mut tracker = PhaseTracker::new(Strategy::MultiAgent);
        tracker.advance(ResearchPhase::Synthesizing).unwrap();
        let err = tracker.fail(AppError::LLM("boom".into()));
        assert_eq!(tracker.phase(), ResearchPhase::Failed);
        assert!(err.to_string().contains("boom"));
    }
}
