// src/orchestrator/phase.rs

use std::fmt;

use tracing::debug;

use crate::errors::{PropagatorError, Result};

/// Lifecycle of one run as seen by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Staged,
    Running,
    PostProcessing,
    Publishing,
    Done,
    Errored,
}

impl RunPhase {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Errored)
    }

    pub fn can_transition_to(self, next: RunPhase) -> bool {
        use RunPhase::*;
        match (self, next) {
            (from, Errored) => !from.is_terminal(),
            (Staged, Running) | (Running, PostProcessing) | (PostProcessing, Publishing) => true,
            (Publishing, Done) => true,
            _ => false,
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunPhase::Staged => "staged",
            RunPhase::Running => "running",
            RunPhase::PostProcessing => "post-processing",
            RunPhase::Publishing => "publishing",
            RunPhase::Done => "done",
            RunPhase::Errored => "errored",
        };
        f.write_str(s)
    }
}

/// Current phase of a run, advanced only along valid transitions.
#[derive(Debug)]
pub struct PhaseTracker {
    run_id: String,
    phase: RunPhase,
}

impl PhaseTracker {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            phase: RunPhase::Staged,
        }
    }

    pub fn current(&self) -> RunPhase {
        self.phase
    }

    pub fn advance(&mut self, next: RunPhase) -> Result<()> {
        if !self.phase.can_transition_to(next) {
            return Err(PropagatorError::Other(anyhow::anyhow!(
                "run {}: invalid phase transition {} -> {}",
                self.run_id,
                self.phase,
                next
            )));
        }
        debug!(run_id = %self.run_id, from = %self.phase, to = %next, "run phase");
        self.phase = next;
        Ok(())
    }

    /// Move to `Errored` unless already terminal.
    pub fn fail(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = RunPhase::Errored;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_is_linear() {
        let mut t = PhaseTracker::new("r1");
        for next in [
            RunPhase::Running,
            RunPhase::PostProcessing,
            RunPhase::Publishing,
            RunPhase::Done,
        ] {
            t.advance(next).unwrap();
        }
        assert_eq!(t.current(), RunPhase::Done);
    }

    #[test]
    fn skipping_a_phase_is_rejected() {
        let mut t = PhaseTracker::new("r1");
        assert!(t.advance(RunPhase::Publishing).is_err());
        assert_eq!(t.current(), RunPhase::Staged);
    }

    #[test]
    fn errored_is_absorbing() {
        let mut t = PhaseTracker::new("r1");
        t.advance(RunPhase::Running).unwrap();
        t.advance(RunPhase::Errored).unwrap();
        assert!(t.advance(RunPhase::PostProcessing).is_err());
        assert!(t.advance(RunPhase::Errored).is_err());
        t.fail();
        assert_eq!(t.current(), RunPhase::Errored);
    }

    #[test]
    fn done_cannot_fail() {
        assert!(!RunPhase::Done.can_transition_to(RunPhase::Errored));
        assert!(RunPhase::Staged.can_transition_to(RunPhase::Errored));
    }
}
