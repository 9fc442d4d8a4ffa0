use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Running)
                | (Self::Running, Self::Completed | Self::Failed | Self::Cancelled)
        )
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Live state of one pipeline run. Mutated only by the engine on behalf of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunState {
    pub run_id: Uuid,
    pub pipeline: String,
    pub status: RunStatus,
    pub current_stage: Option<String>,
    /// 0 to 100.
    pub progress: u8,
    pub documents_processed: usize,
    pub errors: Vec<String>,
    pub started_at: DateTime<Utc>,
}

impl RunState {
    #[must_use]
    pub fn new(pipeline: impl Into<String>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            pipeline: pipeline.into(),
            status: RunStatus::Idle,
            current_stage: None,
            progress: 0,
            documents_processed: 0,
            errors: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// Apply `next` if the state machine allows it. Returns whether it did.
    pub fn transition(&mut self, next: RunStatus) -> bool {
        if !self.status.can_transition_to(next) {
            return false;
        }
        self.status = next;
        if next.is_terminal() {
            self.current_stage = None;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_transitions() {
        let mut state = RunState::new("p");
        assert_eq!(state.status, RunStatus::Idle);
        assert!(!state.transition(RunStatus::Completed));
        assert!(state.transition(RunStatus::Running));
        assert!(state.transition(RunStatus::Completed));
        assert_eq!(state.status, RunStatus::Completed);
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [RunStatus::Completed, RunStatus::Failed, RunStatus::Cancelled] {
            let mut state = RunState::new("p");
            state.transition(RunStatus::Running);
            assert!(state.transition(terminal));
            for next in [
                RunStatus::Idle,
                RunStatus::Running,
                RunStatus::Completed,
                RunStatus::Failed,
                RunStatus::Cancelled,
            ] {
                assert!(!state.transition(next));
            }
            assert_eq!(state.status, terminal);
        }
    }

    #[test]
    fn cancel_only_from_running() {
        let mut state = RunState::new("p");
        assert!(!state.transition(RunStatus::Cancelled));
        state.transition(RunStatus::Running);
        state.current_stage = Some("split".into());
        assert!(state.transition(RunStatus::Cancelled));
        assert!(state.current_stage.is_none());
    }
}
