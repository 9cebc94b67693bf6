use crate::domain::model::RunState;

/// Follows one run through its lifecycle and logs every transition.
#[derive(Debug, Clone)]
pub struct RunTracker {
    run_id: String,
    state: RunState,
    history: Vec<RunState>,
}

impl RunTracker {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            state: RunState::Idle,
            history: vec![RunState::Idle],
        }
    }

    /// Run id derived from the current UTC time.
    pub fn timestamped() -> Self {
        Self::new(format!(
            "run_{}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S%3f")
        ))
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn history(&self) -> &[RunState] {
        &self.history
    }

    pub fn advance(&mut self, next: RunState) {
        tracing::debug!(run_id = %self.run_id, "{} -> {}", self.state, next);
        self.state = next;
        self.history.push(next);
    }

    pub fn fail(&mut self, reason: &dyn std::fmt::Display) {
        tracing::warn!(run_id = %self.run_id, "run failed while {}: {}", self.state, reason);
        self.advance(RunState::Failed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_records_transitions() {
        let mut tracker = RunTracker::new("r1");
        tracker.advance(RunState::Resolving);
        tracker.fail(&"bad link");

        assert_eq!(tracker.state(), RunState::Failed);
        assert_eq!(
            tracker.history(),
            &[RunState::Idle, RunState::Resolving, RunState::Failed]
        );
    }

    #[test]
    fn test_timestamped_run_id() {
        assert!(RunTracker::timestamped().run_id().starts_with("run_"));
    }
}
