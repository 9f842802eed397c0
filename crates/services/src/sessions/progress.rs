use prep_core::model::{ModuleKey, SessionPhase, SessionState, TestDefinition};

/// Aggregated view of progress through the whole test, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub position: ModuleKey,
    pub section_name: String,
    pub module_name: String,
    pub modules_total: usize,
    /// Modules already submitted.
    pub modules_done: usize,
    pub questions_total: usize,
    pub answered: usize,
    pub phase: SessionPhase,
    pub remaining_seconds: u32,
}

impl SessionProgress {
    #[must_use]
    pub fn from_state(test: &TestDefinition, state: &SessionState) -> Self {
        let position = state.position();
        let keys: Vec<ModuleKey> = test.module_keys().collect();
        let modules_done = match state.phase() {
            SessionPhase::AwaitingScore => keys.len(),
            SessionPhase::Break => keys.iter().filter(|k| **k <= position).count(),
            SessionPhase::Module => keys.iter().filter(|k| **k < position).count(),
        };
        let answered = state
            .flatten_answers(test)
            .iter()
            .filter(|a| !a.is_empty())
            .count();

        Self {
            position,
            section_name: test
                .section(position.section)
                .map(|s| s.name().to_string())
                .unwrap_or_default(),
            module_name: test
                .module(position)
                .map(|m| m.name().to_string())
                .unwrap_or_default(),
            modules_total: keys.len(),
            modules_done,
            questions_total: test.total_questions(),
            answered,
            phase: state.phase(),
            remaining_seconds: state.remaining_seconds(),
        }
    }

    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.modules_done == self.modules_total
    }
}
